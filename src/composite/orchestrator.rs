//! Saga driver: creates the parent and its children through the executor and compensates on
//! failure.

// self
use crate::{
	_prelude::*,
	auth::RecordId,
	composite::{
		self, CompositeError, CompositeRequest, CompositeResult, Rollback, RollbackPolicy,
	},
	envelope::Envelope,
	executor::{ExecuteOptions, Executor},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	remote::RecordApi,
};

/// Drives the parent-then-children saga through a shared executor.
pub struct Orchestrator<A>
where
	A: ?Sized + RecordApi,
{
	api: Arc<A>,
	executor: Executor,
	rollback_policy: RollbackPolicy,
	options: ExecuteOptions,
}
impl<A> Orchestrator<A>
where
	A: ?Sized + RecordApi,
{
	/// Creates an orchestrator using [`RollbackPolicy::CascadeParent`].
	pub fn new(api: impl Into<Arc<A>>, executor: Executor) -> Self {
		Self {
			api: api.into(),
			executor,
			rollback_policy: RollbackPolicy::default(),
			options: ExecuteOptions::default(),
		}
	}

	/// Overrides the rollback policy.
	pub fn with_rollback_policy(mut self, policy: RollbackPolicy) -> Self {
		self.rollback_policy = policy;

		self
	}

	/// Options applied to every create call; label, metadata, cancellation, and deadline.
	///
	/// Rollback deletes keep the metadata but ignore cancellation and deadlines so a cancelled
	/// composite still cleans up after itself.
	pub fn with_execute_options(mut self, options: ExecuteOptions) -> Self {
		self.options = options;

		self
	}

	/// Executor shared with other callers.
	pub fn executor(&self) -> &Executor {
		&self.executor
	}

	/// Creates the parent, then every child in order, rolling back on the first child failure.
	pub async fn create_composite(
		&self,
		request: CompositeRequest,
	) -> Result<CompositeResult, CompositeError> {
		const KIND: OperationKind = OperationKind::Composite;

		let span = OperationSpan::with_context(
			KIND,
			"create_composite",
			self.options.label.as_deref(),
			&self.options.metadata,
		);

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.run_saga(&request)).await;

		obs::record_result(KIND, &result);

		result
	}

	/// [`create_composite`](Self::create_composite) wrapped in the standard envelope.
	pub async fn create_composite_envelope(
		&self,
		request: CompositeRequest,
	) -> Envelope<CompositeResult> {
		match self.create_composite(request).await {
			Ok(result) => Envelope::ok(result),
			Err(err) => Envelope::err(err.to_envelope_error()),
		}
	}

	async fn run_saga(&self, request: &CompositeRequest) -> Result<CompositeResult, CompositeError> {
		let total = request.children.len();
		let parent_id = self
			.executor
			.execute(|| self.api.create_parent(&request.parent), self.step_options("create_parent"))
			.await
			.map_err(|source| CompositeError::ParentCreateFailed { source })?;
		let mut child_ids = Vec::with_capacity(total);

		for (child_index, child) in request.children.iter().enumerate() {
			let created = self
				.executor
				.execute(
					|| self.api.create_child(&parent_id, child),
					self.step_options("create_child")
						.with_metadata("child_index", child_index.to_string()),
				)
				.await;

			match created {
				Ok(child_id) => child_ids.push(child_id),
				Err(source) => {
					obs::rollback_started(&parent_id, child_index, child_ids.len());

					let rollback = self.roll_back(&parent_id, &child_ids).await;

					return Err(CompositeError::TaskCreateFailed {
						child_name: composite::child_name(child),
						partial_children_created: child_ids.len(),
						total_children_requested: total,
						parent_id,
						child_index,
						rollback,
						source,
					});
				},
			}
		}

		Ok(CompositeResult { parent_id, succeeded_count: child_ids.len(), child_ids })
	}

	async fn roll_back(&self, parent_id: &RecordId, child_ids: &[RecordId]) -> Rollback {
		const KIND: OperationKind = OperationKind::Rollback;

		let span = OperationSpan::with_context(
			KIND,
			"roll_back",
			self.options.label.as_deref(),
			&self.options.metadata,
		);

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let rollback = span
			.instrument(async {
				let mut children_deleted = 0;

				if self.rollback_policy == RollbackPolicy::ExplicitChildren {
					for child_id in child_ids.iter().rev() {
						let deleted = self
							.executor
							.execute(|| self.api.delete_child(child_id), self.rollback_options())
							.await;

						if let Err(source) = deleted {
							return Rollback::Failed { children_deleted, source: Box::new(source) };
						}

						children_deleted += 1;
					}
				}

				match self
					.executor
					.execute(|| self.api.delete_parent(parent_id), self.rollback_options())
					.await
				{
					Ok(()) => Rollback::Completed { children_deleted },
					Err(source) => Rollback::Failed { children_deleted, source: Box::new(source) },
				}
			})
			.await;

		match &rollback {
			Rollback::Completed { .. } => {
				obs::rollback_completed(parent_id);
				obs::record_operation_outcome(KIND, OperationOutcome::Success);
			},
			Rollback::Failed { source, .. } => {
				obs::rollback_failed(parent_id, source);
				obs::record_operation_outcome(KIND, OperationOutcome::Failure);
			},
		}

		rollback
	}

	fn step_options(&self, step: &'static str) -> ExecuteOptions {
		let options = self.options.clone().with_metadata("step", step);

		if options.label.is_some() { options } else { options.with_label(step) }
	}

	fn rollback_options(&self) -> ExecuteOptions {
		ExecuteOptions { cancellation: None, deadline: None, ..self.step_options("roll_back") }
	}
}
impl<A> Clone for Orchestrator<A>
where
	A: ?Sized + RecordApi,
{
	fn clone(&self) -> Self {
		Self {
			api: self.api.clone(),
			executor: self.executor.clone(),
			rollback_policy: self.rollback_policy,
			options: self.options.clone(),
		}
	}
}
impl<A> Debug for Orchestrator<A>
where
	A: ?Sized + RecordApi,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Orchestrator")
			.field("executor", &self.executor)
			.field("rollback_policy", &self.rollback_policy)
			.field("options", &self.options)
			.finish()
	}
}
