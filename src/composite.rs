//! All-or-nothing creation of a parent record and its ordered children.
//!
//! [`Orchestrator::create_composite`] creates the parent, then each child in submission order,
//! one at a time, through the shared [`Executor`](crate::executor::Executor). When a child
//! fails the parent is deleted again (a compensating rollback), so a failed composite leaves
//! nothing behind unless the rollback itself fails. That last case is reported through
//! [`CompositeError::manual_cleanup_required`].

pub mod orchestrator;

pub use orchestrator::Orchestrator;

// self
use crate::{
	_prelude::*,
	auth::RecordId,
	envelope::{EnvelopeError, source_chain},
	error::ErrorCode,
};

/// Parent payload plus the ordered child payloads to create under it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeRequest {
	/// Parent record payload.
	pub parent: Value,
	/// Child record payloads; created in this order.
	#[serde(default)]
	pub children: Vec<Value>,
}
impl CompositeRequest {
	/// Creates a request.
	pub fn new(parent: Value, children: Vec<Value>) -> Self {
		Self { parent, children }
	}
}

/// Identifiers of a fully created composite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
	/// Parent record identifier.
	pub parent_id: RecordId,
	/// Child identifiers in submission order.
	pub child_ids: Vec<RecordId>,
	/// Number of children created.
	pub succeeded_count: usize,
}

/// How a failed composite is compensated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPolicy {
	/// Delete only the parent; the remote system cascades the delete to its children.
	#[default]
	CascadeParent,
	/// Delete created children in reverse order, then the parent.
	ExplicitChildren,
}

/// Result of the compensating rollback.
#[derive(Debug)]
pub enum Rollback {
	/// Parent (and, with [`RollbackPolicy::ExplicitChildren`], its children) removed.
	Completed {
		/// Children deleted explicitly before the parent.
		children_deleted: usize,
	},
	/// Compensation stopped early; the parent still exists.
	Failed {
		/// Children deleted explicitly before the failure.
		children_deleted: usize,
		/// Failure of the delete that stopped the rollback.
		source: Box<Error>,
	},
}
impl Rollback {
	/// Returns `true` when the parent was removed.
	pub fn succeeded(&self) -> bool {
		matches!(self, Self::Completed { .. })
	}
}

/// Failure of a composite creation.
#[derive(Debug, ThisError)]
pub enum CompositeError {
	/// The parent could not be created; nothing was left behind.
	#[error("Parent record could not be created.")]
	ParentCreateFailed {
		/// Executor failure of the parent create.
		#[source]
		source: Error,
	},
	/// A child failed after the parent existed; a rollback was attempted.
	#[error(
		"Child record {child_index} of {total_children_requested} could not be created under parent {parent_id}."
	)]
	TaskCreateFailed {
		/// Parent that was created and then rolled back (or orphaned).
		parent_id: RecordId,
		/// Zero-based index of the failing child.
		child_index: usize,
		/// `name` or `title` of the failing child payload, when present.
		child_name: Option<String>,
		/// Children created before the failure.
		partial_children_created: usize,
		/// Children in the request.
		total_children_requested: usize,
		/// Outcome of the compensating rollback.
		rollback: Rollback,
		/// Executor failure of the child create.
		#[source]
		source: Error,
	},
}
impl CompositeError {
	/// Machine-readable classification.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::ParentCreateFailed { .. } => ErrorCode::ParentCreateFailed,
			Self::TaskCreateFailed { .. } => ErrorCode::TaskCreateFailed,
		}
	}

	/// Returns `true` when the rollback failed and the parent record is orphaned.
	pub fn manual_cleanup_required(&self) -> bool {
		matches!(self, Self::TaskCreateFailed { rollback: Rollback::Failed { .. }, .. })
	}

	/// Renders the envelope descriptor, with progress and rollback status under `details`.
	pub fn to_envelope_error(&self) -> EnvelopeError {
		match self {
			Self::ParentCreateFailed { source } =>
				EnvelopeError::new(self.code(), "Failed to create the parent record.")
					.with_details(serde_json::json!({ "cause": cause_details(source) })),
			Self::TaskCreateFailed {
				parent_id,
				child_index,
				child_name,
				partial_children_created,
				total_children_requested,
				rollback,
				source,
			} => {
				let (message, rollback_details) = match rollback {
					Rollback::Completed { children_deleted } => (
						format!(
							"Failed to create child {} of {total_children_requested}; the parent record was rolled back.",
							child_index + 1
						),
						serde_json::json!({
							"status": "completed",
							"childrenDeleted": children_deleted,
						}),
					),
					Rollback::Failed { children_deleted, source } => (
						format!(
							"Failed to create child {} of {total_children_requested}; rollback failed and the parent record requires manual cleanup.",
							child_index + 1
						),
						serde_json::json!({
							"status": "failed",
							"code": ErrorCode::RollbackFailed,
							"childrenDeleted": children_deleted,
							"cause": cause_details(source),
						}),
					),
				};

				EnvelopeError::new(self.code(), message).with_details(serde_json::json!({
					"parentId": parent_id,
					"failedChildIndex": child_index,
					"failedChildName": child_name,
					"partialChildrenCreated": partial_children_created,
					"totalChildrenRequested": total_children_requested,
					"manualCleanupRequired": !rollback.succeeded(),
					"rollback": rollback_details,
					"cause": cause_details(source),
				}))
			},
		}
	}
}
impl From<&CompositeError> for EnvelopeError {
	fn from(err: &CompositeError) -> Self {
		err.to_envelope_error()
	}
}

fn cause_details(err: &Error) -> Value {
	serde_json::json!({
		"code": err.code(),
		"message": err.to_string(),
		"attempts": err.attempts(),
		"causes": source_chain(err),
	})
}

/// Display name of a child payload for diagnostics.
pub(crate) fn child_name(payload: &Value) -> Option<String> {
	["name", "title"]
		.into_iter()
		.find_map(|field| payload.get(field).and_then(Value::as_str))
		.map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::RemoteError;

	fn task_failure(rollback: Rollback) -> CompositeError {
		CompositeError::TaskCreateFailed {
			parent_id: RecordId::new("p-1").expect("Record id fixture should be valid."),
			child_index: 2,
			child_name: Some("Write docs".into()),
			partial_children_created: 2,
			total_children_requested: 3,
			rollback,
			source: Error::Terminal { attempts: 1, source: RemoteError::status(400, "Title required") },
		}
	}

	#[test]
	fn rolled_back_failure_envelope() {
		let err = task_failure(Rollback::Completed { children_deleted: 0 });
		let envelope = err.to_envelope_error();

		assert!(!err.manual_cleanup_required());
		assert_eq!(envelope.code, ErrorCode::TaskCreateFailed);
		assert_eq!(envelope.details["partialChildrenCreated"], 2);
		assert_eq!(envelope.details["failedChildName"], "Write docs");
		assert_eq!(envelope.details["rollback"]["status"], "completed");
		assert_eq!(envelope.details["cause"]["code"], "TERMINAL_REMOTE_ERROR");
		assert!(!envelope.message.contains("Title required"));
	}

	#[test]
	fn failed_rollback_requires_manual_cleanup() {
		let err = task_failure(Rollback::Failed {
			children_deleted: 0,
			source: Box::new(Error::RetriesExhausted {
				attempts: 4,
				last: RemoteError::status(503, "busy"),
			}),
		});
		let envelope = EnvelopeError::from(&err);

		assert!(err.manual_cleanup_required());
		assert_eq!(err.code(), ErrorCode::TaskCreateFailed);
		assert_eq!(envelope.details["manualCleanupRequired"], true);
		assert_eq!(envelope.details["rollback"]["code"], "ROLLBACK_FAILED");
		assert!(envelope.message.contains("manual cleanup"));
	}

	#[test]
	fn child_names_come_from_name_or_title() {
		assert_eq!(child_name(&serde_json::json!({ "title": "Review" })).as_deref(), Some("Review"));
		assert_eq!(child_name(&serde_json::json!({ "name": "A", "title": "B" })).as_deref(), Some("A"));
		assert_eq!(child_name(&serde_json::json!(["not", "an", "object"])), None);
	}
}
