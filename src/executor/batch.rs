// crates.io
use futures::stream::{FuturesUnordered, StreamExt};
// self
use crate::{
	_prelude::*,
	error::RemoteError,
	executor::{BatchOptions, BatchProgress, ExecuteOptions, ExecutionOutcome, Executor},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

impl Executor {
	/// Runs every operation through the shared concurrency bound and reports each outcome.
	///
	/// Outcomes come back in submission order even though items may finish in any order. In
	/// the default mode every item runs to completion regardless of the others. With
	/// [`BatchOptions::fail_fast`] the first failure cancels the remaining items, which release
	/// their slots, and the batch returns [`Error::BatchAborted`].
	pub async fn execute_batch<T, I, F, Fut>(
		&self,
		ops: I,
		options: BatchOptions,
	) -> Result<Vec<ExecutionOutcome<T>>>
	where
		I: IntoIterator<Item = F>,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		const KIND: OperationKind = OperationKind::Batch;

		let span = OperationSpan::with_context(
			KIND,
			"execute_batch",
			options.item.label.as_deref(),
			&options.item.metadata,
		);

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.drive_batch(ops, &options)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn drive_batch<T, I, F, Fut>(
		&self,
		ops: I,
		options: &BatchOptions,
	) -> Result<Vec<ExecutionOutcome<T>>>
	where
		I: IntoIterator<Item = F>,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		let cancellation = super::scoped_cancellation(options.item.cancellation.as_ref());
		let item_options =
			ExecuteOptions { cancellation: Some(cancellation.clone()), ..options.item.clone() };
		let item_options = &item_options;
		let mut pending = ops
			.into_iter()
			.enumerate()
			.map(|(index, op)| async move {
				let (attempts, result) = self.run(op, item_options).await;

				ExecutionOutcome { index, attempts, result }
			})
			.collect::<FuturesUnordered<_>>();
		let total = pending.len();
		let mut slots = (0..total).map(|_| None).collect::<Vec<Option<ExecutionOutcome<T>>>>();
		let mut completed = 0;

		while let Some(outcome) = pending.next().await {
			completed += 1;

			if let Some(callback) = &options.on_progress {
				callback(&BatchProgress {
					completed,
					total,
					index: outcome.index,
					error: outcome.result.as_ref().err(),
				});
			}

			let ExecutionOutcome { index, attempts, result } = outcome;

			match result {
				Err(err) if options.fail_fast => {
					cancellation.cancel();

					// Drain so the cancelled items settle their stats before returning.
					while pending.next().await.is_some() {}

					return Err(Error::BatchAborted { index, source: Box::new(err) });
				},
				result => slots[index] = Some(ExecutionOutcome { index, attempts, result }),
			}
		}

		Ok(slots.into_iter().flatten().collect())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::executor::ExecutorConfig;

	fn executor(limit: usize) -> Executor {
		Executor::new(ExecutorConfig {
			concurrency_limit: limit,
			max_retries: 0,
			..ExecutorConfig::default()
		})
		.expect("Test executor should build.")
	}

	#[tokio::test(start_paused = true)]
	async fn outcomes_keep_submission_order() {
		let executor = executor(4);
		let ops = (0..4_u64).map(|i| {
			move || async move {
				tokio::time::sleep(StdDuration::from_millis(40 - i * 10)).await;

				Ok::<_, RemoteError>(i)
			}
		});
		let outcomes = executor
			.execute_batch(ops, BatchOptions::default())
			.await
			.expect("Batch should succeed.");
		let values = outcomes
			.into_iter()
			.map(|outcome| outcome.result.expect("Every item should succeed."))
			.collect::<Vec<_>>();

		assert_eq!(values, vec![0, 1, 2, 3]);
	}

	#[tokio::test(start_paused = true)]
	async fn progress_reports_every_item() {
		let executor = executor(2);
		let reports = Arc::new(AtomicUsize::new(0));
		let failures = Arc::new(AtomicUsize::new(0));
		let options = BatchOptions::default().with_progress({
			let reports = reports.clone();
			let failures = failures.clone();

			move |progress| {
				assert_eq!(progress.total, 3);

				reports.fetch_add(1, Ordering::SeqCst);

				if progress.error.is_some() {
					failures.fetch_add(1, Ordering::SeqCst);
				}
			}
		});
		let ops = (0..3).map(|i| {
			move || async move {
				if i == 1 { Err(RemoteError::status(404, "gone")) } else { Ok(i) }
			}
		});
		let outcomes = executor.execute_batch(ops, options).await.expect("Batch should finish.");

		assert_eq!(outcomes.len(), 3);
		assert_eq!(reports.load(Ordering::SeqCst), 3);
		assert_eq!(failures.load(Ordering::SeqCst), 1);
	}
}
