//! Per-call and per-batch options plus the outcome record returned for each operation.

// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Caller hint recorded with the operation; admission stays first-in, first-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	/// Background work.
	Low,
	/// Default priority.
	#[default]
	Normal,
	/// Latency-sensitive work.
	High,
}

/// Options for a single [`Executor::execute`](crate::executor::Executor::execute) call.
#[derive(Clone, Debug, Default)]
pub struct ExecuteOptions {
	/// Accepted for forward compatibility; does not reorder admission.
	pub priority: Priority,
	/// Opaque key/value pairs attached to the operation span only.
	pub metadata: BTreeMap<String, String>,
	/// Human-readable label attached to the operation span.
	pub label: Option<String>,
	/// Cancels the operation while queued, running, or backing off.
	pub cancellation: Option<CancellationToken>,
	/// Instant after which no further attempt is started or awaited.
	pub deadline: Option<Instant>,
	/// Overrides the executor-wide per-attempt timeout.
	pub attempt_timeout: Option<StdDuration>,
}
impl ExecuteOptions {
	/// Sets the label.
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());

		self
	}

	/// Adds a metadata entry.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.metadata.insert(key.into(), value.into());

		self
	}

	/// Sets the priority hint.
	pub fn with_priority(mut self, priority: Priority) -> Self {
		self.priority = priority;

		self
	}

	/// Ties the operation to `token`.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Sets an absolute deadline.
	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Sets a deadline `timeout` from now.
	pub fn with_timeout(self, timeout: StdDuration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	/// Overrides the per-attempt timeout.
	pub fn with_attempt_timeout(mut self, timeout: StdDuration) -> Self {
		self.attempt_timeout = Some(timeout);

		self
	}
}

/// Progress report handed to [`BatchOptions::on_progress`] after every finished item.
#[derive(Debug)]
pub struct BatchProgress<'a> {
	/// Items finished so far, including this one.
	pub completed: usize,
	/// Items in the batch.
	pub total: usize,
	/// Submission index of the item that just finished.
	pub index: usize,
	/// Failure of that item, if it failed.
	pub error: Option<&'a Error>,
}

/// Callback invoked with batch progress.
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress<'_>) + Send + Sync>;

/// Options for [`Executor::execute_batch`](crate::executor::Executor::execute_batch).
#[derive(Clone, Default)]
pub struct BatchOptions {
	/// Abort the batch at the first failing item.
	pub fail_fast: bool,
	/// Invoked after each item completes.
	pub on_progress: Option<ProgressCallback>,
	/// Options applied to every item.
	pub item: ExecuteOptions,
}
impl BatchOptions {
	/// Enables fail-fast mode.
	pub fn fail_fast(mut self) -> Self {
		self.fail_fast = true;

		self
	}

	/// Registers a progress callback.
	pub fn with_progress<F>(mut self, callback: F) -> Self
	where
		F: 'static + Fn(&BatchProgress<'_>) + Send + Sync,
	{
		self.on_progress = Some(Arc::new(callback));

		self
	}

	/// Sets the options applied to every item.
	pub fn with_item_options(mut self, item: ExecuteOptions) -> Self {
		self.item = item;

		self
	}
}
impl Debug for BatchOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BatchOptions")
			.field("fail_fast", &self.fail_fast)
			.field("on_progress", &self.on_progress.is_some())
			.field("item", &self.item)
			.finish()
	}
}

/// What happened to one operation.
#[derive(Debug)]
pub struct ExecutionOutcome<T> {
	/// Submission index within its batch; zero for single calls.
	pub index: usize,
	/// Attempts started, including the successful one.
	pub attempts: u32,
	/// Final value or error.
	pub result: Result<T>,
}
impl<T> ExecutionOutcome<T> {
	/// Returns `true` when the operation succeeded.
	pub fn succeeded(&self) -> bool {
		self.result.is_ok()
	}

	/// Consumes the outcome, returning its result.
	pub fn into_result(self) -> Result<T> {
		self.result
	}
}
