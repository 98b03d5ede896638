//! Bounded, retrying executor for remote operations.
//!
//! Every call waits for one of `concurrency_limit` slots (granted first-in, first-out), runs its
//! operation, and on a [`RetryClass::Transient`] failure sleeps with exponential backoff and
//! jitter before trying again. The slot stays with the operation across its backoff sleeps, so
//! the ceiling bounds logical operations rather than individual attempts. Cancellation and
//! deadlines are observed at every suspension point and release the slot immediately.

pub mod backoff;
pub mod config;
pub mod options;
pub mod stats;

mod batch;

pub use backoff::Backoff;
pub use config::*;
pub use options::*;
pub use stats::{ExecutorStats, StatsSnapshot};

// crates.io
use tokio::{sync::Semaphore, time::Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	envelope::Envelope,
	error::{RemoteError, RetryClass},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

/// Shared concurrency ceiling, retry policy, and counters.
///
/// Clones share the same slots and stats, so one executor should front one remote system.
#[derive(Clone, Debug)]
pub struct Executor {
	config: Arc<ExecutorConfig>,
	backoff: Backoff,
	permits: Arc<Semaphore>,
	stats: Arc<ExecutorStats>,
}
impl Executor {
	/// Creates an executor with its own counters.
	pub fn new(config: ExecutorConfig) -> Result<Self> {
		Self::with_stats(config, Arc::default())
	}

	/// Creates an executor reporting into an externally owned [`ExecutorStats`].
	pub fn with_stats(config: ExecutorConfig, stats: Arc<ExecutorStats>) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			backoff: Backoff::from_config(&config),
			permits: Arc::new(Semaphore::new(config.concurrency_limit)),
			config: Arc::new(config),
			stats,
		})
	}

	/// Active configuration.
	pub fn config(&self) -> &ExecutorConfig {
		&self.config
	}

	/// Counters shared by this executor and its clones.
	pub fn stats_handle(&self) -> Arc<ExecutorStats> {
		self.stats.clone()
	}

	/// Snapshot of the counters; reading has no side effects.
	pub fn stats(&self) -> StatsSnapshot {
		self.stats.snapshot()
	}

	/// Stats snapshot wrapped in the standard response envelope.
	pub fn stats_envelope(&self) -> Envelope<StatsSnapshot> {
		Envelope::ok(self.stats())
	}

	/// Zeroes the counters. Intended for tests; racing with live traffic skews the gauges.
	pub fn reset_stats(&self) {
		self.stats.reset();
	}

	/// Runs `op` under the concurrency bound, retrying transient failures.
	///
	/// `op` is invoked once per attempt. Terminal and unknown failures return after one
	/// attempt as [`Error::Terminal`]; transient failures that outlive the retry budget return
	/// [`Error::RetriesExhausted`] wrapping the last failure.
	pub async fn execute<T, F, Fut>(&self, op: F, options: ExecuteOptions) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		self.execute_with_outcome(op, options).await.result
	}

	/// Same as [`execute`](Self::execute) but also reports the number of attempts.
	pub async fn execute_with_outcome<T, F, Fut>(
		&self,
		op: F,
		options: ExecuteOptions,
	) -> ExecutionOutcome<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		let (attempts, result) = self.run(op, &options).await;

		ExecutionOutcome { index: 0, attempts, result }
	}

	pub(crate) async fn run<T, F, Fut>(&self, mut op: F, options: &ExecuteOptions) -> (u32, Result<T>)
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		const KIND: OperationKind = OperationKind::Execute;

		let span = OperationSpan::with_context(
			KIND,
			"execute",
			options.label.as_deref(),
			&options.metadata,
		);

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);
		self.stats.record_request();

		let (attempts, result) = span.instrument(self.attempt_loop(&mut op, options)).await;

		match &result {
			Ok(_) => self.stats.record_success(),
			Err(Error::Cancelled { .. }) => self.stats.record_cancelled(),
			Err(_) => self.stats.record_failure(),
		}

		obs::record_result(KIND, &result);

		(attempts, result)
	}

	async fn attempt_loop<T, F, Fut>(&self, op: &mut F, options: &ExecuteOptions) -> (u32, Result<T>)
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, RemoteError>>,
	{
		let cancellation = options.cancellation.clone().unwrap_or_default();
		let deadline = options.deadline;
		let attempt_timeout = options.attempt_timeout.or(self.config.attempt_timeout);
		let queued = self.stats.enter_queue();
		let permit = tokio::select! {
			biased;
			_ = cancellation.cancelled() => return (0, Err(Error::Cancelled { attempts: 0 })),
			_ = deadline_elapsed(deadline) =>
				return (0, Err(Error::DeadlineExceeded { attempts: 0, last: None })),
			permit = self.permits.acquire() => permit,
		};
		let Ok(_permit) = permit else {
			return (0, Err(Error::Cancelled { attempts: 0 }));
		};

		drop(queued);

		let _active = self.stats.enter_active();
		let mut attempt = 0;

		loop {
			attempt += 1;

			let outcome = tokio::select! {
				biased;
				_ = cancellation.cancelled() => return (attempt, Err(Error::Cancelled { attempts: attempt })),
				_ = deadline_elapsed(deadline) =>
					return (attempt, Err(Error::DeadlineExceeded { attempts: attempt, last: None })),
				outcome = bounded(op(), attempt_timeout) => outcome,
			};
			let err = match outcome {
				Ok(value) => return (attempt, Ok(value)),
				Err(err) => err,
			};

			obs::attempt_failed(attempt, &err);

			match err.class() {
				RetryClass::Transient if attempt <= self.config.max_retries => {},
				RetryClass::Transient =>
					return (attempt, Err(Error::RetriesExhausted { attempts: attempt, last: err })),
				RetryClass::Terminal | RetryClass::Unknown =>
					return (attempt, Err(Error::Terminal { attempts: attempt, source: err })),
			}

			let delay = self.backoff.delay(attempt - 1, err.retry_after);

			if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
				return (attempt, Err(Error::DeadlineExceeded { attempts: attempt, last: Some(err) }));
			}

			obs::retry_scheduled(attempt, delay, &err);

			tokio::select! {
				biased;
				_ = cancellation.cancelled() => return (attempt, Err(Error::Cancelled { attempts: attempt })),
				_ = tokio::time::sleep(delay) => {},
			}

			self.stats.record_retry();
		}
	}
}

async fn bounded<T, Fut>(call: Fut, timeout: Option<StdDuration>) -> Result<T, RemoteError>
where
	Fut: Future<Output = Result<T, RemoteError>>,
{
	match timeout {
		Some(limit) =>
			tokio::time::timeout(limit, call).await.unwrap_or_else(|_| Err(RemoteError::timeout())),
		None => call.await,
	}
}

async fn deadline_elapsed(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

/// Cancels every operation started with a clone of the returned token when `parent` fires.
pub(crate) fn scoped_cancellation(parent: Option<&CancellationToken>) -> CancellationToken {
	parent.map(CancellationToken::child_token).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::error::RemoteErrorKind;

	fn executor(max_retries: u32) -> Executor {
		Executor::new(ExecutorConfig {
			max_retries,
			initial_retry_delay: StdDuration::from_millis(10),
			max_retry_delay: StdDuration::from_millis(80),
			..ExecutorConfig::default()
		})
		.expect("Test executor should build.")
	}

	#[tokio::test(start_paused = true)]
	async fn transient_failures_retry_until_success() {
		let executor = executor(3);
		let calls = AtomicU32::new(0);
		let outcome = executor
			.execute_with_outcome(
				|| {
					let call = calls.fetch_add(1, Ordering::SeqCst);

					async move {
						if call < 2 { Err(RemoteError::status(503, "busy")) } else { Ok(call) }
					}
				},
				ExecuteOptions::default(),
			)
			.await;

		assert_eq!(outcome.attempts, 3);
		assert_eq!(outcome.result.expect("Third attempt should succeed."), 2);

		let stats = executor.stats();

		assert_eq!((stats.successful, stats.retried, stats.active, stats.queued), (1, 2, 0, 0));
	}

	#[tokio::test(start_paused = true)]
	async fn exhaustion_reports_attempts_and_last_failure() {
		let executor = executor(2);
		let err = executor
			.execute(
				|| async { Err::<(), _>(RemoteError::status(429, "slow down")) },
				ExecuteOptions::default(),
			)
			.await
			.expect_err("Persistent throttling should exhaust retries.");

		assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
		assert_eq!(err.remote().map(|remote| remote.kind), Some(RemoteErrorKind::Status(429)));
		assert_eq!(executor.stats().failed, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn terminal_and_unknown_failures_are_not_retried() {
		let executor = executor(3);
		let calls = AtomicU32::new(0);

		for failure in [
			RemoteError::status(400, "bad payload"),
			RemoteError::new(
				RemoteErrorKind::Transport(crate::error::TransportFailure::Other),
				"tls handshake",
			),
		] {
			calls.store(0, Ordering::SeqCst);

			let mut failure = Some(failure);
			let err = executor
				.execute(
					|| {
						calls.fetch_add(1, Ordering::SeqCst);

						let failure = failure.take().unwrap_or_else(|| RemoteError::invalid("again"));

						async move { Err::<(), _>(failure) }
					},
					ExecuteOptions::default(),
				)
				.await
				.expect_err("Terminal failure should surface.");

			assert!(matches!(err, Error::Terminal { attempts: 1, .. }));
			assert_eq!(calls.load(Ordering::SeqCst), 1);
		}

		assert_eq!(executor.stats().retried, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn attempt_timeout_counts_as_transient() {
		let executor = executor(1);
		let err = executor
			.execute(
				|| async {
					tokio::time::sleep(StdDuration::from_secs(60)).await;

					Ok::<_, RemoteError>(())
				},
				ExecuteOptions::default().with_attempt_timeout(StdDuration::from_secs(1)),
			)
			.await
			.expect_err("Stalled attempts should time out.");

		assert!(matches!(err, Error::RetriesExhausted { attempts: 2, .. }));
		assert_eq!(
			err.remote().map(|remote| remote.kind),
			Some(RemoteErrorKind::Transport(crate::error::TransportFailure::Timeout))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn default_config_cuts_off_a_stalled_attempt() {
		let executor = Executor::new(ExecutorConfig { max_retries: 0, ..ExecutorConfig::default() })
			.expect("Executor should build.");
		let started = tokio::time::Instant::now();
		let err = executor
			.execute(
				|| async {
					tokio::time::sleep(StdDuration::from_secs(3_600)).await;

					Ok::<_, RemoteError>(())
				},
				ExecuteOptions::default(),
			)
			.await
			.expect_err("A call that never answers should not hold its slot forever.");

		assert!(matches!(err, Error::RetriesExhausted { attempts: 1, .. }));
		assert!(started.elapsed() >= DEFAULT_ATTEMPT_TIMEOUT);
		assert!(started.elapsed() < StdDuration::from_secs(60));
		assert_eq!(executor.stats().active, 0);
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_stops_before_an_overlong_backoff() {
		let executor = Executor::new(ExecutorConfig {
			initial_retry_delay: StdDuration::from_secs(10),
			..ExecutorConfig::default()
		})
		.expect("Executor should build.");
		let err = executor
			.execute(
				|| async { Err::<(), _>(RemoteError::status(502, "bad gateway")) },
				ExecuteOptions::default().with_timeout(StdDuration::from_secs(5)),
			)
			.await
			.expect_err("Deadline should cut the retry loop short.");

		assert!(matches!(err, Error::DeadlineExceeded { attempts: 1, last: Some(_) }));
	}
}
