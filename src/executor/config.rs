//! Executor tuning knobs.

// crates.io
use tokio::sync::Semaphore;
// self
use crate::{_prelude::*, error::ConfigError};

/// Default ceiling on simultaneously active remote calls.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY: StdDuration = StdDuration::from_millis(1_000);
/// Default ceiling for the exponential part of the backoff.
pub const DEFAULT_MAX_RETRY_DELAY: StdDuration = StdDuration::from_millis(32_000);
/// Default upper bound of the random jitter, as a fraction of the computed delay.
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;
/// Default limit on a single attempt, so a stalled call gives its slot back.
pub const DEFAULT_ATTEMPT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Concurrency and retry settings shared by every call routed through one executor.
///
/// Durations (de)serialize as integer milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
	/// Maximum number of operations allowed to run at once.
	pub concurrency_limit: usize,
	/// Retries after the first attempt; `max_retries + 1` attempts in total.
	pub max_retries: u32,
	/// Delay before the first retry; doubles on every further retry.
	#[serde(with = "duration_ms")]
	pub initial_retry_delay: StdDuration,
	/// Ceiling applied to the doubled delay and to server Retry-After hints.
	#[serde(with = "duration_ms")]
	pub max_retry_delay: StdDuration,
	/// Jitter added on top of the delay, drawn uniformly from `[0, jitter_ratio)`.
	pub jitter_ratio: f64,
	/// Upper bound for a single attempt; an attempt exceeding it fails as a transient timeout.
	///
	/// Defaults to [`DEFAULT_ATTEMPT_TIMEOUT`]; `None` (`null` when deserialized) lets attempts
	/// run unbounded.
	#[serde(with = "option_duration_ms")]
	pub attempt_timeout: Option<StdDuration>,
}
impl ExecutorConfig {
	/// Rejects settings that would stall or overflow the executor.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.concurrency_limit == 0 {
			return Err(ConfigError::InvalidExecutorSetting {
				setting: "concurrency_limit",
				reason: "must be at least 1",
			});
		}
		if self.concurrency_limit > Semaphore::MAX_PERMITS {
			return Err(ConfigError::InvalidExecutorSetting {
				setting: "concurrency_limit",
				reason: "exceeds the semaphore permit limit",
			});
		}
		if self.initial_retry_delay > self.max_retry_delay {
			return Err(ConfigError::InvalidExecutorSetting {
				setting: "initial_retry_delay",
				reason: "must not exceed max_retry_delay",
			});
		}
		if !(0.0..=1.0).contains(&self.jitter_ratio) {
			return Err(ConfigError::InvalidExecutorSetting {
				setting: "jitter_ratio",
				reason: "must be within 0.0..=1.0",
			});
		}
		if self.attempt_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(ConfigError::InvalidExecutorSetting {
				setting: "attempt_timeout",
				reason: "must be greater than zero",
			});
		}

		Ok(())
	}
}
impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
			max_retries: DEFAULT_MAX_RETRIES,
			initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
			max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
			jitter_ratio: DEFAULT_JITTER_RATIO,
			attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
		}
	}
}

mod duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(StdDuration::from_millis(u64::deserialize(deserializer)?))
	}
}

mod option_duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Option<StdDuration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(value) => super::duration_ms::serialize(value, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<StdDuration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<u64>::deserialize(deserializer)?.map(StdDuration::from_millis))
	}
}
