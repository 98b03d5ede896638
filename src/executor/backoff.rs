//! Exponential backoff with proportional jitter.

// self
use crate::{_prelude::*, executor::ExecutorConfig};

/// Delay schedule between attempts of one operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
	/// Delay before the first retry.
	pub initial: StdDuration,
	/// Ceiling for the exponential delay and for Retry-After hints.
	pub max: StdDuration,
	/// Upper bound of the jitter fraction.
	pub jitter_ratio: f64,
}
impl Backoff {
	/// Builds the schedule described by `config`.
	pub fn from_config(config: &ExecutorConfig) -> Self {
		Self {
			initial: config.initial_retry_delay,
			max: config.max_retry_delay,
			jitter_ratio: config.jitter_ratio,
		}
	}

	/// `min(initial * 2^retry, max)` without jitter; `retry` is zero-based.
	pub fn base_delay(&self, retry: u32) -> StdDuration {
		2_u32
			.checked_pow(retry)
			.and_then(|factor| self.initial.checked_mul(factor))
			.map_or(self.max, |delay| delay.min(self.max))
	}

	/// Adds `jitter_ratio * sample` of `base` on top of it; `sample` lies in `[0, 1)`.
	pub fn jittered(&self, base: StdDuration, sample: f64) -> StdDuration {
		base + base.mul_f64(self.jitter_ratio * sample.clamp(0.0, 1.0))
	}

	/// Delay before retry number `retry`, honoring a server hint up to `max`.
	pub fn delay(&self, retry: u32, retry_after: Option<StdDuration>) -> StdDuration {
		let delay = self.jittered(self.base_delay(retry), rand::random::<f64>());

		match retry_after {
			Some(hint) if hint > delay => hint.min(self.max).max(delay),
			_ => delay,
		}
	}
}
