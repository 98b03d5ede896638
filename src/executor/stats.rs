//! Shared executor counters and their read-only snapshot.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Lock-free counters owned by one executor and shared by its clones.
///
/// Reads never block writers. [`ExecutorStats::reset`] is meant for test isolation; resetting
/// while operations are in flight leaves the gauges at undefined values until they drain.
#[derive(Debug, Default)]
pub struct ExecutorStats {
	total_requests: AtomicU64,
	successful: AtomicU64,
	failed: AtomicU64,
	retried: AtomicU64,
	cancelled: AtomicU64,
	queued: AtomicU64,
	active: AtomicU64,
}
impl ExecutorStats {
	/// Copies the counters and derives the success and retry percentages.
	pub fn snapshot(&self) -> StatsSnapshot {
		let total_requests = self.total_requests.load(Ordering::Relaxed);
		let successful = self.successful.load(Ordering::Relaxed);
		let retried = self.retried.load(Ordering::Relaxed);

		StatsSnapshot {
			total_requests,
			successful,
			failed: self.failed.load(Ordering::Relaxed),
			retried,
			cancelled: self.cancelled.load(Ordering::Relaxed),
			queued: self.queued.load(Ordering::Relaxed),
			active: self.active.load(Ordering::Relaxed),
			success_rate: percentage(successful, total_requests),
			retry_rate: percentage(retried, total_requests),
		}
	}

	/// Zeroes every counter.
	pub fn reset(&self) {
		for counter in [
			&self.total_requests,
			&self.successful,
			&self.failed,
			&self.retried,
			&self.cancelled,
			&self.queued,
			&self.active,
		] {
			counter.store(0, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_request(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.successful.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retried.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cancelled(&self) {
		self.cancelled.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn enter_queue(&self) -> GaugeGuard<'_> {
		GaugeGuard::enter(&self.queued)
	}

	pub(crate) fn enter_active(&self) -> GaugeGuard<'_> {
		GaugeGuard::enter(&self.active)
	}
}

/// Point-in-time copy of [`ExecutorStats`], serialized with camelCase keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
	/// Operations submitted.
	pub total_requests: u64,
	/// Operations that eventually succeeded.
	pub successful: u64,
	/// Operations that failed after their last attempt.
	pub failed: u64,
	/// Retries performed across all operations.
	pub retried: u64,
	/// Operations cancelled by their caller.
	pub cancelled: u64,
	/// Operations waiting for a concurrency slot.
	pub queued: u64,
	/// Operations holding a concurrency slot.
	pub active: u64,
	/// `successful / total_requests` as a percentage, rounded to two decimals.
	pub success_rate: f64,
	/// `retried / total_requests` as a percentage, rounded to two decimals.
	pub retry_rate: f64,
}

/// Increments a gauge on creation and decrements it on drop, so early returns and dropped
/// futures keep `queued` and `active` exact.
pub(crate) struct GaugeGuard<'a>(&'a AtomicU64);
impl<'a> GaugeGuard<'a> {
	fn enter(gauge: &'a AtomicU64) -> Self {
		gauge.fetch_add(1, Ordering::Relaxed);

		Self(gauge)
	}
}
impl Drop for GaugeGuard<'_> {
	fn drop(&mut self) {
		// Saturate so a reset racing with in-flight work cannot wrap the gauge.
		let _ = self.0.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
			Some(value.saturating_sub(1))
		});
	}
}

fn percentage(part: u64, total: u64) -> f64 {
	if total == 0 {
		return 0.0;
	}

	(part as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn snapshot_derives_rates() {
		let stats = ExecutorStats::default();

		assert_eq!(stats.snapshot().success_rate, 0.0);

		for _ in 0..3 {
			stats.record_request();
		}

		stats.record_success();
		stats.record_success();
		stats.record_failure();
		stats.record_retry();

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.total_requests, 3);
		assert_eq!(snapshot.success_rate, 66.67);
		assert_eq!(snapshot.retry_rate, 33.33);
		assert_eq!(snapshot, stats.snapshot(), "Reading stats must not change them.");
	}

	#[test]
	fn gauges_follow_guard_lifetimes_and_survive_reset() {
		let stats = ExecutorStats::default();
		let queued = stats.enter_queue();
		let active = stats.enter_active();

		assert_eq!((stats.snapshot().queued, stats.snapshot().active), (1, 1));

		drop(queued);

		assert_eq!(stats.snapshot().queued, 0);

		stats.reset();
		drop(active);

		assert_eq!(stats.snapshot().active, 0);
	}

	#[test]
	fn snapshot_serializes_camel_case() {
		let stats = ExecutorStats::default();

		stats.record_request();
		stats.record_success();

		let json = serde_json::to_value(stats.snapshot()).expect("Snapshot should serialize.");

		assert_eq!(json["totalRequests"], 1);
		assert_eq!(json["successRate"], 100.0);
		assert!(json.get("retryRate").is_some());
	}
}
