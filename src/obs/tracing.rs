// self
use crate::{
	_prelude::*,
	auth::RecordId,
	error::RemoteError,
	obs::OperationKind,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by every public operation.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		Self::with_context(kind, stage, None, &BTreeMap::new())
	}

	/// Creates a span that also records a caller label and opaque request metadata.
	pub fn with_context(
		kind: OperationKind,
		stage: &'static str,
		label: Option<&str>,
		metadata: &BTreeMap<String, String>,
	) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"record_broker.operation",
				operation = kind.as_str(),
				stage,
				label = label.unwrap_or(""),
				metadata = ?metadata,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, label, metadata);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn retry_scheduled(attempt: u32, delay: StdDuration, error: &RemoteError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, %error, "Retrying remote call.");
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, delay, error);
}

pub(crate) fn attempt_failed(attempt: u32, error: &RemoteError) {
	#[cfg(feature = "tracing")]
	tracing::debug!(attempt, kind = ?error.kind, class = ?error.class(), %error, "Remote call failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, error);
}

pub(crate) fn token_refreshed(expires_at: OffsetDateTime) {
	#[cfg(feature = "tracing")]
	tracing::info!(%expires_at, "Access token refreshed.");
	#[cfg(not(feature = "tracing"))]
	let _ = expires_at;
}

pub(crate) fn token_refresh_failed(error: &Error, serving_stale: bool) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%error, serving_stale, "Access token refresh failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (error, serving_stale);
}

pub(crate) fn rollback_started(parent: &RecordId, failed_child: usize, created: usize) {
	#[cfg(feature = "tracing")]
	tracing::warn!(%parent, failed_child, created, "Child creation failed; rolling back parent.");
	#[cfg(not(feature = "tracing"))]
	let _ = (parent, failed_child, created);
}

pub(crate) fn rollback_completed(parent: &RecordId) {
	#[cfg(feature = "tracing")]
	tracing::info!(%parent, "Rollback removed the parent record.");
	#[cfg(not(feature = "tracing"))]
	let _ = parent;
}

pub(crate) fn rollback_failed(parent: &RecordId, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(%parent, %error, "Rollback failed; parent record requires manual cleanup.");
	#[cfg(not(feature = "tracing"))]
	let _ = (parent, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_tracing() {
		let parent = RecordId::new("parent-1").expect("Record id fixture should be valid.");

		retry_scheduled(0, StdDuration::from_millis(5), &RemoteError::status(503, "busy"));
		rollback_started(&parent, 2, 2);
		rollback_completed(&parent);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(OperationKind::Execute, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
