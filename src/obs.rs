//! Optional observability helpers for token exchanges, executor calls, and composite sagas.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `record_broker.operation` with the `operation` and
//!   `stage` fields, plus structured events for retries, rollbacks, and token refreshes.
//! - Enable `metrics` to increment the `record_broker_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Client-assertion token exchange.
	TokenExchange,
	/// Single executor call.
	Execute,
	/// Executor batch.
	Batch,
	/// Composite parent + children creation.
	Composite,
	/// Compensating rollback of a composite creation.
	Rollback,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::TokenExchange => "token_exchange",
			OperationKind::Execute => "execute",
			OperationKind::Batch => "batch",
			OperationKind::Composite => "composite",
			OperationKind::Rollback => "rollback",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
