//! Remote record operations consumed by the composite orchestrator.
//!
//! [`RecordApi`] is schema-agnostic: payloads are opaque JSON values and the only contract is
//! that creates return the identifier the remote system assigned. Every method resolves to a
//! [`RemoteError`] on failure so the executor can classify it for retries.

#[cfg(feature = "reqwest")] pub mod http;

#[cfg(feature = "reqwest")] pub use http::{HttpRecordApi, RecordEndpoints};

// self
use crate::{_prelude::*, auth::RecordId, error::RemoteError};

/// Boxed future returned by [`RecordApi`] operations.
pub type RecordFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + 'a + Send>>;

/// Create/delete operations against a parent/child record store.
pub trait RecordApi
where
	Self: Send + Sync,
{
	/// Creates a parent record and returns its identifier.
	fn create_parent<'a>(&'a self, payload: &'a Value) -> RecordFuture<'a, RecordId>;

	/// Creates a child record linked to `parent` and returns its identifier.
	fn create_child<'a>(
		&'a self,
		parent: &'a RecordId,
		payload: &'a Value,
	) -> RecordFuture<'a, RecordId>;

	/// Deletes a parent record; the remote system is expected to cascade to its children.
	fn delete_parent<'a>(&'a self, parent: &'a RecordId) -> RecordFuture<'a, ()>;

	/// Deletes a single child record.
	fn delete_child<'a>(&'a self, child: &'a RecordId) -> RecordFuture<'a, ()>;
}
