//! Token cache contract and the built-in in-process backend.
//!
//! [`TokenCache`] is the seam that lets a horizontally scaled deployment swap the in-memory map
//! for a shared key-value store while keeping `CredentialManager::get_token` unchanged. Backends
//! store a token until its expiry instant and must never return one past that instant.

pub mod memory;

pub use memory::MemoryTokenCache;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CacheKey},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Get / set-with-expiry contract implemented by token cache backends.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Fetches the unexpired token cached under `key`, if any.
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AccessToken>>;

	/// Stores `token` under `key` until `token.expires_at`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a CacheKey, token: AccessToken) -> CacheFuture<'a, ()>;

	/// Removes the entry for `key`, returning the evicted token.
	fn evict<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<AccessToken>>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
