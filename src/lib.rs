//! Authenticated, rate-limited record operations: cached client-assertion tokens, a bounded
//! retrying executor, and all-or-nothing composite creation with compensating rollback.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub mod auth;
pub mod composite;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod http;
pub mod obs;
pub mod remote;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		credential::{CredentialConfig, CredentialManager, SigningKey, TokenProvider},
		executor::{Executor, ExecutorConfig},
		http::ReqwestHttpClient,
		remote::{HttpRecordApi, RecordEndpoints},
		store::{MemoryTokenCache, TokenCache},
	};

	/// Shared secret used to sign HS256 client assertions in tests.
	pub const TEST_SIGNING_SECRET: &str = "record-broker-test-signing-secret";

	/// Builds a credential config pointing at `token_endpoint` with an HS256 signing key.
	pub fn test_credential_config(token_endpoint: &str) -> CredentialConfig {
		CredentialConfig::builder()
			.client_id("record-broker-tests")
			.token_endpoint(
				Url::parse(token_endpoint).expect("Failed to parse test token endpoint URL."),
			)
			.scope("https://records.example.com/.default")
			.key_id("test-key")
			.signing_key(SigningKey::hmac(TEST_SIGNING_SECRET))
			.build()
			.expect("Failed to build test credential config.")
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`CredentialManager`] backed by an in-memory cache and the reqwest transport
	/// used across integration tests.
	pub fn build_test_credential_manager(
		config: CredentialConfig,
	) -> (CredentialManager<ReqwestHttpClient>, Arc<MemoryTokenCache>) {
		let cache_backend = Arc::new(MemoryTokenCache::default());
		let cache: Arc<dyn TokenCache> = cache_backend.clone();
		let manager = CredentialManager::with_parts(config, test_reqwest_http_client(), cache)
			.expect("Failed to build test credential manager.");

		(manager, cache_backend)
	}

	/// Record API client over the insecure test transport, so it can reach `httpmock`'s HTTPS
	/// server.
	pub fn build_test_record_api(
		endpoints: RecordEndpoints,
		tokens: Arc<dyn TokenProvider>,
	) -> HttpRecordApi {
		HttpRecordApi::with_client(test_reqwest_http_client().0, endpoints, tokens)
			.expect("Failed to build test record API client.")
	}

	/// Executor with millisecond backoff so retry tests stay fast.
	pub fn fast_executor(concurrency_limit: usize, max_retries: u32) -> Executor {
		let config = ExecutorConfig {
			concurrency_limit,
			max_retries,
			initial_retry_delay: StdDuration::from_millis(1),
			max_retry_delay: StdDuration::from_millis(8),
			..ExecutorConfig::default()
		};

		Executor::new(config).expect("Failed to build test executor.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
