//! Credential manager issuing and caching short-lived bearer tokens.
//!
//! [`CredentialManager::get_token`] returns the cached token while it outlives the configured
//! safety margin and otherwise signs a fresh client assertion, exchanges it at the token
//! endpoint, and caches the result until its expiry. A single-flight guard makes concurrent
//! callers piggy-back on one in-flight exchange instead of stampeding the endpoint.

pub mod assertion;
pub mod config;

mod exchange;

pub use assertion::AssertionClaims;
pub use config::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, CacheKey},
	credential::assertion::AssertionSigner,
	error::ConfigError,
	http::TokenHttpClient,
	store::TokenCache,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, store::MemoryTokenCache};

#[cfg(feature = "reqwest")]
/// Credential manager specialized for the crate's default reqwest transport.
pub type ReqwestCredentialManager = CredentialManager<ReqwestHttpClient>;

/// Boxed future returned by [`TokenProvider::access_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Anything that can hand out a currently valid bearer token.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Returns a token that is safe to attach to the next remote call.
	fn access_token(&self) -> TokenFuture<'_>;
}

/// Issues and caches the bearer token of one external identity.
pub struct CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	http_client: Arc<C>,
	cache: Arc<dyn TokenCache>,
	config: Arc<CredentialConfig>,
	token_endpoint: Url,
	cache_key: CacheKey,
	signer: Arc<AssertionSigner>,
	refresh_guard: Arc<AsyncMutex<()>>,
	exchanges: Arc<AtomicU64>,
}
impl<C> CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a manager from a transport and cache backend.
	///
	/// The config is validated and the signing key parsed here, so a misconfigured manager
	/// never reaches the network.
	pub fn with_parts(
		config: CredentialConfig,
		http_client: impl Into<Arc<C>>,
		cache: Arc<dyn TokenCache>,
	) -> Result<Self> {
		config.validate()?;

		let signer = AssertionSigner::from_config(&config)?;
		let token_endpoint = config
			.token_endpoint
			.clone()
			.ok_or(ConfigError::MissingField { field: "token_endpoint" })?;
		let cache_key = config.effective_cache_key()?;

		Ok(Self {
			http_client: http_client.into(),
			cache,
			config: Arc::new(config),
			token_endpoint,
			cache_key,
			signer: Arc::new(signer),
			refresh_guard: Default::default(),
			exchanges: Default::default(),
		})
	}

	/// Validated configuration backing this manager.
	pub fn config(&self) -> &CredentialConfig {
		&self.config
	}

	/// Key the token is cached under.
	pub fn cache_key(&self) -> &CacheKey {
		&self.cache_key
	}

	/// Number of token exchanges attempted since construction, across clones.
	pub fn exchange_count(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}
}
#[cfg(feature = "reqwest")]
impl CredentialManager<ReqwestHttpClient> {
	/// Creates a manager with the default reqwest transport and an in-memory cache.
	pub fn new(config: CredentialConfig) -> Result<Self> {
		Self::with_parts(config, ReqwestHttpClient::new()?, Arc::new(MemoryTokenCache::default()))
	}
}
impl<C> Clone for CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			cache: self.cache.clone(),
			config: self.config.clone(),
			token_endpoint: self.token_endpoint.clone(),
			cache_key: self.cache_key.clone(),
			signer: self.signer.clone(),
			refresh_guard: self.refresh_guard.clone(),
			exchanges: self.exchanges.clone(),
		}
	}
}
impl<C> Debug for CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("client_id", &self.config.client_id)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("cache_key", &self.cache_key)
			.field("signer", &self.signer)
			.finish()
	}
}
impl<C> TokenProvider for CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(self.get_token())
	}
}
