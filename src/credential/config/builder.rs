// self
use crate::{
	_prelude::*,
	auth::CacheKey,
	credential::{CredentialConfig, SigningKey},
	error::ConfigError,
};

/// Builder for [`CredentialConfig`] values.
#[derive(Debug, Default)]
pub struct CredentialConfigBuilder {
	config: CredentialConfig,
}
impl CredentialConfigBuilder {
	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.config.client_id = client_id.into();

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.config.token_endpoint = Some(url);

		self
	}

	/// Overrides the assertion audience (defaults to the token endpoint).
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.config.audience = Some(audience.into());

		self
	}

	/// Sets the requested scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.config.scope = scope.into();

		self
	}

	/// Sets the key identifier placed in the assertion header.
	pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
		self.config.key_id = key_id.into();

		self
	}

	/// Sets the hex certificate thumbprint rendered as `x5t`.
	pub fn certificate_thumbprint(mut self, thumbprint: impl Into<String>) -> Self {
		self.config.certificate_thumbprint = Some(thumbprint.into());

		self
	}

	/// Sets the assertion signing key.
	pub fn signing_key(mut self, key: SigningKey) -> Self {
		self.config.signing_key = Some(key);

		self
	}

	/// Overrides the assertion lifetime (defaults to and capped at 55 minutes).
	pub fn assertion_lifetime(mut self, lifetime: Duration) -> Self {
		self.config.assertion_lifetime = lifetime;

		self
	}

	/// Overrides the refresh safety margin (defaults to 5 minutes).
	pub fn safety_margin(mut self, margin: Duration) -> Self {
		self.config.safety_margin = margin;

		self
	}

	/// Overrides the cache key (defaults to the client identifier).
	pub fn cache_key(mut self, key: CacheKey) -> Self {
		self.config.cache_key = Some(key);

		self
	}

	/// Serve a cached, unexpired token when a refresh fails (default `true`).
	pub fn serve_stale_on_error(mut self, enabled: bool) -> Self {
		self.config.serve_stale_on_error = enabled;

		self
	}

	/// Validates and returns the config.
	pub fn build(self) -> Result<CredentialConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn build_fails_fast_on_first_missing_field() {
		let err = CredentialConfig::builder()
			.client_id("client-1")
			.scope("records/.default")
			.build()
			.expect_err("Builder should reject configs without a token endpoint.");

		assert!(matches!(err, ConfigError::MissingField { field: "token_endpoint" }));
	}

	#[test]
	fn build_applies_overrides() {
		let config = CredentialConfig::builder()
			.client_id("client-1")
			.token_endpoint(
				Url::parse("https://login.example.com/token").expect("Endpoint fixture should parse."),
			)
			.audience("api://records")
			.scope("records/.default")
			.key_id("key-1")
			.signing_key(SigningKey::hmac("secret"))
			.safety_margin(Duration::seconds(30))
			.serve_stale_on_error(false)
			.build()
			.expect("Complete builder should succeed.");

		assert_eq!(config.effective_audience().as_deref(), Some("api://records"));
		assert_eq!(config.safety_margin, Duration::seconds(30));
		assert!(!config.serve_stale_on_error);
	}
}
