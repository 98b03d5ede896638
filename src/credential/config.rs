//! Credential configuration: who we are, where to exchange, and how to sign.
//!
//! The struct deserializes from any serde format so hosts can keep it next to the rest of
//! their settings; every field is defaulted and [`CredentialConfig::validate`] reports the first
//! missing one as [`ConfigError::MissingField`] before any network call is attempted.

/// Builder API for assembling credential configs.
pub mod builder;

pub use builder::*;

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey};
// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenSecret},
	error::ConfigError,
};

/// Longest assertion lifetime the crate will sign.
pub const MAX_ASSERTION_LIFETIME: Duration = Duration::minutes(55);
/// Default assertion lifetime.
pub const DEFAULT_ASSERTION_LIFETIME: Duration = MAX_ASSERTION_LIFETIME;
/// Default window before expiry in which a cached token is refreshed instead of returned.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(300);
/// Widest accepted safety margin; token lifetimes beyond a day are not expected.
pub const MAX_SAFETY_MARGIN: Duration = Duration::hours(24);

/// Key material used to sign client assertions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningKey {
	/// PEM-encoded RSA private key; signs with RS256.
	RsaPem(TokenSecret),
	/// Shared secret; signs with HS256.
	Hmac(TokenSecret),
}
impl SigningKey {
	/// Wraps a PEM-encoded RSA private key.
	pub fn rsa_pem(pem: impl Into<String>) -> Self {
		Self::RsaPem(TokenSecret::new(pem))
	}

	/// Wraps a shared HMAC secret.
	pub fn hmac(secret: impl Into<String>) -> Self {
		Self::Hmac(TokenSecret::new(secret))
	}

	/// JWS algorithm used with this key.
	pub fn algorithm(&self) -> Algorithm {
		match self {
			Self::RsaPem(_) => Algorithm::RS256,
			Self::Hmac(_) => Algorithm::HS256,
		}
	}

	/// Returns `true` when no key material was supplied.
	pub fn is_blank(&self) -> bool {
		match self {
			Self::RsaPem(secret) | Self::Hmac(secret) => secret.is_blank(),
		}
	}

	pub(crate) fn encoding_key(&self) -> Result<EncodingKey, ConfigError> {
		match self {
			Self::RsaPem(pem) => EncodingKey::from_rsa_pem(pem.expose().as_bytes())
				.map_err(|source| ConfigError::InvalidSigningKey { source }),
			Self::Hmac(secret) => Ok(EncodingKey::from_secret(secret.expose().as_bytes())),
		}
	}
}

/// Settings for the single external identity whose token the manager caches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
	/// Client identifier; used as the assertion issuer and subject.
	pub client_id: String,
	/// Token endpoint receiving the form-encoded exchange.
	pub token_endpoint: Option<Url>,
	/// Assertion audience; defaults to the token endpoint URL.
	pub audience: Option<String>,
	/// Scope requested for the access token.
	pub scope: String,
	/// Key identifier placed in the assertion header (`kid`).
	pub key_id: String,
	/// Hex SHA-1 certificate thumbprint, rendered as the `x5t` header when present.
	pub certificate_thumbprint: Option<String>,
	/// Key material used to sign assertions.
	pub signing_key: Option<SigningKey>,
	/// Lifetime of each signed assertion.
	#[serde(with = "duration_secs")]
	pub assertion_lifetime: Duration,
	/// Cached tokens expiring within this window are refreshed instead of returned.
	#[serde(with = "duration_secs")]
	pub safety_margin: Duration,
	/// Cache entry key; defaults to the client identifier.
	pub cache_key: Option<CacheKey>,
	/// Return a cached, not yet expired token when a refresh fails instead of the error.
	///
	/// Enabled by default so a token inside the safety margin stays usable until it truly
	/// expires. Disable it to surface every failed refresh to the caller.
	pub serve_stale_on_error: bool,
}
impl CredentialConfig {
	/// Creates a new builder.
	pub fn builder() -> CredentialConfigBuilder {
		CredentialConfigBuilder::default()
	}

	/// Checks every field without touching the network.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client_id" });
		}
		if self.token_endpoint.is_none() {
			return Err(ConfigError::MissingField { field: "token_endpoint" });
		}
		if self.scope.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "scope" });
		}
		if self.key_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "key_id" });
		}
		if self.signing_key.as_ref().is_none_or(SigningKey::is_blank) {
			return Err(ConfigError::MissingField { field: "signing_key" });
		}
		if !self.assertion_lifetime.is_positive()
			|| self.assertion_lifetime > MAX_ASSERTION_LIFETIME
		{
			return Err(ConfigError::AssertionLifetimeOutOfRange {
				max_minutes: MAX_ASSERTION_LIFETIME.whole_minutes(),
			});
		}
		if self.safety_margin.is_negative() || self.safety_margin > MAX_SAFETY_MARGIN {
			return Err(ConfigError::SafetyMarginOutOfRange {
				max_minutes: MAX_SAFETY_MARGIN.whole_minutes(),
			});
		}
		if let Some(thumbprint) = &self.certificate_thumbprint {
			decode_hex(thumbprint).ok_or(ConfigError::InvalidThumbprint)?;
		}

		self.effective_cache_key()?;

		Ok(())
	}

	/// Audience claim, falling back to the token endpoint.
	pub fn effective_audience(&self) -> Option<String> {
		self.audience.clone().or_else(|| self.token_endpoint.as_ref().map(Url::to_string))
	}

	/// Cache key, falling back to the client identifier.
	pub fn effective_cache_key(&self) -> Result<CacheKey, ConfigError> {
		match &self.cache_key {
			Some(key) => Ok(key.clone()),
			None => Ok(CacheKey::new(&self.client_id)?),
		}
	}
}
impl Default for CredentialConfig {
	fn default() -> Self {
		Self {
			client_id: String::new(),
			token_endpoint: None,
			audience: None,
			scope: String::new(),
			key_id: String::new(),
			certificate_thumbprint: None,
			signing_key: None,
			assertion_lifetime: DEFAULT_ASSERTION_LIFETIME,
			safety_margin: DEFAULT_SAFETY_MARGIN,
			cache_key: None,
			serve_stale_on_error: true,
		}
	}
}

pub(crate) fn decode_hex(raw: &str) -> Option<Vec<u8>> {
	let raw = raw.trim().replace(':', "");

	if raw.is_empty() || raw.len() % 2 != 0 {
		return None;
	}

	(0..raw.len())
		.step_by(2)
		.map(|idx| u8::from_str_radix(raw.get(idx..idx + 2)?, 16).ok())
		.collect()
}

mod duration_secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Duration::seconds(i64::deserialize(deserializer)?))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn complete() -> CredentialConfig {
		CredentialConfig {
			client_id: "client-1".into(),
			token_endpoint: Some(
				Url::parse("https://login.example.com/tenant/oauth2/v2.0/token")
					.expect("Token endpoint fixture should parse."),
			),
			scope: "https://records.example.com/.default".into(),
			key_id: "key-1".into(),
			signing_key: Some(SigningKey::hmac("secret")),
			..CredentialConfig::default()
		}
	}

	#[test]
	fn missing_fields_are_reported_by_name() {
		complete().validate().expect("Complete config should validate.");

		let cases: [(&str, fn(&mut CredentialConfig)); 5] = [
			("client_id", |c| c.client_id = " ".into()),
			("token_endpoint", |c| c.token_endpoint = None),
			("scope", |c| c.scope.clear()),
			("key_id", |c| c.key_id.clear()),
			("signing_key", |c| c.signing_key = Some(SigningKey::rsa_pem(""))),
		];

		for (field, mutate) in cases {
			let mut config = complete();

			mutate(&mut config);

			let err = config.validate().expect_err("Incomplete config should be rejected.");

			assert!(
				matches!(err, ConfigError::MissingField { field: reported } if reported == field),
				"Expected missing `{field}`, got {err:?}."
			);
		}
	}

	#[test]
	fn lifetime_margin_and_thumbprint_ranges() {
		let mut config = complete();

		config.assertion_lifetime = Duration::minutes(56);

		assert!(matches!(
			config.validate(),
			Err(ConfigError::AssertionLifetimeOutOfRange { max_minutes: 55 })
		));

		config.assertion_lifetime = Duration::minutes(10);
		config.safety_margin = Duration::seconds(-1);

		assert!(matches!(
			config.validate(),
			Err(ConfigError::SafetyMarginOutOfRange { max_minutes: 1_440 })
		));

		config.safety_margin = Duration::seconds(i64::MAX);

		assert!(matches!(config.validate(), Err(ConfigError::SafetyMarginOutOfRange { .. })));

		config.safety_margin = MAX_SAFETY_MARGIN;

		config.validate().expect("A margin of exactly one day should validate.");

		config.safety_margin = DEFAULT_SAFETY_MARGIN;
		config.certificate_thumbprint = Some("zz".into());

		assert!(matches!(config.validate(), Err(ConfigError::InvalidThumbprint)));

		config.certificate_thumbprint = Some("0A:1b:2C".into());

		config.validate().expect("Colon-separated hex thumbprints should validate.");
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: CredentialConfig = serde_json::from_str(
			r#"{
				"client_id": "client-1",
				"token_endpoint": "https://login.example.com/token",
				"scope": "records/.default",
				"key_id": "key-1",
				"signing_key": { "hmac": "secret" },
				"safety_margin": 120
			}"#,
		)
		.expect("Config should deserialize from JSON.");

		assert_eq!(config.safety_margin, Duration::seconds(120));
		assert_eq!(config.assertion_lifetime, DEFAULT_ASSERTION_LIFETIME);
		assert!(config.serve_stale_on_error);
		assert_eq!(config.effective_audience().as_deref(), Some("https://login.example.com/token"));
		assert_eq!(
			config.effective_cache_key().expect("Cache key should derive from client id.").as_ref(),
			"client-1"
		);
		assert_eq!(config.signing_key.as_ref().map(SigningKey::algorithm), Some(Algorithm::HS256));
		assert!(!format!("{config:?}").contains("secret\""));
	}

	#[test]
	fn hex_decoding() {
		assert_eq!(decode_hex("00ff"), Some(vec![0, 255]));
		assert_eq!(decode_hex("abc"), None);
		assert_eq!(decode_hex(""), None);
	}
}
