//! Signed, time-boxed client assertions presented to the token endpoint.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	credential::{CredentialConfig, config},
	error::{AuthExchangeError, ConfigError},
};

/// Claims carried by every client assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; the client identifier.
	pub iss: String,
	/// Subject; the client identifier.
	pub sub: String,
	/// Audience; the token endpoint unless overridden.
	pub aud: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Not-before, seconds since the Unix epoch.
	pub nbf: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
	/// Unique assertion identifier.
	pub jti: String,
}

/// Pre-validated signing state; building it is the only place key material is parsed.
pub(crate) struct AssertionSigner {
	header: Header,
	key: EncodingKey,
	client_id: String,
	audience: String,
	lifetime: Duration,
}
impl AssertionSigner {
	pub(crate) fn from_config(config: &CredentialConfig) -> Result<Self, ConfigError> {
		let signing_key =
			config.signing_key.as_ref().ok_or(ConfigError::MissingField { field: "signing_key" })?;
		let audience =
			config.effective_audience().ok_or(ConfigError::MissingField { field: "token_endpoint" })?;
		let mut header = Header::new(signing_key.algorithm());

		header.kid = Some(config.key_id.clone());

		if let Some(thumbprint) = &config.certificate_thumbprint {
			let digest = config::decode_hex(thumbprint).ok_or(ConfigError::InvalidThumbprint)?;

			header.x5t = Some(URL_SAFE_NO_PAD.encode(digest));
		}

		Ok(Self {
			header,
			key: signing_key.encoding_key()?,
			client_id: config.client_id.clone(),
			audience,
			lifetime: config.assertion_lifetime,
		})
	}

	pub(crate) fn claims_at(&self, now: OffsetDateTime) -> AssertionClaims {
		let iat = now.unix_timestamp();

		AssertionClaims {
			iss: self.client_id.clone(),
			sub: self.client_id.clone(),
			aud: self.audience.clone(),
			iat,
			nbf: iat,
			exp: (now + self.lifetime).unix_timestamp(),
			jti: format!("{:032x}", rand::random::<u128>()),
		}
	}

	pub(crate) fn sign_at(&self, now: OffsetDateTime) -> Result<String, AuthExchangeError> {
		jsonwebtoken::encode(&self.header, &self.claims_at(now), &self.key)
			.map_err(|source| AuthExchangeError::Signing { source })
	}
}
impl Debug for AssertionSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AssertionSigner")
			.field("alg", &self.header.alg)
			.field("kid", &self.header.kid)
			.field("client_id", &self.client_id)
			.field("audience", &self.audience)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}
