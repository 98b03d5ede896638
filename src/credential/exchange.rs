//! Token issuance: cache lookup, single-flight refresh, and the assertion exchange itself.
//!
//! The fast path reads the cache without locking. Only a miss (or a token inside the safety
//! margin) takes the refresh guard, and the cache is checked again under the guard so callers
//! that queued behind an in-flight exchange reuse its result instead of issuing their own.

// std
use std::sync::atomic::Ordering;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	credential::CredentialManager,
	error::AuthExchangeError,
	http::{HttpReply, TokenHttpClient},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
};

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const KIND: OperationKind = OperationKind::TokenExchange;

#[derive(Deserialize)]
struct TokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
}

// Some endpoints render `expires_in` as a JSON string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(i64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<i64> {
		match self {
			Self::Seconds(secs) => Some(*secs),
			Self::Text(raw) => raw.trim().parse().ok(),
		}
	}
}

#[derive(Default, Deserialize)]
struct TokenErrorResponse {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

impl<C> CredentialManager<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Returns a token that stays valid for at least the configured safety margin.
	///
	/// Concurrent callers that all miss the cache share a single exchange. A failed exchange
	/// leaves the cache untouched and surfaces [`Error::AuthExchange`], unless
	/// `serve_stale_on_error` (on by default) is set and the previous token has not expired yet.
	pub async fn get_token(&self) -> Result<AccessToken> {
		if let Some(token) = self
			.cache
			.get(&self.cache_key)
			.await?
			.filter(|token| token.is_usable_at(OffsetDateTime::now_utc(), self.config.safety_margin))
		{
			return Ok(token);
		}

		self.refresh(false).await
	}

	/// Exchanges a new assertion even when the cached token is still fresh.
	pub async fn force_refresh(&self) -> Result<AccessToken> {
		self.refresh(true).await
	}

	/// Drops the cached token so the next [`get_token`](Self::get_token) performs an exchange.
	pub async fn invalidate(&self) -> Result<Option<AccessToken>> {
		Ok(self.cache.evict(&self.cache_key).await?)
	}

	async fn refresh(&self, force: bool) -> Result<AccessToken> {
		let span = OperationSpan::new(KIND, if force { "force_refresh" } else { "refresh" });

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;
				let cached = self.cache.get(&self.cache_key).await?;

				if let Some(token) = cached.as_ref().filter(|token| {
					!force && token.is_usable_at(OffsetDateTime::now_utc(), self.config.safety_margin)
				}) {
					return Ok(token.clone());
				}

				match self.exchange().await {
					Ok(token) => {
						self.cache.set(&self.cache_key, token.clone()).await?;
						obs::token_refreshed(token.expires_at);

						Ok(token)
					},
					Err(err) => {
						let stale = cached.filter(|token| {
							self.config.serve_stale_on_error
								&& !token.is_expired_at(OffsetDateTime::now_utc())
						});

						obs::token_refresh_failed(&err, stale.is_some());

						stale.ok_or(err)
					},
				}
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn exchange(&self) -> Result<AccessToken> {
		self.exchanges.fetch_add(1, Ordering::Relaxed);

		let assertion = self.signer.sign_at(OffsetDateTime::now_utc())?;
		let form = [
			("grant_type", "client_credentials".to_owned()),
			("client_id", self.config.client_id.clone()),
			("client_assertion_type", CLIENT_ASSERTION_TYPE.to_owned()),
			("client_assertion", assertion),
			("scope", self.config.scope.clone()),
		];
		let reply = self
			.http_client
			.post_form(&self.token_endpoint, &form)
			.await
			.map_err(AuthExchangeError::from)?;

		Ok(parse_token_reply(reply, OffsetDateTime::now_utc())?)
	}
}

fn parse_token_reply(
	reply: HttpReply,
	issued_at: OffsetDateTime,
) -> Result<AccessToken, AuthExchangeError> {
	if !reply.is_success() {
		let detail: TokenErrorResponse = serde_json::from_slice(&reply.body).unwrap_or_default();
		let message = detail
			.error_description
			.or(detail.error)
			.unwrap_or_else(|| "token endpoint returned an error".into());

		return Err(AuthExchangeError::Rejected {
			status: reply.status,
			message,
			retry_after: reply.retry_after,
		});
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&reply.body);
	let parsed: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| AuthExchangeError::MalformedResponse { source, status: reply.status })?;
	let access_token = parsed
		.access_token
		.filter(|value| !value.is_empty())
		.ok_or(AuthExchangeError::MissingAccessToken)?;
	let expires_in = parsed
		.expires_in
		.ok_or(AuthExchangeError::MissingExpiresIn)?
		.seconds()
		.filter(|secs| *secs > 0)
		.ok_or(AuthExchangeError::InvalidExpiresIn)?;

	AccessToken::new(access_token, issued_at, Duration::seconds(expires_in))
		.ok_or(AuthExchangeError::InvalidExpiresIn)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn reply(status: u16, body: &str) -> HttpReply {
		HttpReply { status, retry_after: None, body: body.as_bytes().to_vec() }
	}

	#[test]
	fn expires_in_accepts_numbers_and_strings() {
		let issued_at = macros::datetime!(2025-01-01 00:00 UTC);
		let numeric = parse_token_reply(
			reply(200, r#"{"access_token":"a","expires_in":3600,"token_type":"Bearer"}"#),
			issued_at,
		)
		.expect("Numeric expires_in should parse.");
		let textual =
			parse_token_reply(reply(200, r#"{"access_token":"b","expires_in":"60"}"#), issued_at)
				.expect("String expires_in should parse.");

		assert_eq!(numeric.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(textual.expires_at, macros::datetime!(2025-01-01 00:01 UTC));
		assert_eq!(textual.value.expose(), "b");
	}

	#[test]
	fn incomplete_success_bodies_are_rejected() {
		let now = OffsetDateTime::now_utc();

		assert!(matches!(
			parse_token_reply(reply(200, r#"{"expires_in":60}"#), now),
			Err(AuthExchangeError::MissingAccessToken)
		));
		assert!(matches!(
			parse_token_reply(reply(200, r#"{"access_token":"a"}"#), now),
			Err(AuthExchangeError::MissingExpiresIn)
		));
		assert!(matches!(
			parse_token_reply(reply(200, r#"{"access_token":"a","expires_in":"soon"}"#), now),
			Err(AuthExchangeError::InvalidExpiresIn)
		));
		assert!(matches!(
			parse_token_reply(reply(200, r#"{"access_token":"a","expires_in":0}"#), now),
			Err(AuthExchangeError::InvalidExpiresIn)
		));
		assert!(matches!(
			parse_token_reply(
				reply(200, r#"{"access_token":"a","expires_in":999999999999}"#),
				now
			),
			Err(AuthExchangeError::InvalidExpiresIn)
		));
		assert!(matches!(
			parse_token_reply(reply(200, "<html>"), now),
			Err(AuthExchangeError::MalformedResponse { status: 200, .. })
		));
	}

	#[test]
	fn error_statuses_prefer_provider_description() {
		let now = OffsetDateTime::now_utc();
		let err = parse_token_reply(
			reply(
				401,
				r#"{"error":"invalid_client","error_description":"AADSTS700027: bad assertion"}"#,
			),
			now,
		)
		.expect_err("401 should be rejected.");

		assert!(
			matches!(&err, AuthExchangeError::Rejected { status: 401, message, .. } if message.starts_with("AADSTS700027"))
		);
		assert!(!err.is_transient());

		let mut throttled = reply(503, "unavailable");

		throttled.retry_after = Some(StdDuration::from_secs(3));

		let err = parse_token_reply(throttled, now).expect_err("503 should be rejected.");

		assert!(err.is_transient());
		assert_eq!(err.retry_after(), Some(StdDuration::from_secs(3)));
	}
}
