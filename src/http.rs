//! Transport primitives for the credential exchange.
//!
//! [`TokenHttpClient`] is the credential manager's only dependency on an HTTP stack. It posts a
//! form-encoded body and hands back an [`HttpReply`] carrying the status, any `Retry-After` hint,
//! and the raw body so the manager can classify failures without knowing the client type.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`TokenHttpClient::post_form`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of posting token exchange forms.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// clone of a credential manager. Any response, successful or not, resolves to `Ok`; only
/// failures that never produced a response resolve to [`TransportError`].
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Posts `form` as `application/x-www-form-urlencoded` to `url`.
	fn post_form<'a>(&'a self, url: &'a Url, form: &'a [(&'static str, String)]) -> HttpFuture<'a>;
}

/// Response captured from the token endpoint.
#[derive(Clone, Debug, Default)]
pub struct HttpReply {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<StdDuration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpReply {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so a custom [`ReqwestClient`] should disable redirect
/// following; [`ReqwestHttpClient::new`] does.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects and gives up on a silent endpoint after
	/// [`DEFAULT_ATTEMPT_TIMEOUT`](crate::executor::DEFAULT_ATTEMPT_TIMEOUT).
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(crate::executor::DEFAULT_ATTEMPT_TIMEOUT)
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	fn post_form<'a>(&'a self, url: &'a Url, form: &'a [(&'static str, String)]) -> HttpFuture<'a> {
		Box::pin(async move {
			let response = self.0.post(url.clone()).form(form).send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(HttpReply { status, retry_after, body })
		})
	}
}

/// Reads a `Retry-After` header expressed either in seconds or as an HTTP date.
#[cfg(feature = "reqwest")]
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<StdDuration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return StdDuration::try_from(delta).ok();
		}
	}

	None
}
