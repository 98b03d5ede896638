//! reqwest-backed [`RecordApi`] speaking JSON over HTTP.
//!
//! Creates are `POST {base}/{collection}` with the payload as the JSON body; the new identifier
//! is read from the response body (`id_field`) or, failing that, from the last segment of the
//! `Location` header. Deletes are `DELETE {base}/{collection}/{id}` and treat `404` as already
//! deleted. Every request carries `Authorization: Bearer` from the configured
//! [`TokenProvider`].

// crates.io
use reqwest::{
	Method, Response,
	header::{AUTHORIZATION, LOCATION},
};
// self
use crate::{
	_prelude::*,
	auth::RecordId,
	credential::TokenProvider,
	error::{ConfigError, RemoteError, TransportError},
	executor::DEFAULT_ATTEMPT_TIMEOUT,
	http::parse_retry_after,
	remote::{RecordApi, RecordFuture},
};

/// Where records live and how the remote system shapes its responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEndpoints {
	/// Root of the record API.
	pub base_url: Url,
	/// Collection path holding parent records, relative to `base_url`.
	pub parent_collection: String,
	/// Collection path holding child records, relative to `base_url`.
	pub child_collection: String,
	/// Field injected into child payloads carrying the parent identifier.
	pub parent_reference_field: String,
	/// Response field carrying the identifier of a created record.
	pub id_field: String,
	/// Application error codes that signal throttling inside a 2xx response.
	pub rate_limit_codes: Vec<String>,
}
impl RecordEndpoints {
	/// Creates endpoints rooted at `base_url` using the default collection and field names.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			parent_collection: "parents".into(),
			child_collection: "children".into(),
			parent_reference_field: "parentId".into(),
			id_field: "id".into(),
			rate_limit_codes: vec!["RateLimitExceeded".into(), "TooManyRequests".into()],
		}
	}

	/// Sets both collection paths.
	pub fn with_collections(
		mut self,
		parent_collection: impl Into<String>,
		child_collection: impl Into<String>,
	) -> Self {
		self.parent_collection = parent_collection.into();
		self.child_collection = child_collection.into();

		self
	}

	/// Sets the field that links children to their parent.
	pub fn with_parent_reference_field(mut self, field: impl Into<String>) -> Self {
		self.parent_reference_field = field.into();

		self
	}

	fn url_for(&self, collection: &str, id: Option<&RecordId>) -> Result<Url, RemoteError> {
		let mut url = self.base_url.clone();

		{
			let mut segments = url
				.path_segments_mut()
				.map_err(|_| RemoteError::invalid("Record API base URL cannot carry a path."))?;

			segments.pop_if_empty().extend(collection.split('/').filter(|s| !s.is_empty()));

			if let Some(id) = id {
				segments.push(id);
			}
		}

		Ok(url)
	}
}

/// [`RecordApi`] implementation over reqwest.
#[derive(Clone)]
pub struct HttpRecordApi {
	client: ReqwestClient,
	endpoints: Arc<RecordEndpoints>,
	tokens: Arc<dyn TokenProvider>,
}
impl HttpRecordApi {
	/// Creates a client with a default reqwest transport bounded by
	/// [`DEFAULT_ATTEMPT_TIMEOUT`].
	pub fn new(endpoints: RecordEndpoints, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(DEFAULT_ATTEMPT_TIMEOUT)
			.build()
			.map_err(ConfigError::from)?;

		Self::with_client(client, endpoints, tokens)
	}

	/// Creates a client using a caller-provided reqwest transport.
	pub fn with_client(
		client: ReqwestClient,
		endpoints: RecordEndpoints,
		tokens: Arc<dyn TokenProvider>,
	) -> Result<Self> {
		if endpoints.base_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidUrl {
				field: "base_url",
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			}
			.into());
		}

		Ok(Self { client, endpoints: Arc::new(endpoints), tokens })
	}

	/// Endpoint settings in use.
	pub fn endpoints(&self) -> &RecordEndpoints {
		&self.endpoints
	}

	async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response, RemoteError> {
		let token = self.tokens.access_token().await.map_err(RemoteError::auth)?;
		let mut request = self.client.request(method, url).header(AUTHORIZATION, token.bearer());

		if let Some(body) = body {
			request = request.json(body);
		}

		request.send().await.map_err(|e| RemoteError::transport(TransportError::from(e)))
	}

	async fn create(&self, collection: &str, payload: &Value) -> Result<RecordId, RemoteError> {
		let url = self.endpoints.url_for(collection, None)?;
		let response = self.send(Method::POST, url, Some(payload)).await?;
		let location = response
			.headers()
			.get(LOCATION)
			.and_then(|value| value.to_str().ok())
			.map(ToOwned::to_owned);
		let body = self.checked_body(response).await?;

		self.created_id(&body, location.as_deref())
	}

	async fn delete(&self, collection: &str, id: &RecordId) -> Result<(), RemoteError> {
		let url = self.endpoints.url_for(collection, Some(id))?;
		let response = self.send(Method::DELETE, url, None).await?;

		if response.status().as_u16() == 404 {
			return Ok(());
		}

		self.checked_body(response).await.map(|_| ())
	}

	/// Reads the body and maps failures, including throttling reported inside a 2xx body.
	async fn checked_body(&self, response: Response) -> Result<Value, RemoteError> {
		let status = response.status().as_u16();
		let retry_after = parse_retry_after(response.headers());
		let bytes =
			response.bytes().await.map_err(|e| RemoteError::transport(TransportError::from(e)))?;
		let body = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap_or(Value::Null)
		};
		let app_error = app_error(&body);

		if !(200..300).contains(&status) {
			let message = app_error
				.and_then(|(_, message)| message)
				.unwrap_or_else(|| format!("Record API responded with HTTP {status}."));
			let mut err = RemoteError::status(status, message);

			err.retry_after = retry_after;

			return Err(err);
		}
		match app_error {
			Some((Some(code), message)) if self.endpoints.rate_limit_codes.contains(&code) => {
				let mut err = RemoteError::rate_limited(
					message.unwrap_or_else(|| format!("Record API throttled the request ({code}).")),
				);

				err.retry_after = retry_after;

				Err(err)
			},
			_ => Ok(body),
		}
	}

	fn created_id(&self, body: &Value, location: Option<&str>) -> Result<RecordId, RemoteError> {
		let from_body = match body.get(&self.endpoints.id_field) {
			Some(Value::String(id)) => Some(id.clone()),
			Some(Value::Number(id)) => Some(id.to_string()),
			_ => None,
		};
		let from_location = || {
			location
				.map(|location| location.trim_end_matches('/'))
				.and_then(|location| location.rsplit('/').next())
				.map(ToOwned::to_owned)
		};
		let raw = from_body.or_else(from_location).ok_or_else(|| {
			RemoteError::invalid("Record API response did not include the created record id.")
		})?;

		RecordId::new(raw).map_err(|e| {
			RemoteError::invalid("Record API returned an unusable record id.").with_source(e)
		})
	}
}
impl Debug for HttpRecordApi {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRecordApi").field("endpoints", &self.endpoints).finish()
	}
}
impl RecordApi for HttpRecordApi {
	fn create_parent<'a>(&'a self, payload: &'a Value) -> RecordFuture<'a, RecordId> {
		Box::pin(self.create(&self.endpoints.parent_collection, payload))
	}

	fn create_child<'a>(
		&'a self,
		parent: &'a RecordId,
		payload: &'a Value,
	) -> RecordFuture<'a, RecordId> {
		Box::pin(async move {
			let Value::Object(fields) = payload else {
				return Err(RemoteError::invalid("Child payload must be a JSON object."));
			};
			let mut linked = fields.clone();

			linked.insert(
				self.endpoints.parent_reference_field.clone(),
				Value::String(parent.to_string()),
			);

			self.create(&self.endpoints.child_collection, &Value::Object(linked)).await
		})
	}

	fn delete_parent<'a>(&'a self, parent: &'a RecordId) -> RecordFuture<'a, ()> {
		Box::pin(self.delete(&self.endpoints.parent_collection, parent))
	}

	fn delete_child<'a>(&'a self, child: &'a RecordId) -> RecordFuture<'a, ()> {
		Box::pin(self.delete(&self.endpoints.child_collection, child))
	}
}

/// Extracts `{ "error": { "code", "message" } }` or `{ "error": "...", "message": "..." }`.
fn app_error(body: &Value) -> Option<(Option<String>, Option<String>)> {
	let error = body.get("error")?;
	let text = |value: Option<&Value>| value.and_then(Value::as_str).map(ToOwned::to_owned);

	match error {
		Value::Object(_) => Some((text(error.get("code")), text(error.get("message")))),
		Value::String(code) => Some((Some(code.clone()), text(body.get("message")))),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn endpoints() -> RecordEndpoints {
		RecordEndpoints::new(
			Url::parse("https://records.example.com/api/v1").expect("Base URL fixture should parse."),
		)
		.with_collections("projects", "project/tasks")
	}

	#[test]
	fn urls_extend_the_base_path() {
		let endpoints = endpoints();
		let id = RecordId::new("p-1").expect("Record id fixture should be valid.");

		assert_eq!(
			endpoints.url_for("projects", None).expect("Collection URL should build.").as_str(),
			"https://records.example.com/api/v1/projects"
		);
		assert_eq!(
			endpoints
				.url_for(&endpoints.child_collection, Some(&id))
				.expect("Item URL should build.")
				.as_str(),
			"https://records.example.com/api/v1/project/tasks/p-1"
		);
	}

	#[test]
	fn app_errors_read_both_shapes() {
		let nested = serde_json::json!({ "error": { "code": "RateLimitExceeded", "message": "Slow down" } });
		let flat = serde_json::json!({ "error": "TooManyRequests", "message": "Later" });

		assert_eq!(
			app_error(&nested),
			Some((Some("RateLimitExceeded".into()), Some("Slow down".into())))
		);
		assert_eq!(app_error(&flat), Some((Some("TooManyRequests".into()), Some("Later".into()))));
		assert_eq!(app_error(&serde_json::json!({ "id": "p-1" })), None);
	}
}
