//! Standardized response envelope returned to callers of the public entry points.
//!
//! Every envelope serializes as `{ "success": bool, "data": T | null, "error": { "code",
//! "message", "details" } | null }`. `message` is meant for end users and never carries source
//! chains; those go into `details` for internal logging.

// self
use crate::{_prelude::*, error::ErrorCode};

/// `{success, data, error}` wrapper.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope<T> {
	/// `true` exactly when `data` is present.
	pub success: bool,
	/// Payload of a successful call.
	pub data: Option<T>,
	/// Failure descriptor of an unsuccessful call.
	pub error: Option<EnvelopeError>,
}
impl<T> Envelope<T> {
	/// Wraps a successful payload.
	pub fn ok(data: T) -> Self {
		Self { success: true, data: Some(data), error: None }
	}

	/// Wraps a failure.
	pub fn err(error: EnvelopeError) -> Self {
		Self { success: false, data: None, error: Some(error) }
	}

	/// Converts into a `Result`, discarding the success flag.
	pub fn into_result(self) -> Result<T, EnvelopeError> {
		match (self.data, self.error) {
			(Some(data), _) => Ok(data),
			(None, Some(error)) => Err(error),
			(None, None) => Err(EnvelopeError::new(
				ErrorCode::TerminalRemoteError,
				"Envelope carried neither data nor error.",
			)),
		}
	}
}
impl<T> From<Result<T>> for Envelope<T> {
	fn from(result: Result<T>) -> Self {
		match result {
			Ok(data) => Self::ok(data),
			Err(err) => Self::err(EnvelopeError::from_error(&err)),
		}
	}
}

/// Machine-readable failure descriptor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnvelopeError {
	/// Stable error code.
	pub code: ErrorCode,
	/// Human-readable summary.
	pub message: String,
	/// Structured diagnostics; `null` when there is nothing to add.
	pub details: Value,
}
impl EnvelopeError {
	/// Creates an error without details.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), details: Value::Null }
	}

	/// Attaches structured details.
	pub fn with_details(mut self, details: Value) -> Self {
		self.details = details;

		self
	}

	/// Describes a crate error, recording its attempts and source chain under `details`.
	pub fn from_error(err: &Error) -> Self {
		let mut details = serde_json::Map::new();

		if let Some(attempts) = err.attempts() {
			details.insert("attempts".into(), attempts.into());
		}
		if let Some(remote) = err.remote() {
			details.insert("remoteKind".into(), format!("{:?}", remote.kind).into());
		}

		let causes = source_chain(err);

		if !causes.is_empty() {
			details.insert("causes".into(), causes.into());
		}

		let envelope = Self::new(err.code(), err.to_string());

		if details.is_empty() { envelope } else { envelope.with_details(Value::Object(details)) }
	}
}

/// Renders the `source()` chain below `err`, outermost first.
pub(crate) fn source_chain(err: &dyn StdError) -> Vec<String> {
	let mut causes = Vec::new();
	let mut cause = err.source();

	while let Some(inner) = cause {
		causes.push(inner.to_string());

		cause = inner.source();
	}

	causes
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::RemoteError;

	#[test]
	fn success_envelope_shape() {
		let json = serde_json::to_value(Envelope::ok(serde_json::json!({ "id": "p-1" })))
			.expect("Envelope should serialize.");

		assert_eq!(json, serde_json::json!({ "success": true, "data": { "id": "p-1" }, "error": null }));
	}

	#[test]
	fn failure_envelope_keeps_causes_out_of_message() {
		let err = Error::RetriesExhausted {
			attempts: 4,
			last: RemoteError::status(503, "Service unavailable"),
		};
		let envelope: Envelope<()> = Err(err).into();
		let json = serde_json::to_value(&envelope).expect("Envelope should serialize.");

		assert_eq!(json["success"], false);
		assert_eq!(json["data"], Value::Null);
		assert_eq!(json["error"]["code"], "TRANSIENT_REMOTE_ERROR");
		assert_eq!(json["error"]["details"]["attempts"], 4);
		assert_eq!(json["error"]["details"]["causes"][0], "Service unavailable");
		assert_eq!(json["error"]["details"]["remoteKind"], "Status(503)");
		assert!(envelope.into_result().is_err());
	}
}
