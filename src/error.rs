//! Crate-level error types shared by the credential manager, executor, and orchestrator.

// self
use crate::{_prelude::*, auth::IdentifierError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token cache backend failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::store::CacheError,
	),
	/// Local configuration problem; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential exchange failed.
	#[error(transparent)]
	AuthExchange(#[from] AuthExchangeError),

	/// Transient remote failure that survived every retry.
	#[error("Remote operation failed after {attempts} attempts: {last}.")]
	RetriesExhausted {
		/// Total attempts performed.
		attempts: u32,
		/// Failure reported by the final attempt.
		#[source]
		last: RemoteError,
	},
	/// Remote failure that must not be retried (validation, permission, unknown).
	#[error("Remote operation failed permanently after {attempts} attempt(s): {source}.")]
	Terminal {
		/// Total attempts performed.
		attempts: u32,
		/// Failure reported by the remote system.
		#[source]
		source: RemoteError,
	},
	/// Caller cancelled the operation while it was queued, running, or backing off.
	#[error("Remote operation was cancelled after {attempts} attempt(s).")]
	Cancelled {
		/// Attempts started before cancellation.
		attempts: u32,
	},
	/// The caller-supplied deadline elapsed before the operation could succeed.
	#[error("Remote operation exceeded its deadline after {attempts} attempt(s).")]
	DeadlineExceeded {
		/// Attempts started before the deadline elapsed.
		attempts: u32,
		/// Failure reported by the last attempt, if one completed.
		#[source]
		last: Option<RemoteError>,
	},
	/// A fail-fast batch stopped at the first failing item.
	#[error("Batch aborted because item {index} failed.")]
	BatchAborted {
		/// Submission index of the failing item.
		index: usize,
		/// Failure reported by that item.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Machine-readable classification used by response envelopes.
	pub fn code(&self) -> ErrorCode {
		match self {
			Self::Cache(_) => ErrorCode::CacheError,
			Self::Config(_) => ErrorCode::ConfigurationError,
			Self::AuthExchange(_) => ErrorCode::AuthExchangeError,
			Self::RetriesExhausted { .. } | Self::DeadlineExceeded { .. } =>
				ErrorCode::TransientRemoteError,
			Self::Terminal { .. } => ErrorCode::TerminalRemoteError,
			Self::Cancelled { .. } => ErrorCode::Cancelled,
			Self::BatchAborted { source, .. } => source.code(),
		}
	}

	/// Number of attempts the executor made, when the error came from it.
	pub fn attempts(&self) -> Option<u32> {
		match self {
			Self::RetriesExhausted { attempts, .. }
			| Self::Terminal { attempts, .. }
			| Self::Cancelled { attempts }
			| Self::DeadlineExceeded { attempts, .. } => Some(*attempts),
			Self::BatchAborted { source, .. } => source.attempts(),
			_ => None,
		}
	}

	/// Returns the remote failure wrapped by executor errors.
	pub fn remote(&self) -> Option<&RemoteError> {
		match self {
			Self::RetriesExhausted { last, .. } => Some(last),
			Self::Terminal { source, .. } => Some(source),
			Self::DeadlineExceeded { last, .. } => last.as_ref(),
			Self::BatchAborted { source, .. } => source.remote(),
			_ => None,
		}
	}
}

/// Stable, machine-readable error codes surfaced in envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	/// Missing or invalid configuration.
	ConfigurationError,
	/// Credential exchange failure.
	AuthExchangeError,
	/// Retryable remote failure that outlived the retry budget.
	TransientRemoteError,
	/// Non-retryable remote failure.
	TerminalRemoteError,
	/// Operation cancelled by the caller.
	Cancelled,
	/// Token cache backend failure.
	CacheError,
	/// Parent record could not be created; nothing was left behind.
	ParentCreateFailed,
	/// A child record failed after the parent existed; rollback was attempted.
	TaskCreateFailed,
	/// Compensation failed; the parent record may be orphaned.
	RollbackFailed,
}
impl ErrorCode {
	/// Returns the wire label for the code.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConfigurationError => "CONFIGURATION_ERROR",
			Self::AuthExchangeError => "AUTH_EXCHANGE_ERROR",
			Self::TransientRemoteError => "TRANSIENT_REMOTE_ERROR",
			Self::TerminalRemoteError => "TERMINAL_REMOTE_ERROR",
			Self::Cancelled => "CANCELLED",
			Self::CacheError => "CACHE_ERROR",
			Self::ParentCreateFailed => "PARENT_CREATE_FAILED",
			Self::TaskCreateFailed => "TASK_CREATE_FAILED",
			Self::RollbackFailed => "ROLLBACK_FAILED",
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Serialize for ErrorCode {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

/// Configuration and validation failures; raised before any network call.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required configuration field is absent or blank.
	#[error("Configuration field `{field}` is required.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("Configuration field `{field}` is not a valid URL.")]
	InvalidUrl {
		/// Name of the offending field.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The assertion signing key could not be loaded.
	#[error("Assertion signing key is invalid.")]
	InvalidSigningKey {
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Certificate thumbprint is not a hex string.
	#[error("Certificate thumbprint must be a hex-encoded digest.")]
	InvalidThumbprint,
	/// Assertion lifetime is non-positive or too long.
	#[error("Assertion lifetime must be positive and at most {max_minutes} minutes.")]
	AssertionLifetimeOutOfRange {
		/// Maximum supported lifetime in minutes.
		max_minutes: i64,
	},
	/// Token safety margin is negative or wider than supported.
	#[error("Token safety margin must be between zero and {max_minutes} minutes.")]
	SafetyMarginOutOfRange {
		/// Widest supported margin in minutes.
		max_minutes: i64,
	},
	/// Executor setting is outside its supported range.
	#[error("Executor setting `{setting}` is invalid: {reason}.")]
	InvalidExecutorSetting {
		/// Setting name.
		setting: &'static str,
		/// Why the value was rejected.
		reason: &'static str,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Credential exchange failures. The token cache is never modified when one is raised.
#[derive(Debug, ThisError)]
pub enum AuthExchangeError {
	/// Token endpoint answered with a non-2xx status.
	#[error("Token endpoint rejected the assertion with HTTP {status}: {message}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Provider `error_description`, `error`, or a generic summary.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<StdDuration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Response lacked the `access_token` field.
	#[error("Token endpoint response is missing access_token.")]
	MissingAccessToken,
	/// Response lacked the `expires_in` field.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Response carried a non-positive or unparsable `expires_in`.
	#[error("The expires_in value must be a positive number of seconds.")]
	InvalidExpiresIn,
	/// The client assertion could not be signed.
	#[error("Client assertion could not be signed.")]
	Signing {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Transport failure while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl AuthExchangeError {
	/// Returns `true` when retrying the exchange may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Rejected { status, .. } => TRANSIENT_STATUSES.contains(status),
			Self::Transport(err) => err.failure().is_transient(),
			_ => false,
		}
	}

	/// Retry-After hint, when the endpoint supplied one.
	pub fn retry_after(&self) -> Option<StdDuration> {
		match self {
			Self::Rejected { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Classification of a transport-level failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
	/// Connection could not be established.
	Connect,
	/// Request or attempt timed out.
	Timeout,
	/// Host name resolution failed.
	Dns,
	/// Connection was reset or aborted mid-flight.
	Reset,
	/// Anything else the transport reported.
	Other,
}
impl TransportFailure {
	/// Returns `true` for failures worth retrying.
	pub const fn is_transient(self) -> bool {
		!matches!(self, Self::Other)
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Connect => "connect",
			Self::Timeout => "timeout",
			Self::Dns => "dns",
			Self::Reset => "reset",
			Self::Other => "other",
		}
	}

	fn from_io_kind(kind: std::io::ErrorKind) -> Self {
		use std::io::ErrorKind;

		match kind {
			ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe =>
				Self::Reset,
			ErrorKind::TimedOut => Self::Timeout,
			ErrorKind::ConnectionRefused | ErrorKind::NotConnected | ErrorKind::AddrNotAvailable =>
				Self::Connect,
			_ => Self::Other,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error ({}) occurred during the request.", .failure.as_str())]
	Network {
		/// Classified failure kind.
		failure: TransportFailure,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		failure: TransportFailure,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { failure, source: Box::new(src) }
	}

	/// Classifies the failure.
	pub fn failure(&self) -> TransportFailure {
		match self {
			Self::Network { failure, .. } => *failure,
			Self::Io(err) => TransportFailure::from_io_kind(err.kind()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		let failure = classify_reqwest(&e);

		Self::network(failure, e)
	}
}

#[cfg(feature = "reqwest")]
fn classify_reqwest(err: &ReqwestError) -> TransportFailure {
	if err.is_timeout() {
		return TransportFailure::Timeout;
	}
	if let Some(failure) = StdError::source(err).and_then(classify_causes) {
		return failure;
	}

	if err.is_connect() { TransportFailure::Connect } else { TransportFailure::Other }
}

/// Finds the first cause that decides the failure class.
///
/// TLS handshake and certificate rejections surface from the connector as connect errors but
/// will fail the same way on every attempt, so they classify as [`TransportFailure::Other`].
#[cfg(feature = "reqwest")]
fn classify_causes(top: &(dyn StdError + 'static)) -> Option<TransportFailure> {
	let mut cause = Some(top);

	while let Some(inner) = cause {
		if let Some(io) = inner.downcast_ref::<std::io::Error>() {
			if io.kind() == std::io::ErrorKind::InvalidData {
				return Some(TransportFailure::Other);
			}

			let failure = TransportFailure::from_io_kind(io.kind());

			if failure != TransportFailure::Other {
				return Some(failure);
			}
		}

		let text = inner.to_string().to_ascii_lowercase();

		if text.contains("certificate") || text.contains("tls") {
			return Some(TransportFailure::Other);
		}

		cause = inner.source();
	}

	None
}

/// Retry classification of a failure; a pure function of the structured error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryClass {
	/// Worth retrying with backoff.
	Transient,
	/// Retrying cannot help.
	Terminal,
	/// Not enough information to decide; treated as terminal.
	Unknown,
}

/// What went wrong in a remote record operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
	/// Remote answered with a non-2xx HTTP status.
	Status(u16),
	/// The request never produced a response.
	Transport(TransportFailure),
	/// Application-level throttling signalled inside a successful response.
	RateLimited,
	/// The bearer credential could not be obtained.
	Auth {
		/// Whether the underlying exchange failure was transient.
		transient: bool,
	},
	/// The request or response was unusable (bad payload, missing id).
	Invalid,
}

/// Structured failure returned by a single remote operation attempt.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct RemoteError {
	/// Failure classification input.
	pub kind: RemoteErrorKind,
	/// Human-readable summary; never contains secrets.
	pub message: String,
	/// Server-supplied retry hint.
	pub retry_after: Option<StdDuration>,
	#[source]
	source: Option<BoxError>,
}
impl RemoteError {
	/// Creates an error of the given kind.
	pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into(), retry_after: None, source: None }
	}

	/// Remote answered with a non-2xx status.
	pub fn status(status: u16, message: impl Into<String>) -> Self {
		Self::new(RemoteErrorKind::Status(status), message)
	}

	/// Remote signalled throttling inside an otherwise successful response.
	pub fn rate_limited(message: impl Into<String>) -> Self {
		Self::new(RemoteErrorKind::RateLimited, message)
	}

	/// Request or response was unusable.
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::new(RemoteErrorKind::Invalid, message)
	}

	/// Attempt exceeded its time budget.
	pub fn timeout() -> Self {
		Self::new(
			RemoteErrorKind::Transport(TransportFailure::Timeout),
			"Remote call timed out.",
		)
	}

	/// Wraps a transport failure.
	pub fn transport(err: TransportError) -> Self {
		let failure = err.failure();

		Self::new(RemoteErrorKind::Transport(failure), err.to_string()).with_source(err)
	}

	/// Wraps a credential failure raised while preparing the call.
	pub fn auth(err: Error) -> Self {
		let transient = matches!(&err, Error::AuthExchange(inner) if inner.is_transient());
		let retry_after = match &err {
			Error::AuthExchange(inner) => inner.retry_after(),
			_ => None,
		};
		let mut remote = Self::new(
			RemoteErrorKind::Auth { transient },
			"Bearer credential could not be obtained.",
		)
		.with_source(err);

		remote.retry_after = retry_after;

		remote
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, delay: StdDuration) -> Self {
		self.retry_after = Some(delay);

		self
	}

	/// Attaches the underlying cause.
	pub fn with_source(mut self, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		self.source = Some(Box::new(src));

		self
	}

	/// Classifies the failure for retry purposes.
	pub fn class(&self) -> RetryClass {
		match self.kind {
			RemoteErrorKind::Status(status) if TRANSIENT_STATUSES.contains(&status) =>
				RetryClass::Transient,
			RemoteErrorKind::Status(_) | RemoteErrorKind::Invalid => RetryClass::Terminal,
			RemoteErrorKind::Transport(failure) if failure.is_transient() => RetryClass::Transient,
			RemoteErrorKind::Transport(_) => RetryClass::Unknown,
			RemoteErrorKind::RateLimited => RetryClass::Transient,
			RemoteErrorKind::Auth { transient: true } => RetryClass::Transient,
			RemoteErrorKind::Auth { transient: false } => RetryClass::Terminal,
		}
	}

	/// Convenience predicate for [`RetryClass::Transient`].
	pub fn is_transient(&self) -> bool {
		self.class() == RetryClass::Transient
	}
}
