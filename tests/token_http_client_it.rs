// std
use std::sync::atomic::{AtomicU32, Ordering};
// self
use record_broker::{
	_preludet::*,
	credential::CredentialManager,
	error::{AuthExchangeError, RemoteError, RemoteErrorKind, TransportError, TransportFailure},
	http::{HttpFuture, HttpReply, TokenHttpClient},
	store::MemoryTokenCache,
};

#[derive(Debug)]
enum FakeTransportError {
	Refused,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Refused => write!(f, "Connection refused."),
		}
	}
}
impl StdError for FakeTransportError {}

/// Scripted token endpoint: each call pops the next reply, failing once the script runs out.
#[derive(Default)]
struct ScriptedHttpClient {
	replies: Mutex<Vec<Result<HttpReply, TransportFailure>>>,
	calls: AtomicU32,
}
impl ScriptedHttpClient {
	fn new(mut replies: Vec<Result<HttpReply, TransportFailure>>) -> Self {
		replies.reverse();

		Self { replies: Mutex::new(replies), calls: AtomicU32::new(0) }
	}
}
impl TokenHttpClient for ScriptedHttpClient {
	fn post_form<'a>(&'a self, _url: &'a Url, _form: &'a [(&'static str, String)]) -> HttpFuture<'a> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let next = self.replies.lock().pop().unwrap_or(Err(TransportFailure::Other));

		Box::pin(async move {
			next.map_err(|failure| TransportError::network(failure, FakeTransportError::Refused))
		})
	}
}

fn throttled(retry_after: StdDuration) -> HttpReply {
	HttpReply {
		status: 429,
		retry_after: Some(retry_after),
		body: b"{\"error\":\"temporarily_unavailable\"}".to_vec(),
	}
}

fn manager(client: &Arc<ScriptedHttpClient>) -> CredentialManager<ScriptedHttpClient> {
	CredentialManager::<ScriptedHttpClient>::with_parts(
		test_credential_config("https://login.example.com/tenant/oauth2/v2.0/token"),
		client.clone(),
		Arc::new(MemoryTokenCache::default()),
	)
	.expect("Failed to build credential manager over the scripted transport.")
}

#[tokio::test]
async fn throttled_exchange_surfaces_retry_after() {
	let client = Arc::new(ScriptedHttpClient::new(vec![Ok(throttled(StdDuration::from_secs(5)))]));
	let err = manager(&client).get_token().await.expect_err("Request should be throttled with HTTP 429.");

	match &err {
		Error::AuthExchange(inner @ AuthExchangeError::Rejected { status, message, .. }) => {
			assert_eq!(*status, 429);
			assert_eq!(message, "temporarily_unavailable");
			assert!(inner.is_transient());
			assert_eq!(inner.retry_after(), Some(StdDuration::from_secs(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	// A record call that needed this token inherits the hint and stays retryable.
	let remote = RemoteError::auth(err);

	assert_eq!(remote.kind, RemoteErrorKind::Auth { transient: true });
	assert_eq!(remote.retry_after, Some(StdDuration::from_secs(5)));
}

#[tokio::test]
async fn transport_failures_keep_their_classification() {
	let client = Arc::new(ScriptedHttpClient::new(vec![
		Err(TransportFailure::Connect),
		Ok(HttpReply {
			status: 200,
			retry_after: None,
			body: b"{\"access_token\":\"after-reconnect\",\"expires_in\":600}".to_vec(),
		}),
	]));
	let manager = manager(&client);
	let err = manager.get_token().await.expect_err("Refused connection should fail the exchange.");

	match &err {
		Error::AuthExchange(inner @ AuthExchangeError::Transport(transport)) => {
			assert_eq!(transport.failure(), TransportFailure::Connect);
			assert!(inner.is_transient());
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let token = manager.get_token().await.expect("Next exchange should reach the endpoint.");

	assert_eq!(token.value.expose(), "after-reconnect");
	assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn malformed_success_body_is_rejected() {
	for (body, expected) in [
		(&b"{\"token_type\":\"Bearer\",\"expires_in\":600}"[..], "missing access_token"),
		(&b"{\"access_token\":\"abc\"}"[..], "missing expires_in"),
		(&b"{\"access_token\":\"abc\",\"expires_in\":0}"[..], "positive number"),
		(&b"not json"[..], "malformed JSON"),
	] {
		let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpReply {
			status: 200,
			retry_after: None,
			body: body.to_vec(),
		})]));
		let err = manager(&client).get_token().await.expect_err("Unusable token body should fail.");

		assert!(matches!(err, Error::AuthExchange(_)));
		assert!(err.to_string().contains(expected), "`{err}` should mention `{expected}`.");
	}
}
