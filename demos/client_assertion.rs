//! Demonstrates exchanging a signed client assertion for a bearer token and reusing the cached
//! token across calls.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use record_broker::{
	credential::{CredentialConfig, CredentialManager, SigningKey},
	http::ReqwestHttpClient,
	reqwest::Client,
	store::MemoryTokenCache,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant/oauth2/v2.0/token")
				.body_includes("client_assertion_type=urn");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let config = CredentialConfig::builder()
		.client_id("demo-client")
		.token_endpoint(Url::parse(&server.url("/tenant/oauth2/v2.0/token"))?)
		.scope("https://records.example.com/.default")
		.key_id("demo-key")
		.signing_key(SigningKey::hmac("demo-signing-secret"))
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let manager = <CredentialManager<ReqwestHttpClient>>::with_parts(
		config,
		http_client,
		Arc::new(MemoryTokenCache::default()),
	)?;
	let first = manager.get_token().await?;
	let second = manager.get_token().await?;

	println!("Bearer token {:?} expires at {}.", first.value, first.expires_at);
	println!(
		"Second call reused the cache: {} ({} exchange).",
		first == second,
		manager.exchange_count()
	);

	token_mock.assert_async().await;

	Ok(())
}
