//! Demonstrates creating a parent record with ordered children over HTTP, including the
//! rollback envelope produced when one child is rejected.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use record_broker::{
	composite::{CompositeRequest, Orchestrator},
	credential::{CredentialConfig, CredentialManager, SigningKey},
	executor::{Executor, ExecutorConfig},
	http::ReqwestHttpClient,
	remote::{HttpRecordApi, RecordEndpoints},
	reqwest::{Client, redirect::Policy},
	store::MemoryTokenCache,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3599}",
			);
		})
		.await;
	let _parent = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/projects");
			then.status(201).json_body(json!({ "id": "project-1" }));
		})
		.await;
	let _accepted = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/tasks").body_includes("\"title\":\"Draft\"");
			then.status(201).json_body(json!({ "id": "task-1" }));
		})
		.await;
	let _rejected = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/tasks").body_includes("\"title\":\"Review\"");
			then.status(400)
				.json_body(json!({ "error": { "code": "ValidationFailed", "message": "Reviewer is required." } }));
		})
		.await;
	let rollback = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/projects/project-1");
			then.status(204);
		})
		.await;
	// The mock server presents a self-signed certificate.
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(Policy::none())
		.build()?;
	let credentials = <CredentialManager<ReqwestHttpClient>>::with_parts(
		CredentialConfig::builder()
			.client_id("demo-client")
			.token_endpoint(Url::parse(&server.url("/token"))?)
			.scope("https://records.example.com/.default")
			.key_id("demo-key")
			.signing_key(SigningKey::hmac("demo-signing-secret"))
			.build()?,
		ReqwestHttpClient::with_client(client.clone()),
		Arc::new(MemoryTokenCache::default()),
	)?;
	let endpoints = RecordEndpoints::new(Url::parse(&server.url("/api"))?)
		.with_collections("projects", "tasks")
		.with_parent_reference_field("projectId");
	let api = HttpRecordApi::with_client(client, endpoints, Arc::new(credentials))?;
	let executor = Executor::new(ExecutorConfig::default())?;
	let orchestrator = <Orchestrator<HttpRecordApi>>::new(api, executor.clone());
	let envelope = orchestrator
		.create_composite_envelope(CompositeRequest::new(
			json!({ "name": "Quarterly launch" }),
			vec![json!({ "title": "Draft" }), json!({ "title": "Review" })],
		))
		.await;

	println!("{}", serde_json::to_string_pretty(&envelope)?);
	println!("{}", serde_json::to_string_pretty(&executor.stats_envelope())?);

	rollback.assert_async().await;

	Ok(())
}
