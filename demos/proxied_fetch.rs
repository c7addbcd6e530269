//! Demonstrates logging in through an HTTP provider and proxying an authenticated fetch through
//! the vault, with the refresh token persisted in the in-memory store.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use vault_broker::{
	host::{BrokerBuilder, BrokerConfig},
	provider::{HttpProvider, ProviderEndpoints},
	store::MemoryStore,
	transport::ReqwestTransport,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200).header("content-type", "application/json").body(
				"{\"token\":\"demo-access\",\"refreshToken\":\"demo-refresh\",\"expiresIn\":900}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/me").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":7,\"name\":\"Sam\"}");
		})
		.await;
	let transport = Arc::new(ReqwestTransport::new()?);
	let endpoints = ProviderEndpoints::new()
		.with_login(Url::parse(&server.url("/auth/login"))?)
		.with_refresh(Url::parse(&server.url("/auth/refresh"))?);
	let provider = Arc::new(HttpProvider::new(endpoints, transport.clone()));
	let store = Arc::new(MemoryStore::default());
	let broker = BrokerBuilder::new(provider)
		.with_store(store.clone())
		.with_transport(transport)
		.with_config(BrokerConfig::default())
		.build()?;

	broker.when_ready().await?;
	broker.on_auth_state_changed(|snapshot| {
		println!("Auth state changed: authenticated={}.", snapshot.authenticated);
	});

	let snapshot = broker.login(json!({ "username": "sam", "password": "demo" })).await?;

	println!("Logged in, authenticated={}.", snapshot.authenticated);
	println!("Persisted refresh token: {:?}.", store.token());

	let response = broker.get(server.url("/v1/me")).await?;

	println!("API answered {} with {}.", response.status, response.text().unwrap_or_default());

	login_mock.assert_async().await;
	api_mock.assert_async().await;

	broker.destroy();

	Ok(())
}
