#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use vault_broker::{
	_preludet::*,
	host::{Broker, BrokerConfig},
	transport::ReqwestTransport,
};

async fn build_broker(config: BrokerConfig) -> (Broker, Arc<CountingProvider>) {
	let provider = Arc::new(CountingProvider::default());
	let transport = Arc::new(ReqwestTransport::default());
	let (broker, _store) = build_test_broker(config, provider.clone(), transport);

	broker.when_ready().await.expect("Broker setup should complete.");

	(broker, provider)
}

#[tokio::test]
async fn bearer_is_attached_after_one_refresh_and_the_token_is_reused() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/data").header("authorization", "Bearer token-1");
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let (broker, provider) = build_broker(BrokerConfig::default()).await;
	let first = broker.get(server.url("/data")).await.expect("First fetch should succeed.");

	assert!(first.is_ok());
	assert_eq!(first.status, 200);
	assert_eq!(first.text(), Some("{\"ok\":true}"));

	broker.get(server.url("/data")).await.expect("Second fetch should succeed.");

	mock.assert_hits_async(2).await;

	// Both fetches ran on the same refreshed token.
	assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn error_statuses_complete_the_round_trip_instead_of_failing() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/missing");
			then.status(404).header("content-type", "text/plain").body("gone");
		})
		.await;

	let (broker, _provider) = build_broker(BrokerConfig::default()).await;
	let outcome =
		broker.get(server.url("/missing")).await.expect("A 404 is still a completed fetch.");

	assert!(!outcome.is_ok());
	assert_eq!(outcome.status, 404);
	assert_eq!(outcome.text(), Some("gone"));
}

#[tokio::test]
async fn binary_bodies_cross_the_boundary_as_base64() {
	let payload = [0x89_u8, 0x50, 0x4e, 0x47, 0x00, 0xff];
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/image");
			then.status(200).header("content-type", "image/png").body(payload);
		})
		.await;

	let (broker, _provider) = build_broker(BrokerConfig::default()).await;
	let outcome = broker.get(server.url("/image")).await.expect("Binary fetch should succeed.");

	assert_eq!(outcome.text(), None);
	assert_eq!(outcome.bytes().expect("Base64 body should decode."), payload);
}

#[tokio::test]
async fn unauthenticated_requests_never_touch_the_provider() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/public");
			then.status(200).header("content-type", "text/plain").body("open");
		})
		.await;
	let (broker, provider) = build_broker(BrokerConfig::default()).await;
	let outcome = broker
		.fetch(get_request(server.url("/public")).with_requires_auth(false))
		.await
		.expect("Public fetch should succeed.");

	mock.assert_async().await;

	assert_eq!(outcome.text(), Some("open"));
	assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn disallowed_domains_are_rejected_before_any_credential_work() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/data");
			then.status(200).body("unreachable");
		})
		.await;
	let (broker, provider) =
		build_broker(BrokerConfig::default().with_allowed_domains(["api.example.com"])).await;
	let error = broker
		.get(server.url("/data"))
		.await
		.expect_err("A URL outside the allow-list should fail.");

	assert!(matches!(error, Error::Domain { .. }));
	assert_eq!(provider.refresh_calls(), 0);

	mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn response_headers_are_included_only_on_request() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/meta");
			then.status(200)
				.header("content-type", "text/plain")
				.header("x-request-id", "42")
				.body("meta");
		})
		.await;

	let (broker, _provider) = build_broker(BrokerConfig::default()).await;
	let bare = broker.get(server.url("/meta")).await.expect("Fetch should succeed.");

	assert!(bare.headers.is_none());

	let with_headers = broker
		.fetch(get_request(server.url("/meta")).with_include_headers(true))
		.await
		.expect("Fetch should succeed.");
	let headers = with_headers.headers.expect("Headers were requested.");

	assert_eq!(headers.get("x-request-id").map(String::as_str), Some("42"));
}

#[tokio::test]
async fn concurrent_fetches_share_a_single_refresh() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/data").header("authorization", "Bearer token-1");
			then.status(200).header("content-type", "text/plain").body("ok");
		})
		.await;

	let (broker, provider) = build_broker(BrokerConfig::default()).await;
	let (first, second) =
		tokio::join!(broker.get(server.url("/data")), broker.get(server.url("/data")));

	first.expect("First concurrent fetch should succeed.");
	second.expect("Second concurrent fetch should succeed.");

	assert_eq!(provider.refresh_calls(), 1);
}
