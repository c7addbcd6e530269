// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{sync::oneshot, time};
// self
use vault_broker::{
	_preludet::*,
	host::{Broker, BrokerConfig},
	protocol::MessageId,
	transport::{HttpTransport, RawRequest, RawResponse, TransportFuture},
};

// Answers every request after a fixed delay, honoring the abort signal.
struct SlowTransport {
	delay: StdDuration,
}
impl HttpTransport for SlowTransport {
	fn execute(
		&self,
		_request: RawRequest,
		abort: Option<oneshot::Receiver<()>>,
	) -> TransportFuture<'_> {
		let delay = self.delay;

		Box::pin(async move {
			let respond = async {
				time::sleep(delay).await;

				Ok(RawResponse {
					status: 200,
					content_type: Some("text/plain".into()),
					headers: BTreeMap::new(),
					body: b"late".to_vec(),
				})
			};
			let Some(abort) = abort else {
				return respond.await;
			};

			tokio::pin!(respond);
			tokio::select! {
				outcome = &mut respond => outcome,
				received = abort => match received {
					Ok(()) => Err(Error::Cancelled),
					Err(_) => respond.await,
				},
			}
		})
	}
}

async fn build_broker<T>(config: BrokerConfig, transport: Arc<T>) -> Broker
where
	T: HttpTransport,
{
	let provider = Arc::new(CountingProvider::default());
	let (broker, _store) = build_test_broker(config, provider, transport);

	broker.when_ready().await.expect("Broker setup should complete.");

	broker
}

#[tokio::test]
async fn queued_sends_are_spaced_by_at_least_the_configured_delay() {
	let transport = Arc::new(RecordingTransport::default());
	let config = BrokerConfig::default().with_queue_delay(StdDuration::from_millis(50));
	let broker = build_broker(config, transport.clone()).await;
	let request = || get_request("https://api.example.com/data").with_requires_auth(false);
	let (a, b, c) =
		tokio::join!(broker.fetch(request()), broker.fetch(request()), broker.fetch(request()));

	a.expect("First queued fetch should succeed.");
	b.expect("Second queued fetch should succeed.");
	c.expect("Third queued fetch should succeed.");

	let recorded = transport.take_requests();

	assert_eq!(recorded.len(), 3);

	for window in recorded.windows(2) {
		let gap = window[1].0 - window[0].0;

		// Tokio timers never fire early; a small margin guards against
		// Instant-capture ordering inside the transport.
		assert!(gap >= StdDuration::from_millis(45), "Queue gap was only {gap:?}.");
	}
}

#[tokio::test]
async fn timeouts_count_queue_wait_and_late_responses_are_dropped() {
	let transport = Arc::new(SlowTransport { delay: StdDuration::from_millis(200) });
	let config = BrokerConfig::default().with_fetch_timeout(StdDuration::from_millis(50));
	let broker = build_broker(config, transport).await;
	let error = broker
		.fetch(get_request("https://api.example.com/slow").with_requires_auth(false))
		.await
		.expect_err("The 200ms transport must exceed the 50ms budget.");

	assert!(matches!(error, Error::Timeout { waited_ms: 50 }));

	// Let the late FETCH_RESULT arrive; it must be dropped without effect and
	// the broker must stay fully usable.
	time::sleep(StdDuration::from_millis(250)).await;
	broker.ping().await.expect("Broker should remain responsive after a dropped late response.");
}

#[tokio::test]
async fn cancel_aborts_an_in_flight_fetch() {
	let transport = Arc::new(SlowTransport { delay: StdDuration::from_secs(5) });
	let broker = build_broker(BrokerConfig::default(), transport).await;
	let id = MessageId::generate();
	let task = {
		let broker = broker.clone();
		let id = id.clone();

		tokio::spawn(async move {
			broker
				.fetch_with_id(
					id,
					get_request("https://api.example.com/slow").with_requires_auth(false),
				)
				.await
		})
	};

	// Give the fetch time to clear the queue and reach the transport.
	time::sleep(StdDuration::from_millis(150)).await;
	broker.cancel(id).await.expect("Cancel should reach the vault.");

	let error = task
		.await
		.expect("Fetch task should not panic.")
		.expect_err("The aborted fetch must fail.");

	assert!(matches!(error, Error::Cancelled));
}

#[tokio::test]
async fn cancelling_an_unknown_id_is_a_no_op() {
	let broker = build_broker(BrokerConfig::default(), Arc::new(RecordingTransport::default()))
		.await;

	broker.cancel(MessageId::generate()).await.expect("Unknown targets are ignored.");
	broker.ping().await.expect("Broker should remain responsive.");
}

#[tokio::test]
async fn destroy_rejects_pending_and_future_requests() {
	let transport = Arc::new(SlowTransport { delay: StdDuration::from_secs(5) });
	let broker = build_broker(BrokerConfig::default(), transport).await;
	let task = {
		let broker = broker.clone();

		tokio::spawn(async move {
			broker
				.fetch(get_request("https://api.example.com/slow").with_requires_auth(false))
				.await
		})
	};

	time::sleep(StdDuration::from_millis(150)).await;
	broker.destroy();

	let error = task
		.await
		.expect("Fetch task should not panic.")
		.expect_err("Pending requests must fail on destroy.");

	assert!(matches!(error, Error::Terminated));

	let error = broker.ping().await.expect_err("New requests must fail after destroy.");

	assert!(matches!(error, Error::Terminated));

	// Idempotent.
	broker.destroy();
}
