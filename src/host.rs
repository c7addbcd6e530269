//! Host-side facade: the [`Broker`] handle applications hold.
//!
//! The broker owns the host end of the channel pair. Requests are tagged with a
//! fresh correlation id, pushed through a FIFO queue with a fixed inter-send
//! delay, and matched back to their callers by id when the vault responds.
//! Timeouts arm at enqueue time, so queue wait counts against the budget.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use serde_json::Value;
use tokio::{
	sync::{mpsc, oneshot, watch},
	task::JoinHandle,
	time,
};
// self
use crate::{
	_prelude::*,
	allowlist::AllowList,
	error::{ConfigError, ProtocolError},
	protocol::{
		self, AuthCallRequest, AuthOp, AuthSnapshot, CancelRequest, ErrorPayload, FetchBody,
		FetchOutcome, FetchRequest, HostMessage, HttpMethod, MessageId, SetupConfig, VaultMessage,
		WireEnvelope,
	},
	provider::Provider,
	store::{MemoryStore, RefreshTokenStore},
	transport::HttpTransport,
	vault::{self, VaultCore},
};

/// Broker tuning knobs; the defaults suit interactive applications.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// Permitted target domains; empty means every URL passes.
	pub allowed_domains: Vec<String>,
	/// Proactive refresh window.
	pub refresh_early: StdDuration,
	/// Pause between consecutive queue sends.
	pub queue_delay: StdDuration,
	/// Budget for fetch requests, armed at enqueue.
	pub fetch_timeout: StdDuration,
	/// Budget for setup and auth operations.
	pub auth_timeout: StdDuration,
	/// Budget for liveness probes.
	pub ping_timeout: StdDuration,
	/// Bound of the host-to-vault channel.
	pub channel_capacity: usize,
}
impl BrokerConfig {
	/// Replaces the allowed domain patterns.
	pub fn with_allowed_domains<I, S>(mut self, domains: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_domains = domains.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the proactive refresh window (defaults to 60 seconds).
	pub fn with_refresh_early(mut self, window: StdDuration) -> Self {
		self.refresh_early = window;

		self
	}

	/// Overrides the inter-send queue delay (defaults to 50 milliseconds).
	pub fn with_queue_delay(mut self, delay: StdDuration) -> Self {
		self.queue_delay = delay;

		self
	}

	/// Overrides the fetch timeout (defaults to 30 seconds).
	pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Overrides the auth timeout (defaults to 15 seconds).
	pub fn with_auth_timeout(mut self, timeout: StdDuration) -> Self {
		self.auth_timeout = timeout;

		self
	}

	/// Overrides the ping timeout (defaults to 5 seconds).
	pub fn with_ping_timeout(mut self, timeout: StdDuration) -> Self {
		self.ping_timeout = timeout;

		self
	}

	/// Overrides the channel capacity (defaults to 64).
	pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
		self.channel_capacity = capacity;

		self
	}

	fn validate(&self) -> Result<()> {
		if self.channel_capacity == 0 {
			Err(ConfigError::ZeroChannelCapacity)?;
		}

		// Malformed patterns fail here, at build time, instead of surfacing as
		// a SETUP_ERROR long after construction.
		AllowList::new(&self.allowed_domains)?;

		Ok(())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			allowed_domains: Vec::new(),
			refresh_early: StdDuration::from_secs(60),
			queue_delay: StdDuration::from_millis(50),
			fetch_timeout: StdDuration::from_secs(30),
			auth_timeout: StdDuration::from_secs(15),
			ping_timeout: StdDuration::from_secs(5),
			channel_capacity: 64,
		}
	}
}

type Listener = Box<dyn Fn(AuthSnapshot) + Send + Sync>;

#[derive(Clone, Debug)]
enum ReadyState {
	Pending,
	Ready,
	Failed(ErrorPayload),
}

struct PendingRequest {
	tx: oneshot::Sender<Result<VaultMessage>>,
	timeout: JoinHandle<()>,
}

struct Inner {
	config: BrokerConfig,
	to_vault: Mutex<Option<mpsc::Sender<WireEnvelope>>>,
	queue: Mutex<VecDeque<WireEnvelope>>,
	draining: AtomicBool,
	pending: Mutex<HashMap<String, PendingRequest>>,
	destroyed: AtomicBool,
	ready: watch::Sender<ReadyState>,
	listeners: Mutex<Vec<Listener>>,
}
impl Inner {
	fn sender(&self) -> Option<mpsc::Sender<WireEnvelope>> {
		self.to_vault.lock().clone()
	}

	fn resolve(&self, id: &MessageId, message: VaultMessage) {
		// A missing entry means the caller already timed out; the late
		// response is dropped without effect.
		let Some(pending) = self.pending.lock().remove(id.as_str()) else {
			return;
		};

		pending.timeout.abort();

		let _ = pending.tx.send(Ok(message));
	}

	fn expire(&self, id: &MessageId, waited: StdDuration) {
		let Some(pending) = self.pending.lock().remove(id.as_str()) else {
			return;
		};

		// Unsent queue entries are withdrawn so the vault never sees them.
		self.queue.lock().retain(|envelope| envelope.id != *id);

		let _ = pending.tx.send(Err(Error::Timeout { waited_ms: waited.as_millis() as u64 }));
	}

	fn reject_all(&self) {
		for (_, pending) in self.pending.lock().drain() {
			pending.timeout.abort();

			let _ = pending.tx.send(Err(Error::Terminated));
		}
	}

	fn kick_drain(self: &Arc<Self>) {
		// A single drain task runs at a time; the flag clears when the queue
		// empties and a fresh kick restarts it.
		if self.draining.swap(true, Ordering::SeqCst) {
			return;
		}

		let inner = self.clone();

		tokio::spawn(async move {
			loop {
				let Some(envelope) = inner.queue.lock().pop_front() else {
					break;
				};
				let Some(sender) = inner.sender() else {
					break;
				};

				if sender.send(envelope).await.is_err() {
					break;
				}

				time::sleep(inner.config.queue_delay).await;
			}

			inner.draining.store(false, Ordering::SeqCst);

			// An item queued between the final pop and the flag reset would
			// otherwise sit forever.
			if !inner.queue.lock().is_empty() {
				inner.kick_drain();
			}
		});
	}
}

/// Clonable handle to the vault; the only way the application reaches it.
#[derive(Clone)]
pub struct Broker {
	inner: Arc<Inner>,
}
impl Broker {
	/// Performs a fetch through the vault under a freshly generated id.
	pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
		self.fetch_with_id(MessageId::generate(), request).await
	}

	/// Performs a fetch under a caller-chosen id, so the caller can [`cancel`](Self::cancel) it.
	pub async fn fetch_with_id(&self, id: MessageId, request: FetchRequest) -> Result<FetchOutcome> {
		let timeout = self.inner.config.fetch_timeout;

		match self.request_with_id(id, HostMessage::Fetch(request), timeout).await? {
			VaultMessage::FetchResult(outcome) => Ok(outcome),
			VaultMessage::FetchError(payload) | VaultMessage::Error(payload) =>
				Err(payload.into_error()),
			other => Err(ProtocolError::UnexpectedResponse { kind: other.kind().into() })?,
		}
	}

	/// GET convenience.
	pub async fn get(&self, url: impl Into<String>) -> Result<FetchOutcome> {
		self.fetch(FetchRequest::new(HttpMethod::Get, url)).await
	}

	/// POST convenience.
	pub async fn post(&self, url: impl Into<String>, body: FetchBody) -> Result<FetchOutcome> {
		self.fetch(FetchRequest::new(HttpMethod::Post, url).with_body(body)).await
	}

	/// PUT convenience.
	pub async fn put(&self, url: impl Into<String>, body: FetchBody) -> Result<FetchOutcome> {
		self.fetch(FetchRequest::new(HttpMethod::Put, url).with_body(body)).await
	}

	/// PATCH convenience.
	pub async fn patch(&self, url: impl Into<String>, body: FetchBody) -> Result<FetchOutcome> {
		self.fetch(FetchRequest::new(HttpMethod::Patch, url).with_body(body)).await
	}

	/// DELETE convenience.
	pub async fn delete(&self, url: impl Into<String>) -> Result<FetchOutcome> {
		self.fetch(FetchRequest::new(HttpMethod::Delete, url)).await
	}

	/// Runs a provider auth operation and returns the resulting snapshot.
	pub async fn auth_call(&self, request: AuthCallRequest) -> Result<AuthSnapshot> {
		let timeout = self.inner.config.auth_timeout;

		match self.request(HostMessage::AuthCall(request), timeout).await? {
			VaultMessage::AuthCallResult(snapshot) => Ok(snapshot),
			VaultMessage::Error(payload) => Err(payload.into_error()),
			other => Err(ProtocolError::UnexpectedResponse { kind: other.kind().into() })?,
		}
	}

	/// Authenticates with the provider.
	pub async fn login(&self, payload: Value) -> Result<AuthSnapshot> {
		self.auth_call(AuthCallRequest::new(AuthOp::Login).with_payload(payload)).await
	}

	/// Ends the session; local token state clears only when the provider call succeeds.
	pub async fn logout(&self) -> Result<AuthSnapshot> {
		self.auth_call(AuthCallRequest::new(AuthOp::Logout)).await
	}

	/// Forces a token refresh through the vault's singleflight coordinator.
	pub async fn refresh_token(&self) -> Result<AuthSnapshot> {
		self.auth_call(AuthCallRequest::new(AuthOp::Refresh)).await
	}

	/// Runs a provider operation by name; standard labels map to their
	/// dedicated operations, anything else dispatches as a custom op.
	pub async fn call(&self, op: &str, payload: Value) -> Result<AuthSnapshot> {
		self.auth_call(AuthCallRequest::new(AuthOp::from(op)).with_payload(payload)).await
	}

	/// Checks vault liveness.
	pub async fn ping(&self) -> Result<()> {
		let timeout = self.inner.config.ping_timeout;

		match self.request(HostMessage::Ping, timeout).await? {
			VaultMessage::Pong => Ok(()),
			VaultMessage::Error(payload) => Err(payload.into_error()),
			other => Err(ProtocolError::UnexpectedResponse { kind: other.kind().into() })?,
		}
	}

	/// Aborts the in-flight fetch with the given id.
	///
	/// Cancellation bypasses the queue entirely; waiting behind queued data
	/// requests would defeat its purpose.
	pub async fn cancel(&self, target: MessageId) -> Result<()> {
		if self.inner.destroyed.load(Ordering::SeqCst) {
			return Err(Error::Terminated);
		}

		let envelope = protocol::encode(
			MessageId::generate(),
			&HostMessage::Cancel(CancelRequest { target }),
		)?;
		let sender = self.inner.sender().ok_or(Error::Terminated)?;

		sender.send(envelope).await.map_err(|_| Error::Terminated)
	}

	/// Registers a listener for `AUTH_STATE_CHANGED` events.
	pub fn on_auth_state_changed(&self, listener: impl Fn(AuthSnapshot) + Send + Sync + 'static) {
		self.inner.listeners.lock().push(Box::new(listener));
	}

	/// Resolves once setup completes; surfaces the setup error when it failed.
	pub async fn when_ready(&self) -> Result<()> {
		let mut rx = self.inner.ready.subscribe();

		loop {
			{
				let state = rx.borrow_and_update();

				match &*state {
					ReadyState::Ready => return Ok(()),
					ReadyState::Failed(payload) => return Err(payload.clone().into_error()),
					ReadyState::Pending => (),
				}
			}

			if rx.changed().await.is_err() {
				return Err(Error::Terminated);
			}
		}
	}

	/// Tears the broker down: pending and queued requests fail with
	/// `Terminated`, the vault loop stops, and in-flight fetches abort.
	///
	/// Idempotent; later calls are no-ops.
	pub fn destroy(&self) {
		if self.inner.destroyed.swap(true, Ordering::SeqCst) {
			return;
		}

		self.inner.queue.lock().clear();
		self.inner.reject_all();
		// Dropping the sender closes the channel; the vault loop exits and
		// fires every registered abort on its way out.
		self.inner.to_vault.lock().take();
	}

	async fn request(&self, body: HostMessage, timeout: StdDuration) -> Result<VaultMessage> {
		self.request_with_id(MessageId::generate(), body, timeout).await
	}

	async fn request_with_id(
		&self,
		id: MessageId,
		body: HostMessage,
		timeout: StdDuration,
	) -> Result<VaultMessage> {
		if self.inner.destroyed.load(Ordering::SeqCst) {
			return Err(Error::Terminated);
		}

		let envelope = protocol::encode(id.clone(), &body)?;
		let (tx, rx) = oneshot::channel();
		let timeout_handle = {
			let inner = self.inner.clone();
			let id = id.clone();

			tokio::spawn(async move {
				time::sleep(timeout).await;
				inner.expire(&id, timeout);
			})
		};

		self.inner
			.pending
			.lock()
			.insert(id.as_str().to_owned(), PendingRequest { tx, timeout: timeout_handle });
		self.inner.queue.lock().push_back(envelope);
		self.inner.kick_drain();

		match rx.await {
			Ok(result) => result,
			Err(_) => Err(Error::Terminated),
		}
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("destroyed", &self.inner.destroyed.load(Ordering::SeqCst))
			.field("pending", &self.inner.pending.lock().len())
			.finish_non_exhaustive()
	}
}

/// Builder wiring a provider, store, and transport into a running broker.
pub struct BrokerBuilder {
	provider: Arc<dyn Provider>,
	store: Option<Arc<dyn RefreshTokenStore>>,
	transport: Option<Arc<dyn HttpTransport>>,
	config: BrokerConfig,
}
impl BrokerBuilder {
	/// Starts a builder around the mandatory provider seam.
	pub fn new(provider: Arc<dyn Provider>) -> Self {
		Self { provider, store: None, transport: None, config: BrokerConfig::default() }
	}

	/// Sets the refresh-token store (defaults to an in-memory store).
	pub fn with_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Sets the HTTP transport (defaults to reqwest when the feature is on).
	pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Replaces the configuration.
	pub fn with_config(mut self, config: BrokerConfig) -> Self {
		self.config = config;

		self
	}

	/// Validates the configuration, spawns the vault and router tasks, and
	/// fires the one-shot setup.
	///
	/// Must run inside a Tokio runtime.
	pub fn build(self) -> Result<Broker> {
		self.config.validate()?;

		let transport = match self.transport {
			Some(transport) => transport,
			None => Self::default_transport()?,
		};
		let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
		let core = Arc::new(VaultCore::new(self.provider, store, transport));
		let (to_vault, vault_rx) = mpsc::channel(self.config.channel_capacity);
		let (vault_tx, from_vault) = mpsc::unbounded_channel();

		tokio::spawn(vault::run(core, vault_rx, vault_tx));

		let (ready, _) = watch::channel(ReadyState::Pending);
		let setup = SetupConfig {
			allowed_domains: self.config.allowed_domains.clone(),
			refresh_early_ms: self.config.refresh_early.as_millis() as u64,
		};
		let auth_timeout = self.config.auth_timeout;
		let inner = Arc::new(Inner {
			config: self.config,
			to_vault: Mutex::new(Some(to_vault)),
			queue: Mutex::new(VecDeque::new()),
			draining: AtomicBool::new(false),
			pending: Mutex::new(HashMap::new()),
			destroyed: AtomicBool::new(false),
			ready,
			listeners: Mutex::new(Vec::new()),
		});

		tokio::spawn(route(inner.clone(), from_vault));

		let broker = Broker { inner };
		let setup_handle = broker.clone();

		// Setup rides the normal request path so it is first in the queue;
		// its outcome lands in the ready watch for `when_ready` callers.
		tokio::spawn(async move {
			let _ = setup_handle.request(HostMessage::Setup(setup), auth_timeout).await;
		});

		Ok(broker)
	}

	#[cfg(feature = "reqwest")]
	fn default_transport() -> Result<Arc<dyn HttpTransport>> {
		Ok(Arc::new(crate::transport::ReqwestTransport::new()?))
	}

	#[cfg(not(feature = "reqwest"))]
	fn default_transport() -> Result<Arc<dyn HttpTransport>> {
		Err(ConfigError::Invalid {
			message: "No transport configured and the reqwest feature is disabled.".into(),
		}
		.into())
	}
}
impl Debug for BrokerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerBuilder").field("config", &self.config).finish_non_exhaustive()
	}
}

/// Routes vault responses back to their pending callers by correlation id.
async fn route(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<WireEnvelope>) {
	while let Some(envelope) = rx.recv().await {
		let id = envelope.id.clone();
		let Ok(message) = protocol::decode::<VaultMessage>(&envelope) else {
			// The vault only emits well-formed messages; anything else is
			// unmatchable and dropped.
			continue;
		};

		match message {
			VaultMessage::Ready => {
				inner.ready.send_replace(ReadyState::Ready);

				inner.resolve(&id, VaultMessage::Ready);
			},
			VaultMessage::SetupError(payload) => {
				inner.ready.send_replace(ReadyState::Failed(payload.clone()));

				inner.resolve(&id, VaultMessage::SetupError(payload));
			},
			VaultMessage::AuthStateChanged(snapshot) => {
				for listener in inner.listeners.lock().iter() {
					listener(snapshot.clone());
				}
			},
			other => inner.resolve(&id, other),
		}
	}

	// Vault side gone; nothing outstanding can complete.
	inner.reject_all();
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn zero_channel_capacity_is_rejected() {
		let config = BrokerConfig::default().with_channel_capacity(0);

		assert!(matches!(
			config.validate(),
			Err(Error::Config(ConfigError::ZeroChannelCapacity)),
		));
	}

	#[test]
	fn malformed_allow_patterns_fail_at_build_time() {
		let config = BrokerConfig::default().with_allowed_domains(["*."]);

		assert!(matches!(config.validate(), Err(Error::Config(_))));
	}
}
