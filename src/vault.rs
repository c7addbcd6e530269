//! The vault execution context: sole owner of token state.
//!
//! [`run`] drives a message loop over serialized [`WireEnvelope`]s. The hosting
//! side never touches [`VaultCore`] directly once the loop starts; every
//! interaction crosses the channel as a correlation-id-tagged envelope, which is
//! what keeps tokens confined to this task.

mod fetch;
mod refresh;

pub use refresh::RefreshMetrics;

// crates.io
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
// self
use crate::{
	_prelude::*,
	allowlist::AllowList,
	auth::{TokenInfo, TokenState},
	error::ConfigError,
	obs::{self, OpKind, OpOutcome},
	protocol::{
		self, AuthCallRequest, AuthOp, AuthSnapshot, CancelRequest, FetchRequest, HostMessage,
		MessageId, SetupConfig, VaultMessage, WireEnvelope,
	},
	provider::Provider,
	store::RefreshTokenStore,
	transport::HttpTransport,
};

/// Shared state of the vault task.
///
/// Constructed once by the broker builder, then moved behind an [`Arc`] into
/// the message loop and the per-fetch tasks it spawns.
pub struct VaultCore {
	provider: Arc<dyn Provider>,
	store: Arc<dyn RefreshTokenStore>,
	transport: Arc<dyn HttpTransport>,
	state: Mutex<TokenState>,
	runtime: RwLock<Option<Runtime>>,
	refresh_guard: AsyncMutex<()>,
	refresh_metrics: RefreshMetrics,
	aborts: Mutex<HashMap<MessageId, oneshot::Sender<()>>>,
}
impl VaultCore {
	/// Builds a core over the provided seams; the vault stays uninitialized
	/// until a `SETUP` message arrives.
	pub fn new(
		provider: Arc<dyn Provider>,
		store: Arc<dyn RefreshTokenStore>,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self {
			provider,
			store,
			transport,
			state: Mutex::new(TokenState::default()),
			runtime: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			refresh_metrics: RefreshMetrics::default(),
			aborts: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the refresh attempt counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	fn is_ready(&self) -> bool {
		self.runtime.read().is_some()
	}

	fn refresh_early(&self) -> Duration {
		self.runtime
			.read()
			.as_ref()
			.map(|runtime| runtime.refresh_early)
			.unwrap_or(Duration::seconds(60))
	}

	pub(crate) fn permits(&self, url: &Url) -> bool {
		self.runtime.read().as_ref().map(|runtime| runtime.allowlist.permits(url)).unwrap_or(false)
	}

	async fn handle_setup(&self, id: MessageId, config: SetupConfig, outbox: &Outbox) {
		const KIND: OpKind = OpKind::Setup;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		if self.is_ready() {
			let error = Error::Config(ConfigError::Invalid {
				message: "Setup already completed.".into(),
			});

			obs::record_op_outcome(KIND, OpOutcome::Failure);
			outbox.send(id, &VaultMessage::SetupError((&error).into()));

			return;
		}

		let runtime = match Runtime::build(&config) {
			Ok(runtime) => runtime,
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				outbox.send(id, &VaultMessage::SetupError((&e).into()));

				return;
			},
		};

		// Prime the refresh token from the store before declaring readiness, so
		// the first proactive refresh can run without a prior login.
		match self.store.load().await {
			Ok(Some(token)) => self.state.lock().prime_refresh_token(token),
			Ok(None) => (),
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				outbox.send(id, &VaultMessage::SetupError((&Error::Storage(e)).into()));

				return;
			},
		}

		*self.runtime.write() = Some(runtime);

		obs::record_op_outcome(KIND, OpOutcome::Success);
		outbox.send(id, &VaultMessage::Ready);
	}

	fn handle_fetch(self: &Arc<Self>, id: MessageId, request: FetchRequest, outbox: &Outbox) {
		const KIND: OpKind = OpKind::Fetch;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		if !self.is_ready() {
			obs::record_op_outcome(KIND, OpOutcome::Failure);
			outbox.send(id, &VaultMessage::FetchError((&Error::Initialization).into()));

			return;
		}

		let (abort_tx, abort_rx) = oneshot::channel();

		self.aborts.lock().insert(id.clone(), abort_tx);

		let core = self.clone();
		let outbox = outbox.clone();

		// Fetches run concurrently so a slow endpoint never blocks the loop.
		tokio::spawn(async move {
			let outcome = fetch::execute(&core, request, abort_rx, &outbox).await;

			core.aborts.lock().remove(&id);

			match outcome {
				Ok(result) => {
					obs::record_op_outcome(KIND, OpOutcome::Success);
					outbox.send(id, &VaultMessage::FetchResult(result));
				},
				Err(e) => {
					obs::record_op_outcome(KIND, OpOutcome::Failure);
					outbox.send(id, &VaultMessage::FetchError((&e).into()));
				},
			}
		});
	}

	fn handle_auth_call(self: &Arc<Self>, id: MessageId, request: AuthCallRequest, outbox: &Outbox) {
		const KIND: OpKind = OpKind::AuthCall;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		if !self.is_ready() {
			obs::record_op_outcome(KIND, OpOutcome::Failure);
			outbox.send(id, &VaultMessage::Error((&Error::Initialization).into()));

			return;
		}

		let core = self.clone();
		let outbox = outbox.clone();

		tokio::spawn(async move {
			match core.run_auth_call(request, &outbox).await {
				Ok(snapshot) => {
					obs::record_op_outcome(KIND, OpOutcome::Success);
					outbox.send(id, &VaultMessage::AuthCallResult(snapshot));
				},
				Err(e) => {
					obs::record_op_outcome(KIND, OpOutcome::Failure);
					outbox.send(id, &VaultMessage::Error((&e).into()));
				},
			}
		});
	}

	async fn run_auth_call(
		&self,
		request: AuthCallRequest,
		outbox: &Outbox,
	) -> Result<AuthSnapshot> {
		match &request.op {
			AuthOp::Refresh => {
				refresh::ensure_valid_token(self, true, outbox).await?;
			},
			AuthOp::Login => {
				let url = request
					.url
					.as_deref()
					.map(Url::parse)
					.transpose()
					.map_err(|e| ConfigError::InvalidEndpoint { source: e })?;
				let info = self
					.provider
					.login(request.payload.unwrap_or(Value::Null), url.as_ref())
					.await?;

				self.apply_token_info(&info, outbox, request.emit_event).await?;
			},
			AuthOp::Logout => {
				let info = self.provider.logout(request.payload).await?;

				// Local clearing happens only once the provider call succeeds;
				// a failed logout leaves the session usable.
				let (snapshot, refresh) = {
					let mut state = self.state.lock();

					state.clear();
					state.apply(&info);

					(state.snapshot(), state.refresh_token().map(|t| t.expose().to_owned()))
				};

				self.store.save(refresh.as_deref()).await?;

				if request.emit_event {
					outbox.emit_auth_state(snapshot);
				}
			},
			AuthOp::Custom(op) => {
				let info =
					self.provider.call(op, request.payload.unwrap_or(Value::Null)).await?;

				self.apply_token_info(&info, outbox, request.emit_event).await?;
			},
		}

		Ok(self.state.lock().snapshot())
	}

	/// Merges a provider outcome into token state, mirrors a changed refresh
	/// token into the store, and publishes the resulting snapshot.
	pub(crate) async fn apply_token_info(
		&self,
		info: &TokenInfo,
		outbox: &Outbox,
		emit: bool,
	) -> Result<()> {
		let (snapshot, mirror) = {
			let mut state = self.state.lock();

			state.apply(info);

			// Only a present refresh-token key touches the store.
			let mirror = (!info.refresh_token.is_absent())
				.then(|| state.refresh_token().map(|t| t.expose().to_owned()));

			(state.snapshot(), mirror)
		};

		if let Some(refresh) = mirror {
			self.store.save(refresh.as_deref()).await?;
		}
		if emit {
			outbox.emit_auth_state(snapshot);
		}

		Ok(())
	}

	fn handle_cancel(&self, request: CancelRequest) {
		// Unknown or already-finished targets are a no-op.
		if let Some(abort) = self.aborts.lock().remove(&request.target) {
			let _ = abort.send(());
		}
	}

	fn handle_ping(&self, id: MessageId, outbox: &Outbox) {
		obs::record_op_outcome(OpKind::Ping, OpOutcome::Attempt);

		if !self.is_ready() {
			obs::record_op_outcome(OpKind::Ping, OpOutcome::Failure);
			outbox.send(id, &VaultMessage::Error((&Error::Initialization).into()));

			return;
		}

		obs::record_op_outcome(OpKind::Ping, OpOutcome::Success);
		outbox.send(id, &VaultMessage::Pong);
	}
}
impl Debug for VaultCore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VaultCore").field("ready", &self.is_ready()).finish_non_exhaustive()
	}
}

#[derive(Debug)]
struct Runtime {
	allowlist: AllowList,
	refresh_early: Duration,
}
impl Runtime {
	fn build(config: &SetupConfig) -> Result<Self> {
		let allowlist = AllowList::new(&config.allowed_domains)?;
		let refresh_early =
			Duration::milliseconds(i64::try_from(config.refresh_early_ms).unwrap_or(i64::MAX));

		Ok(Self { allowlist, refresh_early })
	}
}

/// Clonable handle for the vault-to-host direction of the channel.
#[derive(Clone, Debug)]
pub(crate) struct Outbox(mpsc::UnboundedSender<WireEnvelope>);
impl Outbox {
	fn send(&self, id: MessageId, message: &VaultMessage) {
		// VaultMessage bodies always serialize; a closed channel means the
		// broker is gone and there is nobody left to notify.
		if let Ok(envelope) = protocol::encode(id, message) {
			let _ = self.0.send(envelope);
		}
	}

	pub(crate) fn emit_auth_state(&self, snapshot: AuthSnapshot) {
		// Events are unsolicited, so they carry a fresh id instead of echoing one.
		self.send(MessageId::generate(), &VaultMessage::AuthStateChanged(snapshot));
	}
}

/// Drives the vault message loop until the host side closes the channel.
pub async fn run(
	core: Arc<VaultCore>,
	mut rx: mpsc::Receiver<WireEnvelope>,
	tx: mpsc::UnboundedSender<WireEnvelope>,
) {
	let outbox = Outbox(tx);

	while let Some(envelope) = rx.recv().await {
		let id = envelope.id.clone();
		let message = match protocol::decode::<HostMessage>(&envelope) {
			Ok(message) => message,
			Err(e) => {
				outbox.send(id, &VaultMessage::Error((&Error::from(e)).into()));

				continue;
			},
		};

		match message {
			HostMessage::Setup(config) => core.handle_setup(id, config, &outbox).await,
			HostMessage::Fetch(request) => core.handle_fetch(id, request, &outbox),
			HostMessage::AuthCall(request) => core.handle_auth_call(id, request, &outbox),
			HostMessage::Cancel(request) => core.handle_cancel(request),
			HostMessage::Ping => core.handle_ping(id, &outbox),
		}
	}

	// Channel closed: the broker was destroyed. Abort whatever is in flight.
	for (_, abort) in core.aborts.lock().drain() {
		let _ = abort.send(());
	}
}
