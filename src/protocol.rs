//! Typed, correlation-id-tagged message envelopes exchanged across the isolation boundary.
//!
//! The boundary carries [`WireEnvelope`]s—an id plus a `{type, payload}` body—so the vault and
//! the host never share memory, only serialized messages. [`decode`] distinguishes an unknown
//! `type` tag from a malformed payload, which is what lets the vault answer junk with a typed
//! `UNKNOWN_MESSAGE` error instead of dropping it on the floor.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, error::ProtocolError, form::MultipartPayload};

/// Host-generated correlation token, unique per outstanding request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);
impl MessageId {
	/// Generates a fresh random id (16 hex characters).
	pub fn generate() -> Self {
		let value: u64 = rand::rng().random();

		Self(format!("{value:016x}"))
	}

	/// Wraps an existing id string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the id as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for MessageId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "MessageId({})", self.0)
	}
}
impl Display for MessageId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Protocol envelope: a correlation id plus a message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
	/// Correlation id; echoed on the eventual response, or freshly generated for events.
	pub id: MessageId,
	/// Message body, flattened so the wire shape is `{id, type, payload}`.
	#[serde(flatten)]
	pub body: T,
}

/// Envelope as it crosses the boundary: the body stays serialized until decoded.
pub type WireEnvelope = Envelope<Value>;

/// Serializes a message body into a wire envelope under the provided id.
pub fn encode<T>(id: MessageId, body: &T) -> Result<WireEnvelope, ProtocolError>
where
	T: Serialize + MessageBody,
{
	let body = serde_json::to_value(body).map_err(|e| ProtocolError::MalformedPayload {
		kind: T::FAMILY.into(),
		message: e.to_string(),
	})?;

	Ok(Envelope { id, body })
}

/// Decodes a wire envelope body into a typed message.
///
/// An unrecognized `type` tag yields [`ProtocolError::UnknownMessage`]; a recognized tag with an
/// undeserializable payload yields [`ProtocolError::MalformedPayload`] with a field path.
pub fn decode<T>(envelope: &WireEnvelope) -> Result<T, ProtocolError>
where
	T: MessageBody,
{
	let kind = envelope
		.body
		.get("type")
		.and_then(Value::as_str)
		.ok_or_else(|| ProtocolError::UnknownMessage { kind: "<missing>".into() })?;

	if !T::KINDS.contains(&kind) {
		return Err(ProtocolError::UnknownMessage { kind: kind.into() });
	}

	serde_path_to_error::deserialize(envelope.body.clone()).map_err(|e| {
		ProtocolError::MalformedPayload { kind: kind.into(), message: e.to_string() }
	})
}

/// Message family decodable from a wire envelope.
pub trait MessageBody
where
	Self: DeserializeOwned,
{
	/// Human-readable family label used in diagnostics.
	const FAMILY: &'static str;
	/// Every `type` tag this family recognizes.
	const KINDS: &'static [&'static str];
}

/// Messages the host sends into the vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
	/// Configures the vault; produces exactly one `READY` or `SETUP_ERROR`.
	Setup(SetupConfig),
	/// Performs an outbound HTTP call.
	Fetch(FetchRequest),
	/// Runs a provider auth operation.
	AuthCall(AuthCallRequest),
	/// Aborts the named in-flight network call; bypasses the host queue.
	Cancel(CancelRequest),
	/// Liveness probe.
	Ping,
}
impl MessageBody for HostMessage {
	const FAMILY: &'static str = "host";
	const KINDS: &'static [&'static str] = &["SETUP", "FETCH", "AUTH_CALL", "CANCEL", "PING"];
}

/// Messages the vault posts back to the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultMessage {
	/// Setup completed; the vault now accepts all request kinds.
	Ready,
	/// Setup failed; the vault stays uninitialized.
	SetupError(ErrorPayload),
	/// A fetch completed a network round trip (any HTTP status).
	FetchResult(FetchOutcome),
	/// A fetch failed before or during transport (network, domain, cancellation).
	FetchError(ErrorPayload),
	/// A non-fetch request failed.
	Error(ErrorPayload),
	/// Liveness response.
	Pong,
	/// Event: derived auth state changed; never carries tokens. Carries its own id.
	AuthStateChanged(AuthSnapshot),
	/// A provider auth operation completed.
	AuthCallResult(AuthSnapshot),
}
impl VaultMessage {
	/// Returns the wire `type` tag for this message.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Ready => "READY",
			Self::SetupError(_) => "SETUP_ERROR",
			Self::FetchResult(_) => "FETCH_RESULT",
			Self::FetchError(_) => "FETCH_ERROR",
			Self::Error(_) => "ERROR",
			Self::Pong => "PONG",
			Self::AuthStateChanged(_) => "AUTH_STATE_CHANGED",
			Self::AuthCallResult(_) => "AUTH_CALL_RESULT",
		}
	}
}
impl MessageBody for VaultMessage {
	const FAMILY: &'static str = "vault";
	const KINDS: &'static [&'static str] = &[
		"READY",
		"SETUP_ERROR",
		"FETCH_RESULT",
		"FETCH_ERROR",
		"ERROR",
		"PONG",
		"AUTH_STATE_CHANGED",
		"AUTH_CALL_RESULT",
	];
}

/// Vault configuration carried by `SETUP`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupConfig {
	/// Permitted target domains; empty means every URL passes.
	#[serde(default)]
	pub allowed_domains: Vec<String>,
	/// Proactive refresh window in milliseconds.
	#[serde(default = "default_refresh_early_ms")]
	pub refresh_early_ms: u64,
}

fn default_refresh_early_ms() -> u64 {
	60_000
}

/// HTTP method carried by fetch requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// GET.
	#[default]
	Get,
	/// POST.
	Post,
	/// PUT.
	Put,
	/// PATCH.
	Patch,
	/// DELETE.
	Delete,
	/// HEAD.
	Head,
	/// OPTIONS.
	Options,
}
impl HttpMethod {
	/// Returns the canonical uppercase method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
			Self::Head => "HEAD",
			Self::Options => "OPTIONS",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outbound HTTP call description.
///
/// `requires_auth` and `include_headers` are broker flags; the vault strips them before the
/// request reaches the transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
	/// Target URL.
	pub url: String,
	/// HTTP method; defaults to GET.
	#[serde(default)]
	pub method: HttpMethod,
	/// Request headers.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, String>,
	/// Request body, when any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<FetchBody>,
	/// Attach a bearer credential unless explicitly `false`.
	#[serde(default = "default_true")]
	pub requires_auth: bool,
	/// Include response headers in the outcome.
	#[serde(default)]
	pub include_headers: bool,
}
impl FetchRequest {
	/// Creates a request for the provided method and URL with default options.
	pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			method,
			headers: BTreeMap::new(),
			body: None,
			requires_auth: true,
			include_headers: false,
		}
	}

	/// Adds a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Sets the request body.
	pub fn with_body(mut self, body: FetchBody) -> Self {
		self.body = Some(body);

		self
	}

	/// Overrides the `requires_auth` flag (defaults to `true`).
	pub fn with_requires_auth(mut self, requires_auth: bool) -> Self {
		self.requires_auth = requires_auth;

		self
	}

	/// Overrides the `include_headers` flag (defaults to `false`).
	pub fn with_include_headers(mut self, include_headers: bool) -> Self {
		self.include_headers = include_headers;

		self
	}
}

fn default_true() -> bool {
	true
}

/// Transport-safe request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FetchBody {
	/// Plain text body.
	Text {
		/// Body content.
		content: String,
	},
	/// Binary body, base64-encoded for the boundary crossing.
	Bytes {
		/// Base64-encoded bytes.
		data: String,
	},
	/// Serialized multipart payload, reconstructed inside the vault.
	Multipart {
		/// Encoded multipart parts.
		payload: MultipartPayload,
	},
}
impl FetchBody {
	/// Builds a text body.
	pub fn text(content: impl Into<String>) -> Self {
		Self::Text { content: content.into() }
	}

	/// Builds a binary body, encoding the bytes as base64.
	pub fn bytes(data: impl AsRef<[u8]>) -> Self {
		Self::Bytes { data: BASE64.encode(data.as_ref()) }
	}

	/// Builds a multipart body.
	pub fn multipart(payload: MultipartPayload) -> Self {
		Self::Multipart { payload }
	}
}

/// Result of a completed network round trip, whatever the HTTP status.
///
/// Classification into ok-vs-error happens on the host via [`FetchOutcome::is_ok`], never inside
/// the vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
	/// Raw HTTP status code, including 4xx/5xx.
	pub status: u16,
	/// Response content type, when the server declared one.
	pub content_type: Option<String>,
	/// Response headers; present only when the request asked for them.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headers: Option<BTreeMap<String, String>>,
	/// Response body.
	pub body: FetchResponseBody,
}
impl FetchOutcome {
	/// Host-side classification: `true` for non-error HTTP statuses.
	pub fn is_ok(&self) -> bool {
		self.status < 400
	}

	/// Returns the body as text, when it was transmitted unencoded.
	pub fn text(&self) -> Option<&str> {
		match &self.body {
			FetchResponseBody::Text { content } => Some(content),
			FetchResponseBody::Base64 { .. } => None,
		}
	}

	/// Returns the body bytes, decoding base64 when necessary.
	pub fn bytes(&self) -> Result<Vec<u8>> {
		match &self.body {
			FetchResponseBody::Text { content } => Ok(content.clone().into_bytes()),
			FetchResponseBody::Base64 { data } => Ok(BASE64
				.decode(data)
				.map_err(|e| ProtocolError::InvalidBase64 { source: e })?),
		}
	}
}

/// Response body, base64-encoded when the content type is binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "camelCase")]
pub enum FetchResponseBody {
	/// Text content types pass through unencoded.
	Text {
		/// Body content.
		content: String,
	},
	/// Binary content types are base64-encoded before transmission.
	Base64 {
		/// Base64-encoded bytes.
		data: String,
	},
}

/// Provider auth operation requested by the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCallRequest {
	/// Operation to run.
	pub op: AuthOp,
	/// Operation payload, forwarded to the provider.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
	/// Login URL override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Emit an `AUTH_STATE_CHANGED` event after applying the outcome.
	#[serde(default = "default_true")]
	pub emit_event: bool,
}
impl AuthCallRequest {
	/// Creates a request for the provided operation with no payload.
	pub fn new(op: AuthOp) -> Self {
		Self { op, payload: None, url: None, emit_event: true }
	}

	/// Sets the operation payload.
	pub fn with_payload(mut self, payload: Value) -> Self {
		self.payload = Some(payload);

		self
	}

	/// Sets the login URL override.
	pub fn with_url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());

		self
	}

	/// Overrides event emission (defaults to `true`).
	pub fn with_emit_event(mut self, emit_event: bool) -> Self {
		self.emit_event = emit_event;

		self
	}
}

/// Provider operation selector: the three standard operations plus named custom ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOp {
	/// Provider `login`.
	Login,
	/// Provider `logout`.
	Logout,
	/// Provider `refreshToken`, forced through the coordinator.
	Refresh,
	/// Named custom operation dispatched through the provider's capability map.
	Custom(String),
}
impl AuthOp {
	/// Returns the wire label for this operation.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Login => "login",
			Self::Logout => "logout",
			Self::Refresh => "refresh",
			Self::Custom(name) => name,
		}
	}
}
impl From<&str> for AuthOp {
	fn from(value: &str) -> Self {
		match value {
			"login" => Self::Login,
			"logout" => Self::Logout,
			"refresh" => Self::Refresh,
			other => Self::Custom(other.into()),
		}
	}
}
impl Display for AuthOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Serialize for AuthOp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for AuthOp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(String::deserialize(deserializer)?.as_str().into())
	}
}

/// Derived auth state published to the host; never carries the tokens themselves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
	/// Whether a usable access token is currently held.
	pub authenticated: bool,
	/// Expiry instant in epoch milliseconds, when one is set.
	pub expires_at: Option<i64>,
	/// Provider-supplied user object, when one is held.
	pub user: Option<Value>,
}

/// Cancellation request naming the in-flight call to abort.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
	/// Correlation id of the fetch to abort.
	pub target: MessageId,
}

/// Serializable rendition of [`Error`] for the boundary crossing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
	/// Error category tag.
	pub code: ErrorCode,
	/// Human-readable message.
	pub message: String,
	/// HTTP status, for HTTP/auth failures.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<u16>,
	/// Raw response body, for HTTP/auth failures.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<String>,
	/// Category-specific detail (rejected URL, unknown kind, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
	/// Milliseconds waited, for timeouts.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub waited_ms: Option<u64>,
}
impl ErrorPayload {
	/// Rehydrates the payload into an [`Error`].
	///
	/// Boxed sources cannot cross the boundary, so rehydrated network/protocol errors carry the
	/// remote message text instead of the original source chain.
	pub fn into_error(self) -> Error {
		match self.code {
			ErrorCode::Initialization => Error::Initialization,
			ErrorCode::Domain =>
				Error::Domain { url: self.detail.unwrap_or(self.message) },
			ErrorCode::Network => Error::Network { source: Box::new(RemoteError(self.message)) },
			ErrorCode::Http => Error::Http {
				status: self.status.unwrap_or_default(),
				body: self.body.unwrap_or_default(),
			},
			ErrorCode::Auth =>
				Error::Auth { reason: self.message, status: self.status, body: self.body },
			ErrorCode::UnknownMessage => ProtocolError::UnknownMessage {
				kind: self.detail.unwrap_or(self.message),
			}
			.into(),
			ErrorCode::Protocol => ProtocolError::MalformedPayload {
				kind: self.detail.unwrap_or_else(|| "remote".into()),
				message: self.message,
			}
			.into(),
			ErrorCode::Timeout => Error::Timeout { waited_ms: self.waited_ms.unwrap_or_default() },
			ErrorCode::Cancelled => Error::Cancelled,
			ErrorCode::Terminated => Error::Terminated,
			ErrorCode::Storage =>
				crate::store::StoreError::Backend { message: self.message }.into(),
			ErrorCode::Config =>
				crate::error::ConfigError::Invalid { message: self.message }.into(),
		}
	}
}
impl From<&Error> for ErrorPayload {
	fn from(error: &Error) -> Self {
		let mut payload = Self {
			code: ErrorCode::from(error),
			message: error.to_string(),
			status: None,
			body: None,
			detail: None,
			waited_ms: None,
		};

		match error {
			Error::Domain { url } => payload.detail = Some(url.clone()),
			Error::Http { status, body } => {
				payload.status = Some(*status);
				payload.body = Some(body.clone());
			},
			Error::Auth { reason, status, body } => {
				payload.message = reason.clone();
				payload.status = *status;
				payload.body = body.clone();
			},
			Error::Protocol(ProtocolError::UnknownMessage { kind }) =>
				payload.detail = Some(kind.clone()),
			Error::Timeout { waited_ms } => payload.waited_ms = Some(*waited_ms),
			_ => (),
		}

		payload
	}
}

/// Stable error category tags carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Vault not set up.
	Initialization,
	/// URL not allow-listed.
	Domain,
	/// Transport failure.
	Network,
	/// Server error status.
	Http,
	/// Auth operation failure.
	Auth,
	/// Protocol failure other than an unknown kind.
	Protocol,
	/// Unrecognized message kind.
	UnknownMessage,
	/// Host-side wait exceeded.
	Timeout,
	/// Explicit abort.
	Cancelled,
	/// Broker destroyed.
	Terminated,
	/// Store failure.
	Storage,
	/// Configuration rejected.
	Config,
}
impl From<&Error> for ErrorCode {
	fn from(error: &Error) -> Self {
		match error {
			Error::Storage(_) => Self::Storage,
			Error::Config(_) => Self::Config,
			Error::Protocol(ProtocolError::UnknownMessage { .. }) => Self::UnknownMessage,
			Error::Protocol(_) => Self::Protocol,
			Error::Initialization => Self::Initialization,
			Error::Domain { .. } => Self::Domain,
			Error::Network { .. } => Self::Network,
			Error::Http { .. } => Self::Http,
			Error::Auth { .. } => Self::Auth,
			Error::Timeout { .. } => Self::Timeout,
			Error::Cancelled => Self::Cancelled,
			Error::Terminated => Self::Terminated,
		}
	}
}

/// Converts an instant into epoch milliseconds, the protocol's expiry representation.
pub fn to_unix_ms(instant: OffsetDateTime) -> i64 {
	(instant.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Converts epoch milliseconds back into an instant; `None` when out of range.
pub fn from_unix_ms(ms: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

struct RemoteError(String);
impl Debug for RemoteError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "RemoteError({})", self.0)
	}
}
impl Display for RemoteError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl StdError for RemoteError {}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn envelope_wire_shape_is_id_type_payload() {
		let envelope = encode(
			MessageId::new("abc"),
			&HostMessage::Cancel(CancelRequest { target: MessageId::new("def") }),
		)
		.expect("Cancel message should encode.");
		let value = serde_json::to_value(&envelope).expect("Envelope should serialize.");

		assert_eq!(value, json!({"id": "abc", "type": "CANCEL", "payload": {"target": "def"}}));
	}

	#[test]
	fn unit_variants_need_no_payload() {
		let envelope =
			Envelope { id: MessageId::new("p1"), body: json!({"type": "PING"}) };
		let decoded: HostMessage = decode(&envelope).expect("PING should decode without payload.");

		assert!(matches!(decoded, HostMessage::Ping));
	}

	#[test]
	fn unknown_kind_is_distinguished_from_malformed_payload() {
		let unknown = Envelope { id: MessageId::new("x"), body: json!({"type": "TELEPORT"}) };

		assert!(matches!(
			decode::<HostMessage>(&unknown),
			Err(ProtocolError::UnknownMessage { kind }) if kind == "TELEPORT",
		));

		let malformed = Envelope {
			id: MessageId::new("y"),
			body: json!({"type": "FETCH", "payload": {"method": "GET"}}),
		};

		assert!(matches!(
			decode::<HostMessage>(&malformed),
			Err(ProtocolError::MalformedPayload { kind, .. }) if kind == "FETCH",
		));
	}

	#[test]
	fn auth_op_maps_known_labels_and_passes_custom_through() {
		assert_eq!(AuthOp::from("login"), AuthOp::Login);
		assert_eq!(AuthOp::from("refresh"), AuthOp::Refresh);
		assert_eq!(AuthOp::from("refreshUserInfo"), AuthOp::Custom("refreshUserInfo".into()));

		let round: AuthOp = serde_json::from_str("\"logout\"").expect("AuthOp should deserialize.");

		assert_eq!(round, AuthOp::Logout);
		assert_eq!(
			serde_json::to_string(&AuthOp::Custom("x".into())).expect("AuthOp should serialize."),
			"\"x\"",
		);
	}

	#[test]
	fn error_payload_round_trips_the_interesting_fields() {
		let original = Error::Auth {
			reason: "invalid credentials".into(),
			status: Some(401),
			body: Some("{\"error\":\"denied\"}".into()),
		};
		let payload = ErrorPayload::from(&original);

		assert_eq!(payload.code, ErrorCode::Auth);
		assert_eq!(payload.message, "invalid credentials");

		match payload.into_error() {
			Error::Auth { reason, status, body } => {
				assert_eq!(reason, "invalid credentials");
				assert_eq!(status, Some(401));
				assert_eq!(body.as_deref(), Some("{\"error\":\"denied\"}"));
			},
			other => panic!("Expected an auth error, got {other:?}."),
		}

		let timeout = ErrorPayload::from(&Error::Timeout { waited_ms: 30_000 });

		assert!(matches!(timeout.into_error(), Error::Timeout { waited_ms: 30_000 }));
	}

	#[test]
	fn unix_ms_conversions_invert_each_other() {
		let now = OffsetDateTime::now_utc();
		let ms = to_unix_ms(now);
		let back = from_unix_ms(ms).expect("Epoch milliseconds should convert back.");

		assert_eq!(to_unix_ms(back), ms);
		assert!(from_unix_ms(i64::MAX).is_none());
	}

	#[test]
	fn fetch_request_defaults_follow_the_config_contract() {
		let parsed: FetchRequest =
			serde_json::from_value(json!({"url": "https://api.example.com/v1"}))
				.expect("Minimal fetch request should deserialize.");

		assert_eq!(parsed.method, HttpMethod::Get);
		assert!(parsed.requires_auth);
		assert!(!parsed.include_headers);
		assert!(parsed.body.is_none());
	}
}
