//! Broker-wide error taxonomy shared by the host dispatcher and the vault runtime.
//!
//! One unified scheme: every failure a caller can observe is a variant of [`Error`], and every
//! variant the vault produces crosses the isolation boundary as a
//! [`ErrorPayload`](crate::protocol::ErrorPayload) addressed to the originating correlation id.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Refresh-token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; raised at construction time.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Protocol-level failure (unknown kind, malformed payload, unparsable result).
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// The vault has not completed setup.
	#[error("Vault has not completed setup.")]
	Initialization,
	/// Target URL is not covered by the configured allow-list.
	#[error("Domain is not allow-listed: {url}.")]
	Domain {
		/// The rejected URL.
		url: String,
	},
	/// Transport-level failure (DNS, TCP, TLS) while performing a request.
	#[error("Network error occurred while performing the request.")]
	Network {
		/// Underlying transport failure.
		#[source]
		source: BoxError,
	},
	/// Server completed the round trip with an error status.
	///
	/// The FETCH path never produces this variant—raw 4xx/5xx responses surface as
	/// [`FetchOutcome`](crate::protocol::FetchOutcome) successes, and classification happens on
	/// the host side. The variant exists for host-side helpers and provider failures.
	#[error("Server responded with HTTP {status}.")]
	Http {
		/// HTTP status code.
		status: u16,
		/// Raw response body, kept for diagnostics.
		body: String,
	},
	/// Login, logout, refresh, or a custom provider operation failed.
	#[error("Auth operation failed: {reason}.")]
	Auth {
		/// Provider- or broker-supplied reason string.
		reason: String,
		/// HTTP status code, when the provider surfaced one.
		status: Option<u16>,
		/// Raw response body, when available.
		body: Option<String>,
	},
	/// Host-side wait for a response exceeded the configured timeout.
	#[error("Timed out after {waited_ms} ms waiting for a response.")]
	Timeout {
		/// Milliseconds waited before giving up.
		waited_ms: u64,
	},
	/// The caller explicitly aborted the request.
	#[error("Request was cancelled.")]
	Cancelled,
	/// The broker was destroyed while the request was pending.
	#[error("Broker was destroyed while the request was pending.")]
	Terminated,
}
impl Error {
	/// Wraps a transport-specific network failure.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Shorthand for an [`Error::Auth`] carrying only a reason string.
	pub fn auth(reason: impl Into<String>) -> Self {
		Self::Auth { reason: reason.into(), status: None, body: None }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for Error {
	fn from(e: reqwest::Error) -> Self {
		Self::network(e)
	}
}

/// Configuration and validation failures; these fail fast at construction instead of surfacing
/// as per-request results.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Allow-list contains an empty pattern.
	#[error("Allow-list pattern is empty.")]
	EmptyAllowPattern,
	/// Allow-list pattern carries a port segment that is not a valid port number.
	#[error("Allow-list pattern `{pattern}` has an invalid port.")]
	InvalidAllowPort {
		/// The offending pattern.
		pattern: String,
	},
	/// Message channel capacity must be non-zero.
	#[error("Channel capacity must be non-zero.")]
	ZeroChannelCapacity,
	/// Provider endpoint URL cannot be parsed.
	#[error("Provider endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Human-readable builder failure.
		message: String,
	},
	/// Configuration rejected by the vault during setup.
	#[error("{message}")]
	Invalid {
		/// Rejection reason reported in the `SETUP_ERROR` payload.
		message: String,
	},
}

/// Protocol failures raised while crossing the isolation boundary.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Inbound message kind is not part of the protocol.
	#[error("Unknown message kind: {kind}.")]
	UnknownMessage {
		/// The unrecognized `type` tag.
		kind: String,
	},
	/// Inbound payload failed to deserialize against its declared kind.
	#[error("Malformed payload for `{kind}`: {message}.")]
	MalformedPayload {
		/// The message kind whose payload was malformed.
		kind: String,
		/// Structured deserialization failure rendered as text.
		message: String,
	},
	/// Provider response could not be parsed into a token-info outcome.
	#[error("Failed to parse provider response.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// A response arrived whose kind does not answer the request that was sent.
	#[error("Unexpected response kind: {kind}.")]
	UnexpectedResponse {
		/// The surprising `type` tag.
		kind: String,
	},
	/// Payload bytes were not valid base64.
	#[error("Payload is not valid base64.")]
	InvalidBase64 {
		/// Underlying decode failure.
		#[source]
		source: base64::DecodeError,
	},
}
