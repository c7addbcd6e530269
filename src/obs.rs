//! Optional observability helpers for vault operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `vault_broker.op` with the `op` (operation)
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment the `vault_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by the vault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// One-shot vault configuration.
	Setup,
	/// Outbound proxied HTTP call.
	Fetch,
	/// Provider auth operation (login, logout, custom).
	AuthCall,
	/// Token refresh, proactive or forced.
	Refresh,
	/// Liveness probe.
	Ping,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Setup => "setup",
			OpKind::Fetch => "fetch",
			OpKind::AuthCall => "auth_call",
			OpKind::Refresh => "refresh",
			OpKind::Ping => "ping",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a vault handler.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the host.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
