//! Refresh coordination: proactive expiry checks behind a singleflight guard.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome, OpSpan},
	vault::{Outbox, VaultCore},
};

/// Returns a usable access token, refreshing through the provider when the
/// held one is missing, expired, or inside the proactive window.
///
/// Concurrent callers serialize on the vault's refresh guard; whoever loses the
/// race re-checks freshness after acquiring it and reuses the winner's token,
/// so the provider sees at most one refresh per staleness episode.
pub(crate) async fn ensure_valid_token(
	core: &VaultCore,
	force: bool,
	outbox: &Outbox,
) -> Result<Option<String>> {
	const KIND: OpKind = OpKind::Refresh;

	if !force && let Some(token) = fresh_token(core) {
		return Ok(Some(token));
	}

	let _singleflight = core.refresh_guard.lock().await;

	// Re-check under the guard: a concurrent caller may have refreshed already.
	if !force && let Some(token) = fresh_token(core) {
		return Ok(Some(token));
	}

	let span = OpSpan::new(KIND, "ensure_valid_token");

	core.refresh_metrics.record_attempt();
	obs::record_op_outcome(KIND, OpOutcome::Attempt);

	// Fall back to the persisted refresh token when memory holds none, priming
	// state so later attempts skip the store round trip.
	let refresh_token = match core.state.lock().refresh_token() {
		Some(token) => Some(token.expose().to_owned()),
		None => None,
	};
	let refresh_token = match refresh_token {
		Some(token) => Some(token),
		None => {
			let loaded = core.store.load().await?;

			if let Some(token) = &loaded {
				core.state.lock().prime_refresh_token(token.clone());
			}

			loaded
		},
	};

	match span.instrument(core.provider.refresh(refresh_token.as_deref())).await {
		Ok(info) => {
			core.apply_token_info(&info, outbox, true).await?;
			core.refresh_metrics.record_success();
			obs::record_op_outcome(KIND, OpOutcome::Success);

			Ok(core.state.lock().access_token().map(|token| token.expose().to_owned()))
		},
		Err(e) => {
			core.refresh_metrics.record_failure();
			obs::record_op_outcome(KIND, OpOutcome::Failure);

			// A failed refresh invalidates the whole session.
			let snapshot = {
				let mut state = core.state.lock();

				state.clear();

				state.snapshot()
			};

			// The refresh failure is what the caller needs to see; a store
			// error during the teardown must not mask it.
			let _ = core.store.save(None).await;

			outbox.emit_auth_state(snapshot);

			Err(e)
		},
	}
}

/// Returns the held access token when it is non-empty and outside the
/// proactive refresh window.
fn fresh_token(core: &VaultCore) -> Option<String> {
	let refresh_early = core.refresh_early();
	let state = core.state.lock();
	let token = state.access_token()?;

	if token.is_empty() {
		return None;
	}

	match state.expires_at() {
		// No expiry means the token never goes stale.
		None => Some(token.expose().to_owned()),
		Some(expiry) if expiry - OffsetDateTime::now_utc() > refresh_early =>
			Some(token.expose().to_owned()),
		Some(_) => None,
	}
}

/// Thread-safe counters for refresh attempts.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of provider refresh attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh calls.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh calls.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
