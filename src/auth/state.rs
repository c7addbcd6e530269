//! In-memory token state: the four fields the vault exclusively owns.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{TokenInfo, TokenSecret},
	protocol::{self, AuthSnapshot},
};

/// Sole owner of the in-memory token fields; never serialized outward and never constructed
/// outside the vault's execution context.
///
/// `authenticated` is derived, never stored; see [`authenticated_at`](Self::authenticated_at).
#[derive(Clone, Default)]
pub struct TokenState {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
	user: Option<Value>,
}
impl TokenState {
	/// Returns the current access token.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Returns the current refresh token.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Returns the expiry instant, when one is set.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Returns the provider-supplied user object, when one is held.
	pub fn user(&self) -> Option<&Value> {
		self.user.as_ref()
	}

	/// Primes the refresh token from an external store without touching the other fields.
	pub fn prime_refresh_token(&mut self, token: impl Into<String>) {
		self.refresh_token = Some(TokenSecret::new(token));
	}

	/// Derived auth state at the provided instant: a non-empty access token that either never
	/// expires or has not yet expired.
	pub fn authenticated_at(&self, now: OffsetDateTime) -> bool {
		match &self.access_token {
			Some(token) if !token.is_empty() =>
				self.expires_at.map(|expiry| expiry > now).unwrap_or(true),
			_ => false,
		}
	}

	/// Derived auth state against the current clock.
	pub fn authenticated(&self) -> bool {
		self.authenticated_at(OffsetDateTime::now_utc())
	}

	/// Applies a partial provider outcome: each field updates only when its key is present,
	/// including present-with-null; absent keys preserve the existing value.
	///
	/// An expiry outside the representable range clears the field rather than failing the
	/// operation.
	pub fn apply(&mut self, info: &TokenInfo) {
		if let Some(token) = info.token.as_set() {
			self.access_token = token.cloned().map(TokenSecret::new);
		}
		if let Some(ms) = info.expires_at.as_set() {
			self.expires_at = ms.copied().and_then(protocol::from_unix_ms);
		}
		if let Some(token) = info.refresh_token.as_set() {
			self.refresh_token = token.cloned().map(TokenSecret::new);
		}
		if let Some(user) = info.user.as_set() {
			self.user = user.cloned();
		}
	}

	/// Resets all four fields to their empty baseline, forcing re-authentication.
	pub fn clear(&mut self) {
		*self = Self::default();
	}

	/// Produces the outward-facing snapshot: derived auth state, expiry, user—never tokens.
	pub fn snapshot_at(&self, now: OffsetDateTime) -> AuthSnapshot {
		AuthSnapshot {
			authenticated: self.authenticated_at(now),
			expires_at: self.expires_at.map(protocol::to_unix_ms),
			user: self.user.clone(),
		}
	}

	/// Snapshot against the current clock.
	pub fn snapshot(&self) -> AuthSnapshot {
		self.snapshot_at(OffsetDateTime::now_utc())
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("user_set", &self.user.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::auth::FieldPatch;

	fn seeded() -> TokenState {
		let mut state = TokenState::default();

		state.apply(
			&TokenInfo::default()
				.with_token("A")
				.with_refresh_token("R")
				.with_user(json!({"id": 1})),
		);

		state
	}

	#[test]
	fn absent_keys_preserve_existing_fields() {
		let mut state = seeded();

		state.apply(&TokenInfo::default().with_user(json!({"id": 2})));

		assert_eq!(state.access_token().map(TokenSecret::expose), Some("A"));
		assert_eq!(state.user(), Some(&json!({"id": 2})));
	}

	#[test]
	fn present_null_clears_only_that_field() {
		let mut state = seeded();

		state.apply(&TokenInfo::default().with_token_cleared());

		assert!(state.access_token().is_none());
		assert_eq!(state.user(), Some(&json!({"id": 1})));
		assert_eq!(state.refresh_token().map(TokenSecret::expose), Some("R"));
	}

	#[test]
	fn authenticated_is_derived_from_token_and_expiry() {
		let now = OffsetDateTime::now_utc();
		let mut state = TokenState::default();

		assert!(!state.authenticated_at(now));

		state.apply(&TokenInfo::default().with_token("A"));

		// No expiry means the token never expires.
		assert!(state.authenticated_at(now));

		state.apply(&TokenInfo::default().with_expires_at(now - Duration::seconds(1)));

		assert!(!state.authenticated_at(now));

		state.apply(&TokenInfo::default().with_expires_at(now + Duration::hours(1)));

		assert!(state.authenticated_at(now));

		state.apply(&TokenInfo { token: FieldPatch::set(String::new()), ..Default::default() });

		// Empty string tokens never authenticate.
		assert!(!state.authenticated_at(now));
	}

	#[test]
	fn clear_resets_everything() {
		let mut state = seeded();

		state.clear();

		assert!(state.access_token().is_none());
		assert!(state.refresh_token().is_none());
		assert!(state.expires_at().is_none());
		assert!(state.user().is_none());
	}

	#[test]
	fn snapshot_never_carries_tokens() {
		let state = seeded();
		let snapshot = state.snapshot();

		assert!(snapshot.authenticated);
		assert_eq!(snapshot.user, Some(json!({"id": 1})));

		let value = serde_json::to_value(&snapshot).expect("Snapshot should serialize.");

		assert!(value.get("token").is_none());
		assert!(value.get("accessToken").is_none());
		assert!(value.get("refreshToken").is_none());
	}
}
