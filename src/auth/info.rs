//! Partial token-info outcomes and the field-patch primitive behind the merge rule.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, protocol};

/// Three-state field update: absent keys preserve existing state, present keys overwrite it,
/// including with `null`.
///
/// This is the primitive behind smart field preservation: a user-info-refresh operation can
/// return only a `user` key without clearing the access token, while a logout can return an
/// explicit `null` token to wipe it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldPatch<T> {
	/// Key absent; leave the current value untouched.
	#[default]
	Absent,
	/// Key present; overwrite with the carried value, which may be `None`.
	Set(Option<T>),
}
impl<T> FieldPatch<T> {
	/// Builds a patch that sets the field to a value.
	pub fn set(value: T) -> Self {
		Self::Set(Some(value))
	}

	/// Builds a patch that clears the field (present-with-null).
	pub fn clear() -> Self {
		Self::Set(None)
	}

	/// Returns `true` when the key is absent.
	pub fn is_absent(&self) -> bool {
		matches!(self, Self::Absent)
	}

	/// Applies the patch to a slot, honoring absent-preserves semantics.
	pub fn apply_to(&self, slot: &mut Option<T>)
	where
		T: Clone,
	{
		if let Self::Set(value) = self {
			slot.clone_from(value);
		}
	}

	/// Maps the carried value, preserving the three-state shape.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldPatch<U> {
		match self {
			Self::Absent => FieldPatch::Absent,
			Self::Set(value) => FieldPatch::Set(value.map(f)),
		}
	}

	/// Returns the carried value when the patch sets one.
	pub fn as_set(&self) -> Option<Option<&T>> {
		match self {
			Self::Absent => None,
			Self::Set(value) => Some(value.as_ref()),
		}
	}
}
// Serialized as the inner `Option`; `Absent` relies on `skip_serializing_if` at the field site,
// and `#[serde(default)]` turns a missing key back into `Absent` on the way in.
impl<T> Serialize for FieldPatch<T>
where
	T: Serialize,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			Self::Absent => serializer.serialize_none(),
			Self::Set(value) => value.serialize(serializer),
		}
	}
}
impl<'de, T> Deserialize<'de> for FieldPatch<T>
where
	T: Deserialize<'de>,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Self::Set(Option::<T>::deserialize(deserializer)?))
	}
}

/// Normalized, partial outcome of any provider operation.
///
/// Expiry travels as epoch milliseconds, matching the protocol's representation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
	/// Access token update.
	#[serde(default, skip_serializing_if = "FieldPatch::is_absent")]
	pub token: FieldPatch<String>,
	/// Expiry update, epoch milliseconds.
	#[serde(default, skip_serializing_if = "FieldPatch::is_absent")]
	pub expires_at: FieldPatch<i64>,
	/// Refresh token update.
	#[serde(default, skip_serializing_if = "FieldPatch::is_absent")]
	pub refresh_token: FieldPatch<String>,
	/// User object update.
	#[serde(default, skip_serializing_if = "FieldPatch::is_absent")]
	pub user: FieldPatch<Value>,
}
impl TokenInfo {
	/// Sets the access token.
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = FieldPatch::set(token.into());

		self
	}

	/// Clears the access token (present-with-null).
	pub fn with_token_cleared(mut self) -> Self {
		self.token = FieldPatch::clear();

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = FieldPatch::set(token.into());

		self
	}

	/// Clears the refresh token.
	pub fn with_refresh_token_cleared(mut self) -> Self {
		self.refresh_token = FieldPatch::clear();

		self
	}

	/// Sets the expiry from an instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = FieldPatch::set(protocol::to_unix_ms(instant));

		self
	}

	/// Sets the expiry from epoch milliseconds.
	pub fn with_expires_at_ms(mut self, ms: i64) -> Self {
		self.expires_at = FieldPatch::set(ms);

		self
	}

	/// Sets the user object.
	pub fn with_user(mut self, user: Value) -> Self {
		self.user = FieldPatch::set(user);

		self
	}

	/// Returns `true` when no field is present at all.
	pub fn is_empty(&self) -> bool {
		self.token.is_absent()
			&& self.expires_at.is_absent()
			&& self.refresh_token.is_absent()
			&& self.user.is_absent()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn absent_and_null_survive_a_json_round_trip() {
		let info = TokenInfo::default().with_token_cleared().with_user(json!({"id": 2}));
		let value = serde_json::to_value(&info).expect("Token info should serialize.");

		// `token` present as null, `refreshToken`/`expiresAt` absent entirely.
		assert_eq!(value, json!({"token": null, "user": {"id": 2}}));

		let back: TokenInfo =
			serde_json::from_value(value).expect("Token info should deserialize.");

		assert_eq!(back.token, FieldPatch::clear());
		assert!(back.refresh_token.is_absent());
		assert!(back.expires_at.is_absent());
		assert_eq!(back.user, FieldPatch::set(json!({"id": 2})));
	}

	#[test]
	fn apply_to_honors_the_three_states() {
		let mut slot = Some("keep".to_string());

		FieldPatch::<String>::Absent.apply_to(&mut slot);

		assert_eq!(slot.as_deref(), Some("keep"));

		FieldPatch::set("new".to_string()).apply_to(&mut slot);

		assert_eq!(slot.as_deref(), Some("new"));

		FieldPatch::<String>::clear().apply_to(&mut slot);

		assert_eq!(slot, None);
	}
}
