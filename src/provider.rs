//! Provider contract: the auth backend the vault delegates token operations to.
//!
//! `parser` turns raw HTTP responses into normalized [`TokenInfo`] patches;
//! `http` supplies a ready-made endpoint-driven implementation for JSON auth
//! backends. Custom providers implement [`Provider`] directly.

pub mod http;
pub mod parser;

pub use http::{HttpProvider, ProviderEndpoints};
pub use parser::{JsonTokenParser, ResponseParser};

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, auth::TokenInfo};

/// Boxed future returned by [`Provider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Auth backend contract.
///
/// Every operation resolves to a partial [`TokenInfo`]; the vault merges it
/// into its private state under the field-preservation rule, so an operation
/// that only updates the user object leaves tokens untouched.
pub trait Provider
where
	Self: 'static + Send + Sync,
{
	/// Exchanges the persisted refresh token (if any) for fresh credentials.
	fn refresh<'a>(&'a self, refresh_token: Option<&'a str>) -> ProviderFuture<'a, TokenInfo>;

	/// Authenticates with the provided credentials payload. `url` overrides the
	/// provider's default login endpoint when present.
	fn login<'a>(&'a self, payload: Value, url: Option<&'a Url>) -> ProviderFuture<'a, TokenInfo>;

	/// Ends the session server-side. Local state clearing is the vault's job
	/// and happens only when this resolves successfully.
	fn logout<'a>(&'a self, payload: Option<Value>) -> ProviderFuture<'a, TokenInfo>;

	/// Runs a provider-specific operation by name.
	///
	/// The default implementation rejects every name, so providers opt into
	/// custom operations explicitly.
	fn call<'a>(&'a self, op: &'a str, _payload: Value) -> ProviderFuture<'a, TokenInfo> {
		Box::pin(async move {
			Err(Error::auth(format!("Provider does not support the operation {op}.")))
		})
	}
}
