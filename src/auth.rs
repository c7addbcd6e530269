//! Token state, partial-update outcomes, and the smart field-preservation merge rule.
//!
//! `state` owns the in-memory token fields and lives only inside the vault; `info` carries the
//! partial outcome of a provider operation, where an absent key and a present-but-null key mean
//! different things; `secret` keeps raw token material out of logs.

pub mod info;
pub mod secret;
pub mod state;

pub use info::*;
pub use secret::*;
pub use state::*;
