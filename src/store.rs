//! Storage contracts and built-in stores for the persisted refresh token.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`RefreshTokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the long-lived refresh token.
///
/// The vault mirrors its in-memory refresh token into the store on every
/// change, including clears, so the persisted value always reflects the most
/// recent auth state. Access tokens are never persisted.
pub trait RefreshTokenStore
where
	Self: Send + Sync,
{
	/// Loads the persisted refresh token, if any.
	fn load(&self) -> StoreFuture<'_, Option<String>>;

	/// Persists the refresh token, or clears it when `token` is [`None`].
	fn save<'a>(&'a self, token: Option<&'a str>) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`RefreshTokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[tokio::test]
	async fn memory_store_round_trips_and_clears() {
		let store = MemoryStore::default();

		assert_eq!(store.load().await.expect("Empty store should load."), None);

		store.save(Some("refresh-1")).await.expect("Save should succeed.");

		assert_eq!(
			store.load().await.expect("Populated store should load."),
			Some("refresh-1".into())
		);

		store.save(None).await.expect("Clear should succeed.");

		assert_eq!(store.load().await.expect("Cleared store should load."), None);
	}
}
