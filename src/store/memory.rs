//! Thread-safe in-memory [`RefreshTokenStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{RefreshTokenStore, StoreFuture},
};

type StoreSlot = Arc<RwLock<Option<String>>>;

/// Keeps the refresh token in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreSlot);
impl MemoryStore {
	/// Returns a clone of the stored refresh token without going through the
	/// async contract. Test helper.
	pub fn token(&self) -> Option<String> {
		self.0.read().clone()
	}
}
impl RefreshTokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<String>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save<'a>(&'a self, token: Option<&'a str>) -> StoreFuture<'a, ()> {
		let slot = self.0.clone();
		let token = token.map(ToOwned::to_owned);

		Box::pin(async move {
			*slot.write() = token;

			Ok(())
		})
	}
}
