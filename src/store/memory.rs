//! In-memory [`CredentialStore`] for tests and dry runs.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialStore, StoreFuture},
};

/// Keeps every saved refresh token in-process, oldest first.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<Mutex<Vec<TokenSecret>>>);
impl MemoryStore {
	/// Returns the most recently saved token.
	pub fn latest(&self) -> Option<TokenSecret> {
		self.0.lock().last().cloned()
	}

	/// Returns the number of saves observed.
	pub fn saves(&self) -> usize {
		self.0.lock().len()
	}
}
impl CredentialStore for MemoryStore {
	fn save_refresh_token<'a>(&'a self, token: &'a TokenSecret) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.lock().push(token.clone());

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn keeps_latest_token() {
		let store = MemoryStore::default();

		store.save_refresh_token(&TokenSecret::new("a")).await.expect("Save should succeed.");
		store.save_refresh_token(&TokenSecret::new("b")).await.expect("Save should succeed.");

		assert_eq!(store.saves(), 2);
		assert_eq!(store.latest().map(|token| token.expose().to_owned()), Some("b".into()));
	}
}
