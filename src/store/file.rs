//! [`CredentialStore`] that writes rotated refresh tokens back into the YAML configuration.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::Config,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the rotated refresh token by rewriting the configuration file it came from.
#[derive(Debug)]
pub struct ConfigFileStore {
	path: PathBuf,
	config: Mutex<Config>,
}
impl ConfigFileStore {
	/// Creates a store that rewrites `path` starting from `config`.
	pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
		Self { path: path.into(), config: Mutex::new(config) }
	}

	fn persist_now(&self, token: &TokenSecret) -> Result<(), StoreError> {
		let mut config = self.config.lock();
		let mut updated = config.clone();

		updated.set_refresh_token(token.clone()).map_err(|e| StoreError::Serialization {
			message: format!("Failed to record rotated refresh token: {e}"),
		})?;
		updated.write(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", self.path.display()),
		})?;

		*config = updated;

		Ok(())
	}
}
impl CredentialStore for ConfigFileStore {
	fn save_refresh_token<'a>(&'a self, token: &'a TokenSecret) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.persist_now(token) })
	}
}
