//! Durable write-back of rotated credentials.
//!
//! Only one value ever outlives a run: the refresh token returned by the payroll API's
//! refresh-token exchange. Refresh tokens are single-use, so the rotated value must reach
//! durable storage before any further API call.

pub mod file;
pub mod memory;

pub use file::ConfigFileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for rotated refresh tokens.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Durably records the refresh token to spend on the next run.
	fn save_refresh_token<'a>(&'a self, token: &'a TokenSecret) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
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
