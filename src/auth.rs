//! Credential models shared by the source and destination clients.

pub mod credential;
pub mod secret;
pub mod signer;

pub use credential::*;
pub use secret::*;
pub use signer::*;
