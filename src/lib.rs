//! Reconcile payroll driver home addresses into a fleet-management directory.
//!
//! The payroll side ([`source`]) downloads one report per run; the directory side
//! ([`destination`]) is rate limited and refreshes its access token lazily. [`sync`] walks the
//! report and applies single matches, logging and skipping everything else.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod destination;
pub mod error;
pub mod http;
pub mod obs;
pub mod source;
pub mod store;
pub mod sync;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
