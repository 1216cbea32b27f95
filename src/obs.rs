//! Observability helpers for API calls and reconciliation outcomes.
//!
//! - Every outbound operation runs inside a `driver_sync.call` span carrying the `api` and
//!   `operation` fields.
//! - Enable the `metrics` feature to increment the `driver_sync_record_total` counter for every
//!   reconciled record, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// External systems the crate talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiKind {
	/// Payroll report API.
	Source,
	/// Fleet-management directory API.
	Destination,
}
impl ApiKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ApiKind::Source => "source",
			ApiKind::Destination => "destination",
		}
	}
}
impl Display for ApiKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each reconciled record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
	/// Destination record updated.
	Updated,
	/// No destination record matched.
	NoMatch,
	/// Several destination records matched; nothing was updated.
	Ambiguous,
	/// Source record had no usable employee number.
	MissingKey,
	/// Lookup or update failed.
	Failed,
}
impl OutcomeKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OutcomeKind::Updated => "updated",
			OutcomeKind::NoMatch => "no_match",
			OutcomeKind::Ambiguous => "ambiguous",
			OutcomeKind::MissingKey => "missing_key",
			OutcomeKind::Failed => "failed",
		}
	}
}
impl Display for OutcomeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
