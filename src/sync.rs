//! Reconciliation of payroll home addresses into the driver directory.
//!
//! Records are processed one at a time in source order. A record never aborts the run: lookup or
//! update failures are logged with the employee number and counted in the [`SyncReport`].

// self
use crate::{
	_prelude::*,
	destination::{
		DirectoryDriver, DirectoryFuture, DriverAddress, DriverDirectory, DriverId, POST_CODE_LEN,
		truncate_chars,
	},
	obs::{self, OutcomeKind},
	source::{HomeAddressRecord, normalize_employee_number},
};

/// What happened to one source record.
#[derive(Debug)]
pub enum RecordOutcome {
	/// The single matching driver was updated.
	Updated {
		/// Identifier of the updated driver.
		driver_id: DriverId,
	},
	/// No directory driver shares the employee number.
	NoMatch,
	/// Several directory drivers share the employee number; none was touched.
	Ambiguous {
		/// Number of drivers returned by the lookup.
		matches: usize,
	},
	/// The record carries no usable employee number.
	MissingKey,
	/// Lookup or update failed.
	Failed(Error),
}
impl RecordOutcome {
	/// Returns the metric/log label for this outcome.
	pub fn kind(&self) -> OutcomeKind {
		match self {
			RecordOutcome::Updated { .. } => OutcomeKind::Updated,
			RecordOutcome::NoMatch => OutcomeKind::NoMatch,
			RecordOutcome::Ambiguous { .. } => OutcomeKind::Ambiguous,
			RecordOutcome::MissingKey => OutcomeKind::MissingKey,
			RecordOutcome::Failed(_) => OutcomeKind::Failed,
		}
	}
}

/// Per-run tally of record outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	/// Records examined.
	pub processed: usize,
	/// Drivers updated.
	pub updated: usize,
	/// Records without a directory match.
	pub no_match: usize,
	/// Records skipped because several drivers matched.
	pub ambiguous: usize,
	/// Records skipped for lack of an employee number.
	pub missing_key: usize,
	/// Records whose lookup or update failed.
	pub failed: usize,
}
impl SyncReport {
	/// Counts one outcome.
	pub fn record(&mut self, outcome: OutcomeKind) {
		self.processed += 1;

		match outcome {
			OutcomeKind::Updated => self.updated += 1,
			OutcomeKind::NoMatch => self.no_match += 1,
			OutcomeKind::Ambiguous => self.ambiguous += 1,
			OutcomeKind::MissingKey => self.missing_key += 1,
			OutcomeKind::Failed => self.failed += 1,
		}
	}
}
impl Display for SyncReport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(
			f,
			"processed={} updated={} no_match={} ambiguous={} missing_key={} failed={}",
			self.processed,
			self.updated,
			self.no_match,
			self.ambiguous,
			self.missing_key,
			self.failed
		)
	}
}

/// Applies source records to a [`DriverDirectory`].
#[derive(Debug)]
pub struct Reconciler<'a, D>
where
	D: ?Sized + DriverDirectory,
{
	directory: &'a D,
}
impl<'a, D> Reconciler<'a, D>
where
	D: ?Sized + DriverDirectory,
{
	/// Creates a reconciler writing into `directory`.
	pub fn new(directory: &'a D) -> Self {
		Self { directory }
	}

	/// Reconciles every record in order and returns the tally.
	pub async fn sync(&self, records: &[HomeAddressRecord]) -> SyncReport {
		let mut report = SyncReport::default();

		for record in records {
			let outcome = self.reconcile_record(record).await;

			log_outcome(record, &outcome);
			obs::record_sync_outcome(outcome.kind());
			report.record(outcome.kind());
		}

		tracing::info!(
			processed = report.processed,
			updated = report.updated,
			no_match = report.no_match,
			ambiguous = report.ambiguous,
			missing_key = report.missing_key,
			failed = report.failed,
			"Reconciliation finished."
		);

		report
	}

	/// Reconciles a single record; errors are folded into [`RecordOutcome::Failed`].
	pub async fn reconcile_record(&self, record: &HomeAddressRecord) -> RecordOutcome {
		let employee_number = normalize_employee_number(&record.employee_number);

		if employee_number.is_empty() {
			return RecordOutcome::MissingKey;
		}

		match self.apply(&employee_number, record).await {
			Ok(outcome) => outcome,
			Err(e) => RecordOutcome::Failed(e),
		}
	}

	async fn apply(&self, employee_number: &str, record: &HomeAddressRecord) -> Result<RecordOutcome> {
		let drivers = self.directory.find_drivers(employee_number).await?;

		match drivers.as_slice() {
			[] => Ok(RecordOutcome::NoMatch),
			[driver] => {
				let driver_id = driver.driver_id.ok_or_else(|| Error::MissingDriverId {
					employee_number: employee_number.to_owned(),
				})?;

				self.directory
					.update_driver(driver_id, &record.address1, &record.address2, &record.postal_code)
					.await?;

				Ok(RecordOutcome::Updated { driver_id })
			},
			many => Ok(RecordOutcome::Ambiguous { matches: many.len() }),
		}
	}
}

/// Directory wrapper that performs lookups but only logs updates.
#[derive(Debug)]
pub struct DryRunDirectory<D> {
	inner: D,
}
impl<D> DryRunDirectory<D> {
	/// Wraps `inner`.
	pub fn new(inner: D) -> Self {
		Self { inner }
	}
}
impl<D> DriverDirectory for DryRunDirectory<D>
where
	D: DriverDirectory,
{
	fn find_drivers<'a>(
		&'a self,
		employee_number: &'a str,
	) -> DirectoryFuture<'a, Vec<DirectoryDriver>> {
		self.inner.find_drivers(employee_number)
	}

	fn update_driver<'a>(
		&'a self,
		driver_id: DriverId,
		address1: &'a str,
		address2: &'a str,
		postal_code: &'a str,
	) -> DirectoryFuture<'a, DirectoryDriver> {
		Box::pin(async move {
			let address = DriverAddress {
				address1: address1.to_owned(),
				address2: address2.to_owned(),
				post_code: truncate_chars(postal_code, POST_CODE_LEN).to_owned(),
			};

			tracing::info!(
				%driver_id,
				address1 = %address.address1,
				address2 = %address.address2,
				post_code = %address.post_code,
				"Dry run: skipping driver update."
			);

			Ok(DirectoryDriver { driver_id: Some(driver_id), employee_number: None, address })
		})
	}
}

fn log_outcome(record: &HomeAddressRecord, outcome: &RecordOutcome) {
	let employee_number = record.employee_number.as_str();

	match outcome {
		RecordOutcome::Updated { driver_id } =>
			tracing::info!(employee_number, %driver_id, "Updated driver address."),
		RecordOutcome::NoMatch =>
			tracing::debug!(employee_number, "No directory driver for employee number."),
		RecordOutcome::Ambiguous { matches } => {
			let err = Error::AmbiguousMatch {
				employee_number: employee_number.to_owned(),
				matches: *matches,
			};

			tracing::warn!(employee_number, matches, "{err}");
		},
		RecordOutcome::MissingKey => tracing::warn!(
			last_name = %record.last_name,
			first_name = %record.first_name,
			"Skipping record without an employee number."
		),
		RecordOutcome::Failed(e) =>
			tracing::error!(employee_number, error = %e, "Failed to reconcile record."),
	}
}
