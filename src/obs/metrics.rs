// self
use crate::obs::OutcomeKind;

/// Records a reconciliation outcome via the global metrics recorder (when enabled).
pub fn record_sync_outcome(outcome: OutcomeKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("driver_sync_record_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
