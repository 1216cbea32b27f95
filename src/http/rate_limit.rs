//! Minimum-spacing gate applied before every outbound call.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::{self, Instant};
// self
use crate::_prelude::*;

/// Guarantees that consecutive calls depart no closer together than the configured spacing.
///
/// Departure slots are reserved under a lock before sleeping, so the guarantee holds even when
/// several tasks share one limiter.
#[derive(Debug)]
pub struct RateLimiter {
	spacing: StdDuration,
	last_slot: Mutex<Option<Instant>>,
}
impl RateLimiter {
	/// Creates a limiter enforcing `spacing` between departures.
	pub fn new(spacing: StdDuration) -> Self {
		Self { spacing, last_slot: Mutex::new(None) }
	}

	/// Reserves the next departure slot for a call observed at `now`.
	pub fn reserve(&self, now: Instant) -> Instant {
		let mut last_slot = self.last_slot.lock();
		let slot = match *last_slot {
			Some(last) if last + self.spacing > now => last + self.spacing,
			_ => now,
		};

		*last_slot = Some(slot);

		slot
	}

	/// Waits until the caller's reserved slot is reached.
	pub async fn acquire(&self) {
		let now = Instant::now();
		let slot = self.reserve(now);

		if slot > now {
			tracing::trace!(delay_ms = (slot - now).as_millis() as u64, "Delaying outbound call.");

			time::sleep_until(slot).await;
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn reserve_spaces_back_to_back_calls() {
		let limiter = RateLimiter::new(StdDuration::from_millis(500));
		let now = Instant::now();

		assert_eq!(limiter.reserve(now), now);
		assert_eq!(
			limiter.reserve(now + StdDuration::from_millis(200)),
			now + StdDuration::from_millis(500)
		);
		assert_eq!(limiter.reserve(now), now + StdDuration::from_millis(1000));
		assert_eq!(
			limiter.reserve(now + StdDuration::from_millis(1600)),
			now + StdDuration::from_millis(1600)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn acquire_enforces_minimum_gap() {
		let limiter = RateLimiter::new(StdDuration::from_millis(500));
		let mut departures = Vec::new();

		for _ in 0..4 {
			limiter.acquire().await;
			departures.push(Instant::now());
		}

		for pair in departures.windows(2) {
			assert!(pair[1] - pair[0] >= StdDuration::from_millis(500));
		}
	}
}
