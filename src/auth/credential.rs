//! Short-lived access credentials and the lazy refresh state machine that guards them.
//!
//! [`CredentialManager`] owns one cached [`AccessCredential`] per client. Callers ask for a
//! credential through [`CredentialManager::credential`] and hand over the exchange to run when
//! the cached value is missing or inside the refresh window. The refresh itself is an explicit
//! `Expiring -> Refreshing -> Valid` transition taken under a singleflight guard, so concurrent
//! callers piggy-back on one in-flight exchange instead of stampeding the token endpoint.

// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthError};

/// Lifecycle state of a cached credential relative to the refresh window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialState {
	/// Credential exists and outlives the refresh window.
	Valid,
	/// Credential is missing or expires inside the refresh window.
	Expiring,
	/// An exchange is in flight.
	Refreshing,
}
impl CredentialState {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialState::Valid => "valid",
			CredentialState::Expiring => "expiring",
			CredentialState::Refreshing => "refreshing",
		}
	}
}
impl Display for CredentialState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Bearer credential returned by a token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
	/// Access token secret; callers must avoid logging it.
	pub token: TokenSecret,
	/// Scheme prefix used in the `Authorization` header.
	pub token_type: String,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl AccessCredential {
	const DEFAULT_TOKEN_TYPE: &'static str = "Bearer";

	/// Creates a credential with an absolute expiry.
	pub fn new(
		token: impl Into<TokenSecret>,
		token_type: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		let token_type = token_type.into();
		let token_type =
			if token_type.trim().is_empty() { Self::DEFAULT_TOKEN_TYPE.into() } else { token_type };

		Self { token: token.into(), token_type, expires_at }
	}

	/// Creates a credential from a relative `expires_in` (seconds) observed at `issued_at`.
	pub fn expiring_in(
		token: impl Into<TokenSecret>,
		token_type: impl Into<String>,
		expires_in: i64,
		issued_at: OffsetDateTime,
	) -> Result<Self> {
		if expires_in <= 0 {
			return Err(AuthError::NonPositiveExpiresIn.into());
		}

		let expires_at = issued_at
			.checked_add(Duration::seconds(expires_in))
			.ok_or(AuthError::ExpiresInOutOfRange { expires_in })?;

		Ok(Self::new(token, token_type, expires_at))
	}

	/// Renders the `Authorization` header value (`{token_type} {token}`).
	pub fn authorization(&self) -> String {
		format!("{} {}", self.token_type, self.token.expose())
	}

	/// Computes the state at `now`; anything expiring within `window` is [`CredentialState::Expiring`].
	///
	/// A window reaching past the representable clock range counts as expiring.
	pub fn state_at(&self, now: OffsetDateTime, window: Duration) -> CredentialState {
		match now.checked_add(window) {
			Some(deadline) if self.expires_at > deadline => CredentialState::Valid,
			_ => CredentialState::Expiring,
		}
	}
}
impl Debug for AccessCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessCredential")
			.field("token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Debug, Default)]
struct CredentialSlot {
	credential: Option<AccessCredential>,
	refreshing: bool,
}

// Clears `refreshing` even when the refreshing future is dropped mid-exchange.
struct RefreshingFlag<'a>(&'a Mutex<CredentialSlot>);
impl<'a> RefreshingFlag<'a> {
	fn raise(slot: &'a Mutex<CredentialSlot>) -> Self {
		slot.lock().refreshing = true;

		Self(slot)
	}
}
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.lock().refreshing = false;
	}
}

/// Caches one [`AccessCredential`] and refreshes it lazily inside the request path.
#[derive(Debug)]
pub struct CredentialManager {
	refresh_window: Duration,
	slot: Mutex<CredentialSlot>,
	refresh_guard: AsyncMutex<()>,
}
impl CredentialManager {
	/// Refresh window applied when none is configured.
	pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::minutes(5);

	/// Creates an empty manager; the first request triggers an exchange.
	pub fn new(refresh_window: Duration) -> Self {
		let refresh_window = if refresh_window.is_negative() { Duration::ZERO } else { refresh_window };

		Self { refresh_window, slot: Default::default(), refresh_guard: AsyncMutex::new(()) }
	}

	/// Seeds the manager with an already-issued credential.
	pub fn with_credential(self, credential: AccessCredential) -> Self {
		self.slot.lock().credential = Some(credential);

		self
	}

	/// Returns the configured refresh window.
	pub fn refresh_window(&self) -> Duration {
		self.refresh_window
	}

	/// Reports the state machine position at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> CredentialState {
		let slot = self.slot.lock();

		if slot.refreshing {
			return CredentialState::Refreshing;
		}

		slot.credential
			.as_ref()
			.map_or(CredentialState::Expiring, |credential| {
				credential.state_at(now, self.refresh_window)
			})
	}

	/// Returns a usable credential, running `exchange` first when the cached one is stale.
	pub async fn credential<F, Fut>(&self, exchange: F) -> Result<AccessCredential>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<AccessCredential>>,
	{
		self.credential_with_clock(OffsetDateTime::now_utc, exchange).await
	}

	/// Same as [`CredentialManager::credential`] with a fixed clock reading.
	pub async fn credential_at<F, Fut>(
		&self,
		now: OffsetDateTime,
		exchange: F,
	) -> Result<AccessCredential>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<AccessCredential>>,
	{
		self.credential_with_clock(move || now, exchange).await
	}

	async fn credential_with_clock<C, F, Fut>(
		&self,
		clock: C,
		exchange: F,
	) -> Result<AccessCredential>
	where
		C: Fn() -> OffsetDateTime,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<AccessCredential>>,
	{
		if let Some(current) = self.valid_at(clock()) {
			return Ok(current);
		}

		let _singleflight = self.refresh_guard.lock().await;

		// Another caller may have finished a refresh while we waited on the guard.
		if let Some(current) = self.valid_at(clock()) {
			return Ok(current);
		}

		let flag = RefreshingFlag::raise(&self.slot);

		tracing::debug!(state = %CredentialState::Refreshing, "Refreshing access credential.");

		let outcome = exchange().await;

		drop(flag);

		let mut slot = self.slot.lock();

		match outcome {
			Ok(credential) => {
				slot.credential = Some(credential.clone());

				Ok(credential)
			},
			Err(e) => {
				slot.credential = None;

				Err(e)
			},
		}
	}

	fn valid_at(&self, now: OffsetDateTime) -> Option<AccessCredential> {
		let slot = self.slot.lock();

		slot.credential
			.as_ref()
			.filter(|credential| {
				!slot.refreshing
					&& credential.state_at(now, self.refresh_window) == CredentialState::Valid
			})
			.cloned()
	}
}
impl Default for CredentialManager {
	fn default() -> Self {
		Self::new(Self::DEFAULT_REFRESH_WINDOW)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::error::HttpStatusError;

	fn issued(now: OffsetDateTime, ttl: Duration) -> AccessCredential {
		AccessCredential::new("cached", "Bearer", now + ttl)
	}

	#[test]
	fn credential_renders_authorization_header() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(AccessCredential::new("abc", "bearer", now).authorization(), "bearer abc");
		assert_eq!(AccessCredential::new("abc", "", now).authorization(), "Bearer abc");
	}

	#[test]
	fn expiring_in_rejects_non_positive_durations() {
		let err = AccessCredential::expiring_in("abc", "Bearer", 0, OffsetDateTime::now_utc())
			.expect_err("Zero expires_in should be rejected.");

		assert!(matches!(err, Error::Auth(AuthError::NonPositiveExpiresIn)));
	}

	#[test]
	fn expiring_in_rejects_out_of_range_durations() {
		let err =
			AccessCredential::expiring_in("abc", "Bearer", i64::MAX, OffsetDateTime::now_utc())
				.expect_err("An expires_in past the clock range should be rejected.");

		assert!(matches!(
			err,
			Error::Auth(AuthError::ExpiresInOutOfRange { expires_in: i64::MAX })
		));
	}

	#[test]
	fn state_respects_refresh_window() {
		let now = OffsetDateTime::now_utc();
		let window = Duration::minutes(5);

		assert_eq!(issued(now, Duration::minutes(30)).state_at(now, window), CredentialState::Valid);
		assert_eq!(
			issued(now, Duration::minutes(4)).state_at(now, window),
			CredentialState::Expiring
		);
		assert_eq!(issued(now, window).state_at(now, window), CredentialState::Expiring);
	}

	#[test]
	fn unbounded_window_counts_as_expiring() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(
			issued(now, Duration::days(365)).state_at(now, Duration::MAX),
			CredentialState::Expiring
		);

		let manager = CredentialManager::new(Duration::MAX)
			.with_credential(issued(now, Duration::days(365)));

		assert_eq!(manager.state_at(now), CredentialState::Expiring);
	}

	#[tokio::test]
	async fn expiring_credential_triggers_exactly_one_exchange() {
		let now = OffsetDateTime::now_utc();
		let manager = CredentialManager::default().with_credential(issued(now, Duration::minutes(4)));
		let calls = AtomicUsize::new(0);
		let counter = &calls;
		let refreshed = manager
			.credential_at(now, move || async move {
				counter.fetch_add(1, Ordering::SeqCst);

				Ok(AccessCredential::new("fresh", "Bearer", now + Duration::hours(1)))
			})
			.await
			.expect("Refresh should succeed.");

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(refreshed.token.expose(), "fresh");
		assert_eq!(manager.state_at(now), CredentialState::Valid);

		let reused = manager
			.credential_at(now, move || async move {
				counter.fetch_add(1, Ordering::SeqCst);

				Ok(AccessCredential::new("unused", "Bearer", now + Duration::hours(1)))
			})
			.await
			.expect("Cached credential should be reused.");

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(reused.token.expose(), "fresh");
	}

	#[tokio::test]
	async fn valid_credential_skips_exchange() {
		let now = OffsetDateTime::now_utc();
		let manager =
			CredentialManager::default().with_credential(issued(now, Duration::minutes(6)));
		let calls = AtomicUsize::new(0);
		let counter = &calls;
		let current = manager
			.credential_at(now, move || async move {
				counter.fetch_add(1, Ordering::SeqCst);

				Ok(AccessCredential::new("unused", "Bearer", now + Duration::hours(1)))
			})
			.await
			.expect("Valid credential should be returned.");

		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(current.token.expose(), "cached");
	}

	#[tokio::test]
	async fn failed_exchange_clears_cache_and_propagates() {
		let now = OffsetDateTime::now_utc();
		let manager = CredentialManager::default().with_credential(issued(now, Duration::ZERO));
		let url = Url::parse("https://api.example.com/token").expect("Fixture URL should parse.");
		let url = &url;
		let err = manager
			.credential_at(now, move || async move {
				Err(HttpStatusError::from_body("POST", url, 401, br#"{"message":"denied"}"#).into())
			})
			.await
			.expect_err("Exchange failure should propagate.");

		assert!(matches!(err, Error::Status(ref status) if status.status == 401));
		assert_eq!(manager.state_at(now), CredentialState::Expiring);
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_refresh_does_not_stay_refreshing() {
		let now = OffsetDateTime::now_utc();
		let manager = CredentialManager::default();
		let stalled = tokio::time::timeout(
			std::time::Duration::from_millis(10),
			manager.credential_at(now, || std::future::pending::<Result<AccessCredential>>()),
		)
		.await;

		assert!(stalled.is_err());
		assert_eq!(manager.state_at(now), CredentialState::Expiring);

		let calls = AtomicUsize::new(0);
		let counter = &calls;

		for _ in 0..2 {
			manager
				.credential_at(now, move || async move {
					counter.fetch_add(1, Ordering::SeqCst);

					Ok(AccessCredential::new("fresh", "Bearer", now + Duration::hours(1)))
				})
				.await
				.expect("Refresh after a cancelled exchange should succeed.");
		}

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(manager.state_at(now), CredentialState::Valid);
	}

	#[test]
	fn empty_manager_reports_expiring() {
		assert_eq!(
			CredentialManager::default().state_at(OffsetDateTime::now_utc()),
			CredentialState::Expiring
		);
	}
}
