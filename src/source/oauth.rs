//! One-shot refresh-token exchange for payroll deployments behind the OAuth API gateway.
//!
//! The exchange spends the configured refresh token and yields a new access token together with
//! a rotated refresh token. Refresh tokens are single-use, so the caller must persist the rotated
//! value before issuing any other call; [`SourceClient::connect`](crate::source::SourceClient::connect)
//! does this through a [`CredentialStore`](crate::store::CredentialStore).

// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, TokenSecret},
	error::AuthError,
	http::{self, ApiTransport},
};

/// Header carrying the API gateway subscription key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

const EXCHANGE_PATH: [&str; 2] = ["authenticationsupport", "retrieveAccessTokenWithRefreshToken"];

/// Inputs of one refresh-token exchange.
#[derive(Clone, Debug)]
pub struct RefreshTokenGrant {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// API gateway subscription key.
	pub subscription_key: TokenSecret,
	/// Refresh token to spend.
	pub refresh_token: TokenSecret,
}

/// Outcome of a successful exchange.
#[derive(Clone, Debug)]
pub struct RefreshedGrant {
	/// Access credential sent as `Authorization: Bearer ...`.
	pub credential: AccessCredential,
	/// Rotated refresh token that replaces the spent one.
	pub refresh_token: TokenSecret,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
	refresh_token: &'a str,
	client_id: &'a str,
	client_secret: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
	access_token: String,
	expires_in: i64,
	refresh_token: Option<String>,
}

/// Returns the exchange endpoint under `host`, including the subscription key query.
pub fn exchange_url(host: &Url, subscription_key: &TokenSecret) -> Result<Url> {
	let mut url = http::join_url(host, &EXCHANGE_PATH)?;

	url.query_pairs_mut().append_pair("subscription-key", subscription_key.expose());

	Ok(url)
}

/// Spends `grant.refresh_token` and returns the new access credential and rotated refresh token.
pub async fn exchange_refresh_token(
	transport: &ApiTransport,
	host: &Url,
	grant: &RefreshTokenGrant,
) -> Result<RefreshedGrant> {
	let url = exchange_url(host, &grant.subscription_key)?;
	let body = ExchangeRequest {
		refresh_token: grant.refresh_token.expose(),
		client_id: &grant.client_id,
		client_secret: grant.client_secret.expose(),
	};
	let issued_at = OffsetDateTime::now_utc();
	let request = transport.request(Method::POST, url.clone()).json(&body);
	let response: ExchangeResponse = transport
		.execute_json(request, "refresh token exchange")
		.await
		.map_err(|e| AuthError::from_exchange_failure(&url, e))?;
	let refresh_token = response
		.refresh_token
		.filter(|token| !token.trim().is_empty())
		.ok_or(AuthError::MissingRefreshToken)?;
	// The gateway expects `Bearer` regardless of the advertised token type.
	let credential = AccessCredential::expiring_in(
		response.access_token,
		"Bearer",
		response.expires_in,
		issued_at,
	)?;

	Ok(RefreshedGrant { credential, refresh_token: TokenSecret::new(refresh_token) })
}
