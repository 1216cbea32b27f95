//! Fleet-management directory client: client-credentials auth, rate-limited lookups and updates.

// crates.io
use reqwest::{Method, RequestBuilder, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, CredentialManager, TokenSecret},
	config::DestinationConfig,
	error::AuthError,
	http::{self, ApiTransport},
	obs::{ApiKind, ApiSpan},
};

/// Maximum number of postal code characters the directory accepts.
pub const POST_CODE_LEN: usize = 5;

const TOKEN_PATH: [&str; 1] = ["token"];
const FIND_PATH: [&str; 3] = ["driver-management", "driver", "find"];
const DRIVER_PATH: [&str; 2] = ["driver-management", "driver"];

/// Boxed future returned by [`DriverDirectory`] operations.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Directory-assigned driver identifier. Zero is a legitimate value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub i64);
impl Display for DriverId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}

/// Address block stored on a directory driver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAddress {
	/// First street line.
	#[serde(default)]
	pub address1: String,
	/// Second street line.
	#[serde(default)]
	pub address2: String,
	/// Postal code, at most [`POST_CODE_LEN`] characters on write.
	#[serde(default, rename = "postCode")]
	pub post_code: String,
}

/// Driver record as exchanged with the directory API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDriver {
	/// Identifier used to address updates; absent on update payloads.
	#[serde(default, rename = "drvId", skip_serializing_if = "Option::is_none")]
	pub driver_id: Option<DriverId>,
	/// Employee number shared with the payroll system.
	#[serde(default, rename = "employeeNumber", skip_serializing_if = "Option::is_none")]
	pub employee_number: Option<String>,
	/// Home address.
	#[serde(default)]
	pub address: DriverAddress,
}

/// Lookup and update operations the reconciler needs from the directory.
pub trait DriverDirectory
where
	Self: Send + Sync,
{
	/// Returns every driver whose employee number equals `employee_number`.
	fn find_drivers<'a>(&'a self, employee_number: &'a str)
	-> DirectoryFuture<'a, Vec<DirectoryDriver>>;

	/// Replaces the address of driver `driver_id` and returns the directory's response.
	fn update_driver<'a>(
		&'a self,
		driver_id: DriverId,
		address1: &'a str,
		address2: &'a str,
		postal_code: &'a str,
	) -> DirectoryFuture<'a, DirectoryDriver>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
	client_id: &'a str,
	client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	expires_in: i64,
	#[serde(default)]
	token_type: String,
}

#[derive(Serialize)]
struct FindRequest<'a> {
	#[serde(rename = "employeeNumber")]
	employee_number: &'a str,
}

/// Authenticated client for the fleet-management directory.
///
/// Every call, token exchanges included, is spaced by the transport's
/// [`RateLimiter`](crate::http::RateLimiter). The access credential is refreshed lazily through a
/// [`CredentialManager`] once it enters the refresh window.
pub struct DestinationClient {
	endpoint: Url,
	client_id: String,
	client_secret: TokenSecret,
	transport: ApiTransport,
	credentials: CredentialManager,
}
impl DestinationClient {
	/// Builds the client described by `config` and performs the initial token exchange.
	pub async fn connect(config: &DestinationConfig) -> Result<Self> {
		let transport = ApiTransport::new(config.timeout(), Some(config.min_call_spacing()))?;

		Self::connect_with(config, transport).await
	}

	/// Same as [`DestinationClient::connect`] with a caller-provided transport.
	pub async fn connect_with(config: &DestinationConfig, transport: ApiTransport) -> Result<Self> {
		let client = Self {
			endpoint: config.endpoint_url()?,
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			transport,
			credentials: CredentialManager::new(config.refresh_window()),
		};
		let credential = client.credentials.credential(|| client.exchange()).await?;

		tracing::info!(
			endpoint = %client.endpoint,
			expires_at = %credential.expires_at,
			"Authenticated against driver directory."
		);

		Ok(client)
	}

	/// Returns the credential manager backing this client.
	pub fn credentials(&self) -> &CredentialManager {
		&self.credentials
	}

	/// Looks up drivers by employee number.
	pub async fn find_drivers(&self, employee_number: &str) -> Result<Vec<DirectoryDriver>> {
		ApiSpan::new(ApiKind::Destination, "find_drivers")
			.instrument(async {
				let url = http::join_url(&self.endpoint, &FIND_PATH)?;
				let request = self
					.authorized(Method::POST, url)
					.await?
					.json(&FindRequest { employee_number });

				self.transport.execute_json(request, "driver lookup").await
			})
			.await
	}

	/// Replaces a driver's address; `postal_code` is cut to [`POST_CODE_LEN`] characters.
	pub async fn update_driver(
		&self,
		driver_id: DriverId,
		address1: &str,
		address2: &str,
		postal_code: &str,
	) -> Result<DirectoryDriver> {
		ApiSpan::new(ApiKind::Destination, "update_driver")
			.instrument(async {
				let id = driver_id.to_string();
				let url =
					http::join_url(&self.endpoint, &[DRIVER_PATH[0], DRIVER_PATH[1], id.as_str()])?;
				let body = DirectoryDriver {
					driver_id: None,
					employee_number: None,
					address: DriverAddress {
						address1: address1.to_owned(),
						address2: address2.to_owned(),
						post_code: truncate_chars(postal_code, POST_CODE_LEN).to_owned(),
					},
				};
				let request = self.authorized(Method::POST, url).await?.json(&body);

				self.transport.execute_json(request, "driver update").await
			})
			.await
	}

	async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder> {
		let credential = self.credentials.credential(|| self.exchange()).await?;

		Ok(self.transport.request(method, url).header(AUTHORIZATION, credential.authorization()))
	}

	async fn exchange(&self) -> Result<AccessCredential> {
		ApiSpan::new(ApiKind::Destination, "token_exchange")
			.instrument(async {
				let url = http::join_url(&self.endpoint, &TOKEN_PATH)?;
				let body = TokenRequest {
					client_id: &self.client_id,
					client_secret: self.client_secret.expose(),
				};
				let issued_at = OffsetDateTime::now_utc();
				let request = self.transport.request(Method::POST, url.clone()).json(&body);
				let response: TokenResponse = self
					.transport
					.execute_json(request, "token exchange")
					.await
					.map_err(|e| AuthError::from_exchange_failure(&url, e))?;

				AccessCredential::expiring_in(
					response.access_token,
					response.token_type,
					response.expires_in,
					issued_at,
				)
			})
			.await
	}
}
impl DriverDirectory for DestinationClient {
	fn find_drivers<'a>(
		&'a self,
		employee_number: &'a str,
	) -> DirectoryFuture<'a, Vec<DirectoryDriver>> {
		Box::pin(DestinationClient::find_drivers(self, employee_number))
	}

	fn update_driver<'a>(
		&'a self,
		driver_id: DriverId,
		address1: &'a str,
		address2: &'a str,
		postal_code: &'a str,
	) -> DirectoryFuture<'a, DirectoryDriver> {
		Box::pin(DestinationClient::update_driver(self, driver_id, address1, address2, postal_code))
	}
}
impl Debug for DestinationClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DestinationClient")
			.field("endpoint", &self.endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.finish()
	}
}

/// Returns the first `n` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, n: usize) -> &str {
	match s.char_indices().nth(n) {
		Some((idx, _)) => &s[..idx],
		None => s,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn truncate_chars_limits_length() {
		assert_eq!(truncate_chars("452311234", 5), "45231");
		assert_eq!(truncate_chars("12345", 5), "12345");
		assert_eq!(truncate_chars("123", 5), "123");
		assert_eq!(truncate_chars("", 5), "");
		assert_eq!(truncate_chars("ÄÖÜßéè", 5), "ÄÖÜßé");
	}

	#[test]
	fn update_payload_omits_identifiers() {
		let body = DirectoryDriver {
			address: DriverAddress {
				address1: "1 Main St".into(),
				address2: String::new(),
				post_code: "45231".into(),
			},
			..Default::default()
		};
		let json = serde_json::to_value(&body).expect("Update payload should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"address": { "address1": "1 Main St", "address2": "", "postCode": "45231" }
			})
		);
	}

	#[test]
	fn lookup_response_keeps_zero_identifier() {
		let drivers: Vec<DirectoryDriver> = serde_json::from_str(
			r#"[{"drvId":0,"employeeNumber":"0012345","address":{"address1":"A","postCode":"1"}},{"employeeNumber":"7"}]"#,
		)
		.expect("Lookup payload should deserialize.");

		assert_eq!(drivers[0].driver_id, Some(DriverId(0)));
		assert_eq!(drivers[0].address.address2, "");
		assert_eq!(drivers[1].driver_id, None);
		assert_eq!(drivers[1].address, DriverAddress::default());
	}
}
