//! Shared fixtures for the `httpmock`-backed integration tests.

#![allow(dead_code)]

// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use driver_sync::{
	config::{DestinationConfig, SourceAuthConfig, SourceConfig},
	url::Url,
};

pub const CLIENT_ID: &str = "fleet-client";
pub const CLIENT_SECRET: &str = "fleet-secret";
pub const REPORT_NAME: &str = "Driver Home Addresses";

/// Directory settings pointing at `server`, with a 1 ms call spacing to keep tests fast.
pub fn destination_config(server: &MockServer) -> DestinationConfig {
	let mut config = DestinationConfig::new(server.base_url(), CLIENT_ID, CLIENT_SECRET);

	config.min_call_spacing_ms = 1;

	config
}

/// Payroll settings pointing at `server`.
pub fn source_config(server: &MockServer, auth: SourceAuthConfig) -> SourceConfig {
	SourceConfig {
		host: server.base_url(),
		home_addresses_report: REPORT_NAME.into(),
		timeout_secs: 5,
		auth,
	}
}

pub fn key_pair_auth() -> SourceAuthConfig {
	SourceAuthConfig::KeyPair {
		public_key: "payroll-public".into(),
		private_key: "payroll-private".into(),
	}
}

pub fn refresh_token_auth() -> SourceAuthConfig {
	SourceAuthConfig::RefreshToken {
		client_id: "payroll-client".into(),
		client_secret: "payroll-secret".into(),
		subscription_key: "sub-key".into(),
		refresh_token: "refresh-1".into(),
	}
}

pub fn base_url(server: &MockServer) -> Url {
	Url::parse(&server.base_url()).expect("Mock server base URL should parse.")
}

/// Mocks the directory token endpoint with the given lifetime.
pub async fn mock_destination_token<'a>(server: &'a MockServer, expires_in: i64) -> Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.json_body(json!({ "client_id": CLIENT_ID, "client_secret": CLIENT_SECRET }));
			then.status(200).json_body(json!({
				"access_token": "fleet-token",
				"expires_in": expires_in,
				"token_type": "Bearer",
			}));
		})
		.await
}

/// Report body with a header row and three data rows.
pub fn home_address_report() -> &'static str {
	"Employee Number,Last Name,First Name,Address 1,Address 2,City,State,Zip\n\
	 00-1001,Doe,Jane,1 Main St,,Cincinnati,OH,452311234\n\
	 1002,Roe,Rick, 2 Oak Ave ,Unit 5,Dayton,OH,45402\n\
	 1003,Poe,Pat,3 Elm Rd,,Columbus,OH,43004\n"
}
