//! Payroll report client: authenticates once, fetches the named report, decodes home addresses.

pub mod oauth;
pub mod report;

pub use oauth::{RefreshTokenGrant, RefreshedGrant};
pub use report::*;

// crates.io
use reqwest::{
	Method, RequestBuilder,
	header::{ACCEPT, AUTHORIZATION, DATE},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessCredential, KeyPairSigner, TokenSecret},
	config::{SourceAuthConfig, SourceConfig},
	http::{self, ApiTransport},
	obs::{ApiKind, ApiSpan},
	store::CredentialStore,
};

const REPORT_PATH: [&str; 3] = ["documents", "api", "reports"];

enum SourceAuth {
	KeyPair(KeyPairSigner),
	Bearer { credential: AccessCredential, subscription_key: TokenSecret },
}

/// Authenticated client for the payroll report API.
///
/// A value of this type only exists once authentication has succeeded: key-pair deployments
/// sign every request, while refresh-token deployments perform their single exchange inside
/// [`SourceClient::connect`].
pub struct SourceClient {
	host: Url,
	transport: ApiTransport,
	auth: SourceAuth,
}
impl SourceClient {
	/// Builds the client described by `config`.
	///
	/// In refresh-token mode the exchange runs here and the rotated refresh token is written to
	/// `store` before this function returns, so no other call can precede its persistence.
	pub async fn connect(config: &SourceConfig, store: &dyn CredentialStore) -> Result<Self> {
		let host = config.host_url()?;
		let transport = ApiTransport::new(config.timeout(), None)?;

		Self::connect_with(host, transport, &config.auth, store).await
	}

	/// Same as [`SourceClient::connect`] with a caller-provided transport.
	pub async fn connect_with(
		host: Url,
		transport: ApiTransport,
		auth: &SourceAuthConfig,
		store: &dyn CredentialStore,
	) -> Result<Self> {
		let auth = match auth {
			SourceAuthConfig::KeyPair { public_key, private_key } =>
				SourceAuth::KeyPair(KeyPairSigner::new(public_key.clone(), private_key.clone())),
			SourceAuthConfig::RefreshToken {
				client_id,
				client_secret,
				subscription_key,
				refresh_token,
			} => {
				let grant = RefreshTokenGrant {
					client_id: client_id.clone(),
					client_secret: client_secret.clone(),
					subscription_key: subscription_key.clone(),
					refresh_token: refresh_token.clone(),
				};
				let refreshed = ApiSpan::new(ApiKind::Source, "refresh_token_exchange")
					.instrument(oauth::exchange_refresh_token(&transport, &host, &grant))
					.await?;

				store.save_refresh_token(&refreshed.refresh_token).await?;

				tracing::info!(
					expires_at = %refreshed.credential.expires_at,
					"Exchanged payroll refresh token and stored its replacement."
				);

				SourceAuth::Bearer {
					credential: refreshed.credential,
					subscription_key: grant.subscription_key,
				}
			},
		};

		Ok(Self { host, transport, auth })
	}

	/// Returns a stable label for the active authentication mode.
	pub fn auth_mode(&self) -> &'static str {
		match self.auth {
			SourceAuth::KeyPair(_) => "key_pair",
			SourceAuth::Bearer { .. } => "refresh_token",
		}
	}

	/// Downloads the named report as raw bytes.
	pub async fn fetch_report(&self, report_name: &str) -> Result<Vec<u8>> {
		ApiSpan::new(ApiKind::Source, "fetch_report")
			.instrument(async {
				let mut url = http::join_url(&self.host, &REPORT_PATH)?;

				url.query_pairs_mut().append_pair("reportName", report_name);

				let request = self.authorize(Method::GET, url)?.header(ACCEPT, "text/csv, */*");

				self.transport.execute(request).await
			})
			.await
	}

	/// Downloads the named report and decodes its home-address rows.
	pub async fn fetch_home_addresses(&self, report_name: &str) -> Result<Vec<HomeAddressRecord>> {
		let raw = self.fetch_report(report_name).await?;
		let records = report::parse_home_addresses(&raw)?;

		tracing::info!(report = report_name, records = records.len(), "Fetched home addresses.");

		Ok(records)
	}

	fn authorize(&self, method: Method, url: Url) -> Result<RequestBuilder> {
		let request = self.transport.request(method.clone(), url.clone());

		match &self.auth {
			SourceAuth::KeyPair(signer) => {
				let signed = signer.sign(method.as_str(), &url, OffsetDateTime::now_utc())?;

				Ok(request.header(DATE, signed.date).header(AUTHORIZATION, signed.authorization))
			},
			SourceAuth::Bearer { credential, subscription_key } => Ok(request
				.header(AUTHORIZATION, credential.authorization())
				.header(oauth::SUBSCRIPTION_KEY_HEADER, subscription_key.expose())),
		}
	}
}
impl Debug for SourceClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SourceClient")
			.field("host", &self.host.as_str())
			.field("auth_mode", &self.auth_mode())
			.finish()
	}
}
