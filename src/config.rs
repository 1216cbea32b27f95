//! YAML configuration for both API clients, loaded once at startup and passed by reference.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
	path::Path,
	time::Duration as StdDuration,
};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Complete run configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
	/// Payroll (source) system settings.
	pub source: SourceConfig,
	/// Fleet-management (destination) system settings.
	pub destination: DestinationConfig,
}
impl Config {
	/// Reads, parses, and validates the configuration file at `path`.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.display().to_string(),
			source,
		})?;

		Self::from_yaml(&raw)
	}

	/// Parses and validates a YAML document.
	pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_yaml::from_str(raw)?;

		config.validate()?;

		Ok(config)
	}

	/// Checks that every required value is present and well-formed.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.source.validate()?;
		self.destination.validate()
	}

	/// Validates and serializes the configuration, then atomically replaces `path`.
	///
	/// The document is written to a sibling temp file, synced, and renamed over the target so a
	/// crash never leaves a truncated configuration behind.
	pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();

		self.validate()?;

		let serialized = serde_yaml::to_string(self)?;
		let io_err = |target: &Path| {
			let target = target.display().to_string();

			move |source| ConfigError::Io { path: target, source }
		};
		let mut tmp_path = path.to_path_buf();

		tmp_path.set_extension("tmp");

		{
			let mut file = create_private(&tmp_path).map_err(io_err(&tmp_path))?;

			file.write_all(serialized.as_bytes()).map_err(io_err(&tmp_path))?;
			file.sync_all().map_err(io_err(&tmp_path))?;
		}

		fs::rename(&tmp_path, path).map_err(io_err(path))
	}

	/// Replaces the source refresh token after a successful rotation.
	pub fn set_refresh_token(&mut self, token: TokenSecret) -> Result<(), ConfigError> {
		match &mut self.source.auth {
			SourceAuthConfig::RefreshToken { refresh_token, .. } => {
				*refresh_token = token;

				Ok(())
			},
			SourceAuthConfig::KeyPair { .. } => Err(ConfigError::NotRefreshTokenAuth),
		}
	}
}

/// Payroll report API settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
	/// Base URL of the payroll API.
	pub host: String,
	/// Name of the report holding driver home addresses.
	pub home_addresses_report: String,
	/// Fixed per-call timeout in seconds.
	#[serde(default = "SourceConfig::default_timeout_secs")]
	pub timeout_secs: u64,
	/// Authentication mode.
	pub auth: SourceAuthConfig,
}
impl SourceConfig {
	const DEFAULT_TIMEOUT_SECS: u64 = 15;

	fn default_timeout_secs() -> u64 {
		Self::DEFAULT_TIMEOUT_SECS
	}

	/// Parses [`SourceConfig::host`].
	pub fn host_url(&self) -> Result<Url, ConfigError> {
		parse_url(&self.host)
	}

	/// Returns the per-call timeout.
	pub fn timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.timeout_secs)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		require("source.host", &self.host)?;
		require("source.home_addresses_report", &self.home_addresses_report)?;
		self.host_url()?;

		if self.timeout_secs == 0 {
			return Err(ConfigError::NonPositive { field: "source.timeout_secs" });
		}

		self.auth.validate()
	}
}

/// Authentication modes supported by the payroll API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceAuthConfig {
	/// Static key pair; every request is signed.
	KeyPair {
		/// Public key sent with each signature.
		public_key: String,
		/// Private signing key.
		private_key: TokenSecret,
	},
	/// Single-use refresh token exchanged once per run; the rotated token is written back.
	RefreshToken {
		/// OAuth client identifier.
		client_id: String,
		/// OAuth client secret.
		client_secret: TokenSecret,
		/// API gateway subscription key.
		subscription_key: TokenSecret,
		/// Refresh token to spend on the next exchange.
		refresh_token: TokenSecret,
	},
}
impl SourceAuthConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		match self {
			Self::KeyPair { public_key, private_key } => {
				require("source.auth.public_key", public_key)?;
				require_secret("source.auth.private_key", private_key)
			},
			Self::RefreshToken { client_id, client_secret, subscription_key, refresh_token } => {
				require("source.auth.client_id", client_id)?;
				require_secret("source.auth.client_secret", client_secret)?;
				require_secret("source.auth.subscription_key", subscription_key)?;
				require_secret("source.auth.refresh_token", refresh_token)
			},
		}
	}
}

/// Fleet-management directory API settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConfig {
	/// Base URL of the directory API.
	pub endpoint: String,
	/// Client-credentials identifier.
	pub client_id: String,
	/// Client-credentials secret.
	pub client_secret: TokenSecret,
	/// Fixed per-call timeout in seconds.
	#[serde(default = "DestinationConfig::default_timeout_secs")]
	pub timeout_secs: u64,
	/// Minimum spacing between consecutive calls in milliseconds.
	#[serde(default = "DestinationConfig::default_min_call_spacing_ms")]
	pub min_call_spacing_ms: u64,
	/// Remaining lifetime (seconds) below which the access token is refreshed.
	#[serde(default = "DestinationConfig::default_refresh_window_secs")]
	pub refresh_window_secs: u64,
}
impl DestinationConfig {
	/// Largest accepted [`DestinationConfig::refresh_window_secs`].
	pub const MAX_REFRESH_WINDOW_SECS: u64 = 86_400;

	const DEFAULT_MIN_CALL_SPACING_MS: u64 = 500;
	const DEFAULT_REFRESH_WINDOW_SECS: u64 = 300;
	const DEFAULT_TIMEOUT_SECS: u64 = 60;

	fn default_timeout_secs() -> u64 {
		Self::DEFAULT_TIMEOUT_SECS
	}

	fn default_min_call_spacing_ms() -> u64 {
		Self::DEFAULT_MIN_CALL_SPACING_MS
	}

	fn default_refresh_window_secs() -> u64 {
		Self::DEFAULT_REFRESH_WINDOW_SECS
	}

	/// Builds a configuration with default timing settings.
	pub fn new(
		endpoint: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
	) -> Self {
		Self {
			endpoint: endpoint.into(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
			min_call_spacing_ms: Self::DEFAULT_MIN_CALL_SPACING_MS,
			refresh_window_secs: Self::DEFAULT_REFRESH_WINDOW_SECS,
		}
	}

	/// Parses [`DestinationConfig::endpoint`].
	pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
		parse_url(&self.endpoint)
	}

	/// Returns the per-call timeout.
	pub fn timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.timeout_secs)
	}

	/// Returns the minimum spacing between consecutive calls.
	pub fn min_call_spacing(&self) -> StdDuration {
		StdDuration::from_millis(self.min_call_spacing_ms)
	}

	/// Returns the credential refresh window, capped at one day.
	pub fn refresh_window(&self) -> Duration {
		let secs = self.refresh_window_secs.min(Self::MAX_REFRESH_WINDOW_SECS);

		Duration::seconds(i64::try_from(secs).unwrap_or_default())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		require("destination.endpoint", &self.endpoint)?;
		require("destination.client_id", &self.client_id)?;
		require_secret("destination.client_secret", &self.client_secret)?;
		self.endpoint_url()?;

		if self.timeout_secs == 0 {
			return Err(ConfigError::NonPositive { field: "destination.timeout_secs" });
		}
		if self.min_call_spacing_ms == 0 {
			return Err(ConfigError::NonPositive { field: "destination.min_call_spacing_ms" });
		}
		if self.refresh_window_secs > Self::MAX_REFRESH_WINDOW_SECS {
			return Err(ConfigError::TooLarge {
				field: "destination.refresh_window_secs",
				max: Self::MAX_REFRESH_WINDOW_SECS,
			});
		}

		Ok(())
	}
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.trim().is_empty() { Err(ConfigError::MissingField { field }) } else { Ok(()) }
}

fn require_secret(field: &'static str, value: &TokenSecret) -> Result<(), ConfigError> {
	if value.is_blank() { Err(ConfigError::MissingField { field }) } else { Ok(()) }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(value.trim())
		.map_err(|source| ConfigError::invalid_url(value, Some(source)))?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::invalid_url(value, None));
	}

	Ok(url)
}

// The mode only applies on creation, so a stale temp file is removed first.
fn create_private(path: &Path) -> std::io::Result<File> {
	match fs::remove_file(path) {
		Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
		_ => {},
	}

	let mut options = OpenOptions::new();

	options.write(true).create_new(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;

		options.mode(0o600);
	}

	options.open(path)
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, path::PathBuf, process};
	// self
	use super::*;

	const KEY_PAIR_YAML: &str = "
source:
  host: https://secure.example.com
  home_addresses_report: Driver Home Addresses
  auth:
    kind: key_pair
    public_key: pub
    private_key: priv
destination:
  endpoint: https://api.example.com/v1
  client_id: fleet-client
  client_secret: fleet-secret
";

	const REFRESH_YAML: &str = "
source:
  host: https://apis.example.com
  home_addresses_report: Driver Home Addresses
  timeout_secs: 30
  auth:
    kind: refresh_token
    client_id: payroll-client
    client_secret: payroll-secret
    subscription_key: sub-key
    refresh_token: refresh-1
destination:
  endpoint: https://api.example.com/v1
  client_id: fleet-client
  client_secret: fleet-secret
  min_call_spacing_ms: 250
  refresh_window_secs: 120
";

	fn temp_path() -> PathBuf {
		let unique = format!(
			"driver_sync_config_{}_{}.yaml",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn defaults_apply_when_timing_is_omitted() {
		let config = Config::from_yaml(KEY_PAIR_YAML).expect("Key-pair config should parse.");

		assert_eq!(config.source.timeout(), StdDuration::from_secs(15));
		assert_eq!(config.destination.timeout(), StdDuration::from_secs(60));
		assert_eq!(config.destination.min_call_spacing(), StdDuration::from_millis(500));
		assert_eq!(config.destination.refresh_window(), Duration::minutes(5));
		assert!(matches!(config.source.auth, SourceAuthConfig::KeyPair { .. }));
	}

	#[test]
	fn refresh_token_mode_parses_overrides() {
		let config = Config::from_yaml(REFRESH_YAML).expect("Refresh-token config should parse.");

		assert_eq!(config.source.timeout_secs, 30);
		assert_eq!(config.destination.min_call_spacing_ms, 250);
		assert_eq!(config.destination.refresh_window(), Duration::minutes(2));

		match &config.source.auth {
			SourceAuthConfig::RefreshToken { refresh_token, .. } =>
				assert_eq!(refresh_token.expose(), "refresh-1"),
			other => panic!("Unexpected auth mode: {other:?}"),
		}
	}

	#[test]
	fn missing_fields_are_reported_by_path() {
		let yaml = KEY_PAIR_YAML.replace("client_id: fleet-client", "client_id: \"  \"");
		let err = Config::from_yaml(&yaml).expect_err("Blank client id should be rejected.");

		assert!(matches!(err, ConfigError::MissingField { field: "destination.client_id" }));

		let yaml = KEY_PAIR_YAML.replace("private_key: priv", "private_key: \"\"");
		let err = Config::from_yaml(&yaml).expect_err("Blank private key should be rejected.");

		assert!(matches!(err, ConfigError::MissingField { field: "source.auth.private_key" }));
	}

	#[test]
	fn invalid_urls_and_zero_spacing_are_rejected() {
		let yaml = KEY_PAIR_YAML.replace("https://api.example.com/v1", "not a url");

		assert!(matches!(Config::from_yaml(&yaml), Err(ConfigError::InvalidUrl { .. })));

		let yaml = format!("{KEY_PAIR_YAML}  min_call_spacing_ms: 0\n");

		assert!(matches!(
			Config::from_yaml(&yaml),
			Err(ConfigError::NonPositive { field: "destination.min_call_spacing_ms" })
		));
	}

	#[test]
	fn oversized_refresh_window_is_rejected() {
		let yaml = format!("{KEY_PAIR_YAML}  refresh_window_secs: {}\n", u64::MAX);

		assert!(matches!(
			Config::from_yaml(&yaml),
			Err(ConfigError::TooLarge { field: "destination.refresh_window_secs", max: 86_400 })
		));

		let mut destination = DestinationConfig::new("https://api.example.com", "id", "secret");

		destination.refresh_window_secs = u64::MAX;

		assert_eq!(destination.refresh_window(), Duration::days(1));
	}

	#[test]
	fn write_round_trips_rotated_refresh_token() {
		let path = temp_path();
		let mut config = Config::from_yaml(REFRESH_YAML).expect("Refresh-token config should parse.");

		config.set_refresh_token(TokenSecret::new("refresh-2")).expect("Rotation should apply.");
		config.write(&path).expect("Config should be written.");

		let reloaded = Config::from_file(&path).expect("Written config should reload.");

		assert_eq!(reloaded, config);

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;

			let mode = fs::metadata(&path).expect("Config metadata should load.").permissions().mode();

			assert_eq!(mode & 0o777, 0o600);
		}

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary config {}: {e}", path.display())
		});
	}

	#[cfg(unix)]
	#[test]
	fn write_replaces_stale_temp_file_with_private_one() {
		use std::os::unix::fs::PermissionsExt;

		let path = temp_path();
		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");
		fs::write(&tmp_path, "leftover").expect("Stale temp file should be created.");
		fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o644))
			.expect("Stale temp file permissions should apply.");

		let config = Config::from_yaml(KEY_PAIR_YAML).expect("Key-pair config should parse.");

		config.write(&path).expect("Config should be written over a stale temp file.");

		let mode = fs::metadata(&path).expect("Config metadata should load.").permissions().mode();

		assert_eq!(mode & 0o777, 0o600);
		assert!(!tmp_path.exists());
		assert_eq!(Config::from_file(&path).expect("Written config should reload."), config);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary config {}: {e}", path.display())
		});
	}

	#[test]
	fn key_pair_mode_cannot_store_refresh_tokens() {
		let mut config = Config::from_yaml(KEY_PAIR_YAML).expect("Key-pair config should parse.");

		assert!(matches!(
			config.set_refresh_token(TokenSecret::new("x")),
			Err(ConfigError::NotRefreshTokenAuth)
		));
	}
}
