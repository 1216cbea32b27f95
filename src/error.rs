//! Crate-level error types shared across the API clients, the store, and the reconciler.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Storage-layer failure while persisting a rotated credential.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential exchange failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Upstream answered with a non-2xx status.
	#[error(transparent)]
	Status(#[from] HttpStatusError),
	/// Report row or response body could not be decoded.
	#[error(transparent)]
	Parse(#[from] ParseError),

	/// More than one destination record shares the employee number.
	#[error("Employee number {employee_number} matches {matches} destination drivers.")]
	AmbiguousMatch {
		/// Normalized employee number used for the lookup.
		employee_number: String,
		/// Number of destination records returned.
		matches: usize,
	},
	/// The single destination match carried no driver identifier.
	#[error("Destination driver for employee number {employee_number} has no driver identifier.")]
	MissingDriverId {
		/// Normalized employee number used for the lookup.
		employee_number: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required configuration value is missing or blank.
	#[error("Required configuration missing: {field}.")]
	MissingField {
		/// Dotted path of the missing field.
		field: &'static str,
	},
	/// A configured URL cannot be parsed or extended.
	#[error("Configured URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending value.
		value: String,
		/// Underlying parsing failure, when available.
		#[source]
		source: Option<url::ParseError>,
	},
	/// A numeric setting is out of range.
	#[error("Configuration value {field} must be positive.")]
	NonPositive {
		/// Dotted path of the offending field.
		field: &'static str,
	},
	/// A numeric setting exceeds its upper bound.
	#[error("Configuration value {field} must not exceed {max}.")]
	TooLarge {
		/// Dotted path of the offending field.
		field: &'static str,
		/// Largest accepted value.
		max: u64,
	},
	/// The configuration file could not be read or written.
	#[error("Configuration file {path} is not accessible.")]
	Io {
		/// Offending path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// The configuration document could not be (de)serialized.
	#[error("Configuration document is malformed.")]
	Yaml(#[from] serde_yaml::Error),
	/// The configuration needs a refresh-token source to persist a rotated refresh token.
	#[error("Source authentication is not configured for the refresh-token flow.")]
	NotRefreshTokenAuth,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Builds an [`ConfigError::InvalidUrl`] for the provided raw value.
	pub fn invalid_url(value: impl Into<String>, source: Option<url::ParseError>) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The fixed per-call deadline elapsed.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Target URL.
		url: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Credential exchange failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The token endpoint rejected the exchange.
	#[error("Credential exchange against {endpoint} was rejected: {reason}.")]
	Rejected {
		/// Token endpoint without query parameters.
		endpoint: String,
		/// HTTP status code, when the failure came from a response.
		status: Option<u16>,
		/// Upstream or local reason string.
		reason: String,
	},
	/// The token endpoint returned a non-positive `expires_in`.
	#[error("Token endpoint returned a non-positive expires_in.")]
	NonPositiveExpiresIn,
	/// The token endpoint returned an `expires_in` past the representable clock range.
	#[error("Token endpoint returned an expires_in of {expires_in} seconds, which is out of range.")]
	ExpiresInOutOfRange {
		/// Raw value from the response.
		expires_in: i64,
	},
	/// An outbound request could not be signed with the configured key pair.
	#[error("Request signing failed: {reason}.")]
	Signing {
		/// Local reason string.
		reason: String,
	},
	/// The refresh-token exchange did not return a rotated refresh token.
	#[error("Token endpoint did not return a rotated refresh token.")]
	MissingRefreshToken,
}

impl AuthError {
	/// Reclassifies a failed exchange call: status errors become [`AuthError::Rejected`], while
	/// transport and parse failures pass through unchanged.
	pub fn from_exchange_failure(endpoint: &Url, err: Error) -> Error {
		match err {
			Error::Status(status) => Self::Rejected {
				endpoint: endpoint_label(endpoint),
				status: Some(status.status),
				reason: status.message,
			}
			.into(),
			other => other,
		}
	}
}

/// Non-2xx response surfaced by the transport.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{method} call to {url} returned status code {status}, message: {message}.")]
pub struct HttpStatusError {
	/// HTTP method of the failed request.
	pub method: String,
	/// Request URL.
	pub url: String,
	/// Response status code.
	pub status: u16,
	/// Best-effort message extracted from the response body.
	pub message: String,
}
impl HttpStatusError {
	/// Placeholder used when the response body carries no readable message.
	pub const NO_MESSAGE: &'static str = "<no message>";

	/// Builds the error from a raw response body, extracting `{"message": ...}` when present.
	pub fn from_body(method: impl Into<String>, url: &Url, status: u16, body: &[u8]) -> Self {
		#[derive(Deserialize)]
		struct ErrorBody {
			message: Option<String>,
		}

		let message = serde_json::from_slice::<ErrorBody>(body)
			.ok()
			.and_then(|body| body.message)
			.filter(|message| !message.trim().is_empty())
			.unwrap_or_else(|| Self::NO_MESSAGE.into());

		Self { method: method.into(), url: url.to_string(), status, message }
	}
}

/// Decoding failures for reports and JSON payloads.
#[derive(Debug, ThisError)]
pub enum ParseError {
	/// A report row does not have the expected shape.
	#[error("Report line {line} has {found} columns; expected at least {expected}.")]
	ReportRow {
		/// 1-based physical line number.
		line: u64,
		/// Minimum column count.
		expected: usize,
		/// Columns found on the line.
		found: usize,
	},
	/// The delimited-text reader rejected the report.
	#[error("Report could not be read as delimited text.")]
	Csv(#[from] csv::Error),
	/// A JSON response body did not match the expected shape.
	#[error("Response from {context} is not valid JSON.")]
	Json {
		/// Endpoint or payload label.
		context: String,
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

fn endpoint_label(url: &Url) -> String {
	let mut label = url.clone();

	label.set_query(None);

	label.to_string()
}
