//! Rate-aware HTTP transport shared by the source and destination clients.
//!
//! [`ApiTransport`] wraps a [`ReqwestClient`] configured with a fixed per-call timeout, passes
//! every request through an optional [`RateLimiter`], and normalizes failures: network errors and
//! timeouts become [`TransportError`]s, non-2xx responses become [`HttpStatusError`]s, and JSON
//! bodies are decoded through `serde_path_to_error` so parse failures name the offending field.

pub mod rate_limit;

pub use rate_limit::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{Method, RequestBuilder, header::ACCEPT};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, HttpStatusError, ParseError, TransportError},
};

const REDACTED_QUERY_KEYS: [&str; 1] = ["subscription-key"];

/// Thin wrapper around [`ReqwestClient`] so timeout, spacing, and error mapping live in one place.
#[derive(Debug)]
pub struct ApiTransport {
	client: ReqwestClient,
	limiter: Option<RateLimiter>,
}
impl ApiTransport {
	/// Builds a transport with a fixed per-call `timeout` and optional minimum call `spacing`.
	pub fn new(timeout: StdDuration, spacing: Option<StdDuration>) -> Result<Self> {
		let client = ReqwestClient::builder().timeout(timeout).build().map_err(ConfigError::from)?;

		Ok(Self::with_client(client, spacing.map(RateLimiter::new)))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, limiter: Option<RateLimiter>) -> Self {
		Self { client, limiter }
	}

	/// Starts a request against `url`.
	pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
		self.client.request(method, url)
	}

	/// Sends the request and returns the raw body of a 2xx response.
	pub async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>> {
		let request = request.build().map_err(ConfigError::from)?;
		let method = request.method().clone();
		let url = redacted(request.url());

		if let Some(limiter) = &self.limiter {
			limiter.acquire().await;
		}

		tracing::debug!(%method, %url, "Dispatching request.");

		let response =
			self.client.execute(request).await.map_err(|e| map_reqwest_error(&url, e))?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| map_reqwest_error(&url, e))?;

		if !status.is_success() {
			let err = HttpStatusError::from_body(method.as_str(), &url, status.as_u16(), &body);

			tracing::debug!(%method, %url, status = status.as_u16(), "Request failed.");

			return Err(err.into());
		}

		Ok(body.to_vec())
	}

	/// Sends a JSON request and decodes the JSON response body.
	pub async fn execute_json<T>(&self, request: RequestBuilder, context: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = self.execute(request.header(ACCEPT, "application/json")).await?;

		decode_json(&body, context)
	}
}

/// Decodes a JSON payload, reporting the failing path on error.
pub fn decode_json<T>(body: &[u8], context: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ParseError::Json { context: context.to_owned(), source }.into())
}

/// Appends path `segments` to `base`, tolerating a trailing slash on the base path.
pub fn join_url(base: &Url, segments: &[&str]) -> Result<Url> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::invalid_url(base.as_str(), None))?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

/// Returns `url` with secret query parameters masked, for logs and error messages.
pub fn redacted(url: &Url) -> Url {
	let mut clean = url.clone();

	if url.query_pairs().any(|(key, _)| REDACTED_QUERY_KEYS.contains(&key.as_ref())) {
		let pairs = url
			.query_pairs()
			.map(|(key, value)| {
				let value = if REDACTED_QUERY_KEYS.contains(&key.as_ref()) {
					"redacted".to_owned()
				} else {
					value.into_owned()
				};

				(key.into_owned(), value)
			})
			.collect::<Vec<_>>();

		clean.query_pairs_mut().clear().extend_pairs(pairs);
	}

	clean
}

fn map_reqwest_error(url: &Url, err: ReqwestError) -> Error {
	// The raw URL may carry secret query parameters; `url` is already redacted.
	let err = err.without_url();

	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { url: url.to_string() }.into();
	}

	TransportError::network(url, err).into()
}
