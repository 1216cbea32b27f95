//! Static key-pair request signing for the payroll report API.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthError};

type HmacSha256 = Hmac<Sha256>;

const HTTP_DATE: &[BorrowedFormatItem<'_>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Header values produced for one signed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
	/// Value of the `Date` header covered by the signature.
	pub date: String,
	/// Value of the `Authorization` header.
	pub authorization: String,
}

/// Signs outbound requests with a public/private key pair.
///
/// The canonical string is `"{METHOD}\n\n\n{date}\n{path_and_query}"`; its HMAC-SHA256 under the
/// private key is base64 encoded and sent as `paycorapi {public_key}:{signature}`.
#[derive(Clone)]
pub struct KeyPairSigner {
	public_key: String,
	private_key: TokenSecret,
}
impl KeyPairSigner {
	const SCHEME: &'static str = "paycorapi";

	/// Creates a signer for the provided key pair.
	pub fn new(public_key: impl Into<String>, private_key: impl Into<TokenSecret>) -> Self {
		Self { public_key: public_key.into(), private_key: private_key.into() }
	}

	/// Signs a request observed at `now`.
	pub fn sign(&self, method: &str, url: &Url, now: OffsetDateTime) -> Result<SignedHeaders> {
		let date = now.to_offset(UtcOffset::UTC).format(HTTP_DATE).map_err(|e| {
			AuthError::Signing { reason: format!("date header could not be formatted: {e}") }
		})?;
		let canonical = format!("{method}\n\n\n{date}\n{}", path_and_query(url));
		let mut mac = <HmacSha256 as Mac>::new_from_slice(self.private_key.expose().as_bytes())
			.map_err(|_| AuthError::Signing { reason: "private key is unusable".into() })?;

		mac.update(canonical.as_bytes());

		let signature = BASE64.encode(mac.finalize().into_bytes());

		Ok(SignedHeaders {
			date,
			authorization: format!("{} {}:{signature}", Self::SCHEME, self.public_key),
		})
	}
}
impl Debug for KeyPairSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyPairSigner")
			.field("public_key", &self.public_key)
			.field("private_key", &self.private_key)
			.finish()
	}
}

fn path_and_query(url: &Url) -> String {
	match url.query() {
		Some(query) => format!("{}?{query}", url.path()),
		None => url.path().to_owned(),
	}
}
