//! Decoding of the home-address report into [`HomeAddressRecord`]s.

// crates.io
use csv::{ReaderBuilder, StringRecord};
// self
use crate::{_prelude::*, error::ParseError};

/// Number of leading report columns mapped onto [`HomeAddressRecord`].
pub const REPORT_COLUMNS: usize = 8;

/// One driver's home address as held by the payroll system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAddressRecord {
	/// Digits-only employee number; the join key into the directory.
	pub employee_number: String,
	/// Family name.
	pub last_name: String,
	/// Given name.
	pub first_name: String,
	/// First street line.
	pub address1: String,
	/// Second street line.
	pub address2: String,
	/// City.
	pub city: String,
	/// State or province.
	pub state: String,
	/// Postal code as reported (not truncated).
	pub postal_code: String,
}
impl HomeAddressRecord {
	fn from_row(row: &StringRecord) -> Self {
		let field = |idx: usize| row.get(idx).unwrap_or_default().trim().to_owned();

		Self {
			employee_number: normalize_employee_number(row.get(0).unwrap_or_default()),
			last_name: field(1),
			first_name: field(2),
			address1: field(3),
			address2: field(4),
			city: field(5),
			state: field(6),
			postal_code: field(7),
		}
	}
}

/// Keeps only the ASCII digits of `raw`, preserving order.
pub fn normalize_employee_number(raw: &str) -> String {
	raw.chars().filter(char::is_ascii_digit).collect()
}

/// Parses a delimited report, discarding its first row as the header.
///
/// Every data row must match the header's column count and carry at least
/// [`REPORT_COLUMNS`] columns; any malformed row fails the whole report.
pub fn parse_home_addresses(report: &[u8]) -> Result<Vec<HomeAddressRecord>> {
	let mut reader = ReaderBuilder::new().has_headers(true).flexible(false).from_reader(report);
	let mut row = StringRecord::new();
	let mut records = Vec::new();

	while reader.read_record(&mut row).map_err(ParseError::from)? {
		if row.len() < REPORT_COLUMNS {
			return Err(ParseError::ReportRow {
				line: row.position().map_or(0, |position| position.line()),
				expected: REPORT_COLUMNS,
				found: row.len(),
			}
			.into());
		}

		records.push(HomeAddressRecord::from_row(&row));
	}

	Ok(records)
}
