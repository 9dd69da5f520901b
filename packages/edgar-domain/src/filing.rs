use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, Result};

const CIK_WIDTH: usize = 10;
const ACCESSION_DIGITS: usize = 18;

/// Central Index Key, stored zero-padded to ten digits. Padding is idempotent:
/// constructing a `Cik` from an already-padded string yields the same value.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Cik(String);
impl Cik {
	pub fn new(raw: &str) -> Result<Self> {
		let digits = raw.trim().trim_start_matches('0');

		if digits.is_empty() && raw.trim().chars().all(|ch| ch == '0') && !raw.trim().is_empty() {
			return Ok(Self("0".repeat(CIK_WIDTH)))
		}
		if digits.is_empty() {
			return Err(Error::InvalidCik { message: "value is empty".to_string() });
		}
		if !digits.chars().all(|ch| ch.is_ascii_digit()) {
			return Err(Error::InvalidCik { message: format!("{raw:?} is not numeric") });
		}
		if digits.len() > CIK_WIDTH {
			return Err(Error::InvalidCik {
				message: format!("{raw:?} exceeds {CIK_WIDTH} digits"),
			});
		}

		Ok(Self(format!("{digits:0>CIK_WIDTH$}")))
	}

	pub fn from_number(value: u64) -> Result<Self> {
		Self::new(&value.to_string())
	}

	/// Zero-padded ten-digit form used in URLs and cache keys.
	pub fn padded(&self) -> &str {
		&self.0
	}

	/// The numeric form with leading zeros removed.
	pub fn trimmed(&self) -> &str {
		let trimmed = self.0.trim_start_matches('0');

		if trimmed.is_empty() { "0" } else { trimmed }
	}
}

/// Filing accession number. Canonical display form is dashed
/// (`0000320193-24-000123`); archive paths use the dash-stripped form.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct AccessionNumber(String);
impl AccessionNumber {
	pub fn new(raw: &str) -> Result<Self> {
		let stripped: String = raw.trim().chars().filter(|ch| *ch != '-').collect();

		if stripped.len() != ACCESSION_DIGITS || !stripped.chars().all(|ch| ch.is_ascii_digit()) {
			return Err(Error::InvalidAccessionNumber {
				message: format!("{raw:?} must contain exactly {ACCESSION_DIGITS} digits"),
			});
		}

		Ok(Self(format!("{}-{}-{}", &stripped[..10], &stripped[10..12], &stripped[12..])))
	}

	pub fn dashed(&self) -> &str {
		&self.0
	}

	pub fn stripped(&self) -> String {
		self.0.chars().filter(|ch| *ch != '-').collect()
	}
}

/// A single discovered filing. Immutable once constructed.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FilingRef {
	pub cik: Cik,
	pub accession_number: AccessionNumber,
	pub form: String,
	pub filed_at: Date,
	pub primary_document: String,
}
impl FilingRef {
	/// Deterministic archive URL for citations. Template is fixed:
	/// `{base}/edgar/data/{padded cik}/{stripped accession}/{primary document}`.
	pub fn primary_url(&self, archives_base: &str) -> String {
		format!(
			"{}/edgar/data/{}/{}/{}",
			archives_base.trim_end_matches('/'),
			self.cik.padded(),
			self.accession_number.stripped(),
			self.primary_document,
		)
	}
}

/// Inclusive date range. Construction rejects inverted ranges instead of
/// silently swapping the endpoints.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DateRange {
	pub start: Date,
	pub end: Date,
}
impl DateRange {
	pub fn new(start: Date, end: Date) -> Result<Self> {
		if start > end {
			return Err(Error::InvalidDateRange { start, end });
		}

		Ok(Self { start, end })
	}

	pub fn contains(&self, date: Date) -> bool {
		self.start <= date && date <= self.end
	}
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;

	#[test]
	fn cik_padding_is_idempotent() {
		let once = Cik::new("320193").expect("CIK must parse.");
		let twice = Cik::new(once.padded()).expect("Padded CIK must re-parse.");

		assert_eq!(once.padded(), "0000320193");
		assert_eq!(once, twice);
		assert_eq!(twice.trimmed(), "320193");
	}

	#[test]
	fn cik_rejects_garbage() {
		assert!(Cik::new("").is_err());
		assert!(Cik::new("12AB34").is_err());
		assert!(Cik::new("123456789012").is_err());
	}

	#[test]
	fn accession_number_round_trips_both_forms() {
		let dashed = AccessionNumber::new("0000320193-24-000123").expect("Must parse.");
		let stripped = AccessionNumber::new("000032019324000123").expect("Must parse.");

		assert_eq!(dashed, stripped);
		assert_eq!(dashed.dashed(), "0000320193-24-000123");
		assert_eq!(dashed.stripped(), "000032019324000123");
	}

	#[test]
	fn accession_number_rejects_wrong_length() {
		assert!(AccessionNumber::new("0000320193-24-0001").is_err());
		assert!(AccessionNumber::new("not-a-number").is_err());
	}

	#[test]
	fn primary_url_is_deterministic() {
		let filing = FilingRef {
			cik: Cik::new("320193").expect("CIK must parse."),
			accession_number: AccessionNumber::new("0000320193-24-000123").expect("Must parse."),
			form: "10-K".to_string(),
			filed_at: date!(2024 - 11 - 01),
			primary_document: "aapl-20240928.htm".to_string(),
		};
		let url = filing.primary_url("https://www.sec.gov/Archives/");

		assert_eq!(
			url,
			"https://www.sec.gov/Archives/edgar/data/0000320193/000032019324000123/aapl-20240928.htm"
		);
		assert_eq!(url, filing.primary_url("https://www.sec.gov/Archives"));
	}

	#[test]
	fn date_range_rejects_inverted_bounds() {
		let err = DateRange::new(date!(2025 - 01 - 01), date!(2024 - 01 - 01))
			.expect_err("Inverted range must be rejected.");

		assert!(matches!(err, Error::InvalidDateRange { .. }));

		let range = DateRange::new(date!(2024 - 01 - 01), date!(2025 - 01 - 01))
			.expect("Ordered range must be accepted.");

		assert!(range.contains(date!(2024 - 06 - 15)));
		assert!(!range.contains(date!(2023 - 12 - 31)));
	}
}
