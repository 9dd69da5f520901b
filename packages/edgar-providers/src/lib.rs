mod error;

pub mod cache;
pub mod fallback;
pub mod limiter;
pub mod primary;
pub mod sections;

pub use cache::TtlCache;
pub use error::{Error, Result};
pub use fallback::EdgarDirectBackend;
pub use limiter::{Clock, RateLimiter, SystemClock};
pub use primary::PrimaryBackend;
pub use sections::sections_from_text;

use std::{future::Future, pin::Pin};

use serde::{Deserialize, Serialize};

use edgar_domain::{Cik, DateRange, FilingRef};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a caller names a company before its CIK is known.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyIdentifier {
	Ticker(String),
	Name(String),
}
impl CompanyIdentifier {
	pub fn text(&self) -> &str {
		match self {
			Self::Ticker(ticker) => ticker,
			Self::Name(name) => name,
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CompanyRecord {
	pub cik: Cik,
	pub name: String,
	pub tickers: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FilingFilter {
	pub forms: Vec<String>,
	pub date_range: Option<DateRange>,
}
impl FilingFilter {
	pub fn accepts(&self, filing: &FilingRef) -> bool {
		if !self.forms.is_empty()
			&& !self.forms.iter().any(|form| form.eq_ignore_ascii_case(&filing.form))
		{
			return false;
		}
		if let Some(range) = &self.date_range
			&& !range.contains(filing.filed_at)
		{
			return false;
		}

		true
	}
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilingSection {
	pub label: String,
	pub start_offset: usize,
	pub end_offset: usize,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FilingContent {
	pub text: String,
	pub sections: Vec<FilingSection>,
}

/// The three retrieval operations the engine consumes. Primary and fallback
/// implementations must agree on semantics and differ only in availability.
pub trait RetrievalBackend
where
	Self: Send + Sync,
{
	/// Stable identifier recorded in result `sources` for observability.
	fn id(&self) -> &'static str;

	fn resolve_company<'a>(
		&'a self,
		identifier: &'a CompanyIdentifier,
	) -> BoxFuture<'a, Result<CompanyRecord>>;

	fn list_filings<'a>(
		&'a self,
		cik: &'a Cik,
		filter: &'a FilingFilter,
	) -> BoxFuture<'a, Result<Vec<FilingRef>>>;

	fn fetch_filing_content<'a>(
		&'a self,
		filing: &'a FilingRef,
	) -> BoxFuture<'a, Result<FilingContent>>;
}
