use std::{sync::Arc, time::Duration as StdDuration};

use reqwest::Client;
use serde_json::Value;
use time::Duration;

use crate::{
	BoxFuture, CompanyIdentifier, CompanyRecord, Error, FilingContent, FilingFilter, RateLimiter,
	Result, RetrievalBackend, primary::parse_date,
};
use edgar_config::FallbackConfig;
use edgar_domain::{AccessionNumber, Cik, FilingRef};

pub const FALLBACK_BACKEND_ID: &str = "edgar_direct";

/// Direct client for the authoritative EDGAR endpoints. Simpler than the
/// primary service but always available, which is what makes the fallback
/// contract work. SEC fair access requires the configured user agent on
/// every request.
pub struct EdgarDirectBackend {
	client: Client,
	api_base: String,
	archives_base: String,
	tickers_url: String,
	limiter: Arc<RateLimiter>,
	limiter_budget: Duration,
}
impl EdgarDirectBackend {
	pub fn new(cfg: &FallbackConfig, user_agent: &str, limiter: Arc<RateLimiter>) -> Result<Self> {
		let client = Client::builder()
			.timeout(StdDuration::from_millis(cfg.timeout_ms))
			.user_agent(user_agent)
			.build()?;

		Ok(Self {
			client,
			api_base: cfg.api_base.trim_end_matches('/').to_string(),
			archives_base: cfg.archives_base.trim_end_matches('/').to_string(),
			tickers_url: cfg.tickers_url.clone(),
			limiter,
			limiter_budget: Duration::milliseconds(cfg.timeout_ms as i64),
		})
	}

	async fn get_json(&self, url: String) -> Result<Value> {
		self.limiter.acquire(self.limiter_budget).await?;

		let response = self.client.get(url).send().await?;

		Ok(response.error_for_status()?.json().await?)
	}

	async fn get_text(&self, url: String) -> Result<String> {
		self.limiter.acquire(self.limiter_budget).await?;

		let response = self.client.get(url).send().await?;

		Ok(response.error_for_status()?.text().await?)
	}
}

impl RetrievalBackend for EdgarDirectBackend {
	fn id(&self) -> &'static str {
		FALLBACK_BACKEND_ID
	}

	fn resolve_company<'a>(
		&'a self,
		identifier: &'a CompanyIdentifier,
	) -> BoxFuture<'a, Result<CompanyRecord>> {
		Box::pin(async move {
			let json = self.get_json(self.tickers_url.clone()).await?;

			resolve_from_ticker_table(&json, identifier)
		})
	}

	fn list_filings<'a>(
		&'a self,
		cik: &'a Cik,
		filter: &'a FilingFilter,
	) -> BoxFuture<'a, Result<Vec<FilingRef>>> {
		Box::pin(async move {
			let url = format!("{}/submissions/CIK{}.json", self.api_base, cik.padded());
			let json = self.get_json(url).await?;
			let filings = parse_submissions(&json, cik)?;

			Ok(filings.into_iter().filter(|filing| filter.accepts(filing)).collect())
		})
	}

	fn fetch_filing_content<'a>(
		&'a self,
		filing: &'a FilingRef,
	) -> BoxFuture<'a, Result<FilingContent>> {
		Box::pin(async move {
			if filing.primary_document.is_empty() {
				return Err(Error::Permanent {
					message: format!(
						"filing {} has no primary document",
						filing.accession_number.dashed(),
					),
				});
			}

			let raw = self.get_text(filing.primary_url(&self.archives_base)).await?;
			let text = strip_markup(&raw);
			let sections = crate::sections_from_text(&text);

			Ok(FilingContent { text, sections })
		})
	}
}

/// Resolves against the EDGAR company/ticker mapping, a JSON object keyed by
/// row index: `{"0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."}}`.
fn resolve_from_ticker_table(
	json: &Value,
	identifier: &CompanyIdentifier,
) -> Result<CompanyRecord> {
	let rows = json.as_object().ok_or_else(|| Error::Permanent {
		message: "ticker mapping is not an object".to_string(),
	})?;
	let mut best: Option<CompanyRecord> = None;

	for row in rows.values() {
		let Some(ticker) = row.get("ticker").and_then(Value::as_str) else { continue };
		let Some(title) = row.get("title").and_then(Value::as_str) else { continue };
		let Some(cik_number) = row.get("cik_str").and_then(Value::as_u64) else { continue };
		let matched = match identifier {
			CompanyIdentifier::Ticker(wanted) => ticker.eq_ignore_ascii_case(wanted),
			CompanyIdentifier::Name(wanted) =>
				title.to_lowercase().contains(&wanted.to_lowercase()),
		};

		if !matched {
			continue;
		}

		let Ok(cik) = Cik::from_number(cik_number) else { continue };
		let record = CompanyRecord {
			cik,
			name: title.to_string(),
			tickers: vec![ticker.to_ascii_uppercase()],
		};

		match identifier {
			// Ticker matches are exact; take the first.
			CompanyIdentifier::Ticker(_) => return Ok(record),
			// Name matches prefer the shortest title, the closest fit.
			CompanyIdentifier::Name(_) =>
				if best
					.as_ref()
					.map(|current| record.name.len() < current.name.len())
					.unwrap_or(true)
				{
					best = Some(record);
				},
		}
	}

	best.ok_or_else(|| Error::NotFound {
		message: format!("no EDGAR company matches {:?}", identifier.text()),
	})
}

/// Parses the parallel arrays of `data.sec.gov/submissions/CIK##########.json`.
fn parse_submissions(json: &Value, cik: &Cik) -> Result<Vec<FilingRef>> {
	let recent = json
		.pointer("/filings/recent")
		.and_then(Value::as_object)
		.ok_or_else(|| Error::Permanent {
			message: "submissions response missing filings.recent".to_string(),
		})?;
	let column = |name: &str| -> Vec<&str> {
		recent
			.get(name)
			.and_then(Value::as_array)
			.map(|values| values.iter().filter_map(Value::as_str).collect())
			.unwrap_or_default()
	};
	let accessions = column("accessionNumber");
	let forms = column("form");
	let dates = column("filingDate");
	let documents = column("primaryDocument");
	let rows = accessions.len().min(forms.len()).min(dates.len());
	let mut out = Vec::with_capacity(rows);

	for idx in 0..rows {
		let Ok(accession_number) = AccessionNumber::new(accessions[idx]) else {
			tracing::warn!(accession = %accessions[idx], "Submissions row has malformed accession number; skipping.");

			continue;
		};
		let Some(filed_at) = parse_date(dates[idx]) else {
			continue;
		};

		out.push(FilingRef {
			cik: cik.clone(),
			accession_number,
			form: forms[idx].to_string(),
			filed_at,
			primary_document: documents.get(idx).copied().unwrap_or_default().to_string(),
		});
	}

	Ok(out)
}

/// Flattens filing HTML to searchable text. Tags and script/style bodies are
/// dropped; runs of whitespace collapse to one space so snippet offsets stay
/// meaningful.
fn strip_markup(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len() / 2);
	let mut chars = raw.char_indices().peekable();
	let mut last_was_space = true;

	while let Some((idx, ch)) = chars.next() {
		if ch != '<' {
			if ch.is_whitespace() {
				if !last_was_space {
					out.push(' ');
					last_was_space = true;
				}
			} else {
				out.push(ch);
				last_was_space = false;
			}

			continue;
		}

		let rest = &raw[idx..];
		let lower = rest.get(..8).map(str::to_ascii_lowercase).unwrap_or_default();
		let skip_to = if lower.starts_with("<script") {
			find_close(rest, "</script>")
		} else if lower.starts_with("<style") {
			find_close(rest, "</style>")
		} else {
			rest.find('>').map(|end| end + 1)
		};
		let Some(skip_to) = skip_to else {
			// Unterminated tag; drop the remainder.
			break;
		};

		while chars.peek().is_some_and(|(next_idx, _)| *next_idx < idx + skip_to) {
			chars.next();
		}

		if !last_was_space {
			out.push(' ');
			last_was_space = true;
		}
	}

	out.trim_end().to_string()
}

fn find_close(rest: &str, closer: &str) -> Option<usize> {
	let lower = rest.to_ascii_lowercase();
	let at = lower.find(closer)?;

	Some(at + closer.len())
}
