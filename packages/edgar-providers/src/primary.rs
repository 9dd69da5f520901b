use std::{sync::Arc, time::Duration as StdDuration};

use reqwest::{Client, header};
use serde_json::Value;
use time::Duration;

use crate::{
	BoxFuture, CompanyIdentifier, CompanyRecord, Error, FilingContent, FilingFilter,
	FilingSection, RateLimiter, Result, RetrievalBackend,
};
use edgar_config::BackendConfig;
use edgar_domain::{AccessionNumber, Cik, FilingRef};

pub const PRIMARY_BACKEND_ID: &str = "primary";

/// Client for the full-text filing service. Richer than the direct EDGAR API
/// but allowed to be slower or unavailable; the orchestrator falls back to
/// [`crate::EdgarDirectBackend`] when it misbehaves.
pub struct PrimaryBackend {
	client: Client,
	api_base: String,
	limiter: Arc<RateLimiter>,
	limiter_budget: Duration,
}
impl PrimaryBackend {
	pub fn new(cfg: &BackendConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
		let mut headers = header::HeaderMap::new();

		if let Some(api_key) = cfg.api_key.as_deref() {
			let mut value = header::HeaderValue::from_str(&format!("Bearer {api_key}"))?;

			value.set_sensitive(true);
			headers.insert(header::AUTHORIZATION, value);
		}

		let client = Client::builder()
			.timeout(StdDuration::from_millis(cfg.timeout_ms))
			.default_headers(headers)
			.build()?;

		Ok(Self {
			client,
			api_base: cfg.api_base.trim_end_matches('/').to_string(),
			limiter,
			limiter_budget: Duration::milliseconds(cfg.timeout_ms as i64),
		})
	}

	async fn get_json(&self, url: String) -> Result<Value> {
		self.limiter.acquire(self.limiter_budget).await?;

		let response = self.client.get(url).send().await?;

		Ok(response.error_for_status()?.json().await?)
	}
}

impl RetrievalBackend for PrimaryBackend {
	fn id(&self) -> &'static str {
		PRIMARY_BACKEND_ID
	}

	fn resolve_company<'a>(
		&'a self,
		identifier: &'a CompanyIdentifier,
	) -> BoxFuture<'a, Result<CompanyRecord>> {
		Box::pin(async move {
			let kind = match identifier {
				CompanyIdentifier::Ticker(_) => "ticker",
				CompanyIdentifier::Name(_) => "name",
			};
			let url = format!(
				"{}/companies/resolve?kind={kind}&q={}",
				self.api_base,
				urlencode(identifier.text()),
			);
			let json = self.get_json(url).await?;

			parse_company(&json)
		})
	}

	fn list_filings<'a>(
		&'a self,
		cik: &'a Cik,
		filter: &'a FilingFilter,
	) -> BoxFuture<'a, Result<Vec<FilingRef>>> {
		Box::pin(async move {
			let mut url = format!("{}/companies/{}/filings", self.api_base, cik.padded());
			let mut params = Vec::new();

			if !filter.forms.is_empty() {
				params.push(format!("forms={}", urlencode(&filter.forms.join(","))));
			}
			if let Some(range) = &filter.date_range {
				params.push(format!("from={}", range.start));
				params.push(format!("to={}", range.end));
			}
			if !params.is_empty() {
				url = format!("{url}?{}", params.join("&"));
			}

			let json = self.get_json(url).await?;
			let filings = parse_filings(&json, cik)?;

			// The service applies the filter server-side; re-check locally so
			// both backends present identical semantics.
			Ok(filings.into_iter().filter(|filing| filter.accepts(filing)).collect())
		})
	}

	fn fetch_filing_content<'a>(
		&'a self,
		filing: &'a FilingRef,
	) -> BoxFuture<'a, Result<FilingContent>> {
		Box::pin(async move {
			let url = format!(
				"{}/filings/{}/{}/content",
				self.api_base,
				filing.cik.padded(),
				filing.accession_number.stripped(),
			);
			let json = self.get_json(url).await?;

			parse_content(&json)
		})
	}
}

fn parse_company(json: &Value) -> Result<CompanyRecord> {
	let cik_raw = json
		.get("cik")
		.and_then(|value| value.as_str().map(str::to_string).or_else(|| value.as_u64().map(|n| n.to_string())))
		.ok_or_else(|| Error::Permanent { message: "company response missing cik".to_string() })?;
	let cik = Cik::new(&cik_raw)
		.map_err(|err| Error::Permanent { message: err.to_string() })?;
	let name = json
		.get("name")
		.and_then(Value::as_str)
		.ok_or_else(|| Error::Permanent { message: "company response missing name".to_string() })?
		.to_string();
	let tickers = json
		.get("tickers")
		.and_then(Value::as_array)
		.map(|values| {
			values
				.iter()
				.filter_map(Value::as_str)
				.map(|ticker| ticker.to_ascii_uppercase())
				.collect()
		})
		.unwrap_or_default();

	Ok(CompanyRecord { cik, name, tickers })
}

fn parse_filings(json: &Value, cik: &Cik) -> Result<Vec<FilingRef>> {
	let items = json
		.get("filings")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::Permanent {
			message: "filings response missing filings array".to_string(),
		})?;
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let Some(accession_raw) = item.get("accessionNumber").and_then(Value::as_str) else {
			tracing::warn!("Filing entry missing accessionNumber; skipping.");

			continue;
		};
		let Ok(accession_number) = AccessionNumber::new(accession_raw) else {
			tracing::warn!(accession = %accession_raw, "Filing entry has malformed accession number; skipping.");

			continue;
		};
		let Some(form) = item.get("form").and_then(Value::as_str) else {
			continue;
		};
		let Some(filed_at) = item
			.get("filedAt")
			.and_then(Value::as_str)
			.and_then(|raw| parse_date(raw))
		else {
			continue;
		};
		let primary_document = item
			.get("primaryDocument")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string();

		out.push(FilingRef {
			cik: cik.clone(),
			accession_number,
			form: form.to_string(),
			filed_at,
			primary_document,
		});
	}

	Ok(out)
}

fn parse_content(json: &Value) -> Result<FilingContent> {
	let text = json
		.get("text")
		.and_then(Value::as_str)
		.ok_or_else(|| Error::Permanent { message: "content response missing text".to_string() })?
		.to_string();
	let sections = json
		.get("sections")
		.and_then(Value::as_array)
		.map(|values| {
			values
				.iter()
				.filter_map(|section| {
					Some(FilingSection {
						label: section.get("label")?.as_str()?.to_string(),
						start_offset: section.get("startOffset")?.as_u64()? as usize,
						end_offset: section.get("endOffset")?.as_u64()? as usize,
					})
				})
				.collect::<Vec<_>>()
		})
		.unwrap_or_else(|| crate::sections_from_text(&text));

	Ok(FilingContent { text, sections })
}

pub(crate) fn parse_date(raw: &str) -> Option<time::Date> {
	let format = time::macros::format_description!("[year]-[month]-[day]");

	time::Date::parse(raw, &format).ok()
}

pub(crate) fn urlencode(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~') {
			out.push(ch);
		} else {
			for byte in ch.to_string().as_bytes() {
				out.push_str(&format!("%{byte:02X}"));
			}
		}
	}

	out
}
