use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Date;
use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinSet,
};

use crate::{Error, Result};
use edgar_config::Discovery;
use edgar_domain::{DateRange, FilingRef};
use edgar_providers::{CompanyIdentifier, FilingFilter, RetrievalBackend};

/// Fixed company universe, grouped by industry. SIC-code lookups are out of
/// scope, so thematic discovery scans this table instead of the whole filer
/// population.
const INDUSTRY_TABLE: &[(&str, &[(&str, &str)])] = &[
	("technology", &[
		("Apple Inc.", "AAPL"),
		("Microsoft Corporation", "MSFT"),
		("NVIDIA Corporation", "NVDA"),
		("Alphabet Inc.", "GOOGL"),
		("Meta Platforms, Inc.", "META"),
		("Oracle Corporation", "ORCL"),
		("Salesforce, Inc.", "CRM"),
		("Intel Corporation", "INTC"),
	]),
	("financial", &[
		("JPMorgan Chase & Co.", "JPM"),
		("Bank of America Corporation", "BAC"),
		("The Goldman Sachs Group, Inc.", "GS"),
		("Morgan Stanley", "MS"),
		("Wells Fargo & Company", "WFC"),
	]),
	("healthcare", &[
		("Johnson & Johnson", "JNJ"),
		("Pfizer Inc.", "PFE"),
		("UnitedHealth Group Incorporated", "UNH"),
		("Merck & Co., Inc.", "MRK"),
	]),
	("energy", &[
		("Exxon Mobil Corporation", "XOM"),
		("Chevron Corporation", "CVX"),
		("ConocoPhillips", "COP"),
	]),
	("consumer", &[
		("Amazon.com, Inc.", "AMZN"),
		("Walmart Inc.", "WMT"),
		("The Coca-Cola Company", "KO"),
		("The Procter & Gamble Company", "PG"),
		("Tesla, Inc.", "TSLA"),
	]),
];

/// Query phrasings that map onto an industry bucket.
const INDUSTRY_SYNONYMS: &[(&str, &str)] = &[
	("bank", "financial"),
	("banking", "financial"),
	("consumer", "consumer"),
	("energy", "energy"),
	("financial", "financial"),
	("healthcare", "healthcare"),
	("oil", "energy"),
	("pharma", "healthcare"),
	("pharmaceutical", "healthcare"),
	("retail", "consumer"),
	("software", "technology"),
	("tech", "technology"),
	("technology", "technology"),
];

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DiscoveryFilter {
	pub industries: Vec<String>,
	pub forms: Vec<String>,
	/// Kept as raw endpoints so an inverted range is rejected here, at the
	/// boundary, rather than silently swapped during construction.
	pub date_range: Option<(Date, Date)>,
}
impl DiscoveryFilter {
	/// Converts to the backend filter. Runs before any retrieval work starts.
	pub fn normalized(&self) -> Result<FilingFilter> {
		let date_range = match self.date_range {
			Some((start, end)) => Some(DateRange::new(start, end).map_err(|err| {
				Error::InvalidFilter { message: err.to_string() }
			})?),
			None => None,
		};
		let mut forms = self.forms.clone();

		forms.sort();
		forms.dedup();

		Ok(FilingFilter { forms, date_range })
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiscoveryProgress {
	pub found: usize,
	pub scanned: usize,
}

/// Industries mentioned in a raw query, in table order.
pub fn industries_in_query(raw_query: &str) -> Vec<String> {
	let lowered = raw_query.to_lowercase();
	let mut industries: Vec<String> = INDUSTRY_SYNONYMS
		.iter()
		.filter(|(synonym, _)| {
			lowered
				.split(|ch: char| !ch.is_ascii_alphanumeric())
				.any(|word| word == *synonym)
		})
		.map(|(_, industry)| (*industry).to_string())
		.collect();

	industries.sort();
	industries.dedup();

	industries
}

fn companies_for(industries: &[String], max_companies: usize) -> Vec<(&'static str, &'static str)> {
	INDUSTRY_TABLE
		.iter()
		.filter(|(industry, _)| {
			industries.is_empty() || industries.iter().any(|wanted| wanted == industry)
		})
		.flat_map(|(_, companies)| companies.iter().copied())
		.take(max_companies)
		.collect()
}

/// Enumerates candidate filings across the matching companies, yielding each
/// one through a bounded channel as soon as its company scan completes. The
/// filter is validated synchronously, so an invalid filter never reaches the
/// network.
pub fn discover_stream(
	backend: Arc<dyn RetrievalBackend>,
	cfg: &Discovery,
	filter: &DiscoveryFilter,
	progress: Option<mpsc::Sender<DiscoveryProgress>>,
) -> Result<mpsc::Receiver<FilingRef>> {
	let filing_filter = filter.normalized()?;
	let companies = companies_for(&filter.industries, cfg.max_companies as usize);
	let (tx, rx) = mpsc::channel(cfg.channel_capacity as usize);
	let worker_concurrency = cfg.worker_concurrency as usize;

	tokio::spawn(async move {
		let semaphore = Arc::new(Semaphore::new(worker_concurrency));
		let mut set = JoinSet::new();

		for (name, ticker) in companies {
			let backend = backend.clone();
			let semaphore = semaphore.clone();
			let filing_filter = filing_filter.clone();

			set.spawn(async move {
				let Ok(_permit) = semaphore.acquire_owned().await else {
					return (name, Ok(Vec::new()));
				};
				let identifier = CompanyIdentifier::Ticker(ticker.to_string());
				let company = match backend.resolve_company(&identifier).await {
					Ok(company) => company,
					Err(err) => return (name, Err(err)),
				};

				(name, backend.list_filings(&company.cik, &filing_filter).await)
			});
		}

		let mut scanned = 0;
		let mut found = 0;

		while let Some(joined) = set.join_next().await {
			scanned += 1;

			match joined {
				Ok((_, Ok(filings))) => {
					for filing in filings {
						found += 1;

						if tx.send(filing).await.is_err() {
							// Receiver dropped; stop scanning.
							return;
						}
					}
				},
				Ok((name, Err(err))) => {
					tracing::warn!(company = name, error = %err, "Discovery skipped a company.");
				},
				Err(err) => {
					tracing::warn!(error = %err, "Discovery worker panicked.");
				},
			}

			if let Some(progress) = &progress {
				let _ = progress.try_send(DiscoveryProgress { found, scanned });
			}
		}
	});

	Ok(rx)
}

/// Collecting wrapper around [`discover_stream`] with a deterministic output
/// order: newest filings first, accession number as the final tie-break.
pub async fn discover(
	backend: Arc<dyn RetrievalBackend>,
	cfg: &Discovery,
	filter: &DiscoveryFilter,
	progress: Option<mpsc::Sender<DiscoveryProgress>>,
) -> Result<Vec<FilingRef>> {
	let mut rx = discover_stream(backend, cfg, filter, progress)?;
	let mut filings = Vec::new();

	while let Some(filing) = rx.recv().await {
		filings.push(filing);
	}

	filings.sort_by(|a, b| {
		b.filed_at.cmp(&a.filed_at).then_with(|| a.accession_number.cmp(&b.accession_number))
	});

	Ok(filings)
}
