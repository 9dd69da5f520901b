mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use time::{Date, Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;

use edgar_config::{BackendConfig, Backends, Config, Edgar, FallbackConfig, Orchestrator};
use edgar_domain::{AccessionNumber, Cik, FilingRef};
use edgar_providers::{
	BoxFuture, Clock, CompanyIdentifier, CompanyRecord, FilingContent, FilingFilter,
	RetrievalBackend, sections_from_text,
};

/// Installs a fmt subscriber driven by `RUST_LOG`. Safe to call from every
/// test; later calls are no-ops.
pub fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// A valid configuration with fast retry timings, suitable for in-memory
/// tests.
pub fn config() -> Config {
	Config {
		edgar: Edgar {
			user_agent: "EdgarAnswerEngine/2.0 (brett.vantil@crowe.com)".to_string(),
			rate_limit_per_second: 100,
			rate_limit_burst: 100,
		},
		backends: Backends {
			primary: BackendConfig {
				api_base: "http://primary.invalid".to_string(),
				api_key: None,
				timeout_ms: 1_000,
			},
			fallback: FallbackConfig {
				api_base: "https://data.sec.gov".to_string(),
				archives_base: "https://www.sec.gov/Archives".to_string(),
				tickers_url: "https://www.sec.gov/files/company_tickers.json".to_string(),
				timeout_ms: 1_000,
			},
		},
		orchestrator: Orchestrator {
			base_backoff_ms: 1,
			max_backoff_ms: 4,
			step_timeout_ms: 2_000,
			query_timeout_ms: 10_000,
			..Orchestrator::default()
		},
		extraction: Default::default(),
		classifier: Default::default(),
		discovery: Default::default(),
		search: Default::default(),
		cache: Default::default(),
	}
}

/// Manually advanced time source for limiter and cache tests.
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
}
impl ManualClock {
	pub fn new(start: OffsetDateTime) -> Arc<Self> {
		Arc::new(Self { now: Mutex::new(start) })
	}

	pub fn advance(&self, duration: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|err| err.into_inner());

		*now += duration;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Failure kinds a scripted backend can be told to produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptedFailure {
	Transient,
	Permanent,
	NotFound,
}
impl ScriptedFailure {
	fn to_error(self, operation: &str) -> edgar_providers::Error {
		match self {
			Self::Transient => edgar_providers::Error::Transient {
				message: format!("scripted transient failure in {operation}"),
			},
			Self::Permanent => edgar_providers::Error::Permanent {
				message: format!("scripted permanent failure in {operation}"),
			},
			Self::NotFound => edgar_providers::Error::NotFound {
				message: format!("scripted not-found in {operation}"),
			},
		}
	}
}

#[derive(Default)]
struct ScriptState {
	companies: Vec<CompanyRecord>,
	filings: Vec<FilingRef>,
	contents: Vec<(AccessionNumber, FilingContent)>,
	queued_failures: VecDeque<ScriptedFailure>,
	fail_always: Option<ScriptedFailure>,
	delays: Vec<(String, u64)>,
	calls: Vec<String>,
}

/// In-memory retrieval backend driven entirely by the test. Every call is
/// logged; failures can be injected one-shot or permanently.
pub struct ScriptedBackend {
	id: &'static str,
	state: Mutex<ScriptState>,
}
impl ScriptedBackend {
	pub fn new(id: &'static str) -> Arc<Self> {
		Arc::new(Self { id, state: Mutex::new(ScriptState::default()) })
	}

	pub fn add_company(&self, company: CompanyRecord) {
		self.lock().companies.push(company);
	}

	pub fn add_filing(&self, filing: FilingRef) {
		self.lock().filings.push(filing);
	}

	pub fn set_content(&self, accession_number: AccessionNumber, content: FilingContent) {
		self.lock().contents.push((accession_number, content));
	}

	/// The next call fails with the given kind; queued failures are consumed
	/// in order.
	pub fn fail_next(&self, failure: ScriptedFailure) {
		self.lock().queued_failures.push_back(failure);
	}

	pub fn fail_always(&self, failure: ScriptedFailure) {
		self.lock().fail_always = Some(failure);
	}

	/// Every call of the named operation sleeps this long before answering.
	/// Used for timeout and fan-out tests.
	pub fn delay(&self, operation: &str, delay_ms: u64) {
		self.lock().delays.push((operation.to_string(), delay_ms));
	}

	/// Every operation invoked so far, e.g. `"resolve_company:TSLA"`.
	pub fn calls(&self) -> Vec<String> {
		self.lock().calls.clone()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn begin(&self, call: String, operation: &str) -> Result<(), edgar_providers::Error> {
		let mut state = self.lock();

		state.calls.push(call);

		if let Some(failure) = state.fail_always {
			return Err(failure.to_error(operation));
		}
		if let Some(failure) = state.queued_failures.pop_front() {
			return Err(failure.to_error(operation));
		}

		Ok(())
	}

	async fn pause(&self, operation: &str) {
		let delay_ms = {
			let state = self.lock();

			state.delays.iter().find(|(name, _)| name == operation).map(|(_, ms)| *ms)
		};

		if let Some(delay_ms) = delay_ms {
			tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
		}
	}
}

impl RetrievalBackend for ScriptedBackend {
	fn id(&self) -> &'static str {
		self.id
	}

	fn resolve_company<'a>(
		&'a self,
		identifier: &'a CompanyIdentifier,
	) -> BoxFuture<'a, edgar_providers::Result<CompanyRecord>> {
		Box::pin(async move {
			self.pause("resolve_company").await;
			self.begin(format!("resolve_company:{}", identifier.text()), "resolve_company")?;

			let state = self.lock();
			let found = state.companies.iter().find(|company| match identifier {
				CompanyIdentifier::Ticker(ticker) =>
					company.tickers.iter().any(|known| known.eq_ignore_ascii_case(ticker)),
				CompanyIdentifier::Name(name) =>
					company.name.to_lowercase().contains(&name.to_lowercase()),
			});

			found.cloned().ok_or_else(|| edgar_providers::Error::NotFound {
				message: format!("no scripted company matches {:?}", identifier.text()),
			})
		})
	}

	fn list_filings<'a>(
		&'a self,
		cik: &'a Cik,
		filter: &'a FilingFilter,
	) -> BoxFuture<'a, edgar_providers::Result<Vec<FilingRef>>> {
		Box::pin(async move {
			self.pause("list_filings").await;
			self.begin(format!("list_filings:{}", cik.padded()), "list_filings")?;

			let state = self.lock();

			Ok(state
				.filings
				.iter()
				.filter(|filing| filing.cik == *cik && filter.accepts(filing))
				.cloned()
				.collect())
		})
	}

	fn fetch_filing_content<'a>(
		&'a self,
		filing: &'a FilingRef,
	) -> BoxFuture<'a, edgar_providers::Result<FilingContent>> {
		Box::pin(async move {
			self.pause("fetch_filing_content").await;
			self.begin(
				format!("fetch_filing_content:{}", filing.accession_number.dashed()),
				"fetch_filing_content",
			)?;

			let state = self.lock();
			let found = state
				.contents
				.iter()
				.find(|(accession, _)| *accession == filing.accession_number);

			found.map(|(_, content)| content.clone()).ok_or_else(|| {
				edgar_providers::Error::NotFound {
					message: format!(
						"no scripted content for {}",
						filing.accession_number.dashed(),
					),
				}
			})
		})
	}
}

/// Filing fixture with the usual invariants already applied.
pub fn filing(
	cik: &str,
	accession_number: &str,
	form: &str,
	filed_at: Date,
	primary_document: &str,
) -> Result<FilingRef> {
	Ok(FilingRef {
		cik: Cik::new(cik)?,
		accession_number: AccessionNumber::new(accession_number)?,
		form: form.to_string(),
		filed_at,
		primary_document: primary_document.to_string(),
	})
}

pub fn company(cik: &str, name: &str, tickers: &[&str]) -> Result<CompanyRecord> {
	Ok(CompanyRecord {
		cik: Cik::new(cik)?,
		name: name.to_string(),
		tickers: tickers.iter().map(|ticker| ticker.to_ascii_uppercase()).collect(),
	})
}

/// Content fixture with sections derived from the text's headings.
pub fn content(text: &str) -> FilingContent {
	FilingContent { text: text.to_string(), sections: sections_from_text(text) }
}
