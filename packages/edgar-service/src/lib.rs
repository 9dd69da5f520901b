mod error;

pub mod discover;
pub mod orchestrate;
pub mod plan;
pub mod search;

pub use discover::{
	DiscoveryFilter, DiscoveryProgress, discover, discover_stream, industries_in_query,
};
pub use error::{Error, Result};
pub use orchestrate::{Outcome, OrchestrationResult, Progress};
pub use plan::{ExecutionPlan, Step, StepId, StepKind, build_plan};
pub use search::{Citation, SearchProgress, rank_passages, search};

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::mpsc;

use edgar_config::Config;
use edgar_domain::{Extractor, FilingRef, classify};
use edgar_providers::{
	CompanyRecord, EdgarDirectBackend, PrimaryBackend, RateLimiter, RetrievalBackend, SystemClock,
	TtlCache,
};

/// The engine's public entry point. Holds the shared rate-limited backends and
/// caches; one instance per process, queries run concurrently against it.
pub struct EdgarService {
	inner: Arc<Inner>,
}

pub(crate) struct Inner {
	pub(crate) config: Config,
	pub(crate) primary: Arc<dyn RetrievalBackend>,
	pub(crate) fallback: Arc<dyn RetrievalBackend>,
	pub(crate) extractor: Extractor,
	pub(crate) company_cache: TtlCache<String, CompanyRecord>,
	pub(crate) filings_cache: TtlCache<String, Vec<FilingRef>>,
}

impl EdgarService {
	pub fn new(config: Config) -> Result<Self> {
		let limiter = Arc::new(RateLimiter::new(
			config.edgar.rate_limit_per_second,
			config.edgar.rate_limit_burst,
			Arc::new(SystemClock),
		));
		let primary = Arc::new(PrimaryBackend::new(&config.backends.primary, limiter.clone())?);
		let fallback = Arc::new(EdgarDirectBackend::new(
			&config.backends.fallback,
			&config.edgar.user_agent,
			limiter,
		)?);

		Self::with_backends(config, primary, fallback)
	}

	/// Injected backends; used by tests and by embedders with custom
	/// transports.
	pub fn with_backends(
		config: Config,
		primary: Arc<dyn RetrievalBackend>,
		fallback: Arc<dyn RetrievalBackend>,
	) -> Result<Self> {
		let extractor = Extractor::new(&config.extraction)
			.map_err(|err| Error::Configuration { message: err.to_string() })?;
		let company_cache = TtlCache::new(Duration::hours(config.cache.company_ttl_hours));
		let filings_cache = TtlCache::new(Duration::minutes(config.cache.filing_list_ttl_minutes));

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				primary,
				fallback,
				extractor,
				company_cache,
				filings_cache,
			}),
		})
	}

	pub async fn orchestrate(&self, query: &str, now: OffsetDateTime) -> OrchestrationResult {
		self.run(query, now, None).await
	}

	/// Same as [`Self::orchestrate`] with progress events for long-running
	/// thematic queries. Events are dropped, never blocked on, when the
	/// receiver falls behind.
	pub async fn orchestrate_with_progress(
		&self,
		query: &str,
		now: OffsetDateTime,
		progress: mpsc::Sender<Progress>,
	) -> OrchestrationResult {
		self.run(query, now, Some(progress)).await
	}

	async fn run(
		&self,
		query: &str,
		now: OffsetDateTime,
		progress: Option<mpsc::Sender<Progress>>,
	) -> OrchestrationResult {
		let entities = self.inner.extractor.extract(query, now);
		let classification = classify(&entities, query, &self.inner.config.classifier);
		let plan = build_plan(&classification, query);

		tracing::debug!(
			pattern = classification.pattern.label(),
			confidence = classification.confidence,
			steps = plan.steps.len(),
			"Built execution plan.",
		);

		orchestrate::execute(self.inner.clone(), classification, plan, now, progress).await
	}
}
