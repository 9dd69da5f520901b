use std::{
	sync::{Arc, Mutex as StdMutex},
	time::{Duration as StdDuration, Instant},
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinSet,
};
use uuid::Uuid;

use crate::{
	Inner,
	discover::{self, DiscoveryProgress},
	plan::{ExecutionPlan, Step, StepId, StepKind},
	search::{self, Citation, SearchProgress},
};
use edgar_domain::{Classification, EntitySet, FilingRef, QueryPattern};
use edgar_providers::{CompanyRecord, FilingContent};

/// Events surfaced to callers during long-running thematic queries.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
	Discovery(DiscoveryProgress),
	Search(SearchProgress),
}

/// The three caller-visible shapes. Degraded means the data is usable but a
/// fallback path or a partial timeout served part of it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	Success { data: Value, citations: Vec<Citation> },
	Degraded { data: Value, citations: Vec<Citation>, reason: String },
	Failure { recognized: EntitySet, reason: String },
}
impl Outcome {
	pub fn is_degraded(&self) -> bool {
		matches!(self, Self::Degraded { .. })
	}

	pub fn citations(&self) -> &[Citation] {
		match self {
			Self::Success { citations, .. } | Self::Degraded { citations, .. } => citations,
			Self::Failure { .. } => &[],
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OrchestrationResult {
	pub trace_id: Uuid,
	pub pattern: QueryPattern,
	pub confidence: f32,
	pub outcome: Outcome,
	/// Backend identifiers and resolved CIKs consulted, in first-use order.
	pub sources: Vec<String>,
	pub execution_time_ms: u64,
}

#[derive(Clone, Debug)]
enum StepOutput {
	Company(CompanyRecord),
	Profile(Value),
	Filings(Vec<FilingRef>),
	Content { filing: FilingRef, content: FilingContent },
	Discovered(Vec<FilingRef>),
	Citations(Vec<Citation>),
	Thematic(Value),
}

#[derive(Clone, Debug)]
enum StepState {
	Pending,
	Running,
	Succeeded(StepOutput),
	Failed(String),
	Skipped(String),
}
impl StepState {
	fn output(&self) -> Option<&StepOutput> {
		match self {
			Self::Succeeded(output) => Some(output),
			_ => None,
		}
	}
}

struct RunState {
	states: Vec<StepState>,
	sources: Vec<String>,
	used_fallback: bool,
	fatal: Option<String>,
}
impl RunState {
	fn record_source(&mut self, source: String) {
		if !self.sources.contains(&source) {
			self.sources.push(source);
		}
	}
}

struct StepSuccess {
	output: StepOutput,
	backend_id: &'static str,
	used_fallback: bool,
}

struct AttemptError {
	transient: bool,
	message: String,
}
impl From<edgar_providers::Error> for AttemptError {
	fn from(err: edgar_providers::Error) -> Self {
		Self { transient: err.is_transient(), message: err.to_string() }
	}
}

impl From<crate::Error> for AttemptError {
	fn from(err: crate::Error) -> Self {
		// Service-level failures (invalid filters, bad plans) are not
		// retryable.
		Self { transient: false, message: err.to_string() }
	}
}

pub(crate) async fn execute(
	inner: Arc<Inner>,
	classification: Classification,
	plan: ExecutionPlan,
	now: OffsetDateTime,
	progress: Option<mpsc::Sender<Progress>>,
) -> OrchestrationResult {
	let trace_id = Uuid::new_v4();
	let started = Instant::now();

	if plan.is_empty() {
		return OrchestrationResult {
			trace_id,
			pattern: classification.pattern,
			confidence: classification.confidence,
			outcome: Outcome::Failure {
				recognized: classification.entities,
				reason: "no company or searchable theme was recognized in the query".to_string(),
			},
			sources: Vec::new(),
			execution_time_ms: elapsed_ms(started),
		};
	}

	let run = Arc::new(StdMutex::new(RunState {
		states: vec![StepState::Pending; plan.steps.len()],
		sources: Vec::new(),
		used_fallback: false,
		fatal: None,
	}));
	let query_timeout = StdDuration::from_millis(inner.config.orchestrator.query_timeout_ms);
	let timed_out = tokio::time::timeout(
		query_timeout,
		drive_plan(inner.clone(), &plan, run.clone(), now, progress),
	)
	.await
	.is_err();
	let run = run.lock().unwrap_or_else(|err| err.into_inner());
	let succeeded_any = run.states.iter().any(|state| state.output().is_some());
	let mut sources = run.sources.clone();

	for state in &run.states {
		if let Some(StepOutput::Company(company)) = state.output() {
			let cik = company.cik.padded().to_string();

			if !sources.contains(&cik) {
				sources.push(cik);
			}
		}
	}

	let outcome = if let Some(reason) = &run.fatal {
		Outcome::Failure { recognized: classification.entities, reason: reason.clone() }
	} else if timed_out && !succeeded_any {
		Outcome::Failure {
			recognized: classification.entities,
			reason: "query timed out before any step completed".to_string(),
		}
	} else {
		let data = aggregate_data(&plan, &run.states, &inner);
		let citations = collect_citations(&plan, &run.states, &inner);

		if timed_out {
			Outcome::Degraded {
				data,
				citations,
				reason: "query timeout; returning partial results".to_string(),
			}
		} else if run.used_fallback {
			Outcome::Degraded {
				data,
				citations,
				reason: "fallback retrieval path served part of this query".to_string(),
			}
		} else {
			Outcome::Success { data, citations }
		}
	};

	OrchestrationResult {
		trace_id,
		pattern: classification.pattern,
		confidence: classification.confidence,
		outcome,
		sources,
		execution_time_ms: elapsed_ms(started),
	}
}

/// Pending → Ready → Running → Succeeded | Failed. Ready steps are dispatched
/// concurrently in non-decreasing priority, bounded by the configured
/// semaphore. A required step failing both backends aborts the run; optional
/// failures skip their dependents.
async fn drive_plan(
	inner: Arc<Inner>,
	plan: &ExecutionPlan,
	run: Arc<StdMutex<RunState>>,
	now: OffsetDateTime,
	progress: Option<mpsc::Sender<Progress>>,
) {
	let semaphore = Arc::new(Semaphore::new(inner.config.orchestrator.max_concurrent_steps as usize));
	let mut set: JoinSet<(StepId, Result<StepSuccess, String>)> = JoinSet::new();

	loop {
		let ready = {
			let mut guard = run.lock().unwrap_or_else(|err| err.into_inner());

			propagate_skips(plan, &mut guard.states);

			let mut ready: Vec<(Step, Vec<StepOutput>)> = Vec::new();

			for step in &plan.steps {
				if !matches!(guard.states[step.id], StepState::Pending) {
					continue;
				}

				let deps: Option<Vec<StepOutput>> = step
					.depends_on
					.iter()
					.map(|dep| guard.states[*dep].output().cloned())
					.collect();

				if let Some(inputs) = deps {
					ready.push((step.clone(), inputs));
				}
			}

			ready.sort_by_key(|(step, _)| (step.priority, step.id));

			for (step, _) in &ready {
				guard.states[step.id] = StepState::Running;
			}

			ready
		};

		for (step, inputs) in ready {
			let inner = inner.clone();
			let semaphore = semaphore.clone();
			let progress = progress.clone();

			set.spawn(async move {
				let _permit = semaphore.acquire_owned().await;
				let id = step.id;

				(id, run_step(inner, step, inputs, now, progress).await)
			});
		}

		let Some(joined) = set.join_next().await else {
			// Nothing running and nothing became ready.
			break;
		};
		let mut guard = run.lock().unwrap_or_else(|err| err.into_inner());

		match joined {
			Ok((id, Ok(success))) => {
				guard.record_source(success.backend_id.to_string());

				if success.used_fallback {
					guard.used_fallback = true;
				}

				guard.states[id] = StepState::Succeeded(success.output);
			},
			Ok((id, Err(message))) => {
				let step = &plan.steps[id];

				guard.states[id] = StepState::Failed(message.clone());

				if step.required {
					guard.fatal = Some(format!("{} failed: {message}", step.kind.label()));

					drop(guard);
					set.abort_all();

					return;
				}

				tracing::warn!(
					step = step.kind.label(),
					error = %message,
					"Optional step failed; continuing without it.",
				);
			},
			Err(err) => {
				tracing::warn!(error = %err, "Orchestrator worker panicked.");

				guard.fatal = Some("internal execution failure".to_string());

				drop(guard);
				set.abort_all();

				return;
			},
		}
	}
}

/// Steps downstream of a failed or skipped step can never become ready; mark
/// them so the scheduler terminates.
fn propagate_skips(plan: &ExecutionPlan, states: &mut [StepState]) {
	for step in &plan.steps {
		if !matches!(states[step.id], StepState::Pending) {
			continue;
		}

		let blocked = step.depends_on.iter().find(|dep| {
			matches!(states[**dep], StepState::Failed(_) | StepState::Skipped(_))
		});

		if let Some(dep) = blocked {
			states[step.id] = StepState::Skipped(format!("dependency {dep} did not succeed"));
		}
	}
}

/// Runs one step with the full failure policy: per-attempt timeout, bounded
/// retries with exponential backoff on transient errors, then the fallback
/// backend. Pure steps get a single local attempt.
async fn run_step(
	inner: Arc<Inner>,
	step: Step,
	inputs: Vec<StepOutput>,
	now: OffsetDateTime,
	progress: Option<mpsc::Sender<Progress>>,
) -> Result<StepSuccess, String> {
	if !step.kind.uses_backend() {
		return run_pure_step(&step.kind, &inputs)
			.map(|output| StepSuccess { output, backend_id: "local", used_fallback: false })
			.map_err(|err| err.message);
	}
	if let Some(output) = cached_output(&inner, &step.kind, &inputs, now) {
		return Ok(StepSuccess { output, backend_id: "cache", used_fallback: false });
	}

	let orchestrator = &inner.config.orchestrator;
	let step_timeout = StdDuration::from_millis(orchestrator.step_timeout_ms);
	let mut last_error = String::new();

	for use_fallback in [false, true] {
		let backend =
			if use_fallback { inner.fallback.clone() } else { inner.primary.clone() };

		for attempt in 1..=orchestrator.max_attempts {
			let outcome = tokio::time::timeout(
				step_timeout,
				attempt_step(&inner, backend.clone(), &step.kind, &inputs, progress.clone()),
			)
			.await;
			let error = match outcome {
				Ok(Ok(output)) => {
					store_cached_output(&inner, &step.kind, &inputs, &output, now);

					return Ok(StepSuccess {
						output,
						backend_id: backend.id(),
						used_fallback: use_fallback,
					});
				},
				Ok(Err(error)) => error,
				Err(_) => AttemptError {
					transient: true,
					message: format!("step timed out after {}ms", orchestrator.step_timeout_ms),
				},
			};

			last_error = error.message.clone();

			if !error.transient || attempt == orchestrator.max_attempts {
				tracing::warn!(
					step = step.kind.label(),
					backend = backend.id(),
					attempt,
					error = %error.message,
					"Step attempt exhausted on this backend.",
				);

				break;
			}

			tokio::time::sleep(backoff_delay(orchestrator, attempt)).await;
		}
	}

	Err(last_error)
}

fn backoff_delay(cfg: &edgar_config::Orchestrator, attempt: u32) -> StdDuration {
	let exp = cfg.base_backoff_ms.saturating_mul(1_u64 << (attempt - 1).min(16));

	StdDuration::from_millis(exp.min(cfg.max_backoff_ms))
}

async fn attempt_step(
	inner: &Arc<Inner>,
	backend: Arc<dyn edgar_providers::RetrievalBackend>,
	kind: &StepKind,
	inputs: &[StepOutput],
	progress: Option<mpsc::Sender<Progress>>,
) -> Result<StepOutput, AttemptError> {
	match kind {
		StepKind::ResolveCompany { identifier } => {
			let company = backend.resolve_company(identifier).await?;

			Ok(StepOutput::Company(company))
		},
		StepKind::ListFilings { filter } => {
			let company = input_company(inputs)?;
			let filings = backend.list_filings(&company.cik, filter).await?;

			Ok(StepOutput::Filings(filings))
		},
		StepKind::FetchContent => {
			let filings = input_filings(inputs)?;
			let newest = filings.iter().max_by(|a, b| {
				a.filed_at
					.cmp(&b.filed_at)
					.then_with(|| b.accession_number.cmp(&a.accession_number))
			});
			let Some(filing) = newest else {
				return Err(AttemptError {
					transient: false,
					message: "no filings available to fetch content for".to_string(),
				});
			};
			let content = backend.fetch_filing_content(filing).await?;

			Ok(StepOutput::Content { filing: filing.clone(), content })
		},
		StepKind::DiscoverFilings { filter } => {
			let discovery_progress = forward_progress(&progress, Progress::Discovery);
			let filings =
				discover::discover(backend, &inner.config.discovery, filter, discovery_progress)
					.await?;

			Ok(StepOutput::Discovered(filings))
		},
		StepKind::SearchDocuments { query, categories } => {
			let filings = input_discovered(inputs)?;
			let search_progress = forward_progress(&progress, Progress::Search);
			let citations = search::search(
				backend,
				&inner.config.search,
				&inner.config.backends.fallback.archives_base,
				&filings,
				query,
				categories,
				search_progress,
			)
			.await?;

			Ok(StepOutput::Citations(citations))
		},
		StepKind::FetchProfile | StepKind::AggregateThematic => {
			run_pure_step(kind, inputs)
		},
	}
}

fn run_pure_step(kind: &StepKind, inputs: &[StepOutput]) -> Result<StepOutput, AttemptError> {
	match kind {
		StepKind::FetchProfile => {
			let company = input_company(inputs)?;

			Ok(StepOutput::Profile(json!({
				"cik": company.cik.padded(),
				"name": company.name,
				"tickers": company.tickers,
			})))
		},
		StepKind::AggregateThematic => {
			let citations = input_citations(inputs)?;
			let mut by_company: Vec<(String, usize, f32)> = Vec::new();

			for citation in &citations {
				let cik = citation.filing.cik.padded().to_string();

				match by_company.iter_mut().find(|(existing, ..)| *existing == cik) {
					Some((_, count, top)) => {
						*count += 1;
						*top = top.max(citation.score);
					},
					None => by_company.push((cik, 1, citation.score)),
				}
			}

			by_company.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

			Ok(StepOutput::Thematic(json!({
				"companies": by_company
					.iter()
					.map(|(cik, matches, top_score)| {
						json!({ "cik": cik, "matches": matches, "top_score": top_score })
					})
					.collect::<Vec<_>>(),
			})))
		},
		_ => Err(AttemptError {
			transient: false,
			message: format!("{} is not a local step", kind.label()),
		}),
	}
}

/// Bridges a typed progress sub-channel onto the caller's single channel.
fn forward_progress<T>(
	progress: &Option<mpsc::Sender<Progress>>,
	wrap: fn(T) -> Progress,
) -> Option<mpsc::Sender<T>>
where
	T: Send + 'static,
{
	let sender = progress.clone()?;
	let (tx, mut rx) = mpsc::channel(16);

	tokio::spawn(async move {
		while let Some(event) = rx.recv().await {
			let _ = sender.try_send(wrap(event));
		}
	});

	Some(tx)
}

fn cached_output(
	inner: &Arc<Inner>,
	kind: &StepKind,
	inputs: &[StepOutput],
	now: OffsetDateTime,
) -> Option<StepOutput> {
	match kind {
		StepKind::ResolveCompany { identifier } => inner
			.company_cache
			.get(&company_cache_key(identifier), now)
			.map(StepOutput::Company),
		StepKind::ListFilings { filter } => {
			let company = input_company(inputs).ok()?;

			inner
				.filings_cache
				.get(&filings_cache_key(&company, filter), now)
				.map(StepOutput::Filings)
		},
		_ => None,
	}
}

fn store_cached_output(
	inner: &Arc<Inner>,
	kind: &StepKind,
	inputs: &[StepOutput],
	output: &StepOutput,
	now: OffsetDateTime,
) {
	match (kind, output) {
		(StepKind::ResolveCompany { identifier }, StepOutput::Company(company)) => {
			inner.company_cache.insert(company_cache_key(identifier), company.clone(), now);
		},
		(StepKind::ListFilings { filter }, StepOutput::Filings(filings)) => {
			if let Ok(company) = input_company(inputs) {
				inner.filings_cache.insert(
					filings_cache_key(&company, filter),
					filings.clone(),
					now,
				);
			}
		},
		_ => {},
	}
}

fn company_cache_key(identifier: &edgar_providers::CompanyIdentifier) -> String {
	match identifier {
		edgar_providers::CompanyIdentifier::Ticker(ticker) =>
			format!("ticker:{}", ticker.to_lowercase()),
		edgar_providers::CompanyIdentifier::Name(name) => format!("name:{}", name.to_lowercase()),
	}
}

fn filings_cache_key(company: &CompanyRecord, filter: &edgar_providers::FilingFilter) -> String {
	let filter = serde_json::to_string(filter).unwrap_or_default();

	format!("{}|{filter}", company.cik.padded())
}

fn input_company(inputs: &[StepOutput]) -> Result<CompanyRecord, AttemptError> {
	inputs
		.iter()
		.find_map(|input| match input {
			StepOutput::Company(company) => Some(company.clone()),
			_ => None,
		})
		.ok_or_else(|| AttemptError {
			transient: false,
			message: "missing resolved company from dependencies".to_string(),
		})
}

fn input_filings(inputs: &[StepOutput]) -> Result<Vec<FilingRef>, AttemptError> {
	inputs
		.iter()
		.find_map(|input| match input {
			StepOutput::Filings(filings) => Some(filings.clone()),
			_ => None,
		})
		.ok_or_else(|| AttemptError {
			transient: false,
			message: "missing filing list from dependencies".to_string(),
		})
}

fn input_discovered(inputs: &[StepOutput]) -> Result<Vec<FilingRef>, AttemptError> {
	inputs
		.iter()
		.find_map(|input| match input {
			StepOutput::Discovered(filings) => Some(filings.clone()),
			_ => None,
		})
		.ok_or_else(|| AttemptError {
			transient: false,
			message: "missing discovered filings from dependencies".to_string(),
		})
}

fn input_citations(inputs: &[StepOutput]) -> Result<Vec<Citation>, AttemptError> {
	inputs
		.iter()
		.find_map(|input| match input {
			StepOutput::Citations(citations) => Some(citations.clone()),
			_ => None,
		})
		.ok_or_else(|| AttemptError {
			transient: false,
			message: "missing search citations from dependencies".to_string(),
		})
}

fn aggregate_data(plan: &ExecutionPlan, states: &[StepState], inner: &Arc<Inner>) -> Value {
	let mut data = serde_json::Map::new();

	for step in &plan.steps {
		let Some(output) = states[step.id].output() else { continue };

		match output {
			StepOutput::Company(company) => {
				data.insert(
					"company".to_string(),
					json!({
						"cik": company.cik.padded(),
						"name": company.name,
						"tickers": company.tickers,
					}),
				);
			},
			StepOutput::Profile(profile) => {
				data.insert("profile".to_string(), profile.clone());
			},
			StepOutput::Filings(filings) => {
				data.insert(
					"filings".to_string(),
					serde_json::to_value(filings).unwrap_or(Value::Null),
				);
			},
			StepOutput::Content { filing, content } => {
				let excerpt_len = excerpt_len(&content.text, inner);

				data.insert(
					"content".to_string(),
					json!({
						"accession_number": filing.accession_number.dashed(),
						"excerpt": &content.text[..excerpt_len],
					}),
				);
			},
			StepOutput::Discovered(filings) => {
				data.insert("discovered_filings".to_string(), json!(filings.len()));
			},
			StepOutput::Citations(_) => {},
			StepOutput::Thematic(summary) => {
				data.insert("thematic".to_string(), summary.clone());
			},
		}
	}

	Value::Object(data)
}

fn excerpt_len(text: &str, inner: &Arc<Inner>) -> usize {
	let mut len = (inner.config.search.snippet_max_chars as usize).min(text.len());

	while len > 0 && !text.is_char_boundary(len) {
		len -= 1;
	}

	len
}

fn collect_citations(
	plan: &ExecutionPlan,
	states: &[StepState],
	inner: &Arc<Inner>,
) -> Vec<Citation> {
	let archives_base = &inner.config.backends.fallback.archives_base;
	let mut citations = Vec::new();

	for step in &plan.steps {
		match states[step.id].output() {
			Some(StepOutput::Citations(found)) => citations.extend(found.iter().cloned()),
			Some(StepOutput::Content { filing, content }) => {
				let excerpt_len = excerpt_len(&content.text, inner);

				citations.push(Citation {
					filing: filing.clone(),
					section: content.sections.first().map(|section| section.label.clone()),
					snippet: content.text[..excerpt_len].to_string(),
					score: 1.0,
					start_offset: Some(0),
					end_offset: Some(excerpt_len),
					source_url: filing.primary_url(archives_base),
				});
			},
			_ => {},
		}
	}

	// Dedup by (cik, accession, start offset), first occurrence wins.
	let mut seen: Vec<(String, String, Option<usize>)> = Vec::new();

	citations.retain(|citation| {
		let key = (
			citation.filing.cik.padded().to_string(),
			citation.filing.accession_number.dashed().to_string(),
			citation.start_offset,
		);

		if seen.contains(&key) {
			return false;
		}

		seen.push(key);

		true
	});

	citations
}

fn elapsed_ms(started: Instant) -> u64 {
	started.elapsed().as_millis().min(u64::MAX as u128) as u64
}
