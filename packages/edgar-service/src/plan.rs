use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, Result, discover::DiscoveryFilter};
use edgar_domain::{Classification, DateRange, EntitySet, QueryPattern, TopicCategory};
use edgar_providers::{CompanyIdentifier, FilingFilter};

pub type StepId = usize;

/// One node of an execution plan. `depends_on` only ever references earlier
/// steps, so plans are DAGs by construction; [`ExecutionPlan::validate`] checks
/// the invariant anyway for plans that crossed a serialization boundary.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Step {
	pub id: StepId,
	pub kind: StepKind,
	pub depends_on: Vec<StepId>,
	/// Ready steps are dispatched in non-decreasing priority.
	pub priority: u8,
	/// Required steps fail the query when both backends are exhausted;
	/// optional steps fail silently.
	pub required: bool,
}

/// Closed set of step kinds with typed parameters. Dispatch is a `match`, not
/// string lookup, so a new kind is a compile-time-checked change.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	ResolveCompany { identifier: CompanyIdentifier },
	FetchProfile,
	ListFilings { filter: FilingFilter },
	FetchContent,
	DiscoverFilings { filter: DiscoveryFilter },
	SearchDocuments { query: String, categories: Vec<TopicCategory> },
	AggregateThematic,
}
impl StepKind {
	pub fn label(&self) -> &'static str {
		match self {
			Self::ResolveCompany { .. } => "resolve_company",
			Self::FetchProfile => "fetch_profile",
			Self::ListFilings { .. } => "list_filings",
			Self::FetchContent => "fetch_content",
			Self::DiscoverFilings { .. } => "discover_filings",
			Self::SearchDocuments { .. } => "search_documents",
			Self::AggregateThematic => "aggregate_thematic",
		}
	}

	/// Whether executing this kind talks to a retrieval backend at all. Pure
	/// steps get exactly one attempt and no fallback.
	pub fn uses_backend(&self) -> bool {
		!matches!(self, Self::FetchProfile | Self::AggregateThematic)
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ExecutionPlan {
	pub steps: Vec<Step>,
}
impl ExecutionPlan {
	fn push(&mut self, kind: StepKind, depends_on: Vec<StepId>, priority: u8, required: bool) -> StepId {
		let id = self.steps.len();

		self.steps.push(Step { id, kind, depends_on, priority, required });

		id
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Topological check. Fails on forward or self references and on ids that
	/// do not match positions.
	pub fn validate(&self) -> Result<()> {
		for (position, step) in self.steps.iter().enumerate() {
			if step.id != position {
				return Err(Error::InvalidPlan {
					message: format!("step id {} at position {position}", step.id),
				});
			}

			for dep in &step.depends_on {
				if *dep >= step.id {
					return Err(Error::InvalidPlan {
						message: format!("step {} depends on {dep}, which is not earlier", step.id),
					});
				}
			}
		}

		Ok(())
	}
}

/// Builds the per-pattern plan. The raw query rides along because thematic
/// search ranks against the original text, not the extracted entities.
pub fn build_plan(classification: &Classification, raw_query: &str) -> ExecutionPlan {
	let entities = &classification.entities;
	let mut plan = ExecutionPlan::default();

	match classification.pattern {
		QueryPattern::CompanySpecific => {
			push_company_branch(&mut plan, entities, true);
		},
		QueryPattern::MetadataOnly => {
			// The company chain truncated before the content fetch.
			push_company_branch(&mut plan, entities, false);
		},
		QueryPattern::Thematic => {
			push_thematic_branch(&mut plan, entities, raw_query);
		},
		QueryPattern::Hybrid => {
			// Two independent branches; the orchestrator merges their outputs.
			push_company_branch(&mut plan, entities, true);
			push_thematic_branch(&mut plan, entities, raw_query);
		},
	}

	plan
}

fn push_company_branch(plan: &mut ExecutionPlan, entities: &EntitySet, with_content: bool) {
	let Some(identifier) = company_identifier(entities) else {
		// Nothing to resolve. An empty branch surfaces as a recognizable
		// failure instead of a guessed lookup.
		return;
	};
	let resolve = plan.push(StepKind::ResolveCompany { identifier }, Vec::new(), 0, true);

	plan.push(StepKind::FetchProfile, vec![resolve], 1, false);

	let list =
		plan.push(StepKind::ListFilings { filter: filing_filter(entities) }, vec![resolve], 1, true);

	if with_content {
		plan.push(StepKind::FetchContent, vec![list], 2, false);
	}
}

fn push_thematic_branch(plan: &mut ExecutionPlan, entities: &EntitySet, raw_query: &str) {
	let filter = DiscoveryFilter {
		industries: crate::discover::industries_in_query(raw_query),
		forms: entities.forms.iter().map(|form| form.form.clone()).collect(),
		date_range: merged_date_span(entities),
	};
	let discover = plan.push(StepKind::DiscoverFilings { filter }, Vec::new(), 0, true);
	let search = plan.push(
		StepKind::SearchDocuments {
			query: raw_query.to_string(),
			categories: entities.topics.iter().map(|topic| topic.category).collect(),
		},
		vec![discover],
		1,
		true,
	);

	plan.push(StepKind::AggregateThematic, vec![search], 2, false);
}

/// The strongest company signal: best company mention first, explicit tickers
/// as a fallback.
fn company_identifier(entities: &EntitySet) -> Option<CompanyIdentifier> {
	let best_company = entities.companies.iter().max_by(|a, b| {
		a.confidence.total_cmp(&b.confidence).then_with(|| b.name.len().cmp(&a.name.len()))
	});

	if let Some(company) = best_company {
		return Some(match &company.ticker {
			Some(ticker) => CompanyIdentifier::Ticker(ticker.clone()),
			None => CompanyIdentifier::Name(company.name.clone()),
		});
	}

	entities
		.tickers
		.iter()
		.max_by(|a, b| a.confidence.total_cmp(&b.confidence))
		.map(|ticker| CompanyIdentifier::Ticker(ticker.symbol.clone()))
}

fn filing_filter(entities: &EntitySet) -> FilingFilter {
	let mut forms: Vec<String> = entities.forms.iter().map(|form| form.form.clone()).collect();

	forms.sort();
	forms.dedup();

	FilingFilter {
		forms,
		date_range: merged_date_span(entities)
			.and_then(|(start, end)| DateRange::new(start, end).ok()),
	}
}

/// Union of every detected time expression. Min start and max end can never
/// invert.
fn merged_date_span(entities: &EntitySet) -> Option<(Date, Date)> {
	let start = entities.time_expressions.iter().map(|expr| expr.start).min()?;
	let end = entities.time_expressions.iter().map(|expr| expr.end).max()?;

	Some((start, end))
}
