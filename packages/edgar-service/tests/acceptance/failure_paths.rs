use time::macros::date;

use super::{now, service};
use edgar_domain::QueryPattern;
use edgar_service::{EdgarService, Outcome};
use edgar_testkit::{ScriptedBackend, ScriptedFailure, company, config, content, filing};

#[tokio::test]
async fn fallback_serves_the_query_when_primary_always_fails() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.fail_always(ScriptedFailure::Transient);
	fallback
		.add_company(company("1318605", "Tesla, Inc.", &["TSLA"]).expect("Company must build."));

	let annual = filing(
		"1318605",
		"0001318605-24-000123",
		"10-K",
		date!(2024 - 01 - 29),
		"tsla-20231231.htm",
	)
	.expect("Filing must build.");

	fallback.add_filing(annual.clone());
	fallback.set_content(
		annual.accession_number.clone(),
		content("Item 1A. Risk Factors Our business depends on scaling vehicle production."),
	);

	let service = service(&primary, &fallback);
	let result = service.orchestrate("Tesla's latest 10-K", now()).await;

	let Outcome::Degraded { data, citations, .. } = &result.outcome else {
		panic!("Fallback path must degrade, not fail: {:?}", result.outcome);
	};

	assert!(result.sources.iter().any(|source| source == "scripted_fallback"));
	assert!(result.sources.iter().any(|source| source == "0001318605"));
	assert_eq!(data["filings"].as_array().map(Vec::len), Some(1));
	assert_eq!(citations.len(), 1);
	// The primary was actually tried before falling back.
	assert!(!primary.calls().is_empty());
}

#[tokio::test]
async fn both_backends_failing_surfaces_recognized_entities() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.fail_always(ScriptedFailure::NotFound);
	fallback.fail_always(ScriptedFailure::NotFound);

	let service = service(&primary, &fallback);
	let result = service.orchestrate("Summarize Acme Corp's annual report", now()).await;

	let Outcome::Failure { recognized, reason } = &result.outcome else {
		panic!("Exhausting both backends must fail the query: {:?}", result.outcome);
	};

	assert!(!recognized.companies.is_empty());
	assert!(reason.contains("resolve_company"));
}

#[tokio::test]
async fn empty_query_classifies_low_and_fails_cleanly() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");
	let service = service(&primary, &fallback);
	let result = service.orchestrate("", now()).await;

	assert_eq!(result.pattern, QueryPattern::MetadataOnly);
	assert!(result.confidence <= 0.3);
	assert!(matches!(result.outcome, Outcome::Failure { .. }));
	assert!(primary.calls().is_empty());
	assert!(fallback.calls().is_empty());
}

#[tokio::test]
async fn query_timeout_returns_partial_results_as_degraded() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));
	// The filing list never arrives inside the query budget.
	primary.delay("list_filings", 5_000);

	let mut slow = config();

	slow.orchestrator.step_timeout_ms = 8_000;
	slow.orchestrator.query_timeout_ms = 250;

	let service = EdgarService::with_backends(slow, primary.clone(), fallback.clone())
		.expect("Service must build.");
	let result = service.orchestrate("List Apple filings", now()).await;

	let Outcome::Degraded { data, reason, .. } = &result.outcome else {
		panic!("A slow step after earlier successes must degrade: {:?}", result.outcome);
	};

	assert!(reason.contains("timeout"));
	assert_eq!(data["company"]["name"], "Apple Inc.");
	assert!(data.get("filings").is_none(), "the timed-out step must not contribute data");
}

#[tokio::test]
async fn one_transient_failure_is_retried_on_the_same_backend() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));
	primary.fail_next(ScriptedFailure::Transient);

	let service = service(&primary, &fallback);
	let result = service.orchestrate("List Apple filings", now()).await;

	// Retried on the primary itself; the fallback never participated.
	assert!(!result.outcome.is_degraded());
	assert!(fallback.calls().is_empty());

	let resolves = primary
		.calls()
		.iter()
		.filter(|call| call.starts_with("resolve_company"))
		.count();

	assert_eq!(resolves, 2);
}
