use time::macros::date;

use super::{now, service};
use edgar_domain::QueryPattern;
use edgar_service::Outcome;
use edgar_testkit::{ScriptedBackend, company, content, filing};

#[tokio::test]
async fn apple_quarterly_query_resolves_lists_and_cites() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));

	let quarterly = filing(
		"320193",
		"0000320193-24-000077",
		"10-Q",
		date!(2024 - 08 - 02),
		"aapl-20240629.htm",
	)
	.expect("Filing must build.");

	primary.add_filing(quarterly.clone());
	primary.set_content(
		quarterly.accession_number.clone(),
		content(
			"Management's Discussion and Analysis Total net sales were $85.8 billion for the \
			 third quarter, up five percent year over year.",
		),
	);

	let service = service(&primary, &fallback);
	let result = service.orchestrate("What was Apple's revenue in Q3 2024?", now()).await;

	assert_eq!(result.pattern, QueryPattern::CompanySpecific);
	assert!(result.confidence >= 0.8);
	assert!(result.sources.iter().any(|source| source == "0000320193"));
	assert!(result.sources.iter().any(|source| source == "scripted_primary"));

	let Outcome::Success { data, citations } = &result.outcome else {
		panic!("Query must succeed on the primary path, got {:?}", result.outcome);
	};

	assert_eq!(data["company"]["name"], "Apple Inc.");
	assert_eq!(data["filings"].as_array().map(Vec::len), Some(1));
	assert_eq!(citations.len(), 1);
	assert_eq!(
		citations[0].source_url,
		"https://www.sec.gov/Archives/edgar/data/0000320193/000032019324000077/aapl-20240629.htm",
	);
}

#[tokio::test]
async fn repeated_queries_reuse_the_company_cache() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));

	let service = service(&primary, &fallback);

	service.orchestrate("List Apple filings", now()).await;
	service.orchestrate("List Apple filings", now()).await;

	let resolves = primary
		.calls()
		.iter()
		.filter(|call| call.starts_with("resolve_company"))
		.count();

	assert_eq!(resolves, 1);
}

#[tokio::test]
async fn metadata_query_never_fetches_content() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("1318605", "Tesla, Inc.", &["TSLA"]).expect("Company must build."));

	for (accession, filed_at) in [
		("0001318605-24-000050", date!(2024 - 04 - 02)),
		("0001318605-24-000090", date!(2024 - 10 - 10)),
	] {
		primary.add_filing(
			filing("1318605", accession, "8-K", filed_at, "tsla-8k.htm")
				.expect("Filing must build."),
		);
	}

	let service = service(&primary, &fallback);
	let result = service.orchestrate("How many 8-Ks did Tesla file?", now()).await;

	assert_eq!(result.pattern, QueryPattern::MetadataOnly);

	let Outcome::Success { data, .. } = &result.outcome else {
		panic!("Metadata query must succeed, got {:?}", result.outcome);
	};

	assert_eq!(data["filings"].as_array().map(Vec::len), Some(2));
	assert!(
		!primary.calls().iter().any(|call| call.starts_with("fetch_filing_content")),
		"metadata-only plans stop before the content fetch",
	);
}
