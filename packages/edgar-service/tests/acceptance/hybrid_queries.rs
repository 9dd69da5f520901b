use time::macros::date;

use super::{now, service};
use edgar_domain::QueryPattern;
use edgar_service::Outcome;
use edgar_testkit::{ScriptedBackend, company, content, filing};

#[tokio::test]
async fn comparison_query_runs_both_branches() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));
	primary.add_company(
		company("789019", "Microsoft Corp", &["MSFT"]).expect("Company must build."),
	);

	let apple_annual = filing(
		"320193",
		"0000320193-24-000123",
		"10-K",
		date!(2024 - 11 - 01),
		"aapl-20240928.htm",
	)
	.expect("Filing must build.");
	let microsoft_annual = filing(
		"789019",
		"0000789019-24-000045",
		"10-K",
		date!(2024 - 07 - 30),
		"msft-20240630.htm",
	)
	.expect("Filing must build.");

	primary.add_filing(apple_annual.clone());
	primary.add_filing(microsoft_annual.clone());
	primary.set_content(
		apple_annual.accession_number.clone(),
		content(
			"Business Our artificial intelligence strategy spans devices and services across \
			 the sector.",
		),
	);
	primary.set_content(
		microsoft_annual.accession_number.clone(),
		content(
			"Business Our AI strategy centers on cloud infrastructure serving every sector we \
			 compete in.",
		),
	);

	let service = service(&primary, &fallback);
	let result = service
		.orchestrate("Compare Apple's AI strategy to the broader tech sector", now())
		.await;

	assert_eq!(result.pattern, QueryPattern::Hybrid);

	let Outcome::Success { data, citations } = &result.outcome else {
		panic!("Hybrid query must succeed, got {:?}", result.outcome);
	};

	// Company branch.
	assert_eq!(data["company"]["name"], "Apple Inc.");
	assert!(data["content"]["excerpt"].as_str().map(|excerpt| !excerpt.is_empty()).unwrap_or(false));
	// Thematic branch.
	assert_eq!(data["discovered_filings"], 2);
	assert!(
		data["thematic"]["companies"]
			.as_array()
			.map(|companies| companies.len() == 2)
			.unwrap_or(false),
	);
	// Apple appears in both branches; its citation is deduplicated.
	assert_eq!(citations.len(), 2);
	assert!(result.sources.iter().any(|source| source == "0000320193"));
}
