use time::macros::date;
use tokio::sync::mpsc;

use super::{now, service};
use edgar_domain::QueryPattern;
use edgar_service::{Outcome, Progress, search};
use edgar_testkit::{ScriptedBackend, company, config, content, filing};

#[tokio::test]
async fn thematic_query_discovers_searches_and_aggregates() {
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
			"Item 1A. Risk Factors A significant cybersecurity incident could harm our \
			 reputation and expose us to liability.",
		),
	);
	primary.set_content(
		microsoft_annual.accession_number.clone(),
		content(
			"Item 1A. Risk Factors Cybersecurity threats continue to grow in frequency and \
			 sophistication across our cloud offerings.",
		),
	);

	let service = service(&primary, &fallback);
	let (tx, mut rx) = mpsc::channel(64);
	let result = service
		.orchestrate_with_progress("All companies mentioning cybersecurity risk", now(), tx)
		.await;

	assert_eq!(result.pattern, QueryPattern::Thematic);

	let Outcome::Success { data, citations } = &result.outcome else {
		panic!("Thematic query must succeed, got {:?}", result.outcome);
	};

	assert_eq!(citations.len(), 2);
	assert!(citations.iter().all(|citation| citation.source_url.contains("/edgar/data/")));
	assert!(
		data["thematic"]["companies"]
			.as_array()
			.map(|companies| companies.len() == 2)
			.unwrap_or(false),
	);

	// Let the progress forwarders drain before inspecting the channel.
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;

	let mut saw_discovery = false;
	let mut saw_search = false;

	while let Ok(event) = rx.try_recv() {
		match event {
			Progress::Discovery(_) => saw_discovery = true,
			Progress::Search(update) => {
				saw_search = true;

				assert_eq!(update.total_filings, 2);
			},
		}
	}

	assert!(saw_discovery);
	assert!(saw_search);
}

#[tokio::test]
async fn thematic_results_order_is_stable() {
	let primary = ScriptedBackend::new("scripted_primary");
	let fallback = ScriptedBackend::new("scripted_fallback");

	primary.add_company(company("320193", "Apple Inc.", &["AAPL"]).expect("Company must build."));

	let annual = filing(
		"320193",
		"0000320193-24-000123",
		"10-K",
		date!(2024 - 11 - 01),
		"aapl-20240928.htm",
	)
	.expect("Filing must build.");

	primary.add_filing(annual.clone());
	primary.set_content(
		annual.accession_number.clone(),
		content("Item 1A. Risk Factors Cybersecurity incidents remain a material risk."),
	);

	let service = service(&primary, &fallback);
	let query = "All companies mentioning cybersecurity risk";
	let first = service.orchestrate(query, now()).await;
	let second = service.orchestrate(query, now()).await;
	let first_citations =
		serde_json::to_vec(first.outcome.citations()).expect("Citations must serialize.");
	let second_citations =
		serde_json::to_vec(second.outcome.citations()).expect("Citations must serialize.");

	assert_eq!(first_citations, second_citations);
}

#[tokio::test]
async fn content_fetches_fan_out_concurrently() {
	let backend = ScriptedBackend::new("scripted");
	let mut filings = Vec::new();

	for (cik, accession) in [
		("100", "0000000100-24-000001"),
		("200", "0000000200-24-000001"),
		("300", "0000000300-24-000001"),
		("400", "0000000400-24-000001"),
	] {
		let annual = filing(cik, accession, "10-K", date!(2024 - 06 - 01), "report.htm")
			.expect("Filing must build.");

		backend.set_content(
			annual.accession_number.clone(),
			content("Cybersecurity incidents were disclosed during the period."),
		);
		filings.push(annual);
	}

	// Each fetch sleeps 100ms; a sequential loop would need four delays, the
	// bounded fan-out roughly one.
	backend.delay("fetch_filing_content", 100);

	let started = std::time::Instant::now();
	let citations = search(
		backend.clone(),
		&config().search,
		"https://www.sec.gov/Archives",
		&filings,
		"cybersecurity incidents",
		&[],
		None,
	)
	.await
	.expect("Search must succeed.");

	assert_eq!(citations.len(), 4);
	assert!(
		started.elapsed() < std::time::Duration::from_millis(300),
		"fetches did not overlap: {:?}",
		started.elapsed(),
	);
}
