use time::macros::date;

use edgar_service::{DiscoveryFilter, Error, discover};
use edgar_testkit::{ScriptedBackend, config};

#[tokio::test]
async fn inverted_date_range_is_rejected_before_any_retrieval() {
	let backend = ScriptedBackend::new("scripted");
	let filter = DiscoveryFilter {
		date_range: Some((date!(2025 - 01 - 01), date!(2024 - 01 - 01))),
		..DiscoveryFilter::default()
	};
	let err = discover(
		backend.clone(),
		&config().discovery,
		&filter,
		None,
	)
	.await
	.expect_err("Inverted range must be rejected.");

	assert!(matches!(err, Error::InvalidFilter { .. }));
	assert!(backend.calls().is_empty(), "no retrieval may happen for an invalid filter");
}

#[tokio::test]
async fn unmatched_industry_yields_an_empty_sequence() {
	let backend = ScriptedBackend::new("scripted");
	let filter =
		DiscoveryFilter { industries: vec!["aerospace".to_string()], ..DiscoveryFilter::default() };
	let filings = discover(
		backend.clone(),
		&config().discovery,
		&filter,
		None,
	)
	.await
	.expect("Unknown industry is not an error.");

	assert!(filings.is_empty());
	assert!(backend.calls().is_empty());
}
