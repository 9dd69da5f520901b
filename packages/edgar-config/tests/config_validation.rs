use toml::Value;

use edgar_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = r#"
[edgar]
user_agent = "EdgarEngine/0.2 (ops@example.com)"

[backends.primary]
api_base = "http://localhost:8080"
api_key  = "test-key"

[backends.fallback]
"#;

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn parse_and_validate(value: Value) -> Result<(), Error> {
	let rendered = toml::to_string(&value).expect("Failed to render sample config.");
	let cfg: Config = toml::from_str(&rendered).expect("Failed to parse rendered config.");

	edgar_config::validate(&cfg)
}

fn set(value: &mut Value, path: &[&str], leaf: Value) {
	let mut current = value;

	for key in &path[..path.len() - 1] {
		current = current
			.as_table_mut()
			.expect("Config node must be a table.")
			.entry((*key).to_string())
			.or_insert_with(|| Value::Table(Default::default()));
	}

	current
		.as_table_mut()
		.expect("Config node must be a table.")
		.insert(path[path.len() - 1].to_string(), leaf);
}

#[test]
fn accepts_sample_config() {
	parse_and_validate(sample_value()).expect("Sample config must validate.");
}

#[test]
fn defaults_are_applied() {
	let rendered = toml::to_string(&sample_value()).expect("Failed to render sample config.");
	let cfg: Config = toml::from_str(&rendered).expect("Failed to parse rendered config.");

	assert_eq!(cfg.edgar.rate_limit_per_second, 10);
	assert_eq!(cfg.backends.fallback.api_base, "https://data.sec.gov");
	assert_eq!(cfg.orchestrator.max_attempts, 3);
	assert_eq!(cfg.search.proximity_window, 5);
	assert!(cfg.extraction.ticker_stoplist.iter().any(|token| token == "ARE"));
}

#[test]
fn rejects_user_agent_without_contact() {
	let mut value = sample_value();

	set(&mut value, &["edgar", "user_agent"], Value::String("EdgarEngine/0.2".to_string()));

	let err = parse_and_validate(value).expect_err("Contact-free user agent must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
	assert!(err.to_string().contains("contact email"));
}

#[test]
fn rejects_zero_rate_limit() {
	let mut value = sample_value();

	set(&mut value, &["edgar", "rate_limit_per_second"], Value::Integer(0));

	parse_and_validate(value).expect_err("Zero rate limit must be rejected.");
}

#[test]
fn rejects_backoff_ceiling_below_base() {
	let mut value = sample_value();

	set(&mut value, &["orchestrator", "base_backoff_ms"], Value::Integer(5_000));
	set(&mut value, &["orchestrator", "max_backoff_ms"], Value::Integer(1_000));

	parse_and_validate(value).expect_err("Backoff ceiling below base must be rejected.");
}

#[test]
fn rejects_query_timeout_below_step_timeout() {
	let mut value = sample_value();

	set(&mut value, &["orchestrator", "step_timeout_ms"], Value::Integer(20_000));
	set(&mut value, &["orchestrator", "query_timeout_ms"], Value::Integer(10_000));

	parse_and_validate(value).expect_err("Query timeout below step timeout must be rejected.");
}

#[test]
fn rejects_out_of_range_bm25_b() {
	let mut value = sample_value();

	set(&mut value, &["search", "bm25_b"], Value::Float(1.5));

	parse_and_validate(value).expect_err("bm25_b above 1.0 must be rejected.");
}

#[test]
fn rejects_section_boost_below_one() {
	let mut value = sample_value();

	set(&mut value, &["search", "section_boost"], Value::Float(0.5));

	parse_and_validate(value).expect_err("Section boost below 1.0 must be rejected.");
}

#[test]
fn normalizes_ticker_stoplist() {
	let mut value = sample_value();

	set(
		&mut value,
		&["extraction", "ticker_stoplist"],
		Value::Array(vec![
			Value::String(" it ".to_string()),
			Value::String("it".to_string()),
			Value::String("ARE".to_string()),
			Value::String("".to_string()),
		]),
	);

	let rendered = toml::to_string(&value).expect("Failed to render sample config.");
	let path = {
		use std::{env, fs};

		let mut path = env::temp_dir();

		path.push(format!("edgar_config_test_{}.toml", std::process::id()));
		fs::write(&path, rendered).expect("Failed to write temp config.");

		path
	};
	let cfg = edgar_config::load(&path).expect("Config must load.");

	std::fs::remove_file(&path).ok();

	assert_eq!(cfg.extraction.ticker_stoplist, vec!["ARE".to_string(), "IT".to_string()]);
}
