mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BackendConfig, Backends, Cache, Classifier, Config, Discovery, Edgar, Extraction,
	FallbackConfig, Orchestrator, Search,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.edgar.user_agent.trim().is_empty() {
		return Err(Error::Validation {
			message: "edgar.user_agent must be non-empty; SEC requires a product and contact."
				.to_string(),
		});
	}
	if !cfg.edgar.user_agent.contains('@') {
		return Err(Error::Validation {
			message: "edgar.user_agent must include a contact email address.".to_string(),
		});
	}
	if cfg.edgar.rate_limit_per_second == 0 {
		return Err(Error::Validation {
			message: "edgar.rate_limit_per_second must be greater than zero.".to_string(),
		});
	}
	if cfg.edgar.rate_limit_burst == 0 {
		return Err(Error::Validation {
			message: "edgar.rate_limit_burst must be greater than zero.".to_string(),
		});
	}
	if cfg.backends.primary.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.primary.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.backends.fallback.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.fallback.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.backends.fallback.archives_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.fallback.archives_base must be non-empty.".to_string(),
		});
	}
	if cfg.backends.fallback.tickers_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "backends.fallback.tickers_url must be non-empty.".to_string(),
		});
	}

	for (label, timeout) in [
		("backends.primary.timeout_ms", cfg.backends.primary.timeout_ms),
		("backends.fallback.timeout_ms", cfg.backends.fallback.timeout_ms),
	] {
		if timeout == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.orchestrator.max_concurrent_steps == 0 {
		return Err(Error::Validation {
			message: "orchestrator.max_concurrent_steps must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.max_attempts == 0 {
		return Err(Error::Validation {
			message: "orchestrator.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "orchestrator.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.max_backoff_ms < cfg.orchestrator.base_backoff_ms {
		return Err(Error::Validation {
			message: "orchestrator.max_backoff_ms must be at least orchestrator.base_backoff_ms."
				.to_string(),
		});
	}
	if cfg.orchestrator.step_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "orchestrator.step_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.query_timeout_ms < cfg.orchestrator.step_timeout_ms {
		return Err(Error::Validation {
			message:
				"orchestrator.query_timeout_ms must be at least orchestrator.step_timeout_ms."
					.to_string(),
		});
	}

	if !(0.0..=1.0).contains(&cfg.extraction.single_letter_ticker_confidence) {
		return Err(Error::Validation {
			message: "extraction.single_letter_ticker_confidence must be in the range 0.0-1.0."
				.to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.classifier.tie_epsilon) {
		return Err(Error::Validation {
			message: "classifier.tie_epsilon must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.classifier.low_confidence_floor) {
		return Err(Error::Validation {
			message: "classifier.low_confidence_floor must be in the range 0.0-1.0.".to_string(),
		});
	}

	if cfg.discovery.max_companies == 0 {
		return Err(Error::Validation {
			message: "discovery.max_companies must be greater than zero.".to_string(),
		});
	}
	if cfg.discovery.worker_concurrency == 0 {
		return Err(Error::Validation {
			message: "discovery.worker_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.discovery.channel_capacity == 0 {
		return Err(Error::Validation {
			message: "discovery.channel_capacity must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [("search.bm25_k1", cfg.search.bm25_k1), ("search.bm25_b", cfg.search.bm25_b)]
	{
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number of zero or greater."),
			});
		}
	}
	if cfg.search.bm25_b > 1.0 {
		return Err(Error::Validation {
			message: "search.bm25_b must be 1.0 or less.".to_string(),
		});
	}
	if cfg.search.proximity_window == 0 {
		return Err(Error::Validation {
			message: "search.proximity_window must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.proximity_bonus.is_finite() || cfg.search.proximity_bonus < 0.0 {
		return Err(Error::Validation {
			message: "search.proximity_bonus must be a finite number of zero or greater."
				.to_string(),
		});
	}
	if !cfg.search.section_boost.is_finite() || cfg.search.section_boost < 1.0 {
		return Err(Error::Validation {
			message: "search.section_boost must be a finite number of 1.0 or greater.".to_string(),
		});
	}
	if cfg.search.snippet_max_chars == 0 {
		return Err(Error::Validation {
			message: "search.snippet_max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_results == 0 {
		return Err(Error::Validation {
			message: "search.max_results must be greater than zero.".to_string(),
		});
	}
	if cfg.search.passage_tokens == 0 {
		return Err(Error::Validation {
			message: "search.passage_tokens must be greater than zero.".to_string(),
		});
	}
	if cfg.search.fetch_concurrency == 0 {
		return Err(Error::Validation {
			message: "search.fetch_concurrency must be greater than zero.".to_string(),
		});
	}

	if cfg.cache.company_ttl_hours <= 0 {
		return Err(Error::Validation {
			message: "cache.company_ttl_hours must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.filing_list_ttl_minutes <= 0 {
		return Err(Error::Validation {
			message: "cache.filing_list_ttl_minutes must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.backends.primary.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.backends.primary.api_key = None;
	}

	for token in &mut cfg.extraction.ticker_stoplist {
		*token = token.trim().to_ascii_uppercase();
	}

	cfg.extraction.ticker_stoplist.retain(|token| !token.is_empty());
	cfg.extraction.ticker_stoplist.sort();
	cfg.extraction.ticker_stoplist.dedup();
}
