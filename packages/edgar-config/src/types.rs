use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub edgar: Edgar,
	pub backends: Backends,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub extraction: Extraction,
	#[serde(default)]
	pub classifier: Classifier,
	#[serde(default)]
	pub discovery: Discovery,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Edgar {
	/// SEC fair-access policy requires "<product> (<contact email>)".
	pub user_agent: String,
	#[serde(default = "default_rate_limit_per_second")]
	pub rate_limit_per_second: u32,
	#[serde(default = "default_rate_limit_burst")]
	pub rate_limit_burst: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Backends {
	pub primary: BackendConfig,
	pub fallback: FallbackConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BackendConfig {
	pub api_base: String,
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_backend_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FallbackConfig {
	#[serde(default = "default_fallback_api_base")]
	pub api_base: String,
	#[serde(default = "default_fallback_archives_base")]
	pub archives_base: String,
	#[serde(default = "default_fallback_tickers_url")]
	pub tickers_url: String,
	#[serde(default = "default_backend_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Orchestrator {
	pub max_concurrent_steps: u32,
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
	pub step_timeout_ms: u64,
	pub query_timeout_ms: u64,
}
impl Default for Orchestrator {
	fn default() -> Self {
		Self {
			max_concurrent_steps: 4,
			max_attempts: 3,
			base_backoff_ms: 500,
			max_backoff_ms: 30_000,
			step_timeout_ms: 15_000,
			query_timeout_ms: 90_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Extraction {
	/// Uppercase tokens excluded from ticker detection. Tuned data, not a contract.
	pub ticker_stoplist: Vec<String>,
	pub single_letter_ticker_confidence: f32,
}
impl Default for Extraction {
	fn default() -> Self {
		Self {
			ticker_stoplist: default_ticker_stoplist(),
			single_letter_ticker_confidence: 0.3,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Classifier {
	pub tie_epsilon: f32,
	pub low_confidence_floor: f32,
}
impl Default for Classifier {
	fn default() -> Self {
		Self { tie_epsilon: 0.05, low_confidence_floor: 0.3 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Discovery {
	pub max_companies: u32,
	pub worker_concurrency: u32,
	pub channel_capacity: u32,
}
impl Default for Discovery {
	fn default() -> Self {
		Self { max_companies: 64, worker_concurrency: 4, channel_capacity: 64 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub bm25_k1: f32,
	pub bm25_b: f32,
	pub proximity_window: u32,
	pub proximity_bonus: f32,
	pub section_boost: f32,
	pub snippet_max_chars: u32,
	pub max_results: u32,
	pub passage_tokens: u32,
	pub fetch_concurrency: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			bm25_k1: 1.2,
			bm25_b: 0.75,
			proximity_window: 5,
			proximity_bonus: 0.25,
			section_boost: 1.5,
			snippet_max_chars: 400,
			max_results: 20,
			passage_tokens: 256,
			fetch_concurrency: 4,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub company_ttl_hours: i64,
	pub filing_list_ttl_minutes: i64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { company_ttl_hours: 12, filing_list_ttl_minutes: 15 }
	}
}

fn default_rate_limit_per_second() -> u32 {
	10
}

fn default_rate_limit_burst() -> u32 {
	10
}

fn default_backend_timeout_ms() -> u64 {
	15_000
}

fn default_fallback_api_base() -> String {
	"https://data.sec.gov".to_string()
}

fn default_fallback_archives_base() -> String {
	"https://www.sec.gov/Archives".to_string()
}

fn default_fallback_tickers_url() -> String {
	"https://www.sec.gov/files/company_tickers.json".to_string()
}

fn default_ticker_stoplist() -> Vec<String> {
	[
		"A", "ALL", "AN", "AND", "ANY", "ARE", "AS", "AT", "BE", "BIG", "BY", "CAN", "CEO", "CFO",
		"DID", "DO", "EPS", "ETF", "FOR", "GAAP", "HAS", "HOW", "IN", "IPO", "IS", "IT", "ITS",
		"LLC", "LTD", "MAY", "NEW", "NOT", "NOW", "OF", "ON", "ONE", "OR", "OUT", "OWN", "PER",
		"SEC", "SEE", "SO", "THE", "TO", "TOP", "US", "USA", "WAS", "WHO", "WHY", "YET",
	]
	.into_iter()
	.map(str::to_string)
	.collect()
}
