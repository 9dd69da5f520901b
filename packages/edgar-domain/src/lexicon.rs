use serde::{Deserialize, Serialize};

/// Well-known issuer aliases. Lookup keys are lowercase; matches are
/// high-confidence because the alias unambiguously names one company.
pub const COMPANY_ALIASES: &[(&str, &str, &str)] = &[
	("alphabet", "Alphabet Inc.", "GOOGL"),
	("amazon", "Amazon.com, Inc.", "AMZN"),
	("amd", "Advanced Micro Devices, Inc.", "AMD"),
	("apple", "Apple Inc.", "AAPL"),
	("bank of america", "Bank of America Corporation", "BAC"),
	("berkshire hathaway", "Berkshire Hathaway Inc.", "BRK-B"),
	("boeing", "The Boeing Company", "BA"),
	("broadcom", "Broadcom Inc.", "AVGO"),
	("chevron", "Chevron Corporation", "CVX"),
	("cisco", "Cisco Systems, Inc.", "CSCO"),
	("coca-cola", "The Coca-Cola Company", "KO"),
	("disney", "The Walt Disney Company", "DIS"),
	("exxon", "Exxon Mobil Corporation", "XOM"),
	("exxonmobil", "Exxon Mobil Corporation", "XOM"),
	("facebook", "Meta Platforms, Inc.", "META"),
	("ford", "Ford Motor Company", "F"),
	("general motors", "General Motors Company", "GM"),
	("goldman sachs", "The Goldman Sachs Group, Inc.", "GS"),
	("google", "Alphabet Inc.", "GOOGL"),
	("ibm", "International Business Machines Corporation", "IBM"),
	("intel", "Intel Corporation", "INTC"),
	("johnson & johnson", "Johnson & Johnson", "JNJ"),
	("jpmorgan", "JPMorgan Chase & Co.", "JPM"),
	("meta", "Meta Platforms, Inc.", "META"),
	("microsoft", "Microsoft Corporation", "MSFT"),
	("netflix", "Netflix, Inc.", "NFLX"),
	("nvidia", "NVIDIA Corporation", "NVDA"),
	("oracle", "Oracle Corporation", "ORCL"),
	("pepsico", "PepsiCo, Inc.", "PEP"),
	("pfizer", "Pfizer Inc.", "PFE"),
	("salesforce", "Salesforce, Inc.", "CRM"),
	("tesla", "Tesla, Inc.", "TSLA"),
	("walmart", "Walmart Inc.", "WMT"),
	("wells fargo", "Wells Fargo & Company", "WFC"),
];

/// Corporate suffixes that mark a capitalized phrase as a company mention.
pub const CORPORATE_SUFFIXES: &[&str] = &["Inc", "Corp", "Corporation", "Company", "Co", "LLC", "Ltd"];

/// Natural-language aliases for SEC form identifiers. Keys are lowercase.
pub const FORM_ALIASES: &[(&str, &str)] = &[
	("annual report", "10-K"),
	("current report", "8-K"),
	("insider transaction", "Form 4"),
	("ownership report", "Form 4"),
	("proxy statement", "DEF 14A"),
	("quarterly report", "10-Q"),
	("registration statement", "S-1"),
	("shelf registration", "S-3"),
	("tender offer", "SC TO-T"),
];

/// Recognized form labels, matched punctuation-insensitively ("10K" = "10-K").
pub const FORM_LABELS: &[&str] = &[
	"10-K", "10-K/A", "10-Q", "10-Q/A", "11-K", "13F-HR", "20-F", "40-F", "424B5", "6-K", "8-K",
	"8-K/A", "DEF 14A", "DEFA14A", "Form 3", "Form 4", "Form 5", "S-1", "S-3", "S-4", "SC 13D",
	"SC 13G", "SD",
];

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
	Financial,
	Risk,
	Governance,
	Operations,
	Regulatory,
}
impl TopicCategory {
	pub const ALL: [Self; 5] =
		[Self::Financial, Self::Risk, Self::Governance, Self::Operations, Self::Regulatory];

	pub fn keywords(self) -> &'static [&'static str] {
		match self {
			Self::Financial => &[
				"cash flow", "dividend", "earnings", "ebitda", "gross margin", "guidance",
				"income", "liquidity", "margin", "net loss", "profit", "revenue", "sales",
			],
			Self::Risk => &[
				"breach", "climate risk", "competition", "concentration", "cybersecurity",
				"data breach", "hacking", "impairment", "litigation", "ransomware", "risk",
				"uncertainty", "volatility",
			],
			Self::Governance => &[
				"audit committee", "board", "compensation", "director", "executive",
				"governance", "proxy", "shareholder", "succession", "vote",
			],
			Self::Operations => &[
				"acquisition", "capacity", "divestiture", "expansion", "headcount",
				"manufacturing", "merger", "restructuring", "strategy", "supply chain",
				"workforce",
			],
			Self::Regulatory => &[
				"antitrust", "compliance", "enforcement", "fine", "investigation",
				"regulation", "regulatory", "sanction", "settlement", "subpoena", "tariff",
			],
		}
	}

	/// Section headings worth boosting when a query carries this topic.
	pub fn boosted_sections(self) -> &'static [&'static str] {
		match self {
			Self::Financial => &["management's discussion", "md&a", "financial statements"],
			Self::Risk => &["risk factors", "quantitative and qualitative disclosures"],
			Self::Governance => &["directors", "executive compensation", "corporate governance"],
			Self::Operations => &["business", "properties", "management's discussion"],
			Self::Regulatory => &["legal proceedings", "risk factors"],
		}
	}
}

/// Canonical form label for a punctuation-stripped, uppercased token, e.g.
/// "10K" or "DEF14A". Returns `None` for unrecognized tokens.
pub fn canonical_form_label(compact: &str) -> Option<&'static str> {
	FORM_LABELS.iter().find(|label| compact_label(label) == compact).copied()
}

pub fn compact_label(label: &str) -> String {
	label
		.chars()
		.filter(|ch| ch.is_ascii_alphanumeric() || *ch == '/')
		.collect::<String>()
		.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn form_labels_match_punctuation_variants() {
		assert_eq!(canonical_form_label("10K"), Some("10-K"));
		assert_eq!(canonical_form_label("10Q"), Some("10-Q"));
		assert_eq!(canonical_form_label("DEF14A"), Some("DEF 14A"));
		assert_eq!(canonical_form_label("13FHR"), Some("13F-HR"));
		assert_eq!(canonical_form_label("9K"), None);
	}

	#[test]
	fn every_category_has_keywords_and_sections() {
		for category in TopicCategory::ALL {
			assert!(!category.keywords().is_empty());
			assert!(!category.boosted_sections().is_empty());
		}
	}

	#[test]
	fn company_aliases_are_lowercase_keys() {
		for (alias, _, ticker) in COMPANY_ALIASES {
			assert_eq!(*alias, alias.to_lowercase());
			assert_eq!(*ticker, ticker.to_uppercase());
		}
	}
}
