use serde::{Deserialize, Serialize};

use crate::entity::EntitySet;
use edgar_config::Classifier;

const COMPANY_PRESENCE_WEIGHT: f32 = 0.3;
const COMPANY_CONFIDENCE_WEIGHT: f32 = 0.4;
const COMPANY_POSSESSIVE_WEIGHT: f32 = 0.2;
const COMPANY_SINGULAR_WEIGHT: f32 = 0.1;
const THEMATIC_CUE_WEIGHT: f32 = 0.4;
const THEMATIC_EXTRA_CUE_WEIGHT: f32 = 0.1;
const THEMATIC_TOPIC_WEIGHT: f32 = 0.2;
const THEMATIC_TIME_WEIGHT: f32 = 0.1;
const THEMATIC_NO_COMPANY_WEIGHT: f32 = 0.2;
const METADATA_CUE_WEIGHT: f32 = 0.5;
const METADATA_FORM_WEIGHT: f32 = 0.2;
const METADATA_NO_TOPIC_WEIGHT: f32 = 0.2;
const FALLBACK_CONFIDENCE: f32 = 0.2;

const THEMATIC_CUES: &[&str] = &[
	"across companies",
	"across the industry",
	"all companies",
	"any companies",
	"companies that",
	"companies with",
	"compare",
	"competitors",
	"industry",
	"peer",
	"sector",
	"which companies",
	"which firms",
];

const METADATA_CUES: &[&str] = &[
	"count of",
	"how many",
	"how often",
	"list",
	"most recent filings",
	"number of",
	"when did",
	"when was",
];

/// Execution patterns, in tie-break priority order: when two scores land
/// within the configured epsilon, the earlier variant wins.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPattern {
	CompanySpecific,
	MetadataOnly,
	Hybrid,
	Thematic,
}
impl QueryPattern {
	pub const PRIORITY: [Self; 4] =
		[Self::CompanySpecific, Self::MetadataOnly, Self::Hybrid, Self::Thematic];

	pub fn label(self) -> &'static str {
		match self {
			Self::CompanySpecific => "company_specific",
			Self::MetadataOnly => "metadata_only",
			Self::Hybrid => "hybrid",
			Self::Thematic => "thematic",
		}
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Classification {
	pub pattern: QueryPattern,
	pub confidence: f32,
	pub entities: EntitySet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PatternScores {
	pub company: f32,
	pub thematic: f32,
	pub hybrid: f32,
	pub metadata: f32,
}
impl PatternScores {
	fn get(&self, pattern: QueryPattern) -> f32 {
		match pattern {
			QueryPattern::CompanySpecific => self.company,
			QueryPattern::Thematic => self.thematic,
			QueryPattern::Hybrid => self.hybrid,
			QueryPattern::MetadataOnly => self.metadata,
		}
	}
}

pub fn classify(entities: &EntitySet, raw_query: &str, cfg: &Classifier) -> Classification {
	let scores = score_patterns(entities, raw_query);
	let top = QueryPattern::PRIORITY
		.into_iter()
		.map(|pattern| scores.get(pattern))
		.fold(0.0, f32::max);

	if top <= 0.0 {
		// Nothing recognizable: cheapest retrieval path, low confidence.
		return Classification {
			pattern: QueryPattern::MetadataOnly,
			confidence: FALLBACK_CONFIDENCE.min(cfg.low_confidence_floor),
			entities: entities.clone(),
		};
	}

	// Every pattern within epsilon of the top competes; the fixed priority
	// order breaks the tie so classification stays reproducible.
	let pattern = QueryPattern::PRIORITY
		.into_iter()
		.find(|pattern| scores.get(*pattern) >= top - cfg.tie_epsilon)
		.unwrap_or(QueryPattern::MetadataOnly);

	Classification { pattern, confidence: scores.get(pattern), entities: entities.clone() }
}

pub fn score_patterns(entities: &EntitySet, raw_query: &str) -> PatternScores {
	let lower = raw_query.to_lowercase();
	let best_company = entities.best_company_confidence();
	let has_company = best_company > 0.0;
	let thematic_cue_hits =
		THEMATIC_CUES.iter().filter(|cue| lower.contains(*cue)).count();
	let possessive = lower.contains("'s ")
		|| lower.ends_with("'s")
		|| lower.contains("their latest")
		|| lower.contains("its latest");

	let mut company = 0.0;

	if has_company {
		company += COMPANY_PRESENCE_WEIGHT + COMPANY_CONFIDENCE_WEIGHT * best_company;

		if possessive {
			company += COMPANY_POSSESSIVE_WEIGHT;
		}
		if thematic_cue_hits == 0 {
			company += COMPANY_SINGULAR_WEIGHT;
		}
	}

	let mut thematic = 0.0;

	if thematic_cue_hits > 0 {
		thematic += THEMATIC_CUE_WEIGHT
			+ THEMATIC_EXTRA_CUE_WEIGHT * (thematic_cue_hits - 1) as f32;
	}
	if !entities.topics.is_empty() {
		thematic += THEMATIC_TOPIC_WEIGHT;
	}
	if !entities.time_expressions.is_empty() {
		thematic += THEMATIC_TIME_WEIGHT;
	}
	if !has_company {
		thematic += THEMATIC_NO_COMPANY_WEIGHT;
	}
	if thematic_cue_hits == 0 && entities.topics.is_empty() {
		// Time alone does not make a query thematic.
		thematic = 0.0;
	}

	let metadata_cue = METADATA_CUES.iter().any(|cue| lower.contains(cue));
	let mut metadata = 0.0;

	if metadata_cue {
		metadata += METADATA_CUE_WEIGHT;

		if !entities.forms.is_empty() {
			metadata += METADATA_FORM_WEIGHT;
		}
		if entities.topics.is_empty() {
			metadata += METADATA_NO_TOPIC_WEIGHT;
		}
	}

	// Compatibility: Hybrid is the capped sum even when one constituent is
	// individually weak. Revisit only with evidence from real traffic.
	let hybrid = if company > 0.0 && thematic > 0.0 {
		(company + thematic).min(1.0)
	} else {
		0.0
	};

	PatternScores {
		company: company.min(1.0),
		thematic: thematic.min(1.0),
		hybrid,
		metadata: metadata.min(1.0),
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;
	use crate::entity::Extractor;
	use edgar_config::Extraction;

	fn classify_query(query: &str) -> Classification {
		let extractor = Extractor::new(&Extraction::default()).expect("Extractor must build.");
		let entities = extractor.extract(query, datetime!(2025 - 02 - 01 12:00 UTC));

		classify(&entities, query, &Classifier::default())
	}

	#[test]
	fn company_question_classifies_company_specific() {
		let classification = classify_query("What was Apple's revenue in Q3 2024?");

		assert_eq!(classification.pattern, QueryPattern::CompanySpecific);
		assert!(classification.confidence >= 0.8);
	}

	#[test]
	fn industry_wide_question_classifies_thematic() {
		let classification = classify_query("All companies mentioning cybersecurity risk");

		assert_eq!(classification.pattern, QueryPattern::Thematic);
		assert!(classification.confidence >= 0.6);
	}

	#[test]
	fn comparison_question_classifies_hybrid() {
		let classification =
			classify_query("Compare Apple's AI strategy to the broader tech sector");

		assert_eq!(classification.pattern, QueryPattern::Hybrid);

		let entities = Extractor::new(&Extraction::default())
			.expect("Extractor must build.")
			.extract(
				"Compare Apple's AI strategy to the broader tech sector",
				datetime!(2025 - 02 - 01 12:00 UTC),
			);
		let scores = score_patterns(
			&entities,
			"Compare Apple's AI strategy to the broader tech sector",
		);

		assert_eq!(classification.confidence, (scores.company + scores.thematic).min(1.0));
	}

	#[test]
	fn counting_question_classifies_metadata_only() {
		let classification = classify_query("How many 8-Ks did the exchange receive last year?");

		assert_eq!(classification.pattern, QueryPattern::MetadataOnly);
		assert!(classification.confidence >= 0.7);
	}

	#[test]
	fn empty_query_defaults_to_low_confidence_metadata() {
		let classification = classify_query("");

		assert_eq!(classification.pattern, QueryPattern::MetadataOnly);
		assert!(classification.confidence <= 0.3);
	}

	#[test]
	fn near_ties_resolve_by_fixed_priority() {
		let extractor = Extractor::new(&Extraction::default()).expect("Extractor must build.");
		let query = "What was Apple's revenue in Q3 2024?";
		let entities = extractor.extract(query, datetime!(2025 - 02 - 01 12:00 UTC));
		let scores = score_patterns(&entities, query);

		// The capped hybrid score sits within epsilon of the company score;
		// priority must pick CompanySpecific, not Hybrid.
		assert!(scores.hybrid >= scores.company);
		assert!(scores.hybrid - scores.company < 0.05);
		assert_eq!(
			classify(&entities, query, &Classifier::default()).pattern,
			QueryPattern::CompanySpecific,
		);
	}

	#[test]
	fn classification_is_deterministic() {
		let first = classify_query("Which companies disclosed supply chain issues this year?");
		let second = classify_query("Which companies disclosed supply chain issues this year?");

		assert_eq!(first.pattern, second.pattern);
		assert_eq!(first.confidence, second.confidence);
	}
}
