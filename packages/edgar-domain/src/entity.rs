use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	lexicon::{self, COMPANY_ALIASES, CORPORATE_SUFFIXES, FORM_ALIASES, FORM_LABELS, TopicCategory},
	timeexpr::{TimeExpression, TimePatterns},
};
use edgar_config::Extraction;

const ALIAS_CONFIDENCE: f32 = 0.95;
const SUFFIX_CONFIDENCE: f32 = 0.7;
const DOLLAR_TICKER_CONFIDENCE: f32 = 0.9;
const BARE_TICKER_CONFIDENCE: f32 = 0.8;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EntitySet {
	pub companies: Vec<CompanyMention>,
	pub tickers: Vec<TickerMention>,
	pub forms: Vec<FormMention>,
	pub time_expressions: Vec<TimeExpression>,
	pub topics: Vec<TopicMention>,
}
impl EntitySet {
	pub fn is_empty(&self) -> bool {
		self.companies.is_empty()
			&& self.tickers.is_empty()
			&& self.forms.is_empty()
			&& self.time_expressions.is_empty()
			&& self.topics.is_empty()
	}

	pub fn best_company_confidence(&self) -> f32 {
		self.companies
			.iter()
			.map(|company| company.confidence)
			.chain(self.tickers.iter().map(|ticker| ticker.confidence))
			.fold(0.0, f32::max)
	}

	pub fn has_topic_category(&self, category: TopicCategory) -> bool {
		self.topics.iter().any(|topic| topic.category == category)
	}

	/// Human-readable recap attached to error results so callers can suggest a
	/// reformulated query.
	pub fn summary(&self) -> String {
		let mut parts = Vec::new();

		if !self.companies.is_empty() {
			let names: Vec<&str> =
				self.companies.iter().map(|company| company.name.as_str()).collect();

			parts.push(format!("companies: {}", names.join(", ")));
		}
		if !self.tickers.is_empty() {
			let symbols: Vec<&str> =
				self.tickers.iter().map(|ticker| ticker.symbol.as_str()).collect();

			parts.push(format!("tickers: {}", symbols.join(", ")));
		}
		if !self.forms.is_empty() {
			let forms: Vec<&str> = self.forms.iter().map(|form| form.form.as_str()).collect();

			parts.push(format!("forms: {}", forms.join(", ")));
		}
		if !self.time_expressions.is_empty() {
			let ranges: Vec<&str> = self
				.time_expressions
				.iter()
				.map(|expression| expression.source_text.as_str())
				.collect();

			parts.push(format!("periods: {}", ranges.join(", ")));
		}
		if !self.topics.is_empty() {
			let keywords: Vec<&str> =
				self.topics.iter().map(|topic| topic.keyword.as_str()).collect();

			parts.push(format!("topics: {}", keywords.join(", ")));
		}
		if parts.is_empty() {
			return "no recognized entities".to_string();
		}

		parts.join("; ")
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CompanyMention {
	pub name: String,
	pub ticker: Option<String>,
	pub confidence: f32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TickerMention {
	pub symbol: String,
	pub confidence: f32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FormMention {
	pub form: String,
	pub source_text: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TopicMention {
	pub keyword: String,
	pub category: TopicCategory,
}

/// Pure entity extractor. All patterns compile once at construction; `extract`
/// itself does string work only, no I/O and no wall clock.
#[derive(Debug)]
pub struct Extractor {
	stoplist: HashSet<String>,
	single_letter_confidence: f32,
	suffix_company: Regex,
	dollar_ticker: Regex,
	form_label: Regex,
	time: TimePatterns,
}
impl Extractor {
	pub fn new(cfg: &Extraction) -> Result<Self, regex::Error> {
		let suffixes = CORPORATE_SUFFIXES.join("|");
		// The boundary class accepts an apostrophe so possessive mentions like
		// "Acme Corp's report" still match.
		let suffix_company = Regex::new(&format!(
			r"\b([A-Z][A-Za-z0-9&.'-]*(?:\s+[A-Z][A-Za-z0-9&.'-]*)*\s+(?:{suffixes})\.?)(?:\s|$|[,;:!?)'])"
		))?;
		let dollar_ticker = Regex::new(r"\$([A-Za-z]{1,5})\b")?;
		let form_label = Regex::new(&form_label_pattern())?;

		Ok(Self {
			stoplist: cfg.ticker_stoplist.iter().map(|token| token.to_ascii_uppercase()).collect(),
			single_letter_confidence: cfg.single_letter_ticker_confidence,
			suffix_company,
			dollar_ticker,
			form_label,
			time: TimePatterns::new()?,
		})
	}

	pub fn extract(&self, query: &str, now: OffsetDateTime) -> EntitySet {
		let lower = query.to_lowercase();
		let mut companies = Vec::new();
		let mut company_spans: Vec<(usize, usize)> = Vec::new();

		for (alias, canonical, ticker) in COMPANY_ALIASES {
			let Some(span) = find_word(&lower, alias) else { continue };

			company_spans.push(span);
			merge_company(
				&mut companies,
				CompanyMention {
					name: (*canonical).to_string(),
					ticker: Some((*ticker).to_string()),
					confidence: ALIAS_CONFIDENCE,
				},
			);
		}

		for captures in self.suffix_company.captures_iter(query) {
			let Some(matched) = captures.get(1) else { continue };
			let span = (matched.start(), matched.end());

			// An alias hit over the same text is the higher-confidence reading.
			if overlaps(&company_spans, span) {
				continue;
			}

			company_spans.push(span);
			merge_company(
				&mut companies,
				CompanyMention {
					name: matched.as_str().trim_end_matches('.').to_string(),
					ticker: None,
					confidence: SUFFIX_CONFIDENCE,
				},
			);
		}

		let mut tickers: Vec<TickerMention> = Vec::new();

		for captures in self.dollar_ticker.captures_iter(query) {
			let Some(matched) = captures.get(1) else { continue };

			merge_ticker(
				&mut tickers,
				TickerMention {
					symbol: matched.as_str().to_ascii_uppercase(),
					confidence: DOLLAR_TICKER_CONFIDENCE,
				},
			);
		}

		let mut forms = Vec::new();
		let mut form_spans: Vec<(usize, usize)> = Vec::new();

		for matched in self.form_label.find_iter(query) {
			let singular = matched.as_str().trim_end_matches(['s', 'S']);
			let compact = lexicon::compact_label(singular);
			let Some(form) = lexicon::canonical_form_label(&compact) else { continue };

			form_spans.push((matched.start(), matched.end()));

			if forms.iter().any(|mention: &FormMention| mention.form == form) {
				continue;
			}

			forms.push(FormMention {
				form: form.to_string(),
				source_text: matched.as_str().to_string(),
			});
		}
		for (alias, form) in FORM_ALIASES {
			if find_word(&lower, alias).is_none() {
				continue;
			}
			if forms.iter().any(|mention| mention.form == *form) {
				continue;
			}

			forms.push(FormMention { form: (*form).to_string(), source_text: (*alias).to_string() });
		}

		for (offset, word) in bare_ticker_candidates(query) {
			let span = (offset, offset + word.len());

			// Prefer the company or form reading for text already claimed.
			if overlaps(&company_spans, span) || overlaps(&form_spans, span) {
				continue;
			}
			if self.stoplist.contains(word) {
				continue;
			}

			let confidence = if word.len() == 1 {
				self.single_letter_confidence
			} else {
				BARE_TICKER_CONFIDENCE
			};

			merge_ticker(&mut tickers, TickerMention { symbol: word.to_string(), confidence });
		}

		let mut topics = Vec::new();

		for category in TopicCategory::ALL {
			for keyword in category.keywords() {
				if find_word(&lower, keyword).is_none() {
					continue;
				}
				if topics
					.iter()
					.any(|topic: &TopicMention| topic.keyword == *keyword)
				{
					continue;
				}

				topics.push(TopicMention { keyword: (*keyword).to_string(), category });
			}
		}

		EntitySet {
			companies,
			tickers,
			forms,
			time_expressions: self.time.detect(query, now.date()),
			topics,
		}
	}
}

/// Uppercase 1-5 letter tokens with clean boundaries. Tokens adjacent to a
/// digit, dash, or dollar sign are parts of other constructs, not tickers.
fn bare_ticker_candidates(query: &str) -> Vec<(usize, &str)> {
	let mut out = Vec::new();
	let mut begin: Option<usize> = None;

	for (idx, ch) in query.char_indices().chain([(query.len(), ' ')]) {
		if ch.is_ascii_uppercase() {
			begin.get_or_insert(idx);

			continue;
		}

		let Some(start) = begin.take() else {
			continue;
		};
		let possessive = ch == '\'' && query[idx..].starts_with("'s");

		if (ch.is_alphanumeric() || ch == '-') && !possessive {
			// Mixed-case word or hyphenated label, not a ticker.
			continue;
		}

		let word = &query[start..idx];

		if word.is_empty() || word.len() > 5 {
			continue;
		}

		let before = query[..start].chars().next_back();

		if before.map(|ch| ch.is_alphanumeric() || ch == '-' || ch == '$').unwrap_or(false) {
			continue;
		}

		out.push((start, word));
	}

	out
}

fn form_label_pattern() -> String {
	let mut compacts: Vec<String> =
		FORM_LABELS.iter().map(|label| lexicon::compact_label(label)).collect();

	// Longest first so the alternation prefers "10-K/A" over "10-K".
	compacts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
	compacts.dedup();

	let alternates: Vec<String> = compacts
		.iter()
		.map(|compact| {
			let mut pattern = String::new();

			for (idx, ch) in compact.chars().enumerate() {
				if idx > 0 {
					pattern.push_str(r"[\s-]?");
				}

				pattern.push_str(&regex::escape(&ch.to_string()));
			}

			pattern
		})
		.collect();

	format!(r"(?i)\b(?:{})s?\b", alternates.join("|"))
}

fn find_word(haystack: &str, needle: &str) -> Option<(usize, usize)> {
	let mut search_from = 0;

	while let Some(found) = haystack[search_from..].find(needle) {
		let start = search_from + found;
		let end = start + needle.len();
		let clean_before =
			haystack[..start].chars().next_back().map(|ch| !ch.is_alphanumeric()).unwrap_or(true);
		let clean_after =
			haystack[end..].chars().next().map(|ch| !ch.is_alphanumeric()).unwrap_or(true);

		if clean_before && clean_after {
			return Some((start, end));
		}

		search_from = end;
	}

	None
}

fn overlaps(spans: &[(usize, usize)], span: (usize, usize)) -> bool {
	spans.iter().any(|(start, end)| span.0 < *end && span.1 > *start)
}

/// Comparison key for duplicate detection: lowercased, trailing punctuation
/// stripped, and a trailing corporate suffix dropped so "Apple", "Apple Inc",
/// and "Apple Inc." all read as the same company.
fn company_key(name: &str) -> String {
	let lower = name.to_lowercase();
	let mut key = lower.trim().trim_end_matches(['.', ',']).trim_end();

	for suffix in CORPORATE_SUFFIXES {
		let Some(stem) = key.strip_suffix(&suffix.to_lowercase()) else { continue };
		let Some(stem) = stem.strip_suffix(' ') else { continue };
		let stem = stem.trim_end().trim_end_matches(',').trim_end();

		if !stem.is_empty() {
			key = stem;
		}

		break;
	}

	key.to_string()
}

fn merge_company(companies: &mut Vec<CompanyMention>, mention: CompanyMention) {
	let key = company_key(&mention.name);

	if let Some(existing) =
		companies.iter_mut().find(|company| company_key(&company.name) == key)
	{
		if mention.confidence > existing.confidence {
			*existing = mention;
		}

		return;
	}

	companies.push(mention);
}

fn merge_ticker(tickers: &mut Vec<TickerMention>, mention: TickerMention) {
	if let Some(existing) = tickers.iter_mut().find(|ticker| ticker.symbol == mention.symbol) {
		if mention.confidence > existing.confidence {
			existing.confidence = mention.confidence;
		}

		return;
	}

	tickers.push(mention);
}
