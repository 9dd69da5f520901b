use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinSet,
};
use unicode_segmentation::UnicodeSegmentation;

use crate::Result;
use edgar_config::Search;
use edgar_domain::{FilingRef, TopicCategory};
use edgar_providers::{FilingContent, RetrievalBackend};

/// Evidence pointer surfaced to the caller. `source_url` is always derived
/// from the filing reference, never free-form, so every citation resolves
/// against the real archive.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Citation {
	pub filing: FilingRef,
	pub section: Option<String>,
	pub snippet: String,
	pub score: f32,
	pub start_offset: Option<usize>,
	pub end_offset: Option<usize>,
	pub source_url: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SearchProgress {
	pub filings_searched: usize,
	pub total_filings: usize,
}

#[derive(Clone, Debug)]
struct Token {
	text: String,
	start: usize,
	end: usize,
}

struct Passage {
	doc: usize,
	char_start: usize,
	char_end: usize,
	token_count: usize,
	/// `(token position within passage, query term index, char offset)` for
	/// every query-term hit, in token order.
	hits: Vec<(usize, usize, usize)>,
}

/// Fetches each filing's text and ranks passages against the query. Content
/// fetches fan out concurrently under a bounded permit count; filings whose
/// content cannot be fetched are skipped with a warning, so thematic answers
/// degrade per-document, not wholesale. Input order is preserved regardless
/// of completion order, keeping the ranking deterministic.
pub async fn search(
	backend: Arc<dyn RetrievalBackend>,
	cfg: &Search,
	archives_base: &str,
	filings: &[FilingRef],
	query: &str,
	categories: &[TopicCategory],
	progress: Option<mpsc::Sender<SearchProgress>>,
) -> Result<Vec<Citation>> {
	let total_filings = filings.len();
	let semaphore = Arc::new(Semaphore::new(cfg.fetch_concurrency as usize));
	let mut set = JoinSet::new();

	for (idx, filing) in filings.iter().cloned().enumerate() {
		let backend = backend.clone();
		let semaphore = semaphore.clone();

		set.spawn(async move {
			let _permit = semaphore.acquire_owned().await;
			let outcome = backend.fetch_filing_content(&filing).await;

			(idx, filing, outcome)
		});
	}

	let mut slots: Vec<Option<(FilingRef, FilingContent)>> =
		(0..total_filings).map(|_| None).collect();
	let mut filings_searched = 0usize;

	while let Some(joined) = set.join_next().await {
		let Ok((idx, filing, outcome)) = joined else {
			continue;
		};

		filings_searched += 1;

		match outcome {
			Ok(content) => slots[idx] = Some((filing, content)),
			Err(err) => {
				tracing::warn!(
					accession = %filing.accession_number.dashed(),
					error = %err,
					"Search skipped a filing whose content could not be fetched.",
				);
			},
		}

		if let Some(progress) = &progress {
			let _ = progress.try_send(SearchProgress { filings_searched, total_filings });
		}
	}

	let docs: Vec<(FilingRef, FilingContent)> = slots.into_iter().flatten().collect();

	Ok(rank_passages(&docs, query, categories, cfg, archives_base))
}

/// Pure ranking core, separated from fetching so it is directly testable.
///
/// BM25 over fixed-size passages, with a multiplicative section boost when a
/// passage falls inside a section that matters for the query's topic
/// categories, and a proximity boost when every query term lands inside one
/// small token window. One citation per filing, near-duplicate snippets
/// deduplicated across amendments by content hash.
pub fn rank_passages(
	docs: &[(FilingRef, FilingContent)],
	query: &str,
	categories: &[TopicCategory],
	cfg: &Search,
	archives_base: &str,
) -> Vec<Citation> {
	let query_terms = query_terms(query);

	if query_terms.is_empty() || docs.is_empty() {
		return Vec::new();
	}

	let boosted_sections = boosted_sections(categories);
	let mut passages = Vec::new();
	let mut total_tokens = 0usize;

	for (doc, (_, content)) in docs.iter().enumerate() {
		let tokens = tokenize(&content.text);

		total_tokens += tokens.len();

		for chunk in tokens.chunks(cfg.passage_tokens as usize) {
			let Some(first) = chunk.first() else { continue };
			let Some(last) = chunk.last() else { continue };
			let hits = chunk
				.iter()
				.enumerate()
				.filter_map(|(position, token)| {
					query_terms
						.iter()
						.position(|term| *term == token.text)
						.map(|term| (position, term, token.start))
				})
				.collect();

			passages.push(Passage {
				doc,
				char_start: first.start,
				char_end: last.end,
				token_count: chunk.len(),
				hits,
			});
		}
	}

	if passages.is_empty() {
		return Vec::new();
	}

	let passage_count = passages.len() as f32;
	let avg_tokens = total_tokens as f32 / passage_count;
	let mut df = vec![0usize; query_terms.len()];

	for passage in &passages {
		let mut seen = vec![false; query_terms.len()];

		for (_, term, _) in &passage.hits {
			seen[*term] = true;
		}
		for (term, present) in seen.into_iter().enumerate() {
			if present {
				df[term] += 1;
			}
		}
	}

	let idf: Vec<f32> = df
		.iter()
		.map(|df| ((passage_count - *df as f32 + 0.5) / (*df as f32 + 0.5) + 1.0).ln())
		.collect();
	// Best passage per document.
	let mut best: Vec<Option<(f32, usize)>> = vec![None; docs.len()];

	for (idx, passage) in passages.iter().enumerate() {
		let mut tf = vec![0usize; query_terms.len()];

		for (_, term, _) in &passage.hits {
			tf[*term] += 1;
		}

		let mut score = 0.0;

		for (term, count) in tf.iter().enumerate() {
			if *count == 0 {
				continue;
			}

			let count = *count as f32;
			let norm = cfg.bm25_k1
				* (1.0 - cfg.bm25_b + cfg.bm25_b * passage.token_count as f32 / avg_tokens);

			score += idf[term] * count * (cfg.bm25_k1 + 1.0) / (count + norm);
		}

		if score <= 0.0 {
			continue;
		}

		if all_terms_within_window(passage, query_terms.len(), cfg.proximity_window as usize) {
			score *= 1.0 + cfg.proximity_bonus;
		}
		if let Some(label) = section_label(&docs[passage.doc].1, passage.char_start)
			&& boosted_sections.iter().any(|boosted| label.to_lowercase().contains(boosted))
		{
			score *= cfg.section_boost;
		}

		let replace = match best[passage.doc] {
			Some((top, _)) => score > top,
			None => true,
		};

		if replace {
			best[passage.doc] = Some((score, idx));
		}
	}

	let mut citations = Vec::new();

	for (doc, slot) in best.iter().enumerate() {
		let Some((score, passage_idx)) = slot else { continue };
		let passage = &passages[*passage_idx];
		let (filing, content) = &docs[doc];
		let (start_offset, end_offset) =
			snippet_span(&content.text, passage, cfg.snippet_max_chars as usize);
		let snippet = content.text[start_offset..end_offset].to_string();

		citations.push(Citation {
			section: section_label(content, passage.char_start).map(str::to_string),
			snippet,
			score: *score,
			start_offset: Some(start_offset),
			end_offset: Some(end_offset),
			source_url: filing.primary_url(archives_base),
			filing: filing.clone(),
		});
	}

	dedup_amendments(&mut citations);
	citations.sort_by(|a, b| {
		b.score
			.total_cmp(&a.score)
			.then_with(|| b.filing.filed_at.cmp(&a.filing.filed_at))
			.then_with(|| a.filing.accession_number.cmp(&b.filing.accession_number))
	});
	citations.truncate(cfg.max_results as usize);

	citations
}

fn query_terms(query: &str) -> Vec<String> {
	let mut terms: Vec<String> =
		tokenize(query).into_iter().map(|token| token.text).collect();

	terms.sort();
	terms.dedup();

	terms
}

fn tokenize(text: &str) -> Vec<Token> {
	text.split_word_bound_indices()
		.filter(|(_, word)| word.chars().any(char::is_alphanumeric))
		.map(|(start, word)| Token {
			text: word.to_lowercase(),
			start,
			end: start + word.len(),
		})
		.collect()
}

fn boosted_sections(categories: &[TopicCategory]) -> Vec<&'static str> {
	let mut sections: Vec<&'static str> = categories
		.iter()
		.flat_map(|category| category.boosted_sections().iter().copied())
		.collect();

	sections.sort();
	sections.dedup();

	sections
}

/// True when at least one occurrence of every query term fits inside a single
/// `window`-token span. Single-term queries never qualify; proximity is about
/// terms appearing together.
fn all_terms_within_window(passage: &Passage, term_count: usize, window: usize) -> bool {
	if term_count < 2 {
		return false;
	}

	let mut matched = vec![false; term_count];

	for (_, term, _) in &passage.hits {
		matched[*term] = true;
	}
	if matched.iter().any(|present| !present) {
		return false;
	}

	// Minimum covering window over the hit positions, two pointers.
	let mut counts = vec![0usize; term_count];
	let mut covered = 0usize;
	let mut left = 0usize;

	for right in 0..passage.hits.len() {
		let (_, term, _) = passage.hits[right];

		if counts[term] == 0 {
			covered += 1;
		}

		counts[term] += 1;

		while covered == term_count {
			let (left_position, left_term, _) = passage.hits[left];
			let (right_position, ..) = passage.hits[right];

			if right_position - left_position < window {
				return true;
			}

			counts[left_term] -= 1;

			if counts[left_term] == 0 {
				covered -= 1;
			}

			left += 1;
		}
	}

	false
}

fn section_label(content: &FilingContent, offset: usize) -> Option<&str> {
	content
		.sections
		.iter()
		.find(|section| section.start_offset <= offset && offset < section.end_offset)
		.map(|section| section.label.as_str())
}

/// Bounded snippet window centered on the passage's first query-term hit,
/// clamped to the passage and snapped to char boundaries so the recorded
/// offsets slice cleanly.
fn snippet_span(text: &str, passage: &Passage, max_chars: usize) -> (usize, usize) {
	let focus = passage.hits.first().map(|(_, _, offset)| *offset).unwrap_or(passage.char_start);
	let mut start = focus.saturating_sub(max_chars / 2).max(passage.char_start);
	let mut end = (start + max_chars).min(passage.char_end).min(text.len());

	while start > 0 && !text.is_char_boundary(start) {
		start -= 1;
	}
	while end > start && !text.is_char_boundary(end) {
		end -= 1;
	}

	(start, end)
}

/// Near-identical snippets from amendments of the same filer collapse to the
/// strongest one.
fn dedup_amendments(citations: &mut Vec<Citation>) {
	let mut best: AHashMap<(String, blake3::Hash), (f32, time::Date)> = AHashMap::new();

	for citation in citations.iter() {
		let key = (citation.filing.cik.padded().to_string(), snippet_hash(&citation.snippet));
		let candidate = (citation.score, citation.filing.filed_at);
		let entry = best.entry(key).or_insert(candidate);

		if candidate.0 > entry.0 || (candidate.0 == entry.0 && candidate.1 > entry.1) {
			*entry = candidate;
		}
	}

	citations.retain(|citation| {
		let key = (citation.filing.cik.padded().to_string(), snippet_hash(&citation.snippet));
		let keep = best
			.get(&key)
			.map(|(score, filed_at)| {
				citation.score == *score && citation.filing.filed_at == *filed_at
			})
			.unwrap_or(false);

		// Drop the entry only once its winner is kept, so a losing duplicate
		// examined earlier cannot evict it.
		if keep {
			best.remove(&key);
		}

		keep
	});
}

fn snippet_hash(snippet: &str) -> blake3::Hash {
	let normalized: Vec<String> =
		tokenize(snippet).into_iter().map(|token| token.text).collect();

	blake3::hash(normalized.join(" ").as_bytes())
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;
	use edgar_domain::{AccessionNumber, Cik};
	use edgar_providers::FilingSection;

	const ARCHIVES: &str = "https://www.sec.gov/Archives";

	fn filing(cik: &str, accession: &str, filed_at: time::Date) -> FilingRef {
		FilingRef {
			cik: Cik::new(cik).expect("CIK must parse."),
			accession_number: AccessionNumber::new(accession).expect("Accession must parse."),
			form: "10-K".to_string(),
			filed_at,
			primary_document: "report.htm".to_string(),
		}
	}

	fn doc(text: &str) -> FilingContent {
		FilingContent { text: text.to_string(), sections: Vec::new() }
	}

	fn cfg() -> Search {
		Search::default()
	}

	#[test]
	fn clustered_terms_beat_scattered_terms() {
		let filler = "the quarterly report discusses operations and outlook in detail ";
		let clustered = format!("{}cybersecurity breach incident response {}", filler, filler.repeat(8));
		let scattered = format!(
			"cybersecurity {} breach {} incident {} response",
			filler.repeat(3),
			filler.repeat(3),
			filler.repeat(3),
		);
		let docs = vec![
			(filing("100", "000000010024000001", date!(2024 - 01 - 01)), doc(&clustered)),
			(filing("200", "000000020024000001", date!(2024 - 01 - 01)), doc(&scattered)),
		];
		let results =
			rank_passages(&docs, "cybersecurity breach incident response", &[], &cfg(), ARCHIVES);

		assert_eq!(results.len(), 2);
		assert_eq!(results[0].filing.cik.padded(), "0000000100");
		assert!(results[0].score > results[1].score);
	}

	#[test]
	fn ranking_is_stable_across_runs() {
		let docs = vec![
			(
				filing("100", "000000010024000001", date!(2024 - 06 - 01)),
				doc("revenue grew while margin pressure continued"),
			),
			(
				filing("200", "000000020024000001", date!(2024 - 03 - 01)),
				doc("revenue declined on weaker margin"),
			),
		];
		let first = rank_passages(&docs, "revenue margin", &[], &cfg(), ARCHIVES);
		let second = rank_passages(&docs, "revenue margin", &[], &cfg(), ARCHIVES);
		let first_bytes = serde_json::to_vec(&first).expect("Citations must serialize.");
		let second_bytes = serde_json::to_vec(&second).expect("Citations must serialize.");

		assert_eq!(first_bytes, second_bytes);
	}

	#[test]
	fn risk_section_is_boosted_for_risk_topics() {
		let text = "Item 1. Business We sell widgets and discuss cybersecurity briefly. \
			Item 1A. Risk Factors A cybersecurity incident could disrupt operations.";
		let boundary = text.find("Item 1A").expect("Heading must exist.");
		let content = FilingContent {
			text: text.to_string(),
			sections: vec![
				FilingSection {
					label: "Business".to_string(),
					start_offset: 0,
					end_offset: boundary,
				},
				FilingSection {
					label: "Risk Factors".to_string(),
					start_offset: boundary,
					end_offset: text.len(),
				},
			],
		};
		let mut small = cfg();

		// One passage per sentence-sized chunk so the two mentions compete.
		small.passage_tokens = 12;

		let docs = vec![(filing("100", "000000010024000001", date!(2024 - 01 - 01)), content)];
		let results =
			rank_passages(&docs, "cybersecurity", &[TopicCategory::Risk], &small, ARCHIVES);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].section.as_deref(), Some("Risk Factors"));
	}

	#[test]
	fn snippet_offsets_slice_exactly() {
		let text = "Filler text before the part that matters. Cybersecurity incidents rose \
			sharply this year across the portfolio. Trailing text after.";
		let docs = vec![(filing("100", "000000010024000001", date!(2024 - 01 - 01)), doc(text))];
		let results = rank_passages(&docs, "cybersecurity incidents", &[], &cfg(), ARCHIVES);
		let citation = &results[0];
		let start = citation.start_offset.expect("Snippet must carry a start offset.");
		let end = citation.end_offset.expect("Snippet must carry an end offset.");

		assert_eq!(&text[start..end], citation.snippet);
		assert!(citation.snippet.contains("Cybersecurity"));
		assert!(
			citation.source_url.ends_with("/edgar/data/0000000100/000000010024000001/report.htm")
		);
	}

	#[test]
	fn amendment_duplicates_collapse_to_the_newer_filing() {
		let text = "The registrant disclosed a material cybersecurity incident in November.";
		let docs = vec![
			(filing("100", "000000010024000001", date!(2024 - 11 - 01)), doc(text)),
			(filing("100", "000000010024000002", date!(2024 - 12 - 01)), doc(text)),
		];
		let results = rank_passages(&docs, "cybersecurity incident", &[], &cfg(), ARCHIVES);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].filing.filed_at, date!(2024 - 12 - 01));
	}

	#[test]
	fn amendment_dedup_is_order_independent() {
		let text = "The registrant disclosed a material cybersecurity incident in November.";
		// Same corpus with the winning (newer) copy examined first.
		let docs = vec![
			(filing("100", "000000010024000002", date!(2024 - 12 - 01)), doc(text)),
			(filing("100", "000000010024000001", date!(2024 - 11 - 01)), doc(text)),
		];
		let results = rank_passages(&docs, "cybersecurity incident", &[], &cfg(), ARCHIVES);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].filing.filed_at, date!(2024 - 12 - 01));
	}

	#[test]
	fn max_results_caps_the_output() {
		let mut small = cfg();

		small.max_results = 1;

		let docs = vec![
			(
				filing("100", "000000010024000001", date!(2024 - 06 - 01)),
				doc("revenue and margin details"),
			),
			(
				filing("200", "000000020024000001", date!(2024 - 03 - 01)),
				doc("revenue commentary only"),
			),
		];
		let results = rank_passages(&docs, "revenue", &[], &small, ARCHIVES);

		assert_eq!(results.len(), 1);
	}

	#[test]
	fn empty_query_or_corpus_yields_nothing() {
		assert!(rank_passages(&[], "revenue", &[], &cfg(), ARCHIVES).is_empty());

		let docs = vec![(
			filing("100", "000000010024000001", date!(2024 - 01 - 01)),
			doc("revenue details"),
		)];

		assert!(rank_passages(&docs, "", &[], &cfg(), ARCHIVES).is_empty());
	}
}
