use regex::Regex;

use crate::FilingSection;

/// Canonical heading labels recognized in filing text, in document order for
/// a typical annual report.
const SECTION_HEADINGS: &[(&str, &str)] = &[
	(r"item\s+1\s*\.?\s+business", "Business"),
	(r"item\s+1a\s*\.?\s+risk\s+factors", "Risk Factors"),
	(r"item\s+2\s*\.?\s+properties", "Properties"),
	(r"item\s+3\s*\.?\s+legal\s+proceedings", "Legal Proceedings"),
	(
		r"item\s+7\s*\.?\s+management.?s\s+discussion",
		"Management's Discussion",
	),
	(r"item\s+7a\s*\.?\s+quantitative\s+and\s+qualitative", "Quantitative and Qualitative Disclosures"),
	(r"item\s+8\s*\.?\s+financial\s+statements", "Financial Statements"),
	(r"risk\s+factors", "Risk Factors"),
	(r"legal\s+proceedings", "Legal Proceedings"),
	(r"management.?s\s+discussion\s+and\s+analysis", "Management's Discussion"),
];

/// Best-effort section spans for backends that return flat text. Each span
/// runs from its heading to the next recognized heading (or end of text).
/// Unrecognized documents yield no sections, which only disables boosts.
pub fn sections_from_text(text: &str) -> Vec<FilingSection> {
	let mut starts: Vec<(usize, &str)> = Vec::new();

	for (pattern, label) in SECTION_HEADINGS {
		let Ok(re) = Regex::new(&format!("(?i){pattern}")) else { continue };

		for matched in re.find_iter(text) {
			if starts.iter().any(|(start, _)| *start == matched.start()) {
				continue;
			}

			starts.push((matched.start(), label));
		}
	}

	starts.sort_by_key(|(start, _)| *start);

	// Each label keeps only its first occurrence; cross-references later in
	// the document must not truncate the real section's span.
	let mut seen = Vec::new();

	starts.retain(|(_, label)| {
		if seen.contains(label) {
			return false;
		}

		seen.push(*label);

		true
	});

	let mut sections = Vec::new();

	for (idx, (start, label)) in starts.iter().enumerate() {
		let end = starts
			.get(idx + 1)
			.map(|(next_start, _)| *next_start)
			.unwrap_or(text.len());

		sections.push(FilingSection {
			label: (*label).to_string(),
			start_offset: *start,
			end_offset: end,
		});
	}

	sections
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_ordered_sections() {
		let text = "Item 1. Business We make widgets. \
			Item 1A. Risk Factors Cybersecurity threats loom. \
			Item 3. Legal Proceedings None pending.";
		let sections = sections_from_text(text);
		let labels: Vec<&str> =
			sections.iter().map(|section| section.label.as_str()).collect();

		assert_eq!(labels, vec!["Business", "Risk Factors", "Legal Proceedings"]);
		assert!(sections[0].end_offset <= sections[1].start_offset + 1);
		assert!(sections.iter().all(|section| section.start_offset < section.end_offset));
	}

	#[test]
	fn plain_text_without_headings_yields_no_sections() {
		assert!(sections_from_text("just some prose with no headings").is_empty());
	}

	#[test]
	fn repeated_headings_keep_first_occurrence() {
		let text = "Risk Factors ... see Risk Factors above.";
		let sections = sections_from_text(text);

		assert_eq!(sections.len(), 1);
		assert_eq!(sections[0].start_offset, 0);
	}
}
