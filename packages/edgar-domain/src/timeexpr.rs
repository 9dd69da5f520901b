use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

/// A resolved time expression. Ranges are inclusive calendar dates; resolution
/// is always relative to a caller-supplied "today" so extraction stays pure.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TimeExpression {
	pub start: Date,
	pub end: Date,
	pub source_text: String,
}

#[derive(Debug)]
pub struct TimePatterns {
	quarter: Regex,
	quarter_word: Regex,
	fiscal: Regex,
	relative: Regex,
	this_period: Regex,
	year_to_date: Regex,
	bare_year: Regex,
}
impl TimePatterns {
	pub fn new() -> Result<Self, regex::Error> {
		Ok(Self {
			quarter: Regex::new(r"(?i)\bq([1-4])\s*(?:of\s+)?((?:19|20)\d{2})\b")?,
			quarter_word: Regex::new(
				r"(?i)\b(first|second|third|fourth)\s+quarter\s+(?:of\s+)?((?:19|20)\d{2})\b",
			)?,
			fiscal: Regex::new(r"(?i)\b(?:fiscal(?:\s+year)?|fy)\s*((?:19|20)\d{2})\b")?,
			relative: Regex::new(
				r"(?i)\b(?:past|last)\s+(?:(\d{1,2})\s+)?(years?|quarters?|months?)\b",
			)?,
			this_period: Regex::new(r"(?i)\bthis\s+(year|quarter)\b")?,
			year_to_date: Regex::new(r"(?i)\byear\s+to\s+date\b|\bYTD\b")?,
			bare_year: Regex::new(r"\b((?:19|20)\d{2})\b")?,
		})
	}

	pub fn detect(&self, query: &str, today: Date) -> Vec<TimeExpression> {
		let mut out = Vec::new();
		let mut spans: Vec<(usize, usize)> = Vec::new();

		for captures in self.quarter.captures_iter(query) {
			let Some((expression, span)) = resolve_quarter(&captures) else { continue };

			spans.push(span);
			out.push(expression);
		}
		for captures in self.quarter_word.captures_iter(query) {
			let Some((expression, span)) = resolve_quarter_word(&captures) else { continue };

			spans.push(span);
			out.push(expression);
		}
		for captures in self.fiscal.captures_iter(query) {
			let Some((expression, span)) = resolve_fiscal(&captures) else { continue };

			spans.push(span);
			out.push(expression);
		}
		for captures in self.relative.captures_iter(query) {
			let Some((expression, span)) = resolve_relative(&captures, today) else { continue };

			spans.push(span);
			out.push(expression);
		}
		for captures in self.this_period.captures_iter(query) {
			let Some((expression, span)) = resolve_this_period(&captures, today) else {
				continue;
			};

			spans.push(span);
			out.push(expression);
		}
		for matched in self.year_to_date.find_iter(query) {
			let Some(start) = Date::from_calendar_date(today.year(), Month::January, 1).ok()
			else {
				continue;
			};

			spans.push((matched.start(), matched.end()));
			out.push(TimeExpression {
				start,
				end: today,
				source_text: matched.as_str().to_string(),
			});
		}

		// Bare years only count when no richer expression already claimed them.
		for captures in self.bare_year.captures_iter(query) {
			let Some(matched) = captures.get(1) else { continue };

			if spans.iter().any(|(start, end)| matched.start() < *end && matched.end() > *start) {
				continue;
			}

			let Some(expression) = parse_year(matched.as_str())
				.and_then(|year| year_range(year, matched.as_str()))
			else {
				continue;
			};

			out.push(expression);
		}

		out.dedup_by(|a, b| a.start == b.start && a.end == b.end);

		out
	}
}

fn resolve_quarter(captures: &regex::Captures<'_>) -> Option<(TimeExpression, (usize, usize))> {
	let whole = captures.get(0)?;
	let quarter: u8 = captures.get(1)?.as_str().parse().ok()?;
	let year = parse_year(captures.get(2)?.as_str())?;
	let (start, end) = quarter_bounds(year, quarter)?;

	Some((
		TimeExpression { start, end, source_text: whole.as_str().to_string() },
		(whole.start(), whole.end()),
	))
}

fn resolve_quarter_word(
	captures: &regex::Captures<'_>,
) -> Option<(TimeExpression, (usize, usize))> {
	let whole = captures.get(0)?;
	let quarter = match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
		"first" => 1,
		"second" => 2,
		"third" => 3,
		"fourth" => 4,
		_ => return None,
	};
	let year = parse_year(captures.get(2)?.as_str())?;
	let (start, end) = quarter_bounds(year, quarter)?;

	Some((
		TimeExpression { start, end, source_text: whole.as_str().to_string() },
		(whole.start(), whole.end()),
	))
}

fn resolve_fiscal(captures: &regex::Captures<'_>) -> Option<(TimeExpression, (usize, usize))> {
	let whole = captures.get(0)?;
	let year = parse_year(captures.get(1)?.as_str())?;
	let expression = year_range(year, whole.as_str())?;

	Some((expression, (whole.start(), whole.end())))
}

fn resolve_relative(
	captures: &regex::Captures<'_>,
	today: Date,
) -> Option<(TimeExpression, (usize, usize))> {
	let whole = captures.get(0)?;
	let count: u32 = captures.get(1).map(|m| m.as_str().parse().ok()).flatten().unwrap_or(1);
	let unit = captures.get(2)?.as_str().to_ascii_lowercase();
	let start = if unit.starts_with("year") {
		months_back(today, count.saturating_mul(12))
	} else if unit.starts_with("quarter") {
		months_back(today, count.saturating_mul(3))
	} else {
		months_back(today, count)
	};

	Some((
		TimeExpression { start, end: today, source_text: whole.as_str().to_string() },
		(whole.start(), whole.end()),
	))
}

fn resolve_this_period(
	captures: &regex::Captures<'_>,
	today: Date,
) -> Option<(TimeExpression, (usize, usize))> {
	let whole = captures.get(0)?;
	let start = match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
		"year" => Date::from_calendar_date(today.year(), Month::January, 1).ok()?,
		"quarter" => {
			let quarter = (u8::from(today.month()) - 1) / 3 + 1;

			quarter_bounds(today.year(), quarter)?.0
		},
		_ => return None,
	};

	Some((
		TimeExpression { start, end: today, source_text: whole.as_str().to_string() },
		(whole.start(), whole.end()),
	))
}

fn parse_year(raw: &str) -> Option<i32> {
	raw.parse().ok()
}

fn year_range(year: i32, source_text: &str) -> Option<TimeExpression> {
	let start = Date::from_calendar_date(year, Month::January, 1).ok()?;
	let end = Date::from_calendar_date(year, Month::December, 31).ok()?;

	Some(TimeExpression { start, end, source_text: source_text.to_string() })
}

fn quarter_bounds(year: i32, quarter: u8) -> Option<(Date, Date)> {
	let (start_month, end_month, end_day) = match quarter {
		1 => (Month::January, Month::March, 31),
		2 => (Month::April, Month::June, 30),
		3 => (Month::July, Month::September, 30),
		4 => (Month::October, Month::December, 31),
		_ => return None,
	};
	let start = Date::from_calendar_date(year, start_month, 1).ok()?;
	let end = Date::from_calendar_date(year, end_month, end_day).ok()?;

	Some((start, end))
}

fn months_back(date: Date, months: u32) -> Date {
	let total = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months as i32;
	let year = total.div_euclid(12);
	let month = Month::try_from((total.rem_euclid(12) + 1) as u8).unwrap_or(Month::January);
	let day = date.day().min(month.length(year));

	Date::from_calendar_date(year, month, day).unwrap_or(date)
}
