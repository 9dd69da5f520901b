pub mod classify;
pub mod entity;
pub mod filing;
pub mod lexicon;
pub mod timeexpr;

mod error;

pub use classify::{Classification, PatternScores, QueryPattern, classify, score_patterns};
pub use entity::{
	CompanyMention, EntitySet, Extractor, FormMention, TickerMention, TopicMention,
};
pub use error::{Error, Result};
pub use filing::{AccessionNumber, Cik, DateRange, FilingRef};
pub use lexicon::TopicCategory;
pub use timeexpr::{TimeExpression, TimePatterns};
