//! Reciprocal matching and semantic search over the vector index.

pub mod matching;
pub mod recommend;
pub mod search;

pub use matching::{MatchQuery, MatchResult, Matcher};
pub use recommend::SkillRecommendation;
pub use search::{SearchMode, SearchQuery, SearchResult, SearchService};

/// Round to 4 decimal places, the precision match scores are reported at.
pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Round to 3 decimal places (recommendation scores).
pub(crate) fn round3(x: f64) -> f64 {
    (x * 1_000.0).round() / 1_000.0
}
