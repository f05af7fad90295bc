//! Protocol constants for the swap economy and matching engine.

// ── Matching ──────────────────────────────────────────────────────────────────

/// Wide candidate set fetched per direction before the reciprocal intersection.
pub const MATCH_K_WIDE: usize = 50;

/// Minimum directional similarity admitted into the reciprocal candidate sets.
pub const MATCH_SCORE_THRESHOLD: f64 = 0.2;

/// Default number of reciprocal matches returned.
pub const MATCH_DEFAULT_LIMIT: usize = 10;

/// Hard cap on reciprocal matches returned.
pub const MATCH_MAX_LIMIT: usize = 50;

/// Reciprocal score at or above which a match email may be sent.
pub const MATCH_NOTIFY_MIN_SCORE: f64 = 0.70;

// ── Search ────────────────────────────────────────────────────────────────────

/// Default similarity floor for semantic profile search.
pub const SEARCH_DEFAULT_THRESHOLD: f64 = 0.3;

/// Similarity floor used when mining skill recommendations.
pub const RECOMMEND_THRESHOLD: f64 = 0.4;

/// Candidate profiles fetched per vector for skill recommendations.
pub const RECOMMEND_K: usize = 20;

/// Candidate skill phrases taken per profile.
pub const RECOMMEND_PHRASES_PER_PROFILE: usize = 5;

/// Phrases at or below this length are discarded as noise.
pub const RECOMMEND_MIN_PHRASE_CHARS: usize = 10;

/// Needs-side contributions count at this weight relative to offers.
pub const RECOMMEND_NEED_WEIGHT: f64 = 0.8;

// ── Cache ─────────────────────────────────────────────────────────────────────

pub const SEARCH_CACHE_TTL_SECS: u64 = 3_600;
pub const RECOMMEND_CACHE_TTL_SECS: u64 = 7_200;

/// Per-(recipient, conversation) message email debounce window.
pub const MESSAGE_NOTIFY_DEBOUNCE_SECS: u64 = 900;

/// Unordered-pair match notification dedupe window.
pub const MATCH_NOTIFY_DEDUPE_SECS: u64 = 86_400;

// ── Completion ────────────────────────────────────────────────────────────────

/// Window after the first completion mark before the swap auto-finalizes.
pub const AUTO_COMPLETE_HOURS: i64 = 48;

pub const MIN_HOURS_CLAIMED: f64 = 0.5;
pub const MAX_HOURS_CLAIMED: f64 = 100.0;

// ── Economy ───────────────────────────────────────────────────────────────────

/// Base points per hour before weighting.
pub const BASE_POINTS_PER_HOUR: f64 = 10.0;

/// Base credits per hour before the skill-level multiplier.
pub const BASE_CREDITS_PER_HOUR: f64 = 10.0;

/// Credit rate for the requester side of an indirect swap.
pub const INDIRECT_CREDIT_RATE: f64 = 0.5;

/// Priority boost cost per hour of boost.
pub const PRIORITY_BOOST_COST_PER_HOUR: i64 = 5;

/// Maximum priority boost duration in hours (one week).
pub const PRIORITY_BOOST_MAX_HOURS: i64 = 168;

/// Flat cost to request help without offering a skill in return.
pub const REQUEST_WITHOUT_RECIPROCITY_COST: i64 = 50;

// ── Messaging / moderation limits ────────────────────────────────────────────

pub const MAX_MESSAGE_CHARS: usize = 5_000;

/// Conversation preview truncation length.
pub const LAST_MESSAGE_PREVIEW_CHARS: usize = 100;

pub const MAX_REVIEW_TEXT_CHARS: usize = 1_000;
pub const MIN_REPORT_DETAILS_CHARS: usize = 10;
pub const MAX_REPORT_DETAILS_CHARS: usize = 2_000;

// ── Listing ──────────────────────────────────────────────────────────────────

/// Bounded candidate set for list endpoints that sort in memory. Collections
/// are scanned up to this many matching documents before sorting; results
/// beyond the cap are not visible to paging.
pub const LIST_SCAN_CAP: usize = 1_000;
