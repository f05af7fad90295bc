/// Opaque user identifier supplied by the external identity provider.
/// Never derived or parsed — treated as an exact-match document key.
pub type Uid = String;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Non-fungible reputation points. Balances never go negative; i64 leaves
/// headroom for lifetime totals.
pub type Points = i64;

/// Spendable swap credits. Same representation as [`Points`], separate economy.
pub type Credits = i64;

/// Hours exchanged in a swap. Validated into `[0.5, 100]` at the edges.
pub type Hours = f64;

/// Cosine similarity score in `[0, 1]` (unit vectors both sides).
pub type Score = f64;
