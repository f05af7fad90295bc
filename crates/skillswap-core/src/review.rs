use serde::{Deserialize, Serialize};

use crate::types::{Hours, Timestamp, Uid};

/// A review of one participant by the other, valid only once the referenced
/// swap is completed. At most one per (swap_request_id, reviewer_uid).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub swap_request_id: String,
    pub reviewer_uid: Uid,
    pub reviewed_uid: Uid,
    /// 1..=5 stars.
    pub rating: u8,
    pub review_text: Option<String>,
    /// The skill the reviewer received.
    pub skill_exchanged: Option<String>,
    pub hours_exchanged: Hours,
    pub created_at: Timestamp,
}
