//! Blocks and reports.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, Uid};

/// One directed block. At most one per ordered (blocker, blocked) pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub blocker_uid: Uid,
    pub blocked_uid: Uid,
    pub created_at: Timestamp,
    pub reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Harassment,
    InappropriateContent,
    Scam,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
}

/// A user report. Append-only except for `status`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub reporter_uid: Uid,
    pub reported_uid: Uid,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub reason: ReportReason,
    pub details: String,
    pub status: ReportStatus,
    pub created_at: Timestamp,
}
