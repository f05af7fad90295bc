use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generic `{message}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub message: String,
}

impl RpcMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a single-profile reindex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReindexResult {
    pub success: bool,
    pub message: String,
    pub skills_indexed: Option<String>,
}

/// Points-spend request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSpendRequest {
    pub reason: skillswap_economy::SpendReason,
    pub duration_hours: Option<i64>,
}

/// Aggregate unread counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcUnreadCount {
    pub total_unread: u32,
}

/// Liveness + subsystem status returned by `swap_health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcHealth {
    pub status: String,
    pub services: BTreeMap<String, String>,
}
