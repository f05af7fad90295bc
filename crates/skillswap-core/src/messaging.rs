//! Conversations and messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, Uid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Blocked,
    Archived,
}

/// Truncated preview of the most recent message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_uid: Uid,
    pub sent_at: Timestamp,
}

/// A conversation document, key = `id`. Exists iff the owning swap request
/// has been accepted (spec invariant I4); created exactly once per accept.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Both participants, sorted lexicographically.
    pub participant_uids: [Uid; 2],
    pub swap_request_id: String,
    pub status: ConversationStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_message: Option<LastMessage>,
    /// Per-participant unread counters. Never incremented for the sender.
    #[serde(default)]
    pub unread_counts: HashMap<Uid, u32>,
}

impl Conversation {
    pub fn is_participant(&self, uid: &str) -> bool {
        self.participant_uids.iter().any(|u| u == uid)
    }

    pub fn other_participant(&self, uid: &str) -> Option<&Uid> {
        self.participant_uids.iter().find(|u| u.as_str() != uid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    System,
}

/// Sender uid used for protocol-generated messages.
pub const SYSTEM_SENDER: &str = "system";

/// A message in a conversation's message subcollection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_uid: Uid,
    pub content: String,
    pub sent_at: Timestamp,
    pub read_at: Option<Timestamp>,
    /// Uids that have read this message. The sender is implicitly included.
    #[serde(default)]
    pub read_by: Vec<Uid>,
    pub message_type: MessageType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_participant_lookup() {
        let conv = Conversation {
            id: "c1".into(),
            participant_uids: ["alice".into(), "bob".into()],
            swap_request_id: "s1".into(),
            status: ConversationStatus::Active,
            created_at: 0,
            updated_at: 0,
            last_message: None,
            unread_counts: HashMap::new(),
        };
        assert_eq!(conv.other_participant("alice").unwrap(), "bob");
        assert_eq!(conv.other_participant("bob").unwrap(), "alice");
        assert!(conv.is_participant("alice"));
        assert!(!conv.is_participant("carol"));
    }
}
