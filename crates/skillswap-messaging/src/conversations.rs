//! Conversation and message flows.
//!
//! A conversation exists iff its owning swap request was accepted. Its id is
//! derived from the sorted participant pair and the swap id, so a retried
//! accept lands on the same document instead of duplicating it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use skillswap_core::{
    Conversation, ConversationStatus, LastMessage, Message, MessageType, SwapError, SwapRequest,
    SwapStatus, Timestamp, Uid, LAST_MESSAGE_PREVIEW_CHARS, LIST_SCAN_CAP, MAX_MESSAGE_CHARS,
    SYSTEM_SENDER,
};
use skillswap_notify::NotificationService;
use skillswap_store::{LockMap, StoreDb};

/// Seed message posted when a swap is accepted.
const ACCEPT_SYSTEM_MESSAGE: &str = "Swap accepted! You can now start chatting.";

/// Deterministic conversation id from the sorted participants and swap id.
pub fn conversation_id_for(participants: &[Uid; 2], swap_request_id: &str) -> String {
    let material = format!("{}:{}:{}", participants[0], participants[1], swap_request_id);
    let digest = blake3::hash(material.as_bytes());
    hex::encode(&digest.as_bytes()[..16])
}

/// Take the first `limit` characters (not bytes) of a message for previews.
fn preview_of(content: &str) -> String {
    content.chars().take(LAST_MESSAGE_PREVIEW_CHARS).collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OtherParticipant {
    pub uid: Uid,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub skills_to_offer: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: String,
    pub participant_uids: [Uid; 2],
    pub swap_request_id: String,
    pub status: ConversationStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub other_participant: Option<OtherParticipant>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationListPage {
    pub conversations: Vec<ConversationView>,
    pub total: usize,
    pub has_more: bool,
}

pub struct MessagingService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    notify: Arc<NotificationService>,
}

impl MessagingService {
    pub fn new(store: Arc<StoreDb>, locks: Arc<LockMap>, notify: Arc<NotificationService>) -> Self {
        Self {
            store,
            locks,
            notify,
        }
    }

    // ── Conversation bootstrap (called from the accept transition) ──────────

    /// Create the conversation for an accepted swap, or return the existing
    /// one — the deterministic id makes a retried accept safe.
    pub fn create_for_swap(
        &self,
        swap: &SwapRequest,
        now: Timestamp,
    ) -> Result<Conversation, SwapError> {
        let mut participants = [swap.requester_uid.clone(), swap.recipient_uid.clone()];
        participants.sort();
        let id = conversation_id_for(&participants, &swap.id);

        if let Some(existing) = self.store.get_conversation(&id)? {
            return Ok(existing);
        }

        let mut unread_counts = HashMap::new();
        unread_counts.insert(swap.requester_uid.clone(), 0);
        unread_counts.insert(swap.recipient_uid.clone(), 0);

        let conversation = Conversation {
            id: id.clone(),
            participant_uids: participants,
            swap_request_id: swap.id.clone(),
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
            last_message: None,
            unread_counts,
        };
        self.store.put_conversation(&conversation)?;

        self.store.append_message(&Message {
            id: self.store.new_id(),
            conversation_id: id.clone(),
            sender_uid: SYSTEM_SENDER.into(),
            content: ACCEPT_SYSTEM_MESSAGE.into(),
            sent_at: now,
            read_at: None,
            read_by: Vec::new(),
            message_type: MessageType::System,
        })?;

        info!(conversation_id = %id, swap_id = %swap.id, "conversation created");
        Ok(conversation)
    }

    // ── Views ───────────────────────────────────────────────────────────────

    fn view_for(&self, conv: Conversation, uid: &str) -> ConversationView {
        let unread_count = conv.unread_counts.get(uid).copied().unwrap_or(0);
        let other_participant = conv.other_participant(uid).and_then(|other_uid| {
            self.store
                .get_profile(other_uid)
                .ok()
                .flatten()
                .map(|p| OtherParticipant {
                    uid: p.uid,
                    display_name: p.display_name,
                    photo_url: p.photo_url,
                    skills_to_offer: p.skills_to_offer,
                })
        });
        ConversationView {
            id: conv.id,
            participant_uids: conv.participant_uids,
            swap_request_id: conv.swap_request_id,
            status: conv.status,
            created_at: conv.created_at,
            updated_at: conv.updated_at,
            last_message: conv.last_message,
            unread_count,
            other_participant,
        }
    }

    /// Active conversations for `uid`, most recently touched first. The
    /// candidate set is scanned in memory and capped, like every list here.
    pub fn list_conversations(
        &self,
        uid: &str,
        limit: usize,
        offset: usize,
    ) -> Result<ConversationListPage, SwapError> {
        let limit = limit.clamp(1, 50);
        let mut convs: Vec<Conversation> = self
            .store
            .iter_conversations_for(uid)?
            .into_iter()
            .filter(|c| c.status == ConversationStatus::Active)
            .take(LIST_SCAN_CAP)
            .collect();
        convs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = convs.len();
        let page: Vec<ConversationView> = convs
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|c| self.view_for(c, uid))
            .collect();
        Ok(ConversationListPage {
            conversations: page,
            total,
            has_more: offset + limit < total,
        })
    }

    pub fn get_conversation(&self, id: &str, uid: &str) -> Result<ConversationView, SwapError> {
        let conv = self
            .store
            .get_conversation(id)?
            .ok_or_else(|| SwapError::ConversationNotFound(id.to_string()))?;
        if !conv.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        Ok(self.view_for(conv, uid))
    }

    // ── Messages ────────────────────────────────────────────────────────────

    /// Send a message. Permitted only for participants, in unblocked
    /// conversations whose owning swap is still `accepted`.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_uid: &str,
        content: &str,
        now: Timestamp,
    ) -> Result<Message, SwapError> {
        if content.is_empty() || content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SwapError::Validation(format!(
                "message content must be 1..={MAX_MESSAGE_CHARS} characters"
            )));
        }

        let _guard = self.locks.lock(conversation_id).await;

        let mut conv = self
            .store
            .get_conversation(conversation_id)?
            .ok_or_else(|| SwapError::ConversationNotFound(conversation_id.to_string()))?;
        if !conv.is_participant(sender_uid) {
            return Err(SwapError::NotParticipant);
        }
        if conv.status == ConversationStatus::Blocked {
            return Err(SwapError::ConversationBlocked);
        }
        let swap = self.store.get_swap(&conv.swap_request_id)?;
        if !matches!(swap.map(|s| s.status), Some(SwapStatus::Accepted)) {
            return Err(SwapError::SwapNotActive);
        }

        let message = Message {
            id: self.store.new_id(),
            conversation_id: conversation_id.to_string(),
            sender_uid: sender_uid.to_string(),
            content: content.to_string(),
            sent_at: now,
            read_at: None,
            read_by: vec![sender_uid.to_string()],
            message_type: MessageType::Text,
        };
        self.store.append_message(&message)?;

        let other_uid = conv.other_participant(sender_uid).cloned();
        conv.last_message = Some(LastMessage {
            content: preview_of(content),
            sender_uid: sender_uid.to_string(),
            sent_at: now,
        });
        conv.updated_at = now;
        if let Some(other) = &other_uid {
            *conv.unread_counts.entry(other.clone()).or_insert(0) += 1;
        }
        self.store.put_conversation(&conv)?;
        drop(_guard);

        if let Some(other) = other_uid {
            self.notify_other(&other, sender_uid, conversation_id, content)
                .await;
        }

        Ok(message)
    }

    async fn notify_other(
        &self,
        other_uid: &str,
        sender_uid: &str,
        conversation_id: &str,
        content: &str,
    ) {
        let Ok(Some(other_profile)) = self.store.get_profile(other_uid) else {
            return;
        };
        if !other_profile.email_updates || other_profile.email.is_empty() {
            return;
        }
        let sender_name = self
            .store
            .get_profile(sender_uid)
            .ok()
            .flatten()
            .and_then(|p| p.display_name)
            .unwrap_or_else(|| "Someone".into());
        self.notify
            .send_new_message(
                &other_profile.email,
                other_uid,
                conversation_id,
                other_profile.display_name.as_deref().unwrap_or("there"),
                &sender_name,
                &preview_of(content),
            )
            .await;
    }

    /// Messages newest-first with cursor pagination on `sent_at`.
    pub fn get_messages(
        &self,
        conversation_id: &str,
        uid: &str,
        limit: usize,
        before: Option<Timestamp>,
    ) -> Result<Vec<Message>, SwapError> {
        let conv = self
            .store
            .get_conversation(conversation_id)?
            .ok_or_else(|| SwapError::ConversationNotFound(conversation_id.to_string()))?;
        if !conv.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        let limit = limit.clamp(1, 100);

        let mut messages: Vec<Message> = self
            .store
            .iter_messages(conversation_id)?
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| before.map(|b| m.sent_at < b).unwrap_or(true))
            .collect();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        messages.truncate(limit);
        Ok(messages)
    }

    /// Mark every message from the other side as read and zero the caller's
    /// unread counter.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        uid: &str,
        now: Timestamp,
    ) -> Result<(), SwapError> {
        let _guard = self.locks.lock(conversation_id).await;

        let mut conv = self
            .store
            .get_conversation(conversation_id)?
            .ok_or_else(|| SwapError::ConversationNotFound(conversation_id.to_string()))?;
        if !conv.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }

        for (seq, mut message) in self.store.iter_messages(conversation_id)? {
            if message.sender_uid != uid && !message.read_by.iter().any(|u| u == uid) {
                message.read_by.push(uid.to_string());
                if message.read_at.is_none() {
                    message.read_at = Some(now);
                }
                self.store.update_message(&message, seq)?;
            }
        }

        conv.unread_counts.insert(uid.to_string(), 0);
        self.store.put_conversation(&conv)?;
        Ok(())
    }

    /// Sum of unread counters across the caller's active conversations.
    pub fn unread_total(&self, uid: &str) -> Result<u32, SwapError> {
        Ok(self
            .store
            .iter_conversations_for(uid)?
            .into_iter()
            .filter(|c| c.status == ConversationStatus::Active)
            .map(|c| c.unread_counts.get(uid).copied().unwrap_or(0))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_deterministic_and_pair_scoped() {
        let pair = ["alice".to_string(), "bob".to_string()];
        let a = conversation_id_for(&pair, "swap1");
        let b = conversation_id_for(&pair, "swap1");
        let c = conversation_id_for(&pair, "swap2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let long: String = "é".repeat(150);
        let preview = preview_of(&long);
        assert_eq!(preview.chars().count(), LAST_MESSAGE_PREVIEW_CHARS);
    }
}
