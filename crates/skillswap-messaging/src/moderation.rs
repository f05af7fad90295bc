//! Blocks and reports.
//!
//! Blocking cascades to every shared conversation (status → blocked);
//! unblocking restores them only when no reverse block remains.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use skillswap_core::{
    Block, ConversationStatus, Report, ReportReason, ReportStatus, SwapError, Timestamp, Uid,
    MAX_REPORT_DETAILS_CHARS, MIN_REPORT_DETAILS_CHARS,
};
use skillswap_store::StoreDb;

#[derive(Clone, Debug, Deserialize)]
pub struct ReportCreate {
    pub reported_uid: Uid,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub reason: ReportReason,
    pub details: String,
}

pub struct ModerationService {
    store: Arc<StoreDb>,
}

impl ModerationService {
    pub fn new(store: Arc<StoreDb>) -> Self {
        Self { store }
    }

    pub fn block(
        &self,
        blocker_uid: &str,
        blocked_uid: &str,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<Block, SwapError> {
        if blocker_uid == blocked_uid {
            return Err(SwapError::SelfTarget("block"));
        }
        if self.store.get_block(blocker_uid, blocked_uid)?.is_some() {
            return Err(SwapError::AlreadyBlocked);
        }

        let block = Block {
            id: self.store.new_id(),
            blocker_uid: blocker_uid.to_string(),
            blocked_uid: blocked_uid.to_string(),
            created_at: now,
            reason,
        };
        self.store.put_block(&block)?;

        // Cascade: freeze every conversation the two share.
        for mut conv in self.store.iter_conversations_for(blocker_uid)? {
            if conv.is_participant(blocked_uid) && conv.status != ConversationStatus::Blocked {
                conv.status = ConversationStatus::Blocked;
                conv.updated_at = now;
                self.store.put_conversation(&conv)?;
            }
        }

        info!(blocker_uid, blocked_uid, "user blocked");
        Ok(block)
    }

    pub fn unblock(
        &self,
        blocker_uid: &str,
        blocked_uid: &str,
        now: Timestamp,
    ) -> Result<(), SwapError> {
        if self.store.get_block(blocker_uid, blocked_uid)?.is_none() {
            return Err(SwapError::BlockNotFound);
        }
        self.store.delete_block(blocker_uid, blocked_uid)?;

        // Restore conversations only when the other side holds no block.
        let reverse = self.store.get_block(blocked_uid, blocker_uid)?.is_some();
        if !reverse {
            for mut conv in self.store.iter_conversations_for(blocker_uid)? {
                if conv.is_participant(blocked_uid) && conv.status == ConversationStatus::Blocked {
                    conv.status = ConversationStatus::Active;
                    conv.updated_at = now;
                    self.store.put_conversation(&conv)?;
                }
            }
        }

        info!(blocker_uid, blocked_uid, "user unblocked");
        Ok(())
    }

    pub fn list_blocked(&self, uid: &str) -> Result<Vec<Block>, SwapError> {
        let mut blocks = self.store.iter_blocks_by(uid)?;
        blocks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(blocks)
    }

    pub fn report(
        &self,
        reporter_uid: &str,
        input: ReportCreate,
        now: Timestamp,
    ) -> Result<Report, SwapError> {
        if reporter_uid == input.reported_uid {
            return Err(SwapError::SelfTarget("report"));
        }
        let details_len = input.details.chars().count();
        if !(MIN_REPORT_DETAILS_CHARS..=MAX_REPORT_DETAILS_CHARS).contains(&details_len) {
            return Err(SwapError::Validation(format!(
                "details must be {MIN_REPORT_DETAILS_CHARS}..={MAX_REPORT_DETAILS_CHARS} characters"
            )));
        }

        let report = Report {
            id: self.store.new_id(),
            reporter_uid: reporter_uid.to_string(),
            reported_uid: input.reported_uid,
            conversation_id: input.conversation_id,
            message_id: input.message_id,
            reason: input.reason,
            details: input.details,
            status: ReportStatus::Pending,
            created_at: now,
        };
        self.store.put_report(&report)?;
        Ok(report)
    }

    pub fn list_reports(&self, reporter_uid: &str) -> Result<Vec<Report>, SwapError> {
        let mut reports = self.store.iter_reports_by(reporter_uid)?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_core::Conversation;
    use std::collections::HashMap;

    fn service() -> ModerationService {
        ModerationService::new(Arc::new(StoreDb::open_temporary().unwrap()))
    }

    fn seed_conversation(svc: &ModerationService, id: &str, a: &str, b: &str) {
        let mut participants = [a.to_string(), b.to_string()];
        participants.sort();
        svc.store
            .put_conversation(&Conversation {
                id: id.into(),
                participant_uids: participants,
                swap_request_id: "s1".into(),
                status: ConversationStatus::Active,
                created_at: 0,
                updated_at: 0,
                last_message: None,
                unread_counts: HashMap::new(),
            })
            .unwrap();
    }

    #[test]
    fn block_cascades_to_shared_conversations() {
        let svc = service();
        seed_conversation(&svc, "c1", "alice", "bob");
        seed_conversation(&svc, "c2", "alice", "carol");

        svc.block("alice", "bob", None, 10).unwrap();

        let c1 = svc.store.get_conversation("c1").unwrap().unwrap();
        let c2 = svc.store.get_conversation("c2").unwrap().unwrap();
        assert_eq!(c1.status, ConversationStatus::Blocked);
        assert_eq!(c2.status, ConversationStatus::Active);
    }

    #[test]
    fn unblock_restores_unless_reverse_block_exists() {
        let svc = service();
        seed_conversation(&svc, "c1", "alice", "bob");
        svc.block("alice", "bob", None, 10).unwrap();
        svc.block("bob", "alice", None, 11).unwrap();

        // Alice unblocks, but Bob still blocks her: stays blocked.
        svc.unblock("alice", "bob", 20).unwrap();
        let c1 = svc.store.get_conversation("c1").unwrap().unwrap();
        assert_eq!(c1.status, ConversationStatus::Blocked);

        // Bob unblocks too: conversation reopens.
        svc.unblock("bob", "alice", 30).unwrap();
        let c1 = svc.store.get_conversation("c1").unwrap().unwrap();
        assert_eq!(c1.status, ConversationStatus::Active);
    }

    #[test]
    fn self_and_duplicate_blocks_rejected() {
        let svc = service();
        assert!(matches!(
            svc.block("alice", "alice", None, 0).unwrap_err(),
            SwapError::SelfTarget(_)
        ));
        svc.block("alice", "bob", None, 0).unwrap();
        assert!(matches!(
            svc.block("alice", "bob", None, 1).unwrap_err(),
            SwapError::AlreadyBlocked
        ));
    }

    #[test]
    fn unblock_without_block_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.unblock("alice", "bob", 0).unwrap_err(),
            SwapError::BlockNotFound
        ));
    }

    #[test]
    fn report_validates_details_length() {
        let svc = service();
        let short = ReportCreate {
            reported_uid: "bob".into(),
            conversation_id: None,
            message_id: None,
            reason: ReportReason::Spam,
            details: "too short".into(),
        };
        assert!(matches!(
            svc.report("alice", short, 0).unwrap_err(),
            SwapError::Validation(_)
        ));

        let ok = ReportCreate {
            reported_uid: "bob".into(),
            conversation_id: Some("c1".into()),
            message_id: None,
            reason: ReportReason::Harassment,
            details: "sending hostile messages repeatedly".into(),
        };
        let report = svc.report("alice", ok, 5).unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(svc.list_reports("alice").unwrap().len(), 1);
    }
}
