use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use skillswap_core::{
    ActiveBoost, Block, Conversation, Dispute, LedgerEntry, Message, Profile, Report, Review,
    SwapError, SwapRequest, SwapStatus,
};

/// Persistent document store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   profiles             — uid bytes                      → bincode(Profile)
///   profiles_by_email    — lowercased email bytes         → uid bytes
///   swap_requests        — id bytes                       → bincode(SwapRequest)
///   conversations        — id bytes                       → bincode(Conversation)
///   messages             — conv_id ++ 0x00 ++ seq be      → bincode(Message)
///   reviews              — id bytes                       → bincode(Review)
///   points_transactions  — uid ++ 0x00 ++ seq be          → bincode(LedgerEntry)
///   credits_transactions — uid ++ 0x00 ++ seq be          → bincode(LedgerEntry)
///   active_boosts        — uid ++ 0x00 ++ seq be          → bincode(ActiveBoost)
///   blocks               — blocker ++ 0x00 ++ blocked     → bincode(Block)
///   reports              — id bytes                       → bincode(Report)
///   disputes             — id bytes                       → bincode(Dispute)
///   meta                 — utf8 key bytes                 → raw bytes
///
/// Sequence suffixes come from `sled::Db::generate_id`, so a prefix scan over
/// a uid or conversation returns records in insertion order.
pub struct StoreDb {
    db: sled::Db,
    profiles: sled::Tree,
    profiles_by_email: sled::Tree,
    swap_requests: sled::Tree,
    conversations: sled::Tree,
    messages: sled::Tree,
    reviews: sled::Tree,
    points_transactions: sled::Tree,
    credits_transactions: sled::Tree,
    active_boosts: sled::Tree,
    blocks: sled::Tree,
    reports: sled::Tree,
    disputes: sled::Tree,
    meta: sled::Tree,
}

fn storage_err(e: sled::Error) -> SwapError {
    SwapError::Storage(e.to_string())
}

fn ser<T: Serialize>(value: &T) -> Result<Vec<u8>, SwapError> {
    bincode::serialize(value).map_err(|e| SwapError::Serialization(e.to_string()))
}

fn de<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SwapError> {
    bincode::deserialize(bytes).map_err(|e| SwapError::Serialization(e.to_string()))
}

/// Composite key: `prefix ++ 0x00 ++ suffix`.
fn composite(prefix: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = prefix.as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(suffix);
    key
}

/// Prefix for scanning all entries under `prefix`.
fn scan_prefix_of(prefix: &str) -> Vec<u8> {
    let mut key = prefix.as_bytes().to_vec();
    key.push(0);
    key
}

impl StoreDb {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SwapError> {
        Self::from_sled(sled::open(path).map_err(storage_err)?)
    }

    /// Open an ephemeral store for tests; everything is discarded on drop.
    pub fn open_temporary() -> Result<Self, SwapError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_err)?;
        Self::from_sled(db)
    }

    fn from_sled(db: sled::Db) -> Result<Self, SwapError> {
        let profiles             = db.open_tree("profiles").map_err(storage_err)?;
        let profiles_by_email    = db.open_tree("profiles_by_email").map_err(storage_err)?;
        let swap_requests        = db.open_tree("swap_requests").map_err(storage_err)?;
        let conversations        = db.open_tree("conversations").map_err(storage_err)?;
        let messages             = db.open_tree("messages").map_err(storage_err)?;
        let reviews              = db.open_tree("reviews").map_err(storage_err)?;
        let points_transactions  = db.open_tree("points_transactions").map_err(storage_err)?;
        let credits_transactions = db.open_tree("credits_transactions").map_err(storage_err)?;
        let active_boosts        = db.open_tree("active_boosts").map_err(storage_err)?;
        let blocks               = db.open_tree("blocks").map_err(storage_err)?;
        let reports              = db.open_tree("reports").map_err(storage_err)?;
        let disputes             = db.open_tree("disputes").map_err(storage_err)?;
        let meta                 = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self { db, profiles, profiles_by_email, swap_requests, conversations, messages,
                  reviews, points_transactions, credits_transactions, active_boosts,
                  blocks, reports, disputes, meta })
    }

    /// Random 16-byte hex record id.
    pub fn new_id(&self) -> String {
        let bytes: [u8; 16] = rand::random();
        hex::encode(bytes)
    }

    fn next_seq(&self) -> Result<u64, SwapError> {
        self.db.generate_id().map_err(storage_err)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), SwapError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }

    // ── Profiles ─────────────────────────────────────────────────────────────

    pub fn get_profile(&self, uid: &str) -> Result<Option<Profile>, SwapError> {
        match self.profiles.get(uid.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a profile, keeping the email index in step.
    pub fn put_profile(&self, profile: &Profile) -> Result<(), SwapError> {
        if let Some(old) = self.get_profile(&profile.uid)? {
            if !old.email.eq_ignore_ascii_case(&profile.email) {
                self.profiles_by_email
                    .remove(old.email.to_lowercase().as_bytes())
                    .map_err(storage_err)?;
            }
        }
        self.profiles
            .insert(profile.uid.as_bytes(), ser(profile)?)
            .map_err(storage_err)?;
        self.profiles_by_email
            .insert(
                profile.email.to_lowercase().as_bytes(),
                profile.uid.as_bytes(),
            )
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_profile(&self, uid: &str) -> Result<(), SwapError> {
        if let Some(profile) = self.get_profile(uid)? {
            self.profiles_by_email
                .remove(profile.email.to_lowercase().as_bytes())
                .map_err(storage_err)?;
        }
        self.profiles.remove(uid.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>, SwapError> {
        let uid = match self
            .profiles_by_email
            .get(email.to_lowercase().as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            None => return Ok(None),
        };
        self.get_profile(&uid)
    }

    pub fn profile_exists(&self, uid: &str) -> bool {
        self.profiles.contains_key(uid.as_bytes()).unwrap_or(false)
    }

    pub fn count_profiles(&self) -> u64 {
        self.profiles.len() as u64
    }

    /// Every stored profile. Used by reconciliation / bulk reindex only.
    pub fn iter_profiles(&self) -> Result<Vec<Profile>, SwapError> {
        let mut out = Vec::new();
        for item in self.profiles.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    // ── Swap requests ────────────────────────────────────────────────────────

    pub fn get_swap(&self, id: &str) -> Result<Option<SwapRequest>, SwapError> {
        match self.swap_requests.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_swap(&self, swap: &SwapRequest) -> Result<(), SwapError> {
        self.swap_requests
            .insert(swap.id.as_bytes(), ser(swap)?)
            .map_err(storage_err)?;
        Ok(())
    }

    /// All swap requests where `uid` is the requester.
    pub fn iter_swaps_for_requester(&self, uid: &str) -> Result<Vec<SwapRequest>, SwapError> {
        self.filter_swaps(|s| s.requester_uid == uid)
    }

    /// All swap requests where `uid` is the recipient.
    pub fn iter_swaps_for_recipient(&self, uid: &str) -> Result<Vec<SwapRequest>, SwapError> {
        self.filter_swaps(|s| s.recipient_uid == uid)
    }

    /// Pending request for the ordered requester→recipient pair, if any.
    pub fn find_pending_between(
        &self,
        requester: &str,
        recipient: &str,
    ) -> Result<Option<SwapRequest>, SwapError> {
        Ok(self
            .filter_swaps(|s| {
                s.requester_uid == requester
                    && s.recipient_uid == recipient
                    && s.status == SwapStatus::Pending
            })?
            .into_iter()
            .next())
    }

    /// All swaps currently awaiting the auto-complete deadline.
    pub fn iter_pending_completion(&self) -> Result<Vec<SwapRequest>, SwapError> {
        self.filter_swaps(|s| s.status == SwapStatus::PendingCompletion)
    }

    fn filter_swaps<F: Fn(&SwapRequest) -> bool>(
        &self,
        pred: F,
    ) -> Result<Vec<SwapRequest>, SwapError> {
        let mut out = Vec::new();
        for item in self.swap_requests.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let swap: SwapRequest = de(&bytes)?;
            if pred(&swap) {
                out.push(swap);
            }
        }
        Ok(out)
    }

    // ── Conversations ────────────────────────────────────────────────────────

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, SwapError> {
        match self.conversations.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_conversation(&self, conv: &Conversation) -> Result<(), SwapError> {
        self.conversations
            .insert(conv.id.as_bytes(), ser(conv)?)
            .map_err(storage_err)?;
        Ok(())
    }

    /// Every conversation containing `uid`, unsorted.
    pub fn iter_conversations_for(&self, uid: &str) -> Result<Vec<Conversation>, SwapError> {
        let mut out = Vec::new();
        for item in self.conversations.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let conv: Conversation = de(&bytes)?;
            if conv.is_participant(uid) {
                out.push(conv);
            }
        }
        Ok(out)
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    /// Append a message to its conversation. Returns the storage sequence so
    /// the caller can re-write the record in place (read receipts).
    pub fn append_message(&self, message: &Message) -> Result<u64, SwapError> {
        let seq = self.next_seq()?;
        self.put_message_at(message, seq)?;
        Ok(seq)
    }

    fn put_message_at(&self, message: &Message, seq: u64) -> Result<(), SwapError> {
        let key = composite(&message.conversation_id, &seq.to_be_bytes());
        self.messages.insert(key, ser(message)?).map_err(storage_err)?;
        Ok(())
    }

    /// Messages in insertion order (oldest first).
    pub fn iter_messages(&self, conversation_id: &str) -> Result<Vec<(u64, Message)>, SwapError> {
        let prefix = scan_prefix_of(conversation_id);
        let mut out = Vec::new();
        for item in self.messages.scan_prefix(&prefix) {
            let (key, bytes) = item.map_err(storage_err)?;
            let seq_bytes: [u8; 8] = key[prefix.len()..]
                .try_into()
                .map_err(|_| SwapError::Storage("malformed message key".into()))?;
            out.push((u64::from_be_bytes(seq_bytes), de(&bytes)?));
        }
        Ok(out)
    }

    /// Overwrite a message at a known sequence (read-receipt updates).
    pub fn update_message(&self, message: &Message, seq: u64) -> Result<(), SwapError> {
        self.put_message_at(message, seq)
    }

    // ── Reviews ──────────────────────────────────────────────────────────────

    pub fn put_review(&self, review: &Review) -> Result<(), SwapError> {
        self.reviews
            .insert(review.id.as_bytes(), ser(review)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_reviews_received(&self, uid: &str) -> Result<Vec<Review>, SwapError> {
        self.filter_reviews(|r| r.reviewed_uid == uid)
    }

    pub fn iter_reviews_given(&self, uid: &str) -> Result<Vec<Review>, SwapError> {
        self.filter_reviews(|r| r.reviewer_uid == uid)
    }

    pub fn iter_reviews_for_swap(&self, swap_id: &str) -> Result<Vec<Review>, SwapError> {
        self.filter_reviews(|r| r.swap_request_id == swap_id)
    }

    pub fn review_exists(&self, swap_id: &str, reviewer_uid: &str) -> Result<bool, SwapError> {
        Ok(!self
            .filter_reviews(|r| r.swap_request_id == swap_id && r.reviewer_uid == reviewer_uid)?
            .is_empty())
    }

    fn filter_reviews<F: Fn(&Review) -> bool>(&self, pred: F) -> Result<Vec<Review>, SwapError> {
        let mut out = Vec::new();
        for item in self.reviews.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let review: Review = de(&bytes)?;
            if pred(&review) {
                out.push(review);
            }
        }
        Ok(out)
    }

    // ── Ledgers ──────────────────────────────────────────────────────────────

    pub fn append_points_tx(&self, entry: &LedgerEntry) -> Result<(), SwapError> {
        let key = composite(&entry.uid, &self.next_seq()?.to_be_bytes());
        self.points_transactions
            .insert(key, ser(entry)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn append_credits_tx(&self, entry: &LedgerEntry) -> Result<(), SwapError> {
        let key = composite(&entry.uid, &self.next_seq()?.to_be_bytes());
        self.credits_transactions
            .insert(key, ser(entry)?)
            .map_err(storage_err)?;
        Ok(())
    }

    /// Points ledger for `uid`, oldest first.
    pub fn iter_points_txs(&self, uid: &str) -> Result<Vec<LedgerEntry>, SwapError> {
        Self::scan_ledger(&self.points_transactions, uid)
    }

    /// Credits ledger for `uid`, oldest first.
    pub fn iter_credits_txs(&self, uid: &str) -> Result<Vec<LedgerEntry>, SwapError> {
        Self::scan_ledger(&self.credits_transactions, uid)
    }

    fn scan_ledger(tree: &sled::Tree, uid: &str) -> Result<Vec<LedgerEntry>, SwapError> {
        let mut out = Vec::new();
        for item in tree.scan_prefix(scan_prefix_of(uid)) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    // ── Active boosts ────────────────────────────────────────────────────────

    pub fn append_boost(&self, boost: &ActiveBoost) -> Result<(), SwapError> {
        let key = composite(&boost.uid, &self.next_seq()?.to_be_bytes());
        self.active_boosts
            .insert(key, ser(boost)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_boosts(&self, uid: &str) -> Result<Vec<ActiveBoost>, SwapError> {
        let mut out = Vec::new();
        for item in self.active_boosts.scan_prefix(scan_prefix_of(uid)) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    pub fn get_block(&self, blocker: &str, blocked: &str) -> Result<Option<Block>, SwapError> {
        let key = composite(blocker, blocked.as_bytes());
        match self.blocks.get(key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Key is the ordered (blocker, blocked) pair, so duplicates are impossible.
    pub fn put_block(&self, block: &Block) -> Result<(), SwapError> {
        let key = composite(&block.blocker_uid, block.blocked_uid.as_bytes());
        self.blocks.insert(key, ser(block)?).map_err(storage_err)?;
        Ok(())
    }

    pub fn delete_block(&self, blocker: &str, blocked: &str) -> Result<(), SwapError> {
        let key = composite(blocker, blocked.as_bytes());
        self.blocks.remove(key).map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_blocks_by(&self, blocker: &str) -> Result<Vec<Block>, SwapError> {
        let mut out = Vec::new();
        for item in self.blocks.scan_prefix(scan_prefix_of(blocker)) {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(de(&bytes)?);
        }
        Ok(out)
    }

    /// True if either user blocks the other.
    pub fn either_blocked(&self, a: &str, b: &str) -> Result<bool, SwapError> {
        Ok(self.get_block(a, b)?.is_some() || self.get_block(b, a)?.is_some())
    }

    // ── Reports ──────────────────────────────────────────────────────────────

    pub fn put_report(&self, report: &Report) -> Result<(), SwapError> {
        self.reports
            .insert(report.id.as_bytes(), ser(report)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_reports_by(&self, reporter: &str) -> Result<Vec<Report>, SwapError> {
        let mut out = Vec::new();
        for item in self.reports.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let report: Report = de(&bytes)?;
            if report.reporter_uid == reporter {
                out.push(report);
            }
        }
        Ok(out)
    }

    // ── Disputes ─────────────────────────────────────────────────────────────

    pub fn put_dispute(&self, dispute: &Dispute) -> Result<(), SwapError> {
        self.disputes
            .insert(dispute.id.as_bytes(), ser(dispute)?)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_disputes_for_swap(&self, swap_id: &str) -> Result<Vec<Dispute>, SwapError> {
        let mut out = Vec::new();
        for item in self.disputes.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let dispute: Dispute = de(&bytes)?;
            if dispute.swap_request_id == swap_id {
                out.push(dispute);
            }
        }
        Ok(out)
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), SwapError> {
        self.meta.insert(key.as_bytes(), value).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, SwapError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_core::{
        ConversationStatus, MessageType, TransactionKind, TransactionReason,
    };

    fn profile(uid: &str, email: &str) -> Profile {
        Profile::new(uid.into(), email.into(), 1_700_000_000)
    }

    #[test]
    fn profile_round_trip_and_email_index() {
        let db = StoreDb::open_temporary().unwrap();
        let p = profile("alice", "Alice@Example.com");
        db.put_profile(&p).unwrap();

        let loaded = db.get_profile("alice").unwrap().unwrap();
        assert_eq!(loaded.email, "Alice@Example.com");

        // Case-insensitive email lookup.
        let by_email = db.get_profile_by_email("alice@example.COM").unwrap().unwrap();
        assert_eq!(by_email.uid, "alice");

        // Changing the email retires the old index entry.
        let mut p2 = loaded;
        p2.email = "new@example.com".into();
        db.put_profile(&p2).unwrap();
        assert!(db.get_profile_by_email("alice@example.com").unwrap().is_none());
        assert!(db.get_profile_by_email("new@example.com").unwrap().is_some());

        db.delete_profile("alice").unwrap();
        assert!(db.get_profile("alice").unwrap().is_none());
        assert!(db.get_profile_by_email("new@example.com").unwrap().is_none());
    }

    #[test]
    fn messages_scan_in_insertion_order() {
        let db = StoreDb::open_temporary().unwrap();
        for i in 0..5 {
            let msg = Message {
                id: db.new_id(),
                conversation_id: "conv1".into(),
                sender_uid: "alice".into(),
                content: format!("message {i}"),
                sent_at: 100 + i,
                read_at: None,
                read_by: vec!["alice".into()],
                message_type: MessageType::Text,
            };
            db.append_message(&msg).unwrap();
        }
        // A different conversation must not leak into the scan.
        let other = Message {
            id: db.new_id(),
            conversation_id: "conv2".into(),
            sender_uid: "bob".into(),
            content: "elsewhere".into(),
            sent_at: 50,
            read_at: None,
            read_by: vec!["bob".into()],
            message_type: MessageType::Text,
        };
        db.append_message(&other).unwrap();

        let msgs = db.iter_messages("conv1").unwrap();
        assert_eq!(msgs.len(), 5);
        let contents: Vec<_> = msgs.iter().map(|(_, m)| m.content.clone()).collect();
        assert_eq!(contents[0], "message 0");
        assert_eq!(contents[4], "message 4");
    }

    #[test]
    fn ledger_scans_per_uid() {
        let db = StoreDb::open_temporary().unwrap();
        for (uid, amount) in [("alice", 10), ("alice", 20), ("bob", 5)] {
            db.append_points_tx(&LedgerEntry {
                id: db.new_id(),
                uid: uid.into(),
                kind: TransactionKind::Earned,
                amount,
                balance_after: amount,
                reason: TransactionReason::SwapCompleted,
                related_swap_id: None,
                related_skill: None,
                note: None,
                created_at: 0,
            })
            .unwrap();
        }
        let alice = db.iter_points_txs("alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].amount, 10);
        assert_eq!(alice[1].amount, 20);
        assert_eq!(db.iter_points_txs("bob").unwrap().len(), 1);
    }

    #[test]
    fn block_keys_are_unique_per_ordered_pair() {
        let db = StoreDb::open_temporary().unwrap();
        let block = Block {
            id: db.new_id(),
            blocker_uid: "alice".into(),
            blocked_uid: "bob".into(),
            created_at: 0,
            reason: None,
        };
        db.put_block(&block).unwrap();
        db.put_block(&block).unwrap(); // idempotent overwrite, not a duplicate
        assert_eq!(db.iter_blocks_by("alice").unwrap().len(), 1);
        assert!(db.either_blocked("bob", "alice").unwrap());
        assert!(db.get_block("bob", "alice").unwrap().is_none());

        db.delete_block("alice", "bob").unwrap();
        assert!(!db.either_blocked("alice", "bob").unwrap());
    }

    #[test]
    fn pending_between_finds_only_pending() {
        let db = StoreDb::open_temporary().unwrap();
        let mut swap = SwapRequest {
            id: "s1".into(),
            requester_uid: "alice".into(),
            recipient_uid: "bob".into(),
            status: SwapStatus::Pending,
            swap_type: skillswap_core::SwapType::Direct,
            requester_offer: Some("Python".into()),
            requester_need: "Guitar".into(),
            points_offered: None,
            points_reserved: 0,
            message: None,
            created_at: 0,
            updated_at: 0,
            responded_at: None,
            conversation_id: None,
            completion: Default::default(),
        };
        db.put_swap(&swap).unwrap();
        assert!(db.find_pending_between("alice", "bob").unwrap().is_some());
        assert!(db.find_pending_between("bob", "alice").unwrap().is_none());

        swap.status = SwapStatus::Declined;
        db.put_swap(&swap).unwrap();
        assert!(db.find_pending_between("alice", "bob").unwrap().is_none());
    }

    #[test]
    fn conversation_round_trip() {
        let db = StoreDb::open_temporary().unwrap();
        let conv = Conversation {
            id: "c1".into(),
            participant_uids: ["alice".into(), "bob".into()],
            swap_request_id: "s1".into(),
            status: ConversationStatus::Active,
            created_at: 0,
            updated_at: 0,
            last_message: None,
            unread_counts: Default::default(),
        };
        db.put_conversation(&conv).unwrap();
        assert_eq!(db.iter_conversations_for("alice").unwrap().len(), 1);
        assert_eq!(db.iter_conversations_for("carol").unwrap().len(), 0);
    }
}
