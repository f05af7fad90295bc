//! The economy engine: every points/credits balance mutation in the system
//! goes through here.
//!
//! Mutation discipline: take the owner's uid lock, read the balance, decide,
//! append the ledger record and write the new balance before releasing. A
//! reader that observes a profile balance therefore always finds a ledger
//! whose running total matches it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use skillswap_core::{
    ActiveBoost, LedgerEntry, Profile, SkillLevel, SwapError, SwapRequest, SwapType, Timestamp,
    TransactionKind, TransactionReason, Uid, INDIRECT_CREDIT_RATE, PRIORITY_BOOST_COST_PER_HOUR,
    PRIORITY_BOOST_MAX_HOURS, REQUEST_WITHOUT_RECIPROCITY_COST,
};
use skillswap_store::{LockMap, StoreDb};

use crate::formulas::{calculate_credits, calculate_points, review_bonus_credits, trust_score};

/// Pluggable skill-demand index. Recomputation is out of scope; the default
/// returns 1.0 for every skill.
pub trait DemandIndex: Send + Sync {
    fn multiplier(&self, skill: Option<&str>) -> f64;
}

pub struct FlatDemand;

impl DemandIndex for FlatDemand {
    fn multiplier(&self, _skill: Option<&str>) -> f64 {
        1.0
    }
}

/// What settlement awarded to each side.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub requester_points: i64,
    pub requester_credits: i64,
    pub recipient_points: i64,
    pub recipient_credits: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendReason {
    PriorityBoost,
    RequestWithoutReciprocity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpendResult {
    pub new_balance: i64,
    pub message: String,
    pub boost_ends_at: Option<Timestamp>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub uid: Uid,
    pub swap_points: i64,
    pub lifetime_points_earned: i64,
    pub swap_credits: i64,
    pub recent_transactions: Vec<LedgerEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryPage {
    pub transactions: Vec<LedgerEntry>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// An active boost with its remaining lifetime, for API consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoostView {
    pub id: String,
    pub boost_type: String,
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
    pub remaining_hours: f64,
}

pub struct EconomyEngine {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    demand: Arc<dyn DemandIndex>,
}

impl EconomyEngine {
    pub fn new(store: Arc<StoreDb>, locks: Arc<LockMap>, demand: Arc<dyn DemandIndex>) -> Self {
        Self {
            store,
            locks,
            demand,
        }
    }

    fn load_profile(&self, uid: &str) -> Result<Profile, SwapError> {
        self.store
            .get_profile(uid)?
            .ok_or_else(|| SwapError::ProfileNotFound(uid.to_string()))
    }

    // ── Reservation / refund (indirect swaps) ───────────────────────────────

    /// Deduct `amount` from the requester at request creation. Fails without
    /// writing anything when the balance is short.
    pub async fn reserve_points(
        &self,
        uid: &str,
        amount: i64,
        swap_id: &str,
        now: Timestamp,
    ) -> Result<i64, SwapError> {
        let _guard = self.locks.lock(uid).await;
        let mut profile = self.load_profile(uid)?;
        if profile.swap_points < amount {
            return Err(SwapError::InsufficientPoints {
                need: amount,
                have: profile.swap_points,
            });
        }
        profile.swap_points -= amount;
        profile.updated_at = now;

        self.store.append_points_tx(&LedgerEntry {
            id: self.store.new_id(),
            uid: uid.to_string(),
            kind: TransactionKind::Spent,
            amount,
            balance_after: profile.swap_points,
            reason: TransactionReason::IndirectSwapReserved,
            related_swap_id: Some(swap_id.to_string()),
            related_skill: None,
            note: None,
            created_at: now,
        })?;
        self.store.put_profile(&profile)?;
        info!(uid, amount, swap_id, "points reserved");
        Ok(profile.swap_points)
    }

    /// Return reserved points after a decline or cancel. Exactly-once is the
    /// caller's contract: the swap document's `points_reserved` is zeroed in
    /// the same transition that triggers the refund.
    pub async fn refund_points(
        &self,
        uid: &str,
        amount: i64,
        swap_id: &str,
        now: Timestamp,
    ) -> Result<i64, SwapError> {
        let _guard = self.locks.lock(uid).await;
        let mut profile = self.load_profile(uid)?;
        profile.swap_points += amount;
        profile.updated_at = now;

        self.store.append_points_tx(&LedgerEntry {
            id: self.store.new_id(),
            uid: uid.to_string(),
            kind: TransactionKind::Earned,
            amount,
            balance_after: profile.swap_points,
            reason: TransactionReason::IndirectSwapRefund,
            related_swap_id: Some(swap_id.to_string()),
            related_skill: None,
            note: None,
            created_at: now,
        })?;
        self.store.put_profile(&profile)?;
        info!(uid, amount, swap_id, "reserved points refunded");
        Ok(profile.swap_points)
    }

    // ── Settlement ──────────────────────────────────────────────────────────

    /// Run economic settlement for a completed swap.
    ///
    /// Direct: both parties earn full points and credits.
    /// Indirect: the provider earns full points + credits; the requester
    /// earns reduced credits only and gets a zero-amount payment marker —
    /// the reserved points stay consumed.
    pub async fn settle(
        &self,
        swap: &SwapRequest,
        final_hours: f64,
        requester_level: SkillLevel,
        recipient_level: SkillLevel,
        now: Timestamp,
    ) -> Result<SettlementOutcome, SwapError> {
        match swap.swap_type {
            SwapType::Direct => {
                let (requester_points, requester_credits) = self
                    .award_party(
                        &swap.requester_uid,
                        &swap.id,
                        final_hours,
                        requester_level,
                        swap.requester_offer.clone(),
                        1.0,
                        true,
                        None,
                        now,
                    )
                    .await?;
                let (recipient_points, recipient_credits) = self
                    .award_party(
                        &swap.recipient_uid,
                        &swap.id,
                        final_hours,
                        recipient_level,
                        Some(swap.requester_need.clone()),
                        1.0,
                        true,
                        None,
                        now,
                    )
                    .await?;
                Ok(SettlementOutcome {
                    requester_points,
                    requester_credits,
                    recipient_points,
                    recipient_credits,
                })
            }
            SwapType::Indirect => {
                // The provider's skill governs both awards.
                let level = recipient_level;
                let skill = Some(swap.requester_need.clone());
                let (recipient_points, recipient_credits) = self
                    .award_party(
                        &swap.recipient_uid,
                        &swap.id,
                        final_hours,
                        level,
                        skill.clone(),
                        1.0,
                        true,
                        None,
                        now,
                    )
                    .await?;
                let (_, requester_credits) = self
                    .award_party(
                        &swap.requester_uid,
                        &swap.id,
                        final_hours,
                        level,
                        skill,
                        INDIRECT_CREDIT_RATE,
                        false,
                        Some(swap.points_reserved),
                        now,
                    )
                    .await?;
                Ok(SettlementOutcome {
                    requester_points: 0,
                    requester_credits,
                    recipient_points,
                    recipient_credits,
                })
            }
        }
    }

    /// Apply one party's settlement under their uid lock: points (optional),
    /// credits, the indirect payment marker (optional), and the completion
    /// counters, written together.
    #[allow(clippy::too_many_arguments)]
    async fn award_party(
        &self,
        uid: &str,
        swap_id: &str,
        hours: f64,
        level: SkillLevel,
        skill: Option<String>,
        credit_rate: f64,
        award_points: bool,
        indirect_points_paid: Option<i64>,
        now: Timestamp,
    ) -> Result<(i64, i64), SwapError> {
        let _guard = self.locks.lock(uid).await;
        let mut profile = self.load_profile(uid)?;

        // Trust is computed from the pre-settlement counters.
        let trust = trust_score(profile.completed_swap_count, profile.average_rating);
        let demand = self.demand.multiplier(skill.as_deref());

        let points = if award_points {
            let points = calculate_points(hours, level, trust, demand);
            profile.swap_points += points;
            profile.lifetime_points_earned += points;
            self.store.append_points_tx(&LedgerEntry {
                id: self.store.new_id(),
                uid: uid.to_string(),
                kind: TransactionKind::Earned,
                amount: points,
                balance_after: profile.swap_points,
                reason: TransactionReason::SwapCompleted,
                related_swap_id: Some(swap_id.to_string()),
                related_skill: skill.clone(),
                note: None,
                created_at: now,
            })?;
            points
        } else {
            0
        };

        if let Some(paid) = indirect_points_paid {
            // Zero-amount audit marker: the reservation was the real deduction.
            self.store.append_points_tx(&LedgerEntry {
                id: self.store.new_id(),
                uid: uid.to_string(),
                kind: TransactionKind::Spent,
                amount: 0,
                balance_after: profile.swap_points,
                reason: TransactionReason::IndirectSwapPayment,
                related_swap_id: Some(swap_id.to_string()),
                related_skill: skill.clone(),
                note: Some(format!("finalized payment of {paid} points for indirect swap")),
                created_at: now,
            })?;
        }

        let credits = calculate_credits(hours, level, credit_rate);
        profile.swap_credits += credits;
        self.store.append_credits_tx(&LedgerEntry {
            id: self.store.new_id(),
            uid: uid.to_string(),
            kind: TransactionKind::Earned,
            amount: credits,
            balance_after: profile.swap_credits,
            reason: TransactionReason::SwapCompleted,
            related_swap_id: Some(swap_id.to_string()),
            related_skill: skill,
            note: None,
            created_at: now,
        })?;

        profile.completed_swap_count += 1;
        profile.total_hours_traded += hours;
        profile.updated_at = now;
        self.store.put_profile(&profile)?;

        info!(uid, swap_id, points, credits, "settlement applied");
        Ok((points, credits))
    }

    // ── Discretionary spend ─────────────────────────────────────────────────

    pub async fn spend(
        &self,
        uid: &str,
        reason: SpendReason,
        duration_hours: Option<i64>,
        now: Timestamp,
    ) -> Result<SpendResult, SwapError> {
        let (cost, tx_reason, duration) = match reason {
            SpendReason::PriorityBoost => {
                let hours = duration_hours.unwrap_or(24);
                if !(1..=PRIORITY_BOOST_MAX_HOURS).contains(&hours) {
                    return Err(SwapError::Validation(format!(
                        "boost duration must be 1..={PRIORITY_BOOST_MAX_HOURS} hours"
                    )));
                }
                (
                    PRIORITY_BOOST_COST_PER_HOUR * hours,
                    TransactionReason::PriorityBoost,
                    Some(hours),
                )
            }
            SpendReason::RequestWithoutReciprocity => (
                REQUEST_WITHOUT_RECIPROCITY_COST,
                TransactionReason::RequestWithoutReciprocity,
                None,
            ),
        };

        let _guard = self.locks.lock(uid).await;
        let mut profile = self.load_profile(uid)?;
        if profile.swap_points < cost {
            return Err(SwapError::InsufficientPoints {
                need: cost,
                have: profile.swap_points,
            });
        }
        profile.swap_points -= cost;
        profile.updated_at = now;

        self.store.append_points_tx(&LedgerEntry {
            id: self.store.new_id(),
            uid: uid.to_string(),
            kind: TransactionKind::Spent,
            amount: cost,
            balance_after: profile.swap_points,
            reason: tx_reason,
            related_swap_id: None,
            related_skill: None,
            note: None,
            created_at: now,
        })?;
        self.store.put_profile(&profile)?;

        let (message, boost_ends_at) = match duration {
            Some(hours) => {
                let ends_at = now + hours * 3_600;
                self.store.append_boost(&ActiveBoost {
                    id: self.store.new_id(),
                    uid: uid.to_string(),
                    boost_type: "priority".into(),
                    started_at: now,
                    ends_at,
                    points_spent: cost,
                })?;
                (
                    format!("Priority boost activated for {hours} hours!"),
                    Some(ends_at),
                )
            }
            None => (
                "You can now request help without offering a skill in return.".to_string(),
                None,
            ),
        };

        Ok(SpendResult {
            new_balance: profile.swap_points,
            message,
            boost_ends_at,
        })
    }

    /// Credits bonus for a received review, recorded on the ledger.
    pub async fn award_review_bonus(
        &self,
        uid: &str,
        swap_id: &str,
        hours: f64,
        rating: u8,
        skill: Option<String>,
        now: Timestamp,
    ) -> Result<i64, SwapError> {
        let credits = review_bonus_credits(hours, rating);

        let _guard = self.locks.lock(uid).await;
        let mut profile = self.load_profile(uid)?;
        profile.swap_credits += credits;
        profile.updated_at = now;

        self.store.append_credits_tx(&LedgerEntry {
            id: self.store.new_id(),
            uid: uid.to_string(),
            kind: TransactionKind::Earned,
            amount: credits,
            balance_after: profile.swap_credits,
            reason: TransactionReason::Bonus,
            related_swap_id: Some(swap_id.to_string()),
            related_skill: skill,
            note: None,
            created_at: now,
        })?;
        self.store.put_profile(&profile)?;
        Ok(credits)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn balance(&self, uid: &str, transaction_limit: usize) -> Result<BalanceInfo, SwapError> {
        let profile = self.load_profile(uid)?;
        let mut txs = self.store.iter_points_txs(uid)?;
        txs.reverse(); // newest first
        txs.truncate(transaction_limit);
        Ok(BalanceInfo {
            uid: uid.to_string(),
            swap_points: profile.swap_points,
            lifetime_points_earned: profile.lifetime_points_earned,
            swap_credits: profile.swap_credits,
            recent_transactions: txs,
        })
    }

    pub fn history(
        &self,
        uid: &str,
        limit: usize,
        offset: usize,
        kind_filter: Option<TransactionKind>,
    ) -> Result<HistoryPage, SwapError> {
        let mut txs = self.store.iter_points_txs(uid)?;
        if let Some(kind) = kind_filter {
            txs.retain(|t| t.kind == kind);
        }
        txs.reverse();
        let total = txs.len();
        let transactions: Vec<LedgerEntry> = txs.into_iter().skip(offset).take(limit).collect();
        Ok(HistoryPage {
            has_more: offset + limit < total,
            transactions,
            total,
            limit,
            offset,
        })
    }

    pub fn active_boosts(&self, uid: &str, now: Timestamp) -> Result<Vec<BoostView>, SwapError> {
        Ok(self
            .store
            .iter_boosts(uid)?
            .into_iter()
            .filter(|b| b.ends_at > now)
            .map(|b| BoostView {
                remaining_hours: ((b.ends_at - now) as f64 / 3_600.0 * 10.0).round() / 10.0,
                id: b.id,
                boost_type: b.boost_type,
                started_at: b.started_at,
                ends_at: b.ends_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillswap_core::SwapStatus;

    fn engine() -> EconomyEngine {
        let store = Arc::new(StoreDb::open_temporary().unwrap());
        EconomyEngine::new(store, Arc::new(LockMap::new()), Arc::new(FlatDemand))
    }

    fn seed_profile(engine: &EconomyEngine, uid: &str, points: i64) {
        let mut p = Profile::new(uid.into(), format!("{uid}@example.com"), 0);
        p.swap_points = points;
        engine.store.put_profile(&p).unwrap();
    }

    fn swap(id: &str, swap_type: SwapType, reserved: i64) -> SwapRequest {
        SwapRequest {
            id: id.into(),
            requester_uid: "carol".into(),
            recipient_uid: "dave".into(),
            status: SwapStatus::Completed,
            swap_type,
            requester_offer: Some("Python".into()),
            requester_need: "Violin lesson".into(),
            points_offered: (reserved > 0).then_some(reserved),
            points_reserved: reserved,
            message: None,
            created_at: 0,
            updated_at: 0,
            responded_at: None,
            conversation_id: None,
            completion: Default::default(),
        }
    }

    #[tokio::test]
    async fn reserve_then_refund_restores_balance() {
        let engine = engine();
        seed_profile(&engine, "carol", 200);

        let after = engine.reserve_points("carol", 120, "R", 10).await.unwrap();
        assert_eq!(after, 80);

        let after = engine.refund_points("carol", 120, "R", 20).await.unwrap();
        assert_eq!(after, 200);

        let txs = engine.store.iter_points_txs("carol").unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].reason, TransactionReason::IndirectSwapReserved);
        assert_eq!(txs[0].amount, 120);
        assert_eq!(txs[0].balance_after, 80);
        assert_eq!(txs[1].reason, TransactionReason::IndirectSwapRefund);
        assert_eq!(txs[1].balance_after, 200);
    }

    #[tokio::test]
    async fn reserve_rejects_short_balance_without_writing() {
        let engine = engine();
        seed_profile(&engine, "carol", 50);
        let err = engine.reserve_points("carol", 120, "R", 0).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::InsufficientPoints { need: 120, have: 50 }
        ));
        assert!(engine.store.iter_points_txs("carol").unwrap().is_empty());
        assert_eq!(engine.store.get_profile("carol").unwrap().unwrap().swap_points, 50);
    }

    #[tokio::test]
    async fn direct_settlement_awards_both_parties() {
        let engine = engine();
        seed_profile(&engine, "carol", 0);
        seed_profile(&engine, "dave", 0);

        let outcome = engine
            .settle(
                &swap("S", SwapType::Direct, 0),
                2.0,
                SkillLevel::Intermediate,
                SkillLevel::Intermediate,
                100,
            )
            .await
            .unwrap();

        // First swap for both: trust 0, demand 1.0 → 19 points, 20 credits.
        assert_eq!(outcome.requester_points, 19);
        assert_eq!(outcome.recipient_points, 19);
        assert_eq!(outcome.requester_credits, 20);
        assert_eq!(outcome.recipient_credits, 20);

        for uid in ["carol", "dave"] {
            let p = engine.store.get_profile(uid).unwrap().unwrap();
            assert_eq!(p.swap_points, 19);
            assert_eq!(p.lifetime_points_earned, 19);
            assert_eq!(p.swap_credits, 20);
            assert_eq!(p.completed_swap_count, 1);
            assert_eq!(p.total_hours_traded, 2.0);
        }
    }

    #[tokio::test]
    async fn indirect_settlement_keeps_reservation_and_marks_payment() {
        let engine = engine();
        seed_profile(&engine, "carol", 200);
        seed_profile(&engine, "dave", 0);

        engine.reserve_points("carol", 120, "R", 0).await.unwrap();
        let outcome = engine
            .settle(
                &swap("R", SwapType::Indirect, 120),
                1.0,
                SkillLevel::Advanced,
                SkillLevel::Advanced,
                100,
            )
            .await
            .unwrap();

        assert_eq!(outcome.requester_points, 0);
        assert_eq!(outcome.requester_credits, 6); // round(0.5 · 10 · 1.25)
        assert_eq!(outcome.recipient_points, 11); // round(10 · 1.05)
        assert_eq!(outcome.recipient_credits, 13); // round(10 · 1.25)

        let carol = engine.store.get_profile("carol").unwrap().unwrap();
        assert_eq!(carol.swap_points, 80); // NOT refunded
        assert_eq!(carol.swap_credits, 6);

        let txs = engine.store.iter_points_txs("carol").unwrap();
        let marker = txs
            .iter()
            .find(|t| t.reason == TransactionReason::IndirectSwapPayment)
            .unwrap();
        assert_eq!(marker.amount, 0);
        assert_eq!(marker.balance_after, 80);
        assert!(!txs
            .iter()
            .any(|t| t.reason == TransactionReason::IndirectSwapRefund));
    }

    #[tokio::test]
    async fn spend_priority_boost_creates_boost_record() {
        let engine = engine();
        seed_profile(&engine, "erin", 100);

        let result = engine
            .spend("erin", SpendReason::PriorityBoost, Some(10), 1_000)
            .await
            .unwrap();
        assert_eq!(result.new_balance, 50);
        assert_eq!(result.boost_ends_at, Some(1_000 + 36_000));

        let boosts = engine.active_boosts("erin", 1_000).unwrap();
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].remaining_hours, 10.0);

        // Expired boosts disappear from the view.
        assert!(engine.active_boosts("erin", 1_000 + 36_001).unwrap().is_empty());
    }

    #[tokio::test]
    async fn spend_rejects_insufficient_and_bad_duration() {
        let engine = engine();
        seed_profile(&engine, "erin", 10);

        let err = engine
            .spend("erin", SpendReason::RequestWithoutReciprocity, None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InsufficientPoints { need: 50, have: 10 }));

        let err = engine
            .spend("erin", SpendReason::PriorityBoost, Some(0), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(_)));
        let err = engine
            .spend("erin", SpendReason::PriorityBoost, Some(169), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Validation(_)));
    }

    #[tokio::test]
    async fn history_filters_and_pages() {
        let engine = engine();
        seed_profile(&engine, "erin", 500);
        engine.reserve_points("erin", 10, "a", 1).await.unwrap();
        engine.refund_points("erin", 10, "a", 2).await.unwrap();
        engine.reserve_points("erin", 20, "b", 3).await.unwrap();

        let all = engine.history("erin", 10, 0, None).unwrap();
        assert_eq!(all.total, 3);
        // Newest first.
        assert_eq!(all.transactions[0].related_swap_id.as_deref(), Some("b"));

        let spent = engine
            .history("erin", 10, 0, Some(TransactionKind::Spent))
            .unwrap();
        assert_eq!(spent.total, 2);

        let page = engine.history("erin", 1, 1, None).unwrap();
        assert_eq!(page.transactions.len(), 1);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn balance_reports_running_ledger(){
        let engine = engine();
        seed_profile(&engine, "erin", 100);
        engine.reserve_points("erin", 30, "x", 1).await.unwrap();

        let info = engine.balance("erin", 10).unwrap();
        assert_eq!(info.swap_points, 70);
        assert_eq!(info.recent_transactions.len(), 1);
        assert_eq!(info.recent_transactions[0].balance_after, 70);
    }
}
