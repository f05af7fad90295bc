//! Two-sided completion protocol.
//!
//! First mark opens a 48-hour window; the second mark (or an explicit
//! verify) finalizes and settles. Dual marks average the two hour claims;
//! verify adopts the other party's claim verbatim — that asymmetry is
//! deliberate ("verify" means "accept their claim"). When the window lapses
//! the sweeper finalizes in the marking party's favour.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use skillswap_core::{
    Completion, Dispute, DisputeStatus, PartyCompletion, SkillLevel, SwapError, SwapRequest,
    SwapStatus, Timestamp, AUTO_COMPLETE_HOURS, MAX_HOURS_CLAIMED, MIN_HOURS_CLAIMED,
};
use skillswap_economy::EconomyEngine;
use skillswap_notify::NotificationService;
use skillswap_store::{LockMap, StoreDb};

#[derive(Clone, Debug, Deserialize)]
pub struct CompletionInput {
    pub hours_exchanged: f64,
    pub skill_level: SkillLevel,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VerifyAction {
    Verify,
    Dispute { dispute_reason: String },
}

/// Completion state view returned by every completion endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub swap_request_id: String,
    pub status: SwapStatus,
    pub requester_completion: PartyCompletion,
    pub recipient_completion: PartyCompletion,
    pub auto_complete_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub final_hours: Option<f64>,
}

impl CompletionStatus {
    fn from_swap(swap: &SwapRequest) -> Self {
        Self {
            swap_request_id: swap.id.clone(),
            status: swap.status,
            requester_completion: swap.completion.requester.clone(),
            recipient_completion: swap.completion.recipient.clone(),
            auto_complete_at: swap.completion.auto_complete_at,
            completed_at: swap.completion.completed_at,
            final_hours: swap.completion.final_hours,
        }
    }
}

/// Pick the settlement skill levels: a party's own claim wins, the other
/// party's claim fills a gap (verify and auto-complete paths), intermediate
/// as the last resort.
fn resolve_levels(completion: &Completion) -> (SkillLevel, SkillLevel) {
    let requester = completion.requester.skill_level;
    let recipient = completion.recipient.skill_level;
    let fallback = SkillLevel::Intermediate;
    (
        requester.or(recipient).unwrap_or(fallback),
        recipient.or(requester).unwrap_or(fallback),
    )
}

pub struct CompletionService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    economy: Arc<EconomyEngine>,
    notify: Arc<NotificationService>,
}

impl CompletionService {
    pub fn new(
        store: Arc<StoreDb>,
        locks: Arc<LockMap>,
        economy: Arc<EconomyEngine>,
        notify: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            locks,
            economy,
            notify,
        }
    }

    // ── Mark complete ───────────────────────────────────────────────────────

    pub async fn mark_complete(
        &self,
        request_id: &str,
        uid: &str,
        input: CompletionInput,
        now: Timestamp,
    ) -> Result<CompletionStatus, SwapError> {
        if !(MIN_HOURS_CLAIMED..=MAX_HOURS_CLAIMED).contains(&input.hours_exchanged) {
            return Err(SwapError::Validation(format!(
                "hours_exchanged must be {MIN_HOURS_CLAIMED}..={MAX_HOURS_CLAIMED}"
            )));
        }

        let _guard = self.locks.lock(request_id).await;

        let mut swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if !swap.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        if !matches!(
            swap.status,
            SwapStatus::Accepted | SwapStatus::PendingCompletion
        ) {
            return Err(SwapError::NotCompletable(swap.status.as_str().to_string()));
        }

        let is_requester = swap.requester_uid == uid;
        if swap.completion.party(is_requester).marked_complete {
            return Err(SwapError::AlreadyMarkedComplete);
        }

        *swap.completion.party_mut(is_requester) = PartyCompletion {
            marked_complete: true,
            marked_at: Some(now),
            hours_claimed: Some(input.hours_exchanged),
            skill_level: Some(input.skill_level),
            notes: input.notes,
            dispute_reason: None,
            disputed_at: None,
        };

        let other_marked = swap.completion.party(!is_requester).marked_complete;
        if other_marked {
            // Both sides now agree the swap happened; average the claims.
            let other_hours = swap
                .completion
                .party(!is_requester)
                .hours_claimed
                .unwrap_or(input.hours_exchanged);
            let final_hours = (input.hours_exchanged + other_hours) / 2.0;
            self.finalize(&mut swap, final_hours, now).await?;
        } else {
            swap.status = SwapStatus::PendingCompletion;
            swap.completion.auto_complete_at = Some(now + AUTO_COMPLETE_HOURS * 3_600);
            swap.updated_at = now;
            self.store.put_swap(&swap)?;

            self.notify_completion_pending(&swap, uid, input.hours_exchanged)
                .await;
        }

        Ok(CompletionStatus::from_swap(&swap))
    }

    // ── Verify / dispute ────────────────────────────────────────────────────

    /// Only the party that has NOT marked yet may call, only while
    /// `pending_completion`.
    pub async fn verify(
        &self,
        request_id: &str,
        uid: &str,
        action: VerifyAction,
        now: Timestamp,
    ) -> Result<CompletionStatus, SwapError> {
        let _guard = self.locks.lock(request_id).await;

        let mut swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if !swap.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        if swap.status != SwapStatus::PendingCompletion {
            return Err(SwapError::NotVerifiable(swap.status.as_str().to_string()));
        }

        let is_requester = swap.requester_uid == uid;
        if swap.completion.party(is_requester).marked_complete {
            return Err(SwapError::AlreadyMarkedComplete);
        }
        if !swap.completion.party(!is_requester).marked_complete {
            return Err(SwapError::NothingToVerify);
        }

        match action {
            VerifyAction::Verify => {
                // Verify adopts the other party's hours claim as final.
                let final_hours = swap
                    .completion
                    .party(!is_requester)
                    .hours_claimed
                    .unwrap_or(1.0);
                let party = swap.completion.party_mut(is_requester);
                party.marked_complete = true;
                party.marked_at = Some(now);
                self.finalize(&mut swap, final_hours, now).await?;
            }
            VerifyAction::Dispute { dispute_reason } => {
                if dispute_reason.trim().is_empty() {
                    return Err(SwapError::Validation("dispute reason is required".into()));
                }
                let party = swap.completion.party_mut(is_requester);
                party.dispute_reason = Some(dispute_reason.clone());
                party.disputed_at = Some(now);
                swap.status = SwapStatus::Disputed;
                swap.completion.auto_complete_at = None;
                swap.updated_at = now;

                self.store.put_dispute(&Dispute {
                    id: self.store.new_id(),
                    swap_request_id: swap.id.clone(),
                    disputer_uid: uid.to_string(),
                    reason: dispute_reason.clone(),
                    status: DisputeStatus::Pending,
                    created_at: now,
                })?;
                self.store.put_swap(&swap)?;
                warn!(swap_id = %swap.id, uid, "completion disputed");

                self.notify_disputed(&swap, uid, &dispute_reason).await;
            }
        }

        Ok(CompletionStatus::from_swap(&swap))
    }

    pub fn completion_status(
        &self,
        request_id: &str,
        uid: &str,
    ) -> Result<CompletionStatus, SwapError> {
        let swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if !swap.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        Ok(CompletionStatus::from_swap(&swap))
    }

    // ── Auto-complete sweep ─────────────────────────────────────────────────

    /// Finalize every swap whose completion window has lapsed, in the marking
    /// party's favour. Idempotent: finalized swaps leave `pending_completion`
    /// and are re-checked under the lock, so a second sweep is a no-op.
    pub async fn sweep_auto_complete(&self, now: Timestamp) -> Result<usize, SwapError> {
        let due: Vec<SwapRequest> = self
            .store
            .iter_pending_completion()?
            .into_iter()
            .filter(|s| {
                s.completion
                    .auto_complete_at
                    .map(|t| t <= now)
                    .unwrap_or(false)
            })
            .collect();

        let mut finalized = 0;
        for stale in due {
            let _guard = self.locks.lock(&stale.id).await;
            // Re-read: another worker (or the second party) may have won.
            let Some(mut swap) = self.store.get_swap(&stale.id)? else {
                continue;
            };
            if swap.status != SwapStatus::PendingCompletion {
                continue;
            }
            let Some(deadline) = swap.completion.auto_complete_at else {
                continue;
            };
            if deadline > now {
                continue;
            }

            // The marking party's claim becomes final; the silent party's
            // position stays unmarked.
            let marker = if swap.completion.requester.marked_complete {
                &swap.completion.requester
            } else {
                &swap.completion.recipient
            };
            let final_hours = marker.hours_claimed.unwrap_or(1.0);
            self.finalize(&mut swap, final_hours, now).await?;
            finalized += 1;
            info!(swap_id = %swap.id, final_hours, "swap auto-completed");
        }
        Ok(finalized)
    }

    // ── Shared finalization ─────────────────────────────────────────────────

    /// Settle and persist a completed swap. Settlement runs before the
    /// terminal status is written, so no reader ever observes a completed
    /// swap with unsettled points. The caller holds the swap lock.
    async fn finalize(
        &self,
        swap: &mut SwapRequest,
        final_hours: f64,
        now: Timestamp,
    ) -> Result<(), SwapError> {
        let (requester_level, recipient_level) = resolve_levels(&swap.completion);
        let outcome = self
            .economy
            .settle(swap, final_hours, requester_level, recipient_level, now)
            .await?;

        swap.status = SwapStatus::Completed;
        swap.completion.completed_at = Some(now);
        swap.completion.final_hours = Some(final_hours);
        swap.completion.auto_complete_at = None;
        swap.completion.requester_points_earned = Some(outcome.requester_points);
        swap.completion.requester_credits_earned = Some(outcome.requester_credits);
        swap.completion.recipient_points_earned = Some(outcome.recipient_points);
        swap.completion.recipient_credits_earned = Some(outcome.recipient_credits);
        swap.updated_at = now;
        self.store.put_swap(swap)?;
        info!(swap_id = %swap.id, final_hours, "swap completed and settled");
        Ok(())
    }

    // ── Notifications ───────────────────────────────────────────────────────

    async fn notify_completion_pending(&self, swap: &SwapRequest, marker_uid: &str, hours: f64) {
        let other_uid = swap.other_party(marker_uid);
        let Ok(Some(other)) = self.store.get_profile(other_uid) else {
            return;
        };
        if !other.email_updates || other.email.is_empty() {
            return;
        }
        let marker_name = self
            .store
            .get_profile(marker_uid)
            .ok()
            .flatten()
            .and_then(|p| p.display_name)
            .unwrap_or_else(|| "Your swap partner".into());
        let deadline = swap
            .completion
            .auto_complete_at
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        self.notify
            .send_completion_pending(
                &other.email,
                other.display_name.as_deref().unwrap_or("there"),
                &marker_name,
                hours,
                &deadline,
            )
            .await;
    }

    async fn notify_disputed(&self, swap: &SwapRequest, disputer_uid: &str, reason: &str) {
        let other_uid = swap.other_party(disputer_uid);
        let Ok(Some(other)) = self.store.get_profile(other_uid) else {
            return;
        };
        if !other.email_updates || other.email.is_empty() {
            return;
        }
        self.notify
            .send_completion_disputed(
                &other.email,
                other.display_name.as_deref().unwrap_or("there"),
                reason,
            )
            .await;
    }
}
