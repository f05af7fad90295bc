//! Swap request creation, response and cancellation.
//!
//! Indirect requests reserve the offered points at creation; the reservation
//! is refunded exactly once if the request ends declined or cancelled (the
//! status transition under the swap lock is the once-guard, with a ledger
//! check backstopping retried partial failures).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use skillswap_core::{
    SwapError, SwapRequest, SwapStatus, SwapType, Timestamp, TransactionReason, Uid, LIST_SCAN_CAP,
};
use skillswap_economy::EconomyEngine;
use skillswap_messaging::MessagingService;
use skillswap_notify::NotificationService;
use skillswap_store::{LockMap, StoreDb};

/// Upper bound on the optional intro message.
const MAX_REQUEST_MESSAGE_CHARS: usize = 500;

#[derive(Clone, Debug, Deserialize)]
pub struct SwapRequestCreate {
    pub recipient_uid: Uid,
    pub swap_type: SwapType,
    pub requester_offer: Option<String>,
    pub requester_need: String,
    pub points_offered: Option<i64>,
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Decline,
}

pub struct SwapService {
    store: Arc<StoreDb>,
    locks: Arc<LockMap>,
    economy: Arc<EconomyEngine>,
    messaging: Arc<MessagingService>,
    notify: Arc<NotificationService>,
}

impl SwapService {
    pub fn new(
        store: Arc<StoreDb>,
        locks: Arc<LockMap>,
        economy: Arc<EconomyEngine>,
        messaging: Arc<MessagingService>,
        notify: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            locks,
            economy,
            messaging,
            notify,
        }
    }

    // ── Create ──────────────────────────────────────────────────────────────

    pub async fn create(
        &self,
        requester_uid: &str,
        input: SwapRequestCreate,
        now: Timestamp,
    ) -> Result<SwapRequest, SwapError> {
        if requester_uid == input.recipient_uid {
            return Err(SwapError::SelfTarget("send a swap request to"));
        }
        if input.requester_need.trim().is_empty() {
            return Err(SwapError::Validation("requester_need is required".into()));
        }
        if let Some(message) = &input.message {
            if message.chars().count() > MAX_REQUEST_MESSAGE_CHARS {
                return Err(SwapError::Validation(format!(
                    "message must be at most {MAX_REQUEST_MESSAGE_CHARS} characters"
                )));
            }
        }
        match input.swap_type {
            SwapType::Direct => {
                if input
                    .requester_offer
                    .as_deref()
                    .map(|s| s.trim().is_empty())
                    .unwrap_or(true)
                {
                    return Err(SwapError::Validation(
                        "requester_offer is required for direct swaps".into(),
                    ));
                }
            }
            SwapType::Indirect => {
                if input.points_offered.unwrap_or(0) < 1 {
                    return Err(SwapError::Validation(
                        "points_offered must be at least 1 for indirect swaps".into(),
                    ));
                }
            }
        }

        if self.store.either_blocked(requester_uid, &input.recipient_uid)? {
            return Err(SwapError::Blocked);
        }
        let recipient_profile = self
            .store
            .get_profile(&input.recipient_uid)?
            .ok_or_else(|| SwapError::ProfileNotFound(input.recipient_uid.clone()))?;
        if self.store.get_profile(requester_uid)?.is_none() {
            return Err(SwapError::ProfileNotFound(requester_uid.to_string()));
        }
        if self
            .store
            .find_pending_between(requester_uid, &input.recipient_uid)?
            .is_some()
        {
            return Err(SwapError::DuplicatePendingRequest);
        }

        let id = self.store.new_id();

        // Reserve before the request becomes visible: a request that exists
        // in `pending` always has its points held.
        let points_reserved = if input.swap_type == SwapType::Indirect {
            let amount = input.points_offered.unwrap_or(0);
            self.economy
                .reserve_points(requester_uid, amount, &id, now)
                .await?;
            amount
        } else {
            0
        };

        let swap = SwapRequest {
            id: id.clone(),
            requester_uid: requester_uid.to_string(),
            recipient_uid: input.recipient_uid.clone(),
            status: SwapStatus::Pending,
            swap_type: input.swap_type,
            requester_offer: input.requester_offer.clone(),
            requester_need: input.requester_need.clone(),
            points_offered: input.points_offered,
            points_reserved,
            message: input.message.clone(),
            created_at: now,
            updated_at: now,
            responded_at: None,
            conversation_id: None,
            completion: Default::default(),
        };
        if let Err(e) = self.store.put_swap(&swap) {
            // Undo the reservation rather than strand the points.
            if points_reserved > 0 {
                if let Err(refund_err) = self
                    .economy
                    .refund_points(requester_uid, points_reserved, &id, now)
                    .await
                {
                    warn!(swap_id = %id, error = %refund_err, "refund after failed create also failed");
                }
            }
            return Err(e);
        }
        info!(swap_id = %id, requester_uid, recipient_uid = %input.recipient_uid, "swap request created");

        if recipient_profile.email_updates && !recipient_profile.email.is_empty() {
            let requester_name = self
                .store
                .get_profile(requester_uid)?
                .and_then(|p| p.display_name)
                .unwrap_or_else(|| "Someone".into());
            self.notify
                .send_swap_request(
                    &recipient_profile.email,
                    recipient_profile.display_name.as_deref().unwrap_or("there"),
                    &requester_name,
                    swap.requester_offer.as_deref().unwrap_or_default(),
                    &swap.requester_need,
                    swap.message.as_deref().unwrap_or_default(),
                )
                .await;
        }

        Ok(swap)
    }

    // ── Respond ─────────────────────────────────────────────────────────────

    /// Accept or decline. Recipient only, pending only. Accept bootstraps the
    /// conversation; decline refunds any reservation.
    pub async fn respond(
        &self,
        request_id: &str,
        uid: &str,
        action: RespondAction,
        now: Timestamp,
    ) -> Result<SwapRequest, SwapError> {
        let _guard = self.locks.lock(request_id).await;

        let mut swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if swap.recipient_uid != uid {
            return Err(SwapError::NotRecipient);
        }
        if swap.status != SwapStatus::Pending {
            return Err(SwapError::AlreadyResponded);
        }

        match action {
            RespondAction::Accept => {
                let conversation = self.messaging.create_for_swap(&swap, now)?;
                swap.status = SwapStatus::Accepted;
                swap.conversation_id = Some(conversation.id);
            }
            RespondAction::Decline => {
                swap.status = SwapStatus::Declined;
            }
        }
        swap.responded_at = Some(now);
        swap.updated_at = now;

        let refund = (action == RespondAction::Decline && swap.points_reserved > 0)
            .then_some(swap.points_reserved);
        if refund.is_some() {
            swap.points_reserved = 0;
        }
        self.store.put_swap(&swap)?;
        drop(_guard);

        if let Some(amount) = refund {
            self.refund_once(&swap.requester_uid, amount, &swap.id, now)
                .await?;
        }

        self.update_response_rate(uid, now).await?;
        self.notify_requester(&swap, action == RespondAction::Accept)
            .await;

        info!(swap_id = %swap.id, ?action, "swap request responded");
        Ok(swap)
    }

    // ── Cancel ──────────────────────────────────────────────────────────────

    /// Requester-only cancel of a pending request.
    pub async fn cancel(
        &self,
        request_id: &str,
        uid: &str,
        now: Timestamp,
    ) -> Result<(), SwapError> {
        let _guard = self.locks.lock(request_id).await;

        let mut swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if swap.requester_uid != uid {
            return Err(SwapError::NotRequester);
        }
        if swap.status != SwapStatus::Pending {
            return Err(SwapError::NotCancellable);
        }

        swap.status = SwapStatus::Cancelled;
        swap.updated_at = now;
        let refund = (swap.points_reserved > 0).then_some(swap.points_reserved);
        if refund.is_some() {
            swap.points_reserved = 0;
        }
        self.store.put_swap(&swap)?;
        drop(_guard);

        if let Some(amount) = refund {
            self.refund_once(&swap.requester_uid, amount, &swap.id, now)
                .await?;
        }
        info!(swap_id = %request_id, "swap request cancelled");
        Ok(())
    }

    /// Refund guarded against replays: skip when the ledger already carries a
    /// refund for this swap (a retried decline/cancel after a partial failure).
    async fn refund_once(
        &self,
        requester_uid: &str,
        amount: i64,
        swap_id: &str,
        now: Timestamp,
    ) -> Result<(), SwapError> {
        let already = self.store.iter_points_txs(requester_uid)?.iter().any(|t| {
            t.reason == TransactionReason::IndirectSwapRefund
                && t.related_swap_id.as_deref() == Some(swap_id)
        });
        if already {
            warn!(swap_id, "refund already recorded, skipping");
            return Ok(());
        }
        self.economy
            .refund_points(requester_uid, amount, swap_id, now)
            .await?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub fn get(&self, request_id: &str, uid: &str) -> Result<SwapRequest, SwapError> {
        let swap = self
            .store
            .get_swap(request_id)?
            .ok_or_else(|| SwapError::SwapRequestNotFound(request_id.to_string()))?;
        if !swap.is_participant(uid) {
            return Err(SwapError::NotParticipant);
        }
        Ok(swap)
    }

    /// Requests sent TO the user, newest first.
    pub fn incoming(
        &self,
        uid: &str,
        status: Option<SwapStatus>,
    ) -> Result<Vec<SwapRequest>, SwapError> {
        let mut swaps = self.store.iter_swaps_for_recipient(uid)?;
        Self::filter_sort(&mut swaps, status);
        Ok(swaps)
    }

    /// Requests sent BY the user, newest first.
    pub fn outgoing(
        &self,
        uid: &str,
        status: Option<SwapStatus>,
    ) -> Result<Vec<SwapRequest>, SwapError> {
        let mut swaps = self.store.iter_swaps_for_requester(uid)?;
        Self::filter_sort(&mut swaps, status);
        Ok(swaps)
    }

    /// Completed swaps in either role, most recently updated first.
    pub fn completed(&self, uid: &str, limit: usize) -> Result<Vec<SwapRequest>, SwapError> {
        let mut swaps = self.store.iter_swaps_for_requester(uid)?;
        swaps.extend(self.store.iter_swaps_for_recipient(uid)?);
        swaps.retain(|s| s.status == SwapStatus::Completed);
        swaps.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        swaps.truncate(limit.clamp(1, 100));
        Ok(swaps)
    }

    fn filter_sort(swaps: &mut Vec<SwapRequest>, status: Option<SwapStatus>) {
        if let Some(status) = status {
            swaps.retain(|s| s.status == status);
        }
        swaps.truncate(LIST_SCAN_CAP);
        swaps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    // ── Side effects ────────────────────────────────────────────────────────

    /// Recompute the recipient's response rate over everything they have
    /// received: responded = now in {accepted, declined, completed}.
    async fn update_response_rate(&self, uid: &str, now: Timestamp) -> Result<(), SwapError> {
        let received = self.store.iter_swaps_for_recipient(uid)?;
        if received.is_empty() {
            return Ok(());
        }
        let responded = received
            .iter()
            .filter(|s| s.status.counts_as_responded())
            .count();
        let rate = responded as f64 / received.len() as f64 * 100.0;

        let _guard = self.locks.lock(uid).await;
        if let Some(mut profile) = self.store.get_profile(uid)? {
            profile.response_rate = Some((rate * 10.0).round() / 10.0);
            profile.updated_at = now;
            self.store.put_profile(&profile)?;
        }
        Ok(())
    }

    async fn notify_requester(&self, swap: &SwapRequest, accepted: bool) {
        let Ok(Some(requester)) = self.store.get_profile(&swap.requester_uid) else {
            return;
        };
        if !requester.email_updates || requester.email.is_empty() {
            return;
        }
        let recipient_name = self
            .store
            .get_profile(&swap.recipient_uid)
            .ok()
            .flatten()
            .and_then(|p| p.display_name)
            .unwrap_or_else(|| "Someone".into());
        self.notify
            .send_swap_response(
                &requester.email,
                requester.display_name.as_deref().unwrap_or("there"),
                &recipient_name,
                accepted,
            )
            .await;
    }
}
