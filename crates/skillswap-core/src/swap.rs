//! Swap request and completion state.
//!
//! The status graph (terminal states: declined, cancelled, completed, disputed):
//!
//! ```text
//! pending ── decline ──────────────► declined
//!    │ ────── cancel ──────────────► cancelled
//!    └── accept ──► accepted
//!                      │ mark_complete (first party)
//!                      ▼
//!             pending_completion ── mark_complete / verify ──► completed
//!                      │ ──────────── dispute ──────────────► disputed
//!                      └── auto_complete_at reached ─────────► completed
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{Credits, Hours, Points, Timestamp, Uid};

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
    PendingCompletion,
    Disputed,
    Completed,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Declined => "declined",
            SwapStatus::Cancelled => "cancelled",
            SwapStatus::PendingCompletion => "pending_completion",
            SwapStatus::Disputed => "disputed",
            SwapStatus::Completed => "completed",
        }
    }

    /// True if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Declined
                | SwapStatus::Cancelled
                | SwapStatus::Completed
                | SwapStatus::Disputed
        )
    }

    /// Statuses that count as "responded" for the response-rate metric.
    pub fn counts_as_responded(&self) -> bool {
        matches!(
            self,
            SwapStatus::Accepted | SwapStatus::Declined | SwapStatus::Completed
        )
    }
}

impl std::str::FromStr for SwapStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        Ok(match s {
            "pending" => SwapStatus::Pending,
            "accepted" => SwapStatus::Accepted,
            "declined" => SwapStatus::Declined,
            "cancelled" => SwapStatus::Cancelled,
            "pending_completion" => SwapStatus::PendingCompletion,
            "disputed" => SwapStatus::Disputed,
            "completed" => SwapStatus::Completed,
            _ => return Err(()),
        })
    }
}

/// Direct: both parties teach. Indirect: the requester pays points for a
/// one-sided service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    Direct,
    Indirect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// Points skill multiplier.
    pub fn points_multiplier(&self) -> f64 {
        match self {
            SkillLevel::Beginner => 0.5,
            SkillLevel::Intermediate => 1.0,
            SkillLevel::Advanced => 1.5,
        }
    }

    /// Credits skill multiplier.
    pub fn credits_multiplier(&self) -> f64 {
        match self {
            SkillLevel::Beginner => 0.75,
            SkillLevel::Intermediate => 1.0,
            SkillLevel::Advanced => 1.25,
        }
    }
}

// ── Completion ────────────────────────────────────────────────────────────────

/// One participant's side of the completion protocol.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartyCompletion {
    #[serde(default)]
    pub marked_complete: bool,
    pub marked_at: Option<Timestamp>,
    pub hours_claimed: Option<Hours>,
    pub skill_level: Option<SkillLevel>,
    pub notes: Option<String>,
    pub dispute_reason: Option<String>,
    pub disputed_at: Option<Timestamp>,
}

/// Two-sided completion record embedded in the swap request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub requester: PartyCompletion,
    #[serde(default)]
    pub recipient: PartyCompletion,
    /// Deadline for the non-marking party; set while `pending_completion`.
    pub auto_complete_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub final_hours: Option<Hours>,
    // Settlement outcome, recorded for auditability.
    pub requester_points_earned: Option<Points>,
    pub requester_credits_earned: Option<Credits>,
    pub recipient_points_earned: Option<Points>,
    pub recipient_credits_earned: Option<Credits>,
}

impl Completion {
    pub fn party(&self, is_requester: bool) -> &PartyCompletion {
        if is_requester {
            &self.requester
        } else {
            &self.recipient
        }
    }

    pub fn party_mut(&mut self, is_requester: bool) -> &mut PartyCompletion {
        if is_requester {
            &mut self.requester
        } else {
            &mut self.recipient
        }
    }
}

// ── SwapRequest ───────────────────────────────────────────────────────────────

/// A swap request document, key = `id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: String,
    pub requester_uid: Uid,
    pub recipient_uid: Uid,
    pub status: SwapStatus,
    pub swap_type: SwapType,
    /// What the requester teaches in return. Required for direct swaps.
    pub requester_offer: Option<String>,
    /// What the requester wants from the recipient.
    pub requester_need: String,
    /// Points offered for an indirect swap; deducted at creation.
    pub points_offered: Option<Points>,
    /// Amount actually reserved (0 once refunded or never reserved).
    #[serde(default)]
    pub points_reserved: Points,
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub completion: Completion,
}

impl SwapRequest {
    pub fn is_participant(&self, uid: &str) -> bool {
        self.requester_uid == uid || self.recipient_uid == uid
    }

    /// The other participant, given one side.
    pub fn other_party(&self, uid: &str) -> &Uid {
        if self.requester_uid == uid {
            &self.recipient_uid
        } else {
            &self.requester_uid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(SwapStatus::Declined.is_terminal());
        assert!(SwapStatus::Cancelled.is_terminal());
        assert!(SwapStatus::Completed.is_terminal());
        assert!(SwapStatus::Disputed.is_terminal());
        assert!(!SwapStatus::Pending.is_terminal());
        assert!(!SwapStatus::Accepted.is_terminal());
        assert!(!SwapStatus::PendingCompletion.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            SwapStatus::Pending,
            SwapStatus::Accepted,
            SwapStatus::Declined,
            SwapStatus::Cancelled,
            SwapStatus::PendingCompletion,
            SwapStatus::Disputed,
            SwapStatus::Completed,
        ] {
            assert_eq!(s.as_str().parse::<SwapStatus>(), Ok(s));
        }
    }

    #[test]
    fn skill_multipliers() {
        assert_eq!(SkillLevel::Beginner.points_multiplier(), 0.5);
        assert_eq!(SkillLevel::Advanced.points_multiplier(), 1.5);
        assert_eq!(SkillLevel::Beginner.credits_multiplier(), 0.75);
        assert_eq!(SkillLevel::Advanced.credits_multiplier(), 1.25);
    }
}
