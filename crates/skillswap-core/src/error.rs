use thiserror::Error;

/// Coarse error class used by the RPC layer to pick a response code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Validation,
    InsufficientFunds,
    DependencyUnavailable,
    Internal,
}

#[derive(Debug, Error)]
pub enum SwapError {
    // ── not_found ────────────────────────────────────────────────────────────
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("swap request not found: {0}")]
    SwapRequestNotFound(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("block not found")]
    BlockNotFound,

    // ── conflict ─────────────────────────────────────────────────────────────
    #[error("you already have a pending request to this user")]
    DuplicatePendingRequest,

    #[error("this request has already been responded to")]
    AlreadyResponded,

    #[error("can only cancel pending requests")]
    NotCancellable,

    #[error("you have already marked this swap as complete")]
    AlreadyMarkedComplete,

    #[error("cannot mark completion for swap in '{0}' status")]
    NotCompletable(String),

    #[error("cannot verify or dispute a swap in '{0}' status")]
    NotVerifiable(String),

    #[error("no pending completion to verify")]
    NothingToVerify,

    #[error("you have already reviewed this swap")]
    AlreadyReviewed,

    #[error("can only review completed swaps")]
    SwapNotCompleted,

    #[error("user is already blocked")]
    AlreadyBlocked,

    // ── forbidden ────────────────────────────────────────────────────────────
    #[error("only swap participants may perform this action")]
    NotParticipant,

    #[error("only the recipient can respond to this request")]
    NotRecipient,

    #[error("only the requester can cancel this request")]
    NotRequester,

    #[error("cannot send request to this user")]
    Blocked,

    #[error("this conversation has been blocked")]
    ConversationBlocked,

    #[error("swap request is no longer accepted")]
    SwapNotActive,

    // ── validation ───────────────────────────────────────────────────────────
    #[error("cannot {0} yourself")]
    SelfTarget(&'static str),

    #[error("{0}")]
    Validation(String),

    // ── economy ──────────────────────────────────────────────────────────────
    #[error("insufficient points: need {need}, have {have}")]
    InsufficientPoints { need: i64, have: i64 },

    // ── external dependencies ────────────────────────────────────────────────
    #[error("embedding provider unavailable: {0}")]
    Embedding(String),

    #[error("vector index unavailable: {0}")]
    VectorIndex(String),

    #[error("email delivery failed: {0}")]
    Email(String),

    // ── storage ──────────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl SwapError {
    /// Map a concrete error onto the coarse taxonomy the RPC layer exposes.
    pub fn kind(&self) -> ErrorKind {
        use SwapError::*;
        match self {
            ProfileNotFound(_) | SwapRequestNotFound(_) | ConversationNotFound(_)
            | BlockNotFound => ErrorKind::NotFound,

            DuplicatePendingRequest | AlreadyResponded | NotCancellable
            | AlreadyMarkedComplete | NotCompletable(_) | NotVerifiable(_)
            | NothingToVerify | AlreadyReviewed | SwapNotCompleted | AlreadyBlocked => {
                ErrorKind::Conflict
            }

            NotParticipant | NotRecipient | NotRequester | Blocked
            | ConversationBlocked | SwapNotActive => ErrorKind::Forbidden,

            SelfTarget(_) | Validation(_) => ErrorKind::Validation,

            InsufficientPoints { .. } => ErrorKind::InsufficientFunds,

            Embedding(_) | VectorIndex(_) | Email(_) => ErrorKind::DependencyUnavailable,

            Storage(_) | Serialization(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            SwapError::ProfileNotFound("u1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SwapError::DuplicatePendingRequest.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(SwapError::NotRecipient.kind(), ErrorKind::Forbidden);
        assert_eq!(
            SwapError::InsufficientPoints { need: 50, have: 10 }.kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            SwapError::VectorIndex("down".into()).kind(),
            ErrorKind::DependencyUnavailable
        );
    }

    #[test]
    fn insufficient_points_message_names_both_amounts() {
        let e = SwapError::InsufficientPoints { need: 120, have: 80 };
        let msg = e.to_string();
        assert!(msg.contains("120") && msg.contains("80"));
    }
}
