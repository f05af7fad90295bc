//! Append-only economy ledgers.
//!
//! Every balance mutation writes one [`LedgerEntry`] with `balance_after`
//! equal to the profile's post-change balance; the entry and the balance
//! update are applied together under the owner's uid lock. The same record
//! shape backs both the points and the credits ledger (separate trees).

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, Uid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earned,
    Spent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    SwapCompleted,
    PriorityBoost,
    RequestWithoutReciprocity,
    IndirectSwapReserved,
    IndirectSwapRefund,
    IndirectSwapPayment,
    Bonus,
}

/// One ledger record. `amount` is non-negative; the sign is carried by `kind`.
/// The `indirect_swap_payment` marker is the single zero-amount exception,
/// written at settlement for auditability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub uid: Uid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: TransactionReason,
    pub related_swap_id: Option<String>,
    pub related_skill: Option<String>,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// A time-bounded visibility boost purchased with points. Consumers of search
/// read these; the boost itself is just a record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveBoost {
    pub id: String,
    pub uid: Uid,
    pub boost_type: String,
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
    pub points_spent: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Pending,
    Resolved,
}

/// A recorded completion dispute. Adjudication happens outside this system;
/// the record only parks the swap in its terminal `disputed` state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dispute {
    pub id: String,
    pub swap_request_id: String,
    pub disputer_uid: Uid,
    pub reason: String,
    pub status: DisputeStatus,
    pub created_at: Timestamp,
}
