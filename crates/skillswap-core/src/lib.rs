pub mod constants;
pub mod error;
pub mod ledger;
pub mod messaging;
pub mod moderation;
pub mod profile;
pub mod review;
pub mod swap;
pub mod types;

pub use constants::*;
pub use error::{ErrorKind, SwapError};
pub use ledger::{
    ActiveBoost, Dispute, DisputeStatus, LedgerEntry, TransactionKind, TransactionReason,
};
pub use messaging::{
    Conversation, ConversationStatus, LastMessage, Message, MessageType, SYSTEM_SENDER,
};
pub use moderation::{Block, Report, ReportReason, ReportStatus};
pub use profile::{skills_to_text, Profile, ProfilePatch, SkillEntry};
pub use review::Review;
pub use swap::{
    Completion, PartyCompletion, SkillLevel, SwapRequest, SwapStatus, SwapType,
};
pub use types::*;
