//! Conversations, messages and moderation.

pub mod conversations;
pub mod moderation;

pub use conversations::{
    ConversationListPage, ConversationView, MessagingService, OtherParticipant,
};
pub use moderation::ModerationService;
