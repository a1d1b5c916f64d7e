//! Core type definitions

mod message;
mod mode;
mod provider;

pub use message::{
    Conversation, HistoryMessage, HistoryRole, Message, MessageMetadata, MessageRole,
    MessageStatus,
};
pub use mode::{mode_ids, FewShotExample, ModeBank};
pub use provider::{estimate_tokens, ReplyRequest, ReplySource, ReplyUsage};
