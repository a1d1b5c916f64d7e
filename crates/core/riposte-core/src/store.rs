//! Message store abstraction
//!
//! The chat session only needs four operations to stay a pure
//! sequencing/synthesis layer; the app shell owns real persistence.

use crate::types::{Message, MessageMetadata, MessageStatus};
use crate::{Result, RiposteError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A partial update applied to a stored message
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    /// New lifecycle status
    pub status: Option<MessageStatus>,
    /// New metadata (replaces existing)
    pub metadata: Option<MessageMetadata>,
    /// Discard accumulated content (used when a generation restarts)
    pub clear_content: bool,
}

impl MessageUpdate {
    /// Update that only changes the status
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Update that completes a message with its token usage
    pub fn completed(tokens_used: usize) -> Self {
        Self {
            status: Some(MessageStatus::Complete),
            metadata: Some(MessageMetadata {
                tokens_used: Some(tokens_used),
                image_uri: None,
            }),
            clear_content: false,
        }
    }

    /// Update that resets a message to pending with empty content
    pub fn reset_pending() -> Self {
        Self {
            status: Some(MessageStatus::Pending),
            metadata: None,
            clear_content: true,
        }
    }
}

/// Storage operations the chat session depends on
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to a conversation
    async fn add_message(&self, message: Message) -> Result<()>;

    /// Apply a partial update to a message
    async fn update_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        update: MessageUpdate,
    ) -> Result<()>;

    /// Append streamed text to a message's content
    async fn append_content(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        chunk: &str,
    ) -> Result<()>;

    /// All messages of a conversation, oldest first
    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>>;
}

/// In-memory store used by the engine and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<Uuid, Vec<Message>>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn add_message(&self, message: Message) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(message.conversation_id)
            .or_default()
            .push(message);
        Ok(())
    }

    async fn update_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        update: MessageUpdate,
    ) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| RiposteError::store(format!("Unknown conversation {}", conversation_id)))?;
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| RiposteError::store(format!("Unknown message {}", message_id)))?;

        if let Some(status) = update.status {
            message.status = status;
        }
        if let Some(metadata) = update.metadata {
            message.metadata = Some(metadata);
        }
        if update.clear_content {
            message.content.clear();
        }
        Ok(())
    }

    async fn append_content(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        chunk: &str,
    ) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| RiposteError::store(format!("Unknown conversation {}", conversation_id)))?;
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| RiposteError::store(format!("Unknown message {}", message_id)))?;
        message.content.push_str(chunk);
        Ok(())
    }

    async fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
