//! Conversation and message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human user
    User,
    /// The artist persona
    Artist,
}

/// Lifecycle status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Generation queued, no tokens yet
    Pending,
    /// Tokens currently arriving
    Streaming,
    /// Generation finished successfully
    Complete,
    /// Generation failed or was cancelled
    Error,
}

/// Optional message metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Token count of the generated reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<usize>,

    /// URI of an attached image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: Uuid,
    /// Owning conversation ID
    pub conversation_id: Uuid,
    /// Author role
    pub role: MessageRole,
    /// Message text (grows while streaming)
    pub content: String,
    /// Lifecycle status
    pub status: MessageStatus,
    /// Creation timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Create a completed user message
    pub fn user(conversation_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            status: MessageStatus::Complete,
            timestamp: chrono::Utc::now(),
            metadata: None,
        }
    }

    /// Create a pending artist placeholder
    pub fn artist_placeholder(conversation_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role: MessageRole::Artist,
            content: String::new(),
            status: MessageStatus::Pending,
            timestamp: chrono::Utc::now(),
            metadata: None,
        }
    }
}

/// A conversation with one artist persona in one mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID
    pub id: Uuid,
    /// Artist persona identifier
    pub artist_id: String,
    /// Active conversation mode
    pub mode_id: String,
    /// Conversation language (e.g. "fr-CA")
    pub language: String,
    /// Display title
    pub title: String,
    /// Preview of the last message sent
    pub last_message_preview: String,
}

impl Conversation {
    /// Create a new conversation with a fresh ID
    pub fn new(
        artist_id: impl Into<String>,
        mode_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            artist_id: artist_id.into(),
            mode_id: mode_id.into(),
            language: language.into(),
            title: "Nouvelle conversation".to_string(),
            last_message_preview: String::new(),
        }
    }
}

/// Role in the prompt history sent to a reply source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    /// The human user
    User,
    /// The model/persona
    Assistant,
}

/// One prior turn of context for a reply source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Author role
    pub role: HistoryRole,
    /// Turn text
    pub content: String,
}
