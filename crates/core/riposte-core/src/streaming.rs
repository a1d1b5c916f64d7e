//! Streaming reply support
//!
//! A reply source emits [`StreamEvent`]s through a bounded channel while the
//! session dispatcher consumes them. Cancellation is cooperative: sources
//! check the [`CancelToken`] before every emission, and the dispatcher checks
//! it again before mutating any state.

use crate::{Result, RiposteError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An event emitted while a reply streams
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One token of reply text (including its trailing space)
    Token(String),
    /// The generation restarted against a backup source; any partial
    /// content already emitted must be discarded
    Restarted,
}

/// Stream of reply events
pub type TokenStream = mpsc::Receiver<StreamEvent>;

/// Stream sender
pub type TokenStreamSender = mpsc::Sender<StreamEvent>;

/// Create a new token stream
pub fn create_token_stream(buffer_size: usize) -> (TokenStreamSender, TokenStream) {
    mpsc::channel(buffer_size)
}

/// Cooperative cancellation flag shared between a job and its source
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Streaming reply handler given to a reply source
pub struct StreamHandler {
    sender: TokenStreamSender,
}

impl StreamHandler {
    /// Create a new stream handler
    pub fn new(sender: TokenStreamSender) -> Self {
        Self { sender }
    }

    /// Send one token of reply text
    pub async fn send_token(&self, token: impl Into<String>) -> Result<()> {
        self.sender
            .send(StreamEvent::Token(token.into()))
            .await
            .map_err(|e| RiposteError::other(format!("Failed to send token: {}", e)))
    }

    /// Signal that the generation restarted against a backup source
    pub async fn signal_restart(&self) -> Result<()> {
        self.sender
            .send(StreamEvent::Restarted)
            .await
            .map_err(|e| RiposteError::other(format!("Failed to send restart: {}", e)))
    }
}

/// Collect a stream into the final reply text
///
/// A [`StreamEvent::Restarted`] discards everything collected so far.
pub async fn collect_stream(mut stream: TokenStream) -> String {
    let mut result = String::new();
    while let Some(event) = stream.recv().await {
        match event {
            StreamEvent::Token(token) => result.push_str(&token),
            StreamEvent::Restarted => result.clear(),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_tokens() {
        let (sender, receiver) = create_token_stream(10);
        let handler = StreamHandler::new(sender);

        tokio::spawn(async move {
            handler.send_token("Heille ").await.unwrap();
            handler.send_token("toi ").await.unwrap();
        });

        assert_eq!(collect_stream(receiver).await, "Heille toi ");
    }

    #[tokio::test]
    async fn test_restart_discards_partial_content() {
        let (sender, receiver) = create_token_stream(10);
        let handler = StreamHandler::new(sender);

        tokio::spawn(async move {
            handler.send_token("brouillon ").await.unwrap();
            handler.signal_restart().await.unwrap();
            handler.send_token("final ").await.unwrap();
        });

        assert_eq!(collect_stream(receiver).await, "final ");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
