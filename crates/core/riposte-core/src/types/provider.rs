//! Reply source contract
//!
//! Live transports and the mock engine both implement [`ReplySource`]; the
//! chat session never branches on which backend it is driving.

use super::{FewShotExample, HistoryMessage};
use crate::streaming::{CancelToken, StreamHandler};
use crate::Result;
use async_trait::async_trait;

/// One generation request handed to a reply source
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    /// Assembled persona system prompt
    pub system_prompt: String,
    /// The user turn being answered
    pub user_turn: String,
    /// Prior completed turns, oldest first
    pub history: Vec<HistoryMessage>,
    /// Conversation language (e.g. "fr-CA")
    pub language: String,
    /// Active conversation mode
    pub mode_id: String,
    /// Few-shot examples for the active mode
    pub mode_examples: Vec<FewShotExample>,
}

/// Usage reported when a generation completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyUsage {
    /// Token count of the generated reply
    pub tokens_used: usize,
}

/// A backend able to stream an in-character reply
///
/// Implementations must check `cancel` before every token emission and
/// return [`crate::RiposteError::Cancelled`] once it fires; after that point
/// no further events may be sent.
#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Source name, for logging
    fn name(&self) -> &str;

    /// Stream a reply for `request` through `handler`
    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        handler: &StreamHandler,
        cancel: &CancelToken,
    ) -> Result<ReplyUsage>;
}

/// Whitespace-token count of a text, used when a backend reports no usage
pub fn estimate_tokens(text: &str) -> usize {
    let tokens = text.split_whitespace().count();
    tokens.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("trois petits mots"), 3);
        assert_eq!(estimate_tokens("  espacé   bizarre  "), 2);
        assert_eq!(estimate_tokens(""), 1);
    }
}
