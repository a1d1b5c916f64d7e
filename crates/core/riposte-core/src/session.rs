//! Chat session harness
//!
//! One `ChatSession` drives one conversation: it validates user input,
//! records the user message and the pending artist placeholder, queues one
//! generation job per send, and streams replies into the store. Jobs run
//! strictly one at a time per conversation (in-flight guard + FIFO queue);
//! different conversations stream independently.

use crate::config::MAX_MESSAGE_LENGTH;
use crate::persona::{build_system_prompt, format_history, PersonaBlueprint};
use crate::store::{MessageStore, MessageUpdate};
use crate::streaming::{create_token_stream, CancelToken, StreamEvent, StreamHandler};
use crate::types::{
    Conversation, Message, MessageMetadata, MessageStatus, ModeBank, ReplyRequest, ReplySource,
};
use crate::{Result, RiposteError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One queued generation job, owned by the dispatcher for its lifetime
struct StreamJob {
    artist_message_id: Uuid,
    request: ReplyRequest,
}

/// The job currently holding the stream slot
struct ActiveJob {
    artist_message_id: Uuid,
    cancel: CancelToken,
}

#[derive(Default)]
struct SessionState {
    queue: VecDeque<StreamJob>,
    streaming: bool,
    active: Option<ActiveJob>,
}

/// IDs returned by a successful send
#[derive(Debug, Clone, Copy)]
pub struct SendReceipt {
    /// ID of the recorded user message
    pub user_message_id: Uuid,
    /// ID of the artist placeholder the reply streams into
    pub artist_message_id: Uuid,
}

/// Streaming harness for one conversation
#[derive(Clone)]
pub struct ChatSession {
    conversation: Conversation,
    blueprint: Arc<PersonaBlueprint>,
    bank: Arc<ModeBank>,
    store: Arc<dyn MessageStore>,
    source: Arc<dyn ReplySource>,
    state: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    /// Create a session for one conversation
    pub fn new(
        conversation: Conversation,
        blueprint: Arc<PersonaBlueprint>,
        bank: Arc<ModeBank>,
        store: Arc<dyn MessageStore>,
        source: Arc<dyn ReplySource>,
    ) -> Self {
        Self {
            conversation,
            blueprint,
            bank,
            store,
            source,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// The conversation this session drives
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether a generation is currently streaming
    pub async fn is_streaming(&self) -> bool {
        self.state.lock().await.streaming
    }

    /// Number of jobs waiting behind the active one
    pub async fn queued_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Validate, record, and enqueue one user message
    ///
    /// Rejected input never enters the queue: empty text without an image
    /// attachment and over-length text fail synchronously.
    pub async fn send_message(
        &self,
        text: &str,
        image_uri: Option<String>,
    ) -> Result<SendReceipt> {
        let trimmed = text.trim();
        if trimmed.is_empty() && image_uri.is_none() {
            return Err(RiposteError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(RiposteError::MessageTooLong {
                max_length: MAX_MESSAGE_LENGTH,
            });
        }

        let conversation_id = self.conversation.id;
        let prior = self.store.get_messages(conversation_id).await?;

        let mut user_message = Message::user(conversation_id, trimmed);
        if let Some(uri) = image_uri {
            user_message.metadata = Some(MessageMetadata {
                tokens_used: None,
                image_uri: Some(uri),
            });
        }
        let placeholder = Message::artist_placeholder(conversation_id);
        let receipt = SendReceipt {
            user_message_id: user_message.id,
            artist_message_id: placeholder.id,
        };

        self.store.add_message(user_message).await?;
        self.store.add_message(placeholder).await?;

        let mode_id = self.conversation.mode_id.clone();
        let request = ReplyRequest {
            system_prompt: build_system_prompt(&self.blueprint, &mode_id),
            user_turn: trimmed.to_string(),
            history: format_history(&prior),
            language: self.conversation.language.clone(),
            mode_examples: self.bank.examples_for(&mode_id),
            mode_id,
        };

        {
            let mut state = self.state.lock().await;
            state.queue.push_back(StreamJob {
                artist_message_id: receipt.artist_message_id,
                request,
            });
        }
        debug!(
            conversation_id = %conversation_id,
            artist_message_id = %receipt.artist_message_id,
            "Queued generation job"
        );
        self.pump();

        Ok(receipt)
    }

    /// Cancel the in-flight generation and drop queued jobs
    ///
    /// The active placeholder and every queued placeholder flip to `Error`
    /// so the UI can show what happened; nothing is silently lost. Call this
    /// on conversation switch or teardown as well.
    pub async fn cancel(&self) {
        let (active, queued) = {
            let mut state = self.state.lock().await;
            let active = state.active.take();
            let queued: Vec<Uuid> = state
                .queue
                .drain(..)
                .map(|job| job.artist_message_id)
                .collect();
            (active, queued)
        };

        let conversation_id = self.conversation.id;
        if let Some(active) = active {
            active.cancel.cancel();
            if let Err(e) = self
                .store
                .update_message(
                    conversation_id,
                    active.artist_message_id,
                    MessageUpdate::status(MessageStatus::Error),
                )
                .await
            {
                warn!("Failed to mark cancelled message: {}", e);
            }
            info!(
                conversation_id = %conversation_id,
                artist_message_id = %active.artist_message_id,
                "Cancelled active generation"
            );
        }
        for artist_message_id in queued {
            if let Err(e) = self
                .store
                .update_message(
                    conversation_id,
                    artist_message_id,
                    MessageUpdate::status(MessageStatus::Error),
                )
                .await
            {
                warn!("Failed to mark dropped job: {}", e);
            }
        }
    }

    /// Start the dispatcher if it is not already running
    fn pump(&self) {
        let session = self.clone();
        tokio::spawn(async move { session.drive().await });
    }

    /// Process queued jobs one at a time until the queue drains
    async fn drive(self) {
        loop {
            let (job, cancel) = {
                let mut state = self.state.lock().await;
                if state.streaming {
                    // another dispatcher holds the stream slot
                    return;
                }
                let Some(job) = state.queue.pop_front() else {
                    return;
                };
                let cancel = CancelToken::new();
                state.streaming = true;
                state.active = Some(ActiveJob {
                    artist_message_id: job.artist_message_id,
                    cancel: cancel.clone(),
                });
                (job, cancel)
            };

            self.process(job, cancel).await;

            let mut state = self.state.lock().await;
            state.streaming = false;
            state.active = None;
        }
    }

    /// Run one generation job to a terminal state
    async fn process(&self, job: StreamJob, cancel: CancelToken) {
        let conversation_id = self.conversation.id;
        let artist_message_id = job.artist_message_id;

        let (sender, mut receiver) = create_token_stream(32);
        let source = self.source.clone();
        let request = job.request;
        let source_cancel = cancel.clone();
        let generation = tokio::spawn(async move {
            let handler = StreamHandler::new(sender);
            source.stream_reply(&request, &handler, &source_cancel).await
        });

        let mut streaming_marked = false;
        while let Some(event) = receiver.recv().await {
            if cancel.is_cancelled() {
                break;
            }
            match event {
                StreamEvent::Token(token) => {
                    if !streaming_marked {
                        streaming_marked = true;
                        if let Err(e) = self
                            .store
                            .update_message(
                                conversation_id,
                                artist_message_id,
                                MessageUpdate::status(MessageStatus::Streaming),
                            )
                            .await
                        {
                            warn!("Failed to mark message streaming: {}", e);
                        }
                    }
                    if let Err(e) = self
                        .store
                        .append_content(conversation_id, artist_message_id, &token)
                        .await
                    {
                        warn!("Failed to append token: {}", e);
                    }
                }
                StreamEvent::Restarted => {
                    streaming_marked = false;
                    if let Err(e) = self
                        .store
                        .update_message(
                            conversation_id,
                            artist_message_id,
                            MessageUpdate::reset_pending(),
                        )
                        .await
                    {
                        warn!("Failed to reset message for fallback: {}", e);
                    }
                }
            }
        }

        // unblock a source still trying to send after we stopped listening
        drop(receiver);
        let outcome = generation.await;

        // once cancelled, cancel() owns the terminal status
        if cancel.is_cancelled() {
            debug!(
                artist_message_id = %artist_message_id,
                "Generation cancelled, skipping terminal update"
            );
            return;
        }

        match outcome {
            Ok(Ok(usage)) => {
                if let Err(e) = self
                    .store
                    .update_message(
                        conversation_id,
                        artist_message_id,
                        MessageUpdate::completed(usage.tokens_used),
                    )
                    .await
                {
                    warn!("Failed to complete message: {}", e);
                }
                info!(
                    conversation_id = %conversation_id,
                    artist_message_id = %artist_message_id,
                    tokens_used = usage.tokens_used,
                    "✓ Generation complete"
                );
            }
            Ok(Err(e)) => {
                error!(
                    conversation_id = %conversation_id,
                    artist_message_id = %artist_message_id,
                    "Generation failed: {}",
                    e
                );
                let _ = self
                    .store
                    .update_message(
                        conversation_id,
                        artist_message_id,
                        MessageUpdate::status(MessageStatus::Error),
                    )
                    .await;
            }
            Err(join_error) => {
                error!(
                    conversation_id = %conversation_id,
                    artist_message_id = %artist_message_id,
                    "Generation task aborted: {}",
                    join_error
                );
                let _ = self
                    .store
                    .update_message(
                        conversation_id,
                        artist_message_id,
                        MessageUpdate::status(MessageStatus::Error),
                    )
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::streaming::StreamHandler;
    use crate::types::{estimate_tokens, ReplyUsage};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Scripted source that streams a fixed reply word by word
    struct ScriptedSource {
        reply: String,
        token_delay: Duration,
    }

    #[async_trait]
    impl ReplySource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream_reply(
            &self,
            _request: &ReplyRequest,
            handler: &StreamHandler,
            cancel: &CancelToken,
        ) -> crate::Result<ReplyUsage> {
            for word in self.reply.split(' ') {
                if cancel.is_cancelled() {
                    return Err(RiposteError::Cancelled);
                }
                tokio::time::sleep(self.token_delay).await;
                handler.send_token(format!("{} ", word)).await?;
            }
            Ok(ReplyUsage {
                tokens_used: estimate_tokens(&self.reply),
            })
        }
    }

    /// Source that always fails before emitting anything
    struct FailingSource;

    #[async_trait]
    impl ReplySource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn stream_reply(
            &self,
            _request: &ReplyRequest,
            _handler: &StreamHandler,
            _cancel: &CancelToken,
        ) -> crate::Result<ReplyUsage> {
            Err(RiposteError::provider("upstream refused"))
        }
    }

    fn test_conversation() -> Conversation {
        Conversation::new("cathy-gauthier", "roast", "fr-CA")
    }

    fn session_with(source: Arc<dyn ReplySource>) -> (ChatSession, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let session = ChatSession::new(
            test_conversation(),
            Arc::new(PersonaBlueprint::bundled()),
            Arc::new(ModeBank::new()),
            store.clone(),
            source,
        );
        (session, store)
    }

    async fn wait_for_terminal(
        store: &InMemoryStore,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> MessageStatus {
        for _ in 0..200 {
            let messages = store.get_messages(conversation_id).await.unwrap();
            if let Some(message) = messages.iter().find(|m| m.id == message_id) {
                if matches!(message.status, MessageStatus::Complete | MessageStatus::Error) {
                    return message.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("message never reached a terminal status");
    }

    #[tokio::test]
    async fn test_send_message_streams_to_completion() {
        let source = Arc::new(ScriptedSource {
            reply: "ouin pis toi".to_string(),
            token_delay: Duration::from_millis(1),
        });
        let (session, store) = session_with(source);
        let conversation_id = session.conversation().id;

        let receipt = session.send_message("roast moi", None).await.unwrap();
        let status =
            wait_for_terminal(&store, conversation_id, receipt.artist_message_id).await;

        assert_eq!(status, MessageStatus::Complete);
        let messages = store.get_messages(conversation_id).await.unwrap();
        let artist = messages
            .iter()
            .find(|m| m.id == receipt.artist_message_id)
            .unwrap();
        assert_eq!(artist.content, "ouin pis toi ");
        assert_eq!(artist.metadata.as_ref().unwrap().tokens_used, Some(3));
    }

    #[tokio::test]
    async fn test_validation_rejects_without_queueing() {
        let source = Arc::new(ScriptedSource {
            reply: "jamais".to_string(),
            token_delay: Duration::from_millis(1),
        });
        let (session, store) = session_with(source);

        assert!(matches!(
            session.send_message("   ", None).await,
            Err(RiposteError::EmptyMessage)
        ));
        let long = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            session.send_message(&long, None).await,
            Err(RiposteError::MessageTooLong { .. })
        ));

        let messages = store
            .get_messages(session.conversation().id)
            .await
            .unwrap();
        assert!(messages.is_empty());
        assert_eq!(session.queued_len().await, 0);
    }

    #[tokio::test]
    async fn test_empty_text_with_image_is_accepted() {
        let source = Arc::new(ScriptedSource {
            reply: "belle photo".to_string(),
            token_delay: Duration::from_millis(1),
        });
        let (session, store) = session_with(source);
        let conversation_id = session.conversation().id;

        let receipt = session
            .send_message("", Some("file://photo.jpg".to_string()))
            .await
            .unwrap();
        let status =
            wait_for_terminal(&store, conversation_id, receipt.artist_message_id).await;
        assert_eq!(status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn test_back_to_back_sends_never_interleave() {
        let source = Arc::new(ScriptedSource {
            reply: "un deux trois quatre".to_string(),
            token_delay: Duration::from_millis(5),
        });
        let (session, store) = session_with(source);
        let conversation_id = session.conversation().id;

        let first = session.send_message("premier", None).await.unwrap();
        let second = session.send_message("deuxieme", None).await.unwrap();

        // while the first streams, the second must stay pending
        tokio::time::sleep(Duration::from_millis(8)).await;
        let messages = store.get_messages(conversation_id).await.unwrap();
        let second_message = messages
            .iter()
            .find(|m| m.id == second.artist_message_id)
            .unwrap();
        assert_eq!(second_message.status, MessageStatus::Pending);
        assert!(second_message.content.is_empty());

        let first_status =
            wait_for_terminal(&store, conversation_id, first.artist_message_id).await;
        let second_status =
            wait_for_terminal(&store, conversation_id, second.artist_message_id).await;
        assert_eq!(first_status, MessageStatus::Complete);
        assert_eq!(second_status, MessageStatus::Complete);

        let messages = store.get_messages(conversation_id).await.unwrap();
        for receipt in [first, second] {
            let message = messages
                .iter()
                .find(|m| m.id == receipt.artist_message_id)
                .unwrap();
            assert_eq!(message.content, "un deux trois quatre ");
        }
    }

    #[tokio::test]
    async fn test_cancel_marks_active_and_queued_as_error() {
        let source = Arc::new(ScriptedSource {
            reply: "une longue longue longue longue reponse".to_string(),
            token_delay: Duration::from_millis(20),
        });
        let (session, store) = session_with(source);
        let conversation_id = session.conversation().id;

        let first = session.send_message("premier", None).await.unwrap();
        let second = session.send_message("deuxieme", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        session.cancel().await;

        let messages = store.get_messages(conversation_id).await.unwrap();
        for receipt in [first, second] {
            let message = messages
                .iter()
                .find(|m| m.id == receipt.artist_message_id)
                .unwrap();
            assert_eq!(message.status, MessageStatus::Error);
        }

        // no further tokens after cancellation
        let content_at_cancel = messages
            .iter()
            .find(|m| m.id == first.artist_message_id)
            .unwrap()
            .content
            .clone();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let messages = store.get_messages(conversation_id).await.unwrap();
        let first_message = messages
            .iter()
            .find(|m| m.id == first.artist_message_id)
            .unwrap();
        assert_eq!(first_message.content, content_at_cancel);
        assert_eq!(first_message.status, MessageStatus::Error);
    }

    #[tokio::test]
    async fn test_cancel_then_resend_only_second_completes() {
        let source = Arc::new(ScriptedSource {
            reply: "reponse plutot longue pour laisser le temps".to_string(),
            token_delay: Duration::from_millis(15),
        });
        let (session, store) = session_with(source);
        let conversation_id = session.conversation().id;

        let first = session.send_message("premier", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.cancel().await;

        let second = session.send_message("deuxieme", None).await.unwrap();
        let second_status =
            wait_for_terminal(&store, conversation_id, second.artist_message_id).await;
        assert_eq!(second_status, MessageStatus::Complete);

        let messages = store.get_messages(conversation_id).await.unwrap();
        let first_message = messages
            .iter()
            .find(|m| m.id == first.artist_message_id)
            .unwrap();
        assert_eq!(first_message.status, MessageStatus::Error);
    }

    #[tokio::test]
    async fn test_failure_marks_error_and_keeps_draining() {
        let (session, store) = session_with(Arc::new(FailingSource));
        let conversation_id = session.conversation().id;

        let first = session.send_message("premier", None).await.unwrap();
        let second = session.send_message("deuxieme", None).await.unwrap();

        let first_status =
            wait_for_terminal(&store, conversation_id, first.artist_message_id).await;
        let second_status =
            wait_for_terminal(&store, conversation_id, second.artist_message_id).await;
        assert_eq!(first_status, MessageStatus::Error);
        assert_eq!(second_status, MessageStatus::Error);
    }
}
