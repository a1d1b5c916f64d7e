//! Riposte Core Runtime
//!
//! This crate provides the core runtime, types, and interfaces for streaming
//! scripted-comedian chat: the conversation store, the persona prompt
//! builder, the signal extractor for structured modes, and the session
//! dispatcher that drives one generation at a time per conversation.
//!
//! Reply sources plug in through the [`ReplySource`] trait; the mock
//! synthesis engine and the live Messages API source live in sibling
//! provider crates.
//!
//! # Example
//!
//! ```no_run
//! use riposte_core::*;
//! use std::sync::Arc;
//!
//! # async fn run(source: Arc<dyn ReplySource>) -> Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let session = ChatSession::new(
//!     Conversation::new("cathy-gauthier", "roast", "fr-CA"),
//!     Arc::new(PersonaBlueprint::bundled()),
//!     Arc::new(ModeBank::new()),
//!     store,
//!     source,
//! );
//! session.send_message("Roast-moi pas trop fort", None).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export commonly used types
pub use uuid::Uuid;

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod nlp;
pub mod persona;
pub mod session;
pub mod signals;
pub mod store;
pub mod streaming;
pub mod types;

// Re-export main types
pub use config::{
    get_env_int, get_env_or, get_required_env, load_env,
    mock_token_delay_ms, DEFAULT_LANGUAGE, MAX_HISTORY_MESSAGES, MAX_MESSAGE_LENGTH,
    MOCK_STREAM_TOKEN_DELAY_MS, RECENCY_CAPACITY,
};
pub use error::{Result, RiposteError};
pub use logging::init_logging;
pub use persona::{build_system_prompt, format_history, PersonaBlueprint};
pub use session::{ChatSession, SendReceipt};
pub use signals::{extract_signals, ExtractedSignals};
pub use store::{InMemoryStore, MessageStore, MessageUpdate};
pub use streaming::{
    collect_stream, create_token_stream, CancelToken, StreamEvent, StreamHandler, TokenStream,
    TokenStreamSender,
};
pub use types::{
    estimate_tokens, mode_ids, Conversation, FewShotExample, HistoryMessage, HistoryRole,
    Message, MessageMetadata, MessageRole, MessageStatus, ModeBank, ReplyRequest, ReplySource,
    ReplyUsage,
};
