//! Mock Reply Synthesis Engine
//!
//! A [`ReplySource`] that stands in for a real model call. Given the user's
//! turn, the active mode, and a bank of few-shot (input, response) examples,
//! it selects a contextually appropriate canned response, substitutes freshly
//! extracted entities (name, age, city, zodiac sign, weather, occasion) into
//! it, avoids recently used responses, and streams the result token by token
//! with cooperative cancellation.
//!
//! Selection is deterministic in its scores; only the choice among near-tied
//! candidates is randomized, and the random source is seedable for tests.
//! The engine never fails to produce text: an empty bank falls back to a
//! pool of generic in-character one-liners.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fallback;
pub mod matcher;
pub mod recency;
pub mod substitute;

pub use matcher::{pick_example, structured_weights, MatcherConfig, SignalField};
pub use recency::{RecencyLog, DEFAULT_RECENCY_FRACTION};
pub use substitute::substitute_variables;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use riposte_core::streaming::{CancelToken, StreamHandler};
use riposte_core::types::{
    estimate_tokens, FewShotExample, ModeBank, ReplyRequest, ReplySource, ReplyUsage,
};
use riposte_core::{mock_token_delay_ms, Result, RiposteError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

const BUNDLED_BANK_JSON: &str = include_str!("../data/cathy-gauthier-replies.json");

/// Load the bundled Cathy Gauthier few-shot bank
pub fn bundled_bank() -> Result<ModeBank> {
    ModeBank::from_json(BUNDLED_BANK_JSON)
}

/// Few-shot mock reply engine
///
/// The recency log is injected so several sources (or test cases) can share
/// or isolate it explicitly; it is never a hidden global.
pub struct MockReplyEngine {
    recency: Arc<Mutex<RecencyLog>>,
    rng: Mutex<StdRng>,
    matcher_config: MatcherConfig,
    recency_fraction: f32,
    token_delay: Duration,
}

impl MockReplyEngine {
    /// Create an engine over a shared recency log
    pub fn new(recency: Arc<Mutex<RecencyLog>>) -> Self {
        Self {
            recency,
            rng: Mutex::new(StdRng::from_entropy()),
            matcher_config: MatcherConfig::default(),
            recency_fraction: DEFAULT_RECENCY_FRACTION,
            token_delay: Duration::from_millis(mock_token_delay_ms()),
        }
    }

    /// Seed the tie-break random source (tests)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Override the per-token emission delay
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Override the matcher tuning
    pub fn with_matcher_config(mut self, config: MatcherConfig) -> Self {
        self.matcher_config = config;
        self
    }

    /// Override the recency pool fraction
    pub fn with_recency_fraction(mut self, fraction: f32) -> Self {
        self.recency_fraction = fraction;
        self
    }

    /// Synthesize one complete reply for a user turn
    ///
    /// Matches against the recency-filtered pool, substitutes extracted
    /// entities into the selected template, and records the choice in the
    /// recency log. Always returns non-empty text.
    pub async fn build_reply(
        &self,
        user_turn: &str,
        mode_id: &str,
        examples: &[FewShotExample],
    ) -> String {
        let mut rng = self.rng.lock().await;
        let mut recency = self.recency.lock().await;

        let pool = recency.exclude_recent(examples, mode_id, self.recency_fraction);
        if let Some(example) =
            matcher::pick_example(user_turn, &pool, mode_id, &self.matcher_config, &mut *rng)
        {
            let reply = substitute_variables(
                &example.response,
                &example.parsed_variables(),
                user_turn,
            );
            recency.mark_used(&example.response, mode_id);
            debug!(mode_id, "✓ Matched few-shot example");
            return reply;
        }

        let line =
            fallback::fallback_reply(mode_id, &recency, self.recency_fraction, &mut *rng);
        recency.mark_used(&line, &fallback::fallback_recency_key(mode_id));
        debug!(mode_id, "✗ No example available, using fallback line");
        line
    }
}

#[async_trait]
impl ReplySource for MockReplyEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        handler: &StreamHandler,
        cancel: &CancelToken,
    ) -> Result<ReplyUsage> {
        if cancel.is_cancelled() {
            return Err(RiposteError::Cancelled);
        }
        let reply = self
            .build_reply(&request.user_turn, &request.mode_id, &request.mode_examples)
            .await;

        for word in reply.split_whitespace() {
            if cancel.is_cancelled() {
                return Err(RiposteError::Cancelled);
            }
            tokio::time::sleep(self.token_delay).await;
            handler.send_token(format!("{} ", word)).await?;
        }

        Ok(ReplyUsage {
            tokens_used: estimate_tokens(&reply),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riposte_core::streaming::{collect_stream, create_token_stream};
    use riposte_core::types::mode_ids;

    fn engine() -> MockReplyEngine {
        MockReplyEngine::new(Arc::new(Mutex::new(RecencyLog::default())))
            .with_seed(11)
            .with_token_delay(Duration::from_millis(1))
    }

    fn request(user_turn: &str, mode_id: &str, examples: Vec<FewShotExample>) -> ReplyRequest {
        ReplyRequest {
            system_prompt: String::new(),
            user_turn: user_turn.to_string(),
            history: Vec::new(),
            language: "fr-CA".to_string(),
            mode_id: mode_id.to_string(),
            mode_examples: examples,
        }
    }

    #[test]
    fn test_bundled_bank_loads() {
        let bank = bundled_bank().unwrap();
        assert!(!bank.is_empty());
        assert!(!bank.examples_for(mode_ids::HOROSCOPE).is_empty());
        assert!(!bank.examples_for(mode_ids::ROAST).is_empty());
    }

    #[tokio::test]
    async fn test_empty_bank_streams_fallback_with_word_count() {
        let engine = engine();
        let req = request("roast moi", mode_ids::ROAST, Vec::new());
        let (sender, receiver) = create_token_stream(64);
        let handler = StreamHandler::new(sender);

        let usage = engine
            .stream_reply(&req, &handler, &CancelToken::new())
            .await
            .unwrap();
        drop(handler);

        let text = collect_stream(receiver).await;
        assert!(!text.trim().is_empty());
        assert_eq!(usage.tokens_used, text.split_whitespace().count());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_emits_nothing() {
        let engine = engine();
        let req = request("allo", mode_ids::DEFAULT, Vec::new());
        let (sender, receiver) = create_token_stream(64);
        let handler = StreamHandler::new(sender);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = engine.stream_reply(&req, &handler, &cancel).await;
        drop(handler);

        assert!(matches!(result, Err(RiposteError::Cancelled)));
        assert!(collect_stream(receiver).await.is_empty());
    }

    #[tokio::test]
    async fn test_substitution_personalizes_matched_template() {
        let engine = engine();
        let bank = bundled_bank().unwrap();
        let reply = engine
            .build_reply(
                "écris un message pour les 30 ans de Chantal",
                mode_ids::MESSAGE_PERSONNALISE,
                &bank.examples_for(mode_ids::MESSAGE_PERSONNALISE),
            )
            .await;
        assert!(reply.contains("Chantal"));
        assert!(!reply.contains("Julie"));
    }

    #[tokio::test]
    async fn test_recency_avoids_immediate_repeat() {
        let engine = engine();
        let bank = bundled_bank().unwrap();
        let examples = bank.examples_for(mode_ids::ROAST);

        let first = engine
            .build_reply("roast ma coiffure", mode_ids::ROAST, &examples)
            .await;
        let second = engine
            .build_reply("roast ma coiffure", mode_ids::ROAST, &examples)
            .await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_shared_recency_log_spans_engines() {
        let recency = Arc::new(Mutex::new(RecencyLog::default()));
        let bank = bundled_bank().unwrap();
        let examples = bank.examples_for(mode_ids::ROAST);

        let first_engine = MockReplyEngine::new(recency.clone()).with_seed(1);
        let second_engine = MockReplyEngine::new(recency.clone()).with_seed(1);

        let first = first_engine
            .build_reply("roast ma coiffure", mode_ids::ROAST, &examples)
            .await;
        let second = second_engine
            .build_reply("roast ma coiffure", mode_ids::ROAST, &examples)
            .await;
        assert_ne!(first, second);
    }
}
