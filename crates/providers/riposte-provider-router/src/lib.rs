//! Reply source composition
//!
//! [`FallbackSource`] chains a primary reply source with a backup: when the
//! primary fails for any reason other than cancellation, the job restarts
//! once against the backup. The restart is announced through the token
//! stream so the harness can discard any partial content the primary already
//! emitted. Fallback fires at most once per job; a failing backup surfaces
//! its own error.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use riposte_core::streaming::{CancelToken, StreamHandler};
use riposte_core::types::{ReplyRequest, ReplySource, ReplyUsage};
use riposte_core::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// A primary reply source with a one-shot backup
pub struct FallbackSource {
    primary: Arc<dyn ReplySource>,
    backup: Arc<dyn ReplySource>,
}

impl FallbackSource {
    /// Compose a primary source with its backup
    pub fn new(primary: Arc<dyn ReplySource>, backup: Arc<dyn ReplySource>) -> Self {
        Self { primary, backup }
    }
}

#[async_trait]
impl ReplySource for FallbackSource {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn stream_reply(
        &self,
        request: &ReplyRequest,
        handler: &StreamHandler,
        cancel: &CancelToken,
    ) -> Result<ReplyUsage> {
        let primary_error = match self.primary.stream_reply(request, handler, cancel).await {
            Ok(usage) => return Ok(usage),
            Err(e) => e,
        };
        if primary_error.is_cancelled() || cancel.is_cancelled() {
            // an intentional stop is never retried
            return Err(primary_error);
        }

        warn!(
            primary = self.primary.name(),
            backup = self.backup.name(),
            "Primary reply source failed, restarting against backup: {}",
            primary_error
        );
        handler.signal_restart().await?;
        let usage = self.backup.stream_reply(request, handler, cancel).await?;
        info!(backup = self.backup.name(), "✓ Backup source completed the job");
        Ok(usage)
    }
}
