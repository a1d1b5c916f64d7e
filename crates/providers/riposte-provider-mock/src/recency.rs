//! Recency filter
//!
//! A bounded, process-wide log of recently emitted responses, keyed by mode.
//! It only biases selection away from immediate repeats; it is a variety
//! heuristic, never a reason to return nothing.

use riposte_core::types::FewShotExample;
use riposte_core::RECENCY_CAPACITY;
use std::collections::{HashSet, VecDeque};

/// Fraction of a pool that may be excluded for recency
pub const DEFAULT_RECENCY_FRACTION: f32 = 0.6;

#[derive(Debug, Clone)]
struct RecentEntry {
    response: String,
    mode_id: String,
}

/// Bounded ring of recently used responses, shared across conversations
///
/// Inject one instance per process (or per test) rather than reaching for a
/// hidden global; the engine takes it behind a lock.
#[derive(Debug, Clone)]
pub struct RecencyLog {
    entries: VecDeque<RecentEntry>,
    capacity: usize,
}

impl Default for RecencyLog {
    fn default() -> Self {
        Self::new(RECENCY_CAPACITY)
    }
}

impl RecencyLog {
    /// Create a log holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a response as used for a mode, evicting the oldest entry past
    /// capacity
    pub fn mark_used(&mut self, response: &str, mode_id: &str) {
        self.entries.push_back(RecentEntry {
            response: response.to_string(),
            mode_id: mode_id.to_string(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Number of logged entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filter examples whose response was used too recently for this mode
    ///
    /// Over-filtering small pools is worse than repetition, so the effective
    /// limit scales with pool size, and the filter degrades progressively:
    /// full window, then only the single most recent response, then nothing.
    pub fn exclude_recent(
        &self,
        examples: &[FewShotExample],
        mode_id: &str,
        fraction: f32,
    ) -> Vec<FewShotExample> {
        self.exclude_by(examples, mode_id, fraction, |example| &example.response)
    }

    /// Same progressive filter, over a flat pool of reply lines
    pub fn exclude_recent_lines<'a>(
        &self,
        lines: &[&'a str],
        mode_id: &str,
        fraction: f32,
    ) -> Vec<&'a str> {
        self.exclude_by(lines, mode_id, fraction, |line| line)
    }

    fn exclude_by<T: Clone>(
        &self,
        pool: &[T],
        mode_id: &str,
        fraction: f32,
        response_of: impl Fn(&T) -> &str,
    ) -> Vec<T> {
        if pool.is_empty() {
            return Vec::new();
        }
        let limit = self.effective_limit(pool.len(), fraction);
        let recent = self.recent_responses(mode_id, limit);
        let filtered: Vec<T> = pool
            .iter()
            .filter(|item| !recent.contains(response_of(item)))
            .cloned()
            .collect();
        if !filtered.is_empty() {
            return filtered;
        }

        // everything was recent: only avoid the single most recent response
        let most_recent = self.recent_responses(mode_id, 1);
        let relaxed: Vec<T> = pool
            .iter()
            .filter(|item| !most_recent.contains(response_of(item)))
            .cloned()
            .collect();
        if !relaxed.is_empty() {
            return relaxed;
        }

        pool.to_vec()
    }

    /// How many recent entries may be held against a pool of this size
    fn effective_limit(&self, pool_size: usize, fraction: f32) -> usize {
        let scaled = (pool_size as f32 * fraction).floor() as usize;
        self.capacity.min(scaled.max(1))
    }

    /// The last `limit` responses logged for this mode
    fn recent_responses(&self, mode_id: &str, limit: usize) -> HashSet<&str> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| entry.mode_id == mode_id)
            .take(limit)
            .map(|entry| entry.response.as_str())
            .collect()
    }
}
