use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{summary_text, Compressor};
use crate::error::MemoryError;
use crate::estimator::{CharEstimator, TokenEstimator};
use crate::format::format_messages;
use crate::message::Message;
use crate::offload::OffloadStore;

/// Caller-supplied predicate that can fire compression below the token
/// threshold, e.g. at a natural conversation boundary.
pub trait CompactionTrigger: Send + Sync {
    fn should_compact(&self, working: &[Message]) -> bool;
}

impl<F> CompactionTrigger for F
where
    F: Fn(&[Message]) -> bool + Send + Sync,
{
    fn should_compact(&self, working: &[Message]) -> bool {
        self(working)
    }
}

/// Index-aware message predicate used by [`GetMemory::filter`]. Receives
/// `(index, message)` pairs in pre-filter working-log order.
pub type MessageFilter = Box<dyn Fn(usize, &Message) -> bool + Send + Sync>;

/// Options for [`CompactingMemory::get_memory`].
#[derive(Default)]
pub struct GetMemory {
    recent_n: Option<usize>,
    filter: Option<MessageFilter>,
    trigger_override: Option<Arc<dyn CompactionTrigger>>,
}

impl GetMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the last `n` entries of the (post-filter) log.
    pub fn recent_n(mut self, n: usize) -> Self {
        self.recent_n = Some(n);
        self
    }

    pub fn filter(mut self, f: impl Fn(usize, &Message) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Substitute the configured trigger for this call only.
    pub fn trigger(mut self, trigger: Arc<dyn CompactionTrigger>) -> Self {
        self.trigger_override = Some(trigger);
        self
    }
}

/// Plain-data export of the full memory state. Round-trips losslessly through
/// serde; the budget field is `max_token` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryState {
    pub chat_history: Vec<Message>,
    pub memory: Vec<Message>,
    #[serde(rename = "max_token")]
    pub max_tokens: u64,
}

/// Snapshot of memory counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    pub raw_len: usize,
    pub working_len: usize,
    pub token_estimate: u64,
    pub max_tokens: u64,
    pub compaction_count: u32,
}

/// Conversation memory that keeps two parallel logs: the raw, append-only
/// history of everything added, and a working log that gets replaced by a
/// synthetic summary whenever a compression event fires.
///
/// One logical owner drives `add`/`get_memory` sequentially; `&mut self` on
/// every mutating operation enforces that. The only suspension point is the
/// model call inside the compressor, and the compression decision (including
/// any offload write) completes fully before `add`/`get_memory` return.
pub struct CompactingMemory {
    chat_history: Vec<Message>,
    memory: Vec<Message>,
    max_tokens: u64,
    estimator: Arc<dyn TokenEstimator>,
    compressor: Arc<dyn Compressor>,
    offload: Option<Arc<dyn OffloadStore>>,
    trigger: Option<Arc<dyn CompactionTrigger>>,
    compact_on_add: bool,
    compact_on_read: bool,
    compaction_count: u32,
}

impl CompactingMemory {
    pub fn builder(max_tokens: u64, compressor: Arc<dyn Compressor>) -> CompactingMemoryBuilder {
        CompactingMemoryBuilder::new(max_tokens, compressor)
    }

    /// Append messages to both logs, deep-copying each one. With
    /// compact-on-add enabled this runs the compression decision once; an
    /// empty slice is a no-op.
    pub async fn add(&mut self, messages: &[Message]) -> Result<(), MemoryError> {
        for msg in messages {
            self.chat_history.push(msg.clone());
            self.memory.push(msg.clone());
        }
        if self.compact_on_add && !messages.is_empty() {
            self.run_compression_decision(None).await?;
        }
        Ok(())
    }

    /// Convenience for a single message.
    pub async fn push(&mut self, message: Message) -> Result<(), MemoryError> {
        self.add(std::slice::from_ref(&message)).await
    }

    /// Read the working log. With compact-on-read enabled this first runs the
    /// compression decision, then applies the filter (over pre-filter
    /// indices), then tail-windows to the last `recent_n` of the filtered
    /// sequence.
    pub async fn get_memory(&mut self, opts: GetMemory) -> Result<Vec<Message>, MemoryError> {
        if self.compact_on_read {
            self.run_compression_decision(opts.trigger_override.as_ref())
                .await?;
        }

        let filtered: Vec<&Message> = match &opts.filter {
            Some(f) => self
                .memory
                .iter()
                .enumerate()
                .filter(|(i, msg)| f(*i, msg))
                .map(|(_, msg)| msg)
                .collect(),
            None => self.memory.iter().collect(),
        };

        let start = match opts.recent_n {
            Some(n) => filtered.len().saturating_sub(n),
            None => 0,
        };
        Ok(filtered[start..].iter().map(|msg| (*msg).clone()).collect())
    }

    /// Full working log, no compression decision, no windowing.
    pub fn working_log(&self) -> &[Message] {
        &self.memory
    }

    /// Full raw history.
    pub fn raw_history(&self) -> &[Message] {
        &self.chat_history
    }

    /// Remove entries at the given positions from both logs. Out-of-range
    /// indices are silently skipped per log, so deleting the same index twice
    /// is a no-op the second time.
    pub fn delete(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        // Descending so earlier removals don't shift later targets
        for &idx in sorted.iter().rev() {
            if idx < self.chat_history.len() {
                self.chat_history.remove(idx);
            }
            if idx < self.memory.len() {
                self.memory.remove(idx);
            }
        }
    }

    /// Raw-history length: the true total turn count, unaffected by
    /// compression.
    pub fn len(&self) -> usize {
        self.chat_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chat_history.is_empty()
    }

    pub fn working_len(&self) -> usize {
        self.memory.len()
    }

    /// Empty both logs, keeping the configuration.
    pub fn clear(&mut self) {
        self.chat_history.clear();
        self.memory.clear();
    }

    pub fn max_tokens(&self) -> u64 {
        self.max_tokens
    }

    /// Token estimate of the current working log.
    pub fn token_estimate(&self) -> u64 {
        self.estimator.count(&format_messages(&self.memory), None)
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            raw_len: self.chat_history.len(),
            working_len: self.memory.len(),
            token_estimate: self.token_estimate(),
            max_tokens: self.max_tokens,
            compaction_count: self.compaction_count,
        }
    }

    /// Export the full state as plain data.
    pub fn state(&self) -> MemoryState {
        MemoryState {
            chat_history: self.chat_history.clone(),
            memory: self.memory.clone(),
            max_tokens: self.max_tokens,
        }
    }

    /// Replace logs and budget from an exported state.
    pub fn restore(&mut self, state: MemoryState) {
        self.chat_history = state.chat_history;
        self.memory = state.memory;
        self.max_tokens = state.max_tokens;
    }

    /// The compression decision: the threshold trigger is evaluated first and
    /// is sufficient alone; the custom trigger (per-call override, else the
    /// configured default) is consulted only when the threshold did not fire.
    /// At most one compression pass per call — no re-check loop, so a summary
    /// that is itself over budget is surfaced to the caller rather than
    /// recursively re-summarized.
    async fn run_compression_decision(
        &mut self,
        trigger_override: Option<&Arc<dyn CompactionTrigger>>,
    ) -> Result<(), MemoryError> {
        if self.memory.is_empty() {
            return Ok(());
        }

        let tokens = self.token_estimate();
        let threshold_fired = tokens > self.max_tokens;
        let fired = threshold_fired || {
            let trigger = trigger_override.or(self.trigger.as_ref());
            trigger.is_some_and(|t| t.should_compact(&self.memory))
        };
        if !fired {
            return Ok(());
        }

        info!(
            tokens,
            max_tokens = self.max_tokens,
            threshold_fired,
            working_len = self.memory.len(),
            "compression event"
        );

        // Failure here leaves the working log untouched, so the call is
        // retryable.
        let replacement = self.compressor.compress(&self.memory).await?;

        if let Some(store) = &self.offload {
            let summary = replacement
                .iter()
                .find_map(summary_text)
                .unwrap_or_else(|| {
                    replacement
                        .iter()
                        .map(Message::text_body)
                        .collect::<Vec<_>>()
                        .join("\n")
                });
            store.store(self.memory.clone(), summary).await?;
        }

        self.memory = replacement;
        self.compaction_count += 1;
        Ok(())
    }
}

/// Builder for [`CompactingMemory`]. Defaults: [`CharEstimator`] fallback,
/// compact-on-read enabled, compact-on-add disabled, no offload store, no
/// custom trigger.
pub struct CompactingMemoryBuilder {
    max_tokens: u64,
    compressor: Arc<dyn Compressor>,
    estimator: Arc<dyn TokenEstimator>,
    offload: Option<Arc<dyn OffloadStore>>,
    trigger: Option<Arc<dyn CompactionTrigger>>,
    compact_on_add: bool,
    compact_on_read: bool,
}

impl CompactingMemoryBuilder {
    pub fn new(max_tokens: u64, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            max_tokens,
            compressor,
            estimator: Arc::new(CharEstimator::new()),
            offload: None,
            trigger: None,
            compact_on_add: false,
            compact_on_read: true,
        }
    }

    pub fn estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn offload(mut self, store: Arc<dyn OffloadStore>) -> Self {
        self.offload = Some(store);
        self
    }

    pub fn trigger(mut self, trigger: Arc<dyn CompactionTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn compact_on_add(mut self, enabled: bool) -> Self {
        self.compact_on_add = enabled;
        self
    }

    pub fn compact_on_read(mut self, enabled: bool) -> Self {
        self.compact_on_read = enabled;
        self
    }

    pub fn build(self) -> CompactingMemory {
        CompactingMemory {
            chat_history: Vec::new(),
            memory: Vec::new(),
            max_tokens: self.max_tokens,
            estimator: self.estimator,
            compressor: self.compressor,
            offload: self.offload,
            trigger: self.trigger,
            compact_on_add: self.compact_on_add,
            compact_on_read: self.compact_on_read,
            compaction_count: 0,
        }
    }
}
