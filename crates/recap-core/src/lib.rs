//! Bounded conversation memory for agent runtimes.
//!
//! A [`CompactingMemory`] keeps two parallel logs of a conversation: the raw,
//! append-only history of everything added, and a working log that is replaced
//! by a single synthetic summary whenever its token estimate exceeds the
//! configured budget (or a custom trigger fires). Compressed-away batches can
//! be offloaded to a searchable store so nothing is permanently lost.

pub mod engine;
pub mod error;
pub mod estimator;
pub mod format;
pub mod memory;
pub mod message;
pub mod model;
pub mod offload;
pub mod schema;

pub use engine::{is_summary_message, summary_text, Compressor, SummaryCompressor};
pub use error::MemoryError;
pub use estimator::{CharEstimator, TokenEstimator, CHARS_PER_TOKEN};
pub use format::{format_messages, FlatMessage};
pub use memory::{
    CompactingMemory, CompactingMemoryBuilder, CompactionTrigger, GetMemory, MemoryState,
    MemoryStats,
};
pub use message::{Content, ContentBlock, Message, Role};
pub use model::{ModelClient, ModelOutcome, ModelResponse};
pub use offload::{InMemoryOffloadStore, JsonlOffloadStore, OffloadHit, OffloadStore, OffloadedChunk};
pub use schema::CompressedSummary;
