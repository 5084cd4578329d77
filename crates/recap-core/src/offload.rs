use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MemoryError;
use crate::message::Message;

/// One compressed-away batch: the exact messages that were replaced, the
/// summary produced for them, and when. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadedChunk {
    pub messages: Vec<Message>,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub num_messages: usize,
}

impl OffloadedChunk {
    pub fn new(messages: Vec<Message>, summary: impl Into<String>) -> Self {
        let num_messages = messages.len();
        Self {
            messages,
            summary: summary.into(),
            timestamp: Utc::now(),
            num_messages,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        if self.summary.to_lowercase().contains(needle) {
            return true;
        }
        self.messages
            .iter()
            .any(|msg| msg.text_body().to_lowercase().contains(needle))
    }

    fn to_hit(&self) -> OffloadHit {
        OffloadHit {
            summary: self.summary.clone(),
            timestamp: self.timestamp.to_rfc3339(),
            num_messages: self.num_messages,
        }
    }
}

/// Search result record. Minimum fields per the offload contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadHit {
    pub summary: String,
    pub timestamp: String,
    pub num_messages: usize,
}

/// Append-only store for compressed-away batches with keyword search.
#[async_trait]
pub trait OffloadStore: Send + Sync {
    /// Persist one chunk capturing `messages` and the summary derived from
    /// them.
    async fn store(&self, messages: Vec<Message>, summary: String) -> Result<(), MemoryError>;

    /// Case-insensitive substring search over summaries and stored message
    /// text, most-recent-first, capped at `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<OffloadHit>, MemoryError>;

    async fn clear(&self) -> Result<(), MemoryError>;

    async fn len(&self) -> Result<usize, MemoryError>;

    async fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len().await? == 0)
    }
}

/// Vec-backed reference store.
#[derive(Default)]
pub struct InMemoryOffloadStore {
    chunks: Mutex<Vec<OffloadedChunk>>,
}

impl InMemoryOffloadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OffloadStore for InMemoryOffloadStore {
    async fn store(&self, messages: Vec<Message>, summary: String) -> Result<(), MemoryError> {
        let chunk = OffloadedChunk::new(messages, summary);
        debug!(num_messages = chunk.num_messages, "offloaded chunk");
        self.chunks.lock().expect("offload store poisoned").push(chunk);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<OffloadHit>, MemoryError> {
        let needle = query.to_lowercase();
        let chunks = self.chunks.lock().expect("offload store poisoned");
        Ok(chunks
            .iter()
            .rev()
            .filter(|chunk| chunk.matches(&needle))
            .take(limit)
            .map(OffloadedChunk::to_hit)
            .collect())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.chunks.lock().expect("offload store poisoned").clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.chunks.lock().expect("offload store poisoned").len())
    }
}

/// File-backed store: one JSON chunk per line, append-only.
pub struct JsonlOffloadStore {
    path: PathBuf,
}

impl JsonlOffloadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_chunks(&self) -> Result<Vec<OffloadedChunk>, MemoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut chunks = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            chunks.push(serde_json::from_str::<OffloadedChunk>(&line)?);
        }
        Ok(chunks)
    }
}

#[async_trait]
impl OffloadStore for JsonlOffloadStore {
    async fn store(&self, messages: Vec<Message>, summary: String) -> Result<(), MemoryError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let chunk = OffloadedChunk::new(messages, summary);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(&chunk)?;
        writeln!(file, "{}", json)?;
        debug!(
            num_messages = chunk.num_messages,
            path = %self.path.display(),
            "offloaded chunk to file"
        );
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<OffloadHit>, MemoryError> {
        let needle = query.to_lowercase();
        Ok(self
            .read_chunks()?
            .iter()
            .rev()
            .filter(|chunk| chunk.matches(&needle))
            .take(limit)
            .map(OffloadedChunk::to_hit)
            .collect())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.read_chunks()?.len())
    }
}
