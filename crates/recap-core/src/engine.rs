use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::error::MemoryError;
use crate::format::{format_messages, FlatMessage};
use crate::message::Message;
use crate::model::{ModelClient, ModelOutcome};
use crate::schema::CompressedSummary;

/// Fixed markers wrapping a compaction summary, so downstream consumers can
/// tell an injected summary apart from a real assistant utterance without a
/// new message role.
pub const SUMMARY_OPEN: &str = "<conversation_summary>";
pub const SUMMARY_CLOSE: &str = "</conversation_summary>";

const MAX_TOKENS_SLOT: &str = "{max_tokens}";
const MESSAGES_SLOT: &str = "{messages}";
const SCHEMA_SLOT: &str = "{schema}";

const DEFAULT_TEMPLATE: &str = "\
Summarize the conversation below. Focus on: active tasks, important decisions \
made, user preferences learned, and any open questions. The summary must fit \
comfortably within {max_tokens} tokens.

Conversation (JSON):
{messages}

Respond with JSON matching this schema:
{schema}";

/// Strategy seam for replacing a message batch with a shorter one.
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, messages: &[Message]) -> Result<Vec<Message>, MemoryError>;
}

/// Built-in compression engine: renders a summarization prompt, asks the model
/// for schema-constrained output, and wraps the result in a single synthetic
/// assistant message.
pub struct SummaryCompressor {
    client: Arc<dyn ModelClient>,
    max_tokens: u64,
    template: String,
}

impl SummaryCompressor {
    pub fn new(client: Arc<dyn ModelClient>, max_tokens: u64) -> Self {
        Self {
            client,
            max_tokens,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Use a caller-supplied prompt template. It must contain the
    /// `{max_tokens}`, `{messages}`, and `{schema}` placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self, MemoryError> {
        let template = template.into();
        for slot in [MAX_TOKENS_SLOT, MESSAGES_SLOT, SCHEMA_SLOT] {
            if !template.contains(slot) {
                return Err(MemoryError::Template {
                    missing: match slot {
                        MAX_TOKENS_SLOT => "{max_tokens}",
                        MESSAGES_SLOT => "{messages}",
                        _ => "{schema}",
                    },
                });
            }
        }
        self.template = template;
        Ok(self)
    }

    fn render_prompt(&self, flat: &[FlatMessage]) -> Result<String, MemoryError> {
        let messages_json = serde_json::to_string_pretty(flat)?;
        let schema_json = serde_json::to_string_pretty(CompressedSummary::json_schema())?;
        Ok(self
            .template
            .replace(MAX_TOKENS_SLOT, &self.max_tokens.to_string())
            .replace(MESSAGES_SLOT, &messages_json)
            .replace(SCHEMA_SLOT, &schema_json))
    }
}

#[async_trait]
impl Compressor for SummaryCompressor {
    async fn compress(&self, messages: &[Message]) -> Result<Vec<Message>, MemoryError> {
        let flat = format_messages(messages);
        let prompt = self.render_prompt(&flat)?;
        let request = vec![FlatMessage {
            role: crate::message::Role::User,
            content: prompt.into(),
        }];

        let outcome = self
            .client
            .call(&request, Some(CompressedSummary::json_schema()))
            .await?;

        let payload = resolve_structured_payload(outcome).await?;
        let summary: CompressedSummary = serde_json::from_value(payload)?;

        debug!(
            input_messages = messages.len(),
            summary_chars = summary.compressed_text.len(),
            "compressed message batch"
        );

        Ok(vec![wrap_summary(&summary.compressed_text)])
    }
}

/// Pull the structured payload out of either response shape. For a stream,
/// only the final chunk is expected to carry it.
async fn resolve_structured_payload(
    outcome: ModelOutcome,
) -> Result<serde_json::Value, MemoryError> {
    let structured = match outcome {
        ModelOutcome::Immediate(resp) => resp.structured,
        ModelOutcome::Stream(mut stream) => {
            let mut last = None;
            while let Some(chunk) = stream.next().await {
                last = Some(chunk?);
            }
            last.and_then(|resp| resp.structured)
        }
    };
    structured.ok_or(MemoryError::StructuredOutputMissing)
}

/// Build the synthetic assistant message holding a delimited summary.
pub fn wrap_summary(compressed_text: &str) -> Message {
    Message::assistant(format!(
        "{}\n{}\n{}",
        SUMMARY_OPEN, compressed_text, SUMMARY_CLOSE
    ))
}

/// Whether a message is a compaction summary produced by [`wrap_summary`].
pub fn is_summary_message(msg: &Message) -> bool {
    let body = msg.text_body();
    body.starts_with(SUMMARY_OPEN) && body.trim_end().ends_with(SUMMARY_CLOSE)
}

/// Extract the raw summary text, delimiters stripped. Returns `None` for
/// ordinary messages.
pub fn summary_text(msg: &Message) -> Option<String> {
    if !is_summary_message(msg) {
        return None;
    }
    let body = msg.text_body();
    let inner = body
        .trim_start_matches(SUMMARY_OPEN)
        .trim_end()
        .trim_end_matches(SUMMARY_CLOSE);
    Some(inner.trim().to_string())
}
