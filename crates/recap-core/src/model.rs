use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::MemoryError;
use crate::format::FlatMessage;

/// One model reply, or one chunk of a streamed reply.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Free-form text content. The compression engine ignores it.
    pub content: String,
    /// Structured payload matching the schema the call requested, if any.
    /// In a stream, only the final chunk is expected to carry it.
    pub structured: Option<serde_json::Value>,
}

impl ModelResponse {
    pub fn structured(payload: serde_json::Value) -> Self {
        Self {
            content: String::new(),
            structured: Some(payload),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            structured: None,
        }
    }
}

/// A model call resolves to either a single response or a stream of partial
/// responses where only the last chunk carries the assembled payload.
pub enum ModelOutcome {
    Immediate(ModelResponse),
    Stream(BoxStream<'static, Result<ModelResponse, MemoryError>>),
}

impl ModelOutcome {
    /// Wrap an iterable of chunks as a streamed outcome.
    pub fn stream_of(chunks: Vec<ModelResponse>) -> Self {
        ModelOutcome::Stream(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

impl std::fmt::Debug for ModelOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelOutcome::Immediate(resp) => f.debug_tuple("Immediate").field(resp).finish(),
            ModelOutcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Generic model-call interface the compression engine talks to.
///
/// `schema`, when present, asks the implementation to constrain the response
/// to that JSON shape (structured output). Implementations decide whether to
/// answer immediately or stream.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(
        &self,
        messages: &[FlatMessage],
        schema: Option<&serde_json::Value>,
    ) -> Result<ModelOutcome, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_of_yields_in_order() {
        let outcome = ModelOutcome::stream_of(vec![
            ModelResponse::text("partial"),
            ModelResponse::structured(serde_json::json!({"compressed_text": "done"})),
        ]);
        let ModelOutcome::Stream(mut stream) = outcome else {
            panic!("expected stream");
        };
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, "partial");
        assert!(first.structured.is_none());
        let last = stream.next().await.unwrap().unwrap();
        assert!(last.structured.is_some());
        assert!(stream.next().await.is_none());
    }
}
