use thiserror::Error;

/// Failures surfaced by the memory and its compression engine.
///
/// All of these propagate unmodified out of `add`/`get_memory`: silently
/// dropping conversation history on a parse error would be worse than
/// surfacing the error, so the core never swallows or substitutes defaults.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The model reply, streamed or not, never carried a structured payload
    /// matching the compression schema.
    #[error("model response carried no structured payload matching the compression schema")]
    StructuredOutputMissing,

    /// The model call itself failed (transport, timeout, cancellation).
    #[error("model call failed: {0}")]
    Model(String),

    /// The structured payload did not parse as a compressed summary.
    #[error("structured payload did not match the compression schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// A custom prompt template is missing a required placeholder.
    #[error("prompt template is missing the {missing} placeholder")]
    Template { missing: &'static str },

    /// An offload store backed by files failed to read or write.
    #[error("offload store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// Wrap an arbitrary model-client failure.
    pub fn model(err: impl std::fmt::Display) -> Self {
        MemoryError::Model(err.to_string())
    }

    /// Wrap a plain-text model-client failure.
    pub fn model_msg(msg: impl Into<String>) -> Self {
        MemoryError::Model(msg.into())
    }
}
