use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Structured output a model must produce when asked to compress a
/// conversation: a single compressed-text field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedSummary {
    pub compressed_text: String,
}

static JSON_SCHEMA: Lazy<serde_json::Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "compressed_text": {
                "type": "string",
                "description": "Condensed summary of the conversation so far"
            }
        },
        "required": ["compressed_text"]
    })
});

impl CompressedSummary {
    /// JSON schema the model response is constrained to.
    pub fn json_schema() -> &'static serde_json::Value {
        &JSON_SCHEMA
    }
}
