use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One typed block inside a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    Image {
        source: String,
    },
    Audio {
        source: String,
    },
    Thinking {
        text: String,
    },
}

impl ContentBlock {
    /// Textual projection of the block, used for search and estimation.
    pub fn text_body(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::ToolUse { name, input, .. } => {
                format!("[tool: {} {}]", name, input)
            }
            ContentBlock::ToolResult { content, .. } => content.clone(),
            ContentBlock::Image { source } => format!("[image: {}]", source),
            ContentBlock::Audio { source } => format!("[audio: {}]", source),
            ContentBlock::Thinking { text } => text.clone(),
        }
    }
}

/// Message body: either a plain string or an ordered list of typed blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Blocks(blocks) => blocks.is_empty(),
        }
    }

    /// Flatten to plain text. Blocks are joined with newlines.
    pub fn text_body(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .map(ContentBlock::text_body)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Vec<ContentBlock>> for Content {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Content::Blocks(blocks)
    }
}

/// A single conversation turn.
///
/// Messages are value types: `Clone` is a deep copy, and the memory clones on
/// every insertion so callers keeping their own copy cannot mutate stored
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, author: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            id: generate_message_id(),
            author: author.into(),
            role,
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, "user", content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, "assistant", content)
    }

    pub fn system(content: impl Into<Content>) -> Self {
        Self::new(Role::System, "system", content)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Textual projection of the whole message, used for search and estimation.
    pub fn text_body(&self) -> String {
        self.content.text_body()
    }
}

/// Generate a unique message id: `msg-<millis>-<8 hex>`.
pub fn generate_message_id() -> String {
    let ts = Utc::now().timestamp_millis();
    let rand_part: u32 = rand::random();
    format!("msg-{}-{:08x}", ts, rand_part)
}
