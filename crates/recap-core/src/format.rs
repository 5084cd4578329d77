use serde::{Deserialize, Serialize};

use crate::message::{Content, Message, Role};

/// The flat `{role, content}` record consumed by token estimators and the
/// compression prompt builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatMessage {
    pub role: Role,
    pub content: Content,
}

/// Project an ordered message log into flat records.
///
/// Order-preserving, and never drops a message: an empty body still formats to
/// a record with empty content.
pub fn format_messages(messages: &[Message]) -> Vec<FlatMessage> {
    messages
        .iter()
        .map(|msg| FlatMessage {
            role: msg.role,
            content: msg.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentBlock;

    #[test]
    fn test_preserves_order_and_length() {
        let messages = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ];
        let flat = format_messages(&messages);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].role, Role::User);
        assert_eq!(flat[1].role, Role::Assistant);
        assert_eq!(flat[2].content, Content::Text("three".to_string()));
    }

    #[test]
    fn test_empty_message_is_kept() {
        let messages = vec![Message::user(""), Message::assistant("reply")];
        let flat = format_messages(&messages);
        assert_eq!(flat.len(), 2);
        assert!(flat[0].content.is_empty());
    }

    #[test]
    fn test_blocks_pass_through_unchanged() {
        let blocks = vec![ContentBlock::Thinking {
            text: "hmm".to_string(),
        }];
        let messages = vec![Message::assistant(blocks.clone())];
        let flat = format_messages(&messages);
        assert_eq!(flat[0].content, Content::Blocks(blocks));
    }

    #[test]
    fn test_flat_record_shape() {
        let flat = format_messages(&[Message::user("hi")]);
        let value = serde_json::to_value(&flat[0]).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
