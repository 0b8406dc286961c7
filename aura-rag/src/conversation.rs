//! Conversation history types.
//!
//! History arrives from request handlers as loosely shaped JSON. It is
//! validated into [`ConversationMessage`]s here, before it reaches the
//! reformulator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RagError, Result};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the assistant.
    User,
    /// The assistant itself.
    Assistant,
}

/// One turn of conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    /// Author of the turn.
    pub role: Role,
    /// Text of the turn.
    pub content: String,
}

impl ConversationMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Validate a JSON array of `{ "role": ..., "content": ... }` objects.
///
/// `null` is accepted as an empty history.
///
/// # Errors
///
/// Returns [`RagError::Validation`] naming the first offending entry.
pub fn parse_history(value: &Value) -> Result<Vec<ConversationMessage>> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => {
            return Err(RagError::Validation(format!(
                "conversation history must be an array, got {}",
                json_kind(other)
            )));
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            ConversationMessage::deserialize(entry).map_err(|e| {
                RagError::Validation(format!("conversation history entry {index}: {e}"))
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_well_formed_history() {
        let history = parse_history(&json!([
            { "role": "user", "content": "I have a headache" },
            { "role": "assistant", "content": "How long has it lasted?" }
        ]))
        .unwrap();
        assert_eq!(
            history,
            vec![
                ConversationMessage::user("I have a headache"),
                ConversationMessage::assistant("How long has it lasted?"),
            ]
        );
    }

    #[test]
    fn null_is_empty_history() {
        assert!(parse_history(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_role_with_entry_index() {
        let err = parse_history(&json!([
            { "role": "user", "content": "hi" },
            { "role": "system", "content": "be nice" }
        ]))
        .unwrap_err();
        assert!(matches!(err, RagError::Validation(msg) if msg.contains("entry 1")));
    }

    #[test]
    fn rejects_missing_content_and_non_arrays() {
        assert!(parse_history(&json!([{ "role": "user" }])).is_err());
        assert!(parse_history(&json!({ "role": "user", "content": "hi" })).is_err());
    }
}
