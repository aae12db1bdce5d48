//! Language-model request/response types
//!
//! The model is consumed as an opaque request/response function: the
//! orchestrator sends a bounded message context plus a tool vocabulary and
//! receives reply text and zero or more proposed actions. No streaming.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the model context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// Tool made available to the model for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: Value,
}

/// An action the model asks the orchestrator to perform
///
/// Ephemeral and unvalidated: nothing here is trusted until it passes the
/// schema and guardrail validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    pub name: String,
    pub fields: Map<String, Value>,
}

impl ProposedAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Token accounting for one model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Model response: reply text plus proposed actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ModelReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proposed_action_fields() {
        let action = ProposedAction::new("create_callback_task")
            .with_field("callback_number", json!("+15551234567"))
            .with_field("priority", json!("high"));

        assert_eq!(action.str_field("callback_number"), Some("+15551234567"));
        assert_eq!(action.str_field("priority"), Some("high"));
        assert!(action.field("missing").is_none());
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 40,
        };
        assert_eq!(usage.total(), 140);
    }
}
