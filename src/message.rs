use serde::{Deserialize, Serialize};

/// Who produced a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Human,
    Ai,
    Generic,
    Function,
    Tool,
}

/// A single role-tagged message sent to or produced by a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, content)
    }
}

impl MessageRole {
    /// Prefix used when rendering a transcript as plain text.
    pub fn as_prefix(&self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::Human => "Human",
            MessageRole::Ai => "AI",
            MessageRole::Generic => "Generic",
            MessageRole::Function => "Function",
            MessageRole::Tool => "Tool",
        }
    }
}
