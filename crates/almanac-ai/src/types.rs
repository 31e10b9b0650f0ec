//! Core types for model interactions

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Content blocks inside a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Image content (base64 encoded)
    Image { data: String, mime_type: String },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content from base64 data
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }

    /// Check if this is image content
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// One message in the conversation, tagged user or assistant.
/// Immutable once appended to a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<Content>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Turn {
    /// Create a user turn with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a user turn with multiple content blocks
    pub fn user_with_content(content: Vec<Content>) -> Self {
        Self {
            role: Role::User,
            content,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an assistant turn with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Check if any content block is an image
    pub fn has_image(&self) -> bool {
        self.content.iter().any(|c| c.is_image())
    }
}

/// Supported input types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
}

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "gemini-1.5-flash")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Base URL for API calls
    pub base_url: String,
    /// Supported input types
    pub input_types: Vec<InputType>,
    /// Context window size in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
}

impl Model {
    /// Whether the model accepts image input
    pub fn supports_images(&self) -> bool {
        self.input_types.contains(&InputType::Image)
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

impl Usage {
    /// Add another usage record to this one
    pub fn add(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    Stop,
    /// Maximum tokens reached
    Length,
    /// Blocked by a safety filter
    Safety,
    /// Request was aborted
    Aborted,
}

/// The final result of one model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub turn: Turn,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

/// The ordered content assembled for one external model call.
/// Transient: built fresh per call, never stored.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// System instruction sent alongside the conversation
    pub system_instruction: Option<String>,
    /// Conversation turns, oldest first; the newest user turn is last
    pub turns: Vec<Turn>,
}

impl Context {
    /// Create a new context with a system instruction
    pub fn with_system(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: Some(system_instruction.into()),
            turns: vec![],
        }
    }

    /// Add a turn to the context
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The turns preceding the newest one
    pub fn history(&self) -> &[Turn] {
        let len = self.turns.len();
        &self.turns[..len.saturating_sub(1)]
    }

    /// The newest turn, if any
    pub fn newest(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_text_joins_text_blocks_only() {
        let turn = Turn::user_with_content(vec![
            Content::text("before "),
            Content::image("aGk=", "image/png"),
            Content::text("after"),
        ]);
        assert_eq!(turn.text(), "before after");
        assert!(turn.has_image());
    }

    #[test]
    fn test_context_history_excludes_newest() {
        let mut ctx = Context::with_system("be terse");
        ctx.push(Turn::user("A"));
        ctx.push(Turn::assistant("B"));
        ctx.push(Turn::user("C"));

        let history: Vec<String> = ctx.history().iter().map(|t| t.text()).collect();
        assert_eq!(history, vec!["A", "B"]);
        assert_eq!(ctx.newest().unwrap().text(), "C");
    }

    #[test]
    fn test_context_history_empty() {
        let ctx = Context::default();
        assert!(ctx.history().is_empty());
        assert!(ctx.newest().is_none());
    }

    #[test]
    fn test_usage_add() {
        let mut usage = Usage { input: 10, output: 5 };
        usage.add(&Usage { input: 3, output: 2 });
        assert_eq!(usage, Usage { input: 13, output: 7 });
    }
}
