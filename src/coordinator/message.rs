//! Conversation transcript entries

use serde::Serialize;

/// Greeting every conversation starts with
pub const GREETING: &str = "Hello! I'm your AI assistant. What would you like to talk about today?";

/// Id of the greeting message
pub const GREETING_ID: u64 = 1;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One immutable transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    pub id: u64,
    pub text: String,
    pub speaker: Speaker,
    pub is_error: bool,
}

impl ConversationMessage {
    /// The seed greeting
    #[must_use]
    pub fn greeting() -> Self {
        Self {
            id: GREETING_ID,
            text: GREETING.to_string(),
            speaker: Speaker::Assistant,
            is_error: false,
        }
    }

    /// Whether the user said it
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }
}
