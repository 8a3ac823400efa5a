//! Remote text generation
//!
//! A [`TextGenerator`] turns one prompt into one reply. Every failure is folded
//! into a [`GenerationError`] so callers never see transport or parse errors.

mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{GeminiClient, MAX_OUTPUT_TOKENS, REQUEST_TIMEOUT, TEMPERATURE, classify_response};

/// Why a generation request produced no reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The prompt was empty
    #[error("no prompt provided")]
    EmptyPrompt,

    /// No response within the request timeout
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Credential rejected (401/403)
    #[error("invalid API key")]
    Authentication,

    /// Provider throttled the request (429)
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Any other provider-reported failure
    #[error("provider error ({status}): {message}")]
    Provider { message: String, status: u16 },

    /// Success status but no answer text
    #[error("no content in response")]
    NoContent,
}

impl GenerationError {
    /// Assistant reply shown in place of a real answer
    #[must_use]
    pub const fn fallback_text(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "No prompt provided.",
            Self::Timeout => "Gemini request timed out.",
            Self::Network(_) => "Failed to connect to Gemini. Please check your network.",
            Self::Authentication => "Invalid Gemini API key.",
            Self::RateLimitExceeded => "Gemini rate limit exceeded. Please try again later.",
            Self::Provider { .. } => "Error processing Gemini request.",
            Self::NoContent => "No valid response from Gemini.",
        }
    }

    /// Stable machine-readable kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "invalid_prompt",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Authentication => "authentication_error",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::Provider { .. } => "provider_error",
            Self::NoContent => "no_content",
        }
    }
}

/// A single-turn text generation service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `prompt`
    ///
    /// # Errors
    ///
    /// Returns the classified failure when no reply text is available
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
