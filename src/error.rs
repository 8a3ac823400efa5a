//! Error types for speechbot
//!
//! Infrastructure failures (config, audio devices, HTTP plumbing) use [`Error`].
//! Conversation-level failures that the coordinator turns into notices have their
//! own closed enums next to the component that produces them.

use thiserror::Error;

/// Result type alias for speechbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the conversation state machine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
