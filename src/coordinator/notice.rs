//! Transient user-facing notices
//!
//! Every condition the coordinator surfaces, recoverable error or plain
//! confirmation, becomes one [`Notice`].

use std::fmt;

use serde::Serialize;

use crate::generation::GenerationError;
use crate::voice::{InputError, OutputError};

/// How a notice should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// What a notice is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    InputUnsupported,
    InputNoSpeech,
    InputAudioCapture,
    InputAlreadyListening,
    InputOther,
    EmptyUtterance,
    RateLimitedLocally,
    ReplyPending,
    RecordingActive,
    RecordingFinishing,
    GenerationEmptyPrompt,
    GenerationTimeout,
    GenerationNetwork,
    GenerationAuth,
    GenerationRateLimited,
    GenerationProviderError,
    GenerationNoContent,
    PlaybackUnsupported,
    PlaybackError,
    ListeningStarted,
    SpeechStopped,
    VolumeChanged,
    ConversationCleared,
}

/// A toast-style message for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    /// An informational notice
    #[must_use]
    pub fn info(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            kind,
            message: message.into(),
        }
    }

    /// A confirmation notice
    #[must_use]
    pub fn success(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            kind,
            message: message.into(),
        }
    }

    /// An error notice
    #[must_use]
    pub fn error(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            kind,
            message: message.into(),
        }
    }

    /// Whether this notice reports a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&InputError> for Notice {
    fn from(err: &InputError) -> Self {
        match err {
            InputError::NoSpeech => Self::error(
                NoticeKind::InputNoSpeech,
                "No speech detected. Please speak clearly.",
            ),
            InputError::AudioCapture => Self::error(
                NoticeKind::InputAudioCapture,
                "Microphone not found or access denied.",
            ),
            InputError::Unsupported => Self::error(
                NoticeKind::InputUnsupported,
                "Speech recognition is not supported here.",
            ),
            InputError::AlreadyListening => {
                Self::error(NoticeKind::InputAlreadyListening, "Already listening.")
            }
            InputError::Other(code) => Self::error(
                NoticeKind::InputOther,
                format!("Speech recognition error: {code}"),
            ),
        }
    }
}

impl From<&GenerationError> for Notice {
    fn from(err: &GenerationError) -> Self {
        let kind = match err {
            GenerationError::EmptyPrompt => NoticeKind::GenerationEmptyPrompt,
            GenerationError::Timeout => NoticeKind::GenerationTimeout,
            GenerationError::Network(_) => NoticeKind::GenerationNetwork,
            GenerationError::Authentication => NoticeKind::GenerationAuth,
            GenerationError::RateLimitExceeded => NoticeKind::GenerationRateLimited,
            GenerationError::Provider { .. } => NoticeKind::GenerationProviderError,
            GenerationError::NoContent => NoticeKind::GenerationNoContent,
        };
        Self::error(kind, format!("Error: {err}"))
    }
}

impl From<&OutputError> for Notice {
    fn from(err: &OutputError) -> Self {
        match err {
            OutputError::Unsupported => Self::error(
                NoticeKind::PlaybackUnsupported,
                "Text-to-speech is not supported here.",
            ),
            OutputError::Backend(_) => {
                Self::error(NoticeKind::PlaybackError, "Failed to speak response.")
            }
        }
    }
}

/// Persistent banner text for a generation failure, naming the likely cause
#[must_use]
pub fn generation_banner(err: &GenerationError) -> String {
    match err {
        GenerationError::Authentication => {
            "Invalid Gemini API key. Please check the configuration.".to_string()
        }
        GenerationError::RateLimitExceeded => {
            "Gemini is throttling requests. Wait a moment and try again.".to_string()
        }
        other => format!("Error from Gemini: {other}"),
    }
}
