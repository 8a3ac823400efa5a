//! Coordinator state types

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use super::message::ConversationMessage;
use super::notice::Notice;
use crate::event::{Epoch, RequestId, SessionId};

/// Playback volume step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeLevel {
    #[default]
    Full,
    Half,
    Muted,
}

impl VolumeLevel {
    /// The level `toggle_volume` moves to
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Full => Self::Half,
            Self::Half => Self::Muted,
            Self::Muted => Self::Full,
        }
    }

    /// Gain in `0.0..=1.0`
    #[must_use]
    pub const fn as_f32(self) -> f32 {
        match self {
            Self::Full => 1.0,
            Self::Half => 0.5,
            Self::Muted => 0.0,
        }
    }

    #[must_use]
    pub const fn is_muted(self) -> bool {
        matches!(self, Self::Muted)
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("100%"),
            Self::Half => f.write_str("50%"),
            Self::Muted => f.write_str("muted"),
        }
    }
}

/// Coarse state derived from the live session slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    Listening,
    AwaitingGeneration,
    Speaking,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Listening => f.write_str("listening"),
            Self::AwaitingGeneration => f.write_str("awaiting reply"),
            Self::Speaking => f.write_str("speaking"),
        }
    }
}

/// The live recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSession {
    pub id: SessionId,
    /// Cleared by `stop_listening`; the outcome is still awaited
    pub active: bool,
}

/// Where a playback session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Pending,
    Speaking,
    Finished,
    Failed,
    Cancelled,
}

/// The live playback session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub text: String,
    pub volume: f32,
    pub status: PlaybackStatus,
}

/// The outstanding generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub epoch: Epoch,
    pub prompt: String,
    pub started_at: Instant,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<ConversationMessage>,
    pub is_recording: bool,
    pub is_speaking: bool,
    pub is_awaiting_reply: bool,
    pub volume: VolumeLevel,
    pub last_notice: Option<Notice>,
    pub banner: Option<String>,
}
