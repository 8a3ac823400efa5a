//! Speechbot - voice conversation coordinator
//!
//! Turns microphone speech into text, asks a remote text-generation service for
//! a reply, shows it and speaks it back:
//! - Speech input (microphone capture, utterance detection, Whisper STT)
//! - Speech output (`OpenAI` TTS, speaker playback)
//! - Text generation (Gemini)
//! - The conversation coordinator tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Presentation (REPL)                   │
//! └────────────────────┬────────────────────────────────┘
//!           commands   │   ▲  snapshot / notices
//! ┌────────────────────▼───┴────────────────────────────┐
//! │                 Coordinator                         │
//! │   messages  │  sessions  │  rate limit  │  volume   │
//! └──────┬─────────────┬──────────────────┬─────────────┘
//!        │             │                  │
//!   SpeechInput   TextGenerator      SpeechOutput
//!        │             │                  │
//!        └─────── CoordinatorEvent ───────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod generation;
pub mod voice;

pub use config::Config;
pub use coordinator::{
    ConversationMessage, ConversationSnapshot, ConversationState, Coordinator, Notice, NoticeKind,
    NoticeLevel, Speaker, VolumeLevel,
};
pub use error::{Error, Result};
pub use event::{CoordinatorEvent, EventReceiver, EventSender};
pub use generation::{GeminiClient, GenerationError, TextGenerator};
pub use voice::{SpeechInput, SpeechOutput};
