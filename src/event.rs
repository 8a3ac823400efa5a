//! Events fed back into the coordinator
//!
//! Every asynchronous outcome (recognition, generation, playback) travels back to
//! the coordinator as a [`CoordinatorEvent`] on one unbounded channel. Each event
//! carries the identity of the session or request it belongs to so stale results
//! can be told apart from live ones.

use std::fmt;

use tokio::sync::mpsc;

use crate::generation::GenerationError;
use crate::voice::{PlaybackEvent, RecognitionOutcome};

/// Sending half of the coordinator's event channel
pub type EventSender = mpsc::UnboundedSender<CoordinatorEvent>;

/// Receiving half of the coordinator's event channel
pub type EventReceiver = mpsc::UnboundedReceiver<CoordinatorEvent>;

/// Create a new coordinator event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Identity of one recording or playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identity of one generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Conversation generation, bumped on every reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Asynchronous outcome delivered to the coordinator
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// A recording session produced its single outcome
    Recognition {
        session: SessionId,
        outcome: RecognitionOutcome,
    },

    /// A generation request completed
    Generation {
        epoch: Epoch,
        request: RequestId,
        outcome: Result<String, GenerationError>,
    },

    /// A playback session reported a lifecycle change
    Playback {
        session: SessionId,
        event: PlaybackEvent,
    },

    /// The synthesis backend's voice list changed
    VoicesChanged,
}
