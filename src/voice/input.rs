//! Speech input adapter
//!
//! Wraps a [`RecognitionBackend`] and turns whatever it reports into exactly one
//! [`RecognitionOutcome`] per recording session.

use thiserror::Error;

use crate::config::DEFAULT_LOCALE;
use crate::event::{CoordinatorEvent, EventSender, SessionId};

/// Recognition failure kinds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Nothing intelligible was heard
    #[error("no speech detected")]
    NoSpeech,

    /// Microphone unavailable or access denied
    #[error("microphone not found or access denied")]
    AudioCapture,

    /// No recognition capability in this environment
    #[error("speech recognition is not supported")]
    Unsupported,

    /// A recording session is already live
    #[error("already listening")]
    AlreadyListening,

    /// Any other backend-reported failure
    #[error("speech recognition error: {0}")]
    Other(String),
}

impl InputError {
    /// Map a platform recognition error code to a failure kind
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "audio-capture" | "not-allowed" => Self::AudioCapture,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Single outcome of a recording session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Finalized, trimmed, non-empty transcript
    Transcript(String),

    /// Recognition failed
    Failed(InputError),

    /// Session ended without a result (stopped before anything was heard)
    Ended,
}

/// How the backend should recognize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// BCP 47 locale, e.g. "en-US"
    pub locale: String,

    /// Keep listening after the first utterance
    pub continuous: bool,

    /// Report partial results
    pub interim_results: bool,
}

impl RecognitionConfig {
    /// Single-utterance, final-results-only recognition in `locale`
    #[must_use]
    pub fn single_utterance(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            continuous: false,
            interim_results: false,
        }
    }

    /// Primary language subtag of the locale ("en" for "en-US")
    #[must_use]
    pub fn language(&self) -> &str {
        self.locale.split(['-', '_']).next().unwrap_or(&self.locale)
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self::single_utterance(DEFAULT_LOCALE)
    }
}

/// One-shot reporting handle handed to a backend for a single session
///
/// Consuming methods guarantee at most one outcome. Dropping the sink without
/// reporting delivers [`RecognitionOutcome::Ended`]; [`RecognitionSink::detach`]
/// drops it silently.
#[derive(Debug)]
pub struct RecognitionSink {
    session: SessionId,
    events: Option<EventSender>,
}

impl RecognitionSink {
    /// Create a sink reporting `session` outcomes to `events`
    #[must_use]
    pub const fn new(session: SessionId, events: EventSender) -> Self {
        Self {
            session,
            events: Some(events),
        }
    }

    /// Session this sink reports for
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Report the finalized transcript
    ///
    /// Whitespace-only transcripts are reported as [`InputError::NoSpeech`].
    pub fn transcript(mut self, raw: &str) {
        let text = raw.trim();
        let outcome = if text.is_empty() {
            RecognitionOutcome::Failed(InputError::NoSpeech)
        } else {
            RecognitionOutcome::Transcript(text.to_string())
        };
        self.deliver(outcome);
    }

    /// Report a platform error code
    pub fn error(mut self, code: &str) {
        self.deliver(RecognitionOutcome::Failed(InputError::from_code(code)));
    }

    /// Report a typed failure
    pub fn fail(mut self, error: InputError) {
        self.deliver(RecognitionOutcome::Failed(error));
    }

    /// Drop the sink without reporting anything
    pub fn detach(mut self) {
        self.events = None;
    }

    fn deliver(&mut self, outcome: RecognitionOutcome) {
        if let Some(events) = self.events.take() {
            tracing::debug!(session = %self.session, ?outcome, "recognition outcome");
            // Receiver gone means the coordinator is shutting down
            let _ = events.send(CoordinatorEvent::Recognition {
                session: self.session,
                outcome,
            });
        }
    }
}

impl Drop for RecognitionSink {
    fn drop(&mut self) {
        self.deliver(RecognitionOutcome::Ended);
    }
}

/// A speech recognition capability
pub trait RecognitionBackend: Send {
    /// Begin a session; the backend reports through `sink` exactly once
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started
    fn start(
        &mut self,
        config: &RecognitionConfig,
        sink: RecognitionSink,
    ) -> Result<(), InputError>;

    /// Finish the live session early, recognizing what was heard so far
    fn stop(&mut self);

    /// Tear down the live session without reporting anything
    fn abort(&mut self);
}

/// Speech input adapter owned by the coordinator
pub struct SpeechInput {
    backend: Option<Box<dyn RecognitionBackend>>,
    config: RecognitionConfig,
    active: Option<SessionId>,
}

impl SpeechInput {
    /// Create an adapter over `backend`
    #[must_use]
    pub fn new(backend: Box<dyn RecognitionBackend>, config: RecognitionConfig) -> Self {
        Self {
            backend: Some(backend),
            config,
            active: None,
        }
    }

    /// Create an adapter for an environment without recognition
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            backend: None,
            config: RecognitionConfig::default(),
            active: None,
        }
    }

    /// Whether a recognition backend is present
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    /// Session currently owned by the backend
    #[must_use]
    pub const fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// Recognition settings in use
    #[must_use]
    pub const fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Start a recording session
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Unsupported`] without a backend,
    /// [`InputError::AlreadyListening`] while a session is live, or whatever the
    /// backend fails with
    pub fn start_listening(
        &mut self,
        session: SessionId,
        events: &EventSender,
    ) -> Result<(), InputError> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(InputError::Unsupported);
        };

        if let Some(active) = self.active {
            tracing::debug!(active = %active, "start ignored, already listening");
            return Err(InputError::AlreadyListening);
        }

        let sink = RecognitionSink::new(session, events.clone());
        backend.start(&self.config, sink)?;
        self.active = Some(session);

        tracing::debug!(session = %session, locale = %self.config.locale, "listening");
        Ok(())
    }

    /// Ask the backend to finish the live session
    pub fn stop_listening(&mut self) {
        if let (Some(backend), Some(session)) = (self.backend.as_mut(), self.active) {
            tracing::debug!(session = %session, "stopping recognition");
            backend.stop();
        }
    }

    /// Drop the live session without waiting for its outcome
    pub fn abort(&mut self) {
        if let Some(session) = self.active.take() {
            if let Some(backend) = self.backend.as_mut() {
                backend.abort();
            }
            tracing::debug!(session = %session, "recognition aborted");
        }
    }

    /// Mark `session` as finished once its outcome was handled
    pub fn finish(&mut self, session: SessionId) {
        if self.active == Some(session) {
            self.active = None;
        }
    }
}

impl Drop for SpeechInput {
    fn drop(&mut self) {
        self.abort();
    }
}
