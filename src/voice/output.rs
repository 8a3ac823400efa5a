//! Speech output adapter
//!
//! Wraps a [`SynthesisBackend`], picks a voice, and guarantees that starting a
//! new utterance always cancels the previous one first.

use thiserror::Error;

use crate::event::{CoordinatorEvent, EventSender, SessionId};

/// Fixed speaking rate
pub const SPEECH_RATE: f32 = 1.0;

/// Fixed speaking pitch
pub const SPEECH_PITCH: f32 = 1.0;

/// Synthesis failure kinds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// No synthesis capability in this environment
    #[error("text-to-speech is not supported")]
    Unsupported,

    /// The backend refused or failed the utterance
    #[error("speech synthesis failed: {0}")]
    Backend(String),
}

/// Lifecycle change of a playback session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio became audible
    Started,

    /// Utterance played to the end
    Finished,

    /// Utterance could not be played
    Failed(String),
}

/// A voice offered by the synthesis backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Backend identifier passed back when speaking
    pub id: String,

    /// Human-readable name, used for preference matching
    pub name: String,

    /// Language tag
    pub lang: String,

    /// Backend's default voice
    pub default: bool,
}

/// Everything the backend needs to speak one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub volume: f32,
    pub rate: f32,
    pub pitch: f32,
    /// Voice id, `None` for the backend default
    pub voice: Option<String>,
}

/// Name fragments tried in order when picking a voice
const VOICE_PREFERENCES: [&str; 3] = ["Female", "Google", "Samantha"];

/// Pick a voice from `voices`
///
/// Prefers, in order, a voice whose name mentions "Female", then "Google", then
/// "Samantha", then the voice flagged as default. `None` means the backend's own
/// default.
#[must_use]
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    VOICE_PREFERENCES
        .iter()
        .find_map(|fragment| voices.iter().find(|v| v.name.contains(fragment)))
        .or_else(|| voices.iter().find(|v| v.default))
}

/// One-shot lifecycle reporter for a single playback session
///
/// `finished` and `failed` consume the sink. Dropping it without either reports
/// [`PlaybackEvent::Failed`]; [`PlaybackSink::detach`] drops it silently, for
/// utterances that were cancelled.
#[derive(Debug)]
pub struct PlaybackSink {
    session: SessionId,
    events: Option<EventSender>,
}

impl PlaybackSink {
    /// Create a sink reporting `session` lifecycle to `events`
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

    /// Report that audio started
    pub fn started(&self) {
        self.send(PlaybackEvent::Started);
    }

    /// Report normal completion
    pub fn finished(mut self) {
        self.finish(PlaybackEvent::Finished);
    }

    /// Report a failure
    pub fn failed(mut self, reason: impl Into<String>) {
        self.finish(PlaybackEvent::Failed(reason.into()));
    }

    /// Drop the sink without reporting anything
    pub fn detach(mut self) {
        self.events = None;
    }

    fn finish(&mut self, event: PlaybackEvent) {
        self.send(event);
        self.events = None;
    }

    fn send(&self, event: PlaybackEvent) {
        let Some(events) = &self.events else {
            return;
        };
        tracing::trace!(session = %self.session, ?event, "playback event");
        let _ = events.send(CoordinatorEvent::Playback {
            session: self.session,
            event,
        });
    }
}

impl Drop for PlaybackSink {
    fn drop(&mut self) {
        if self.events.is_some() {
            tracing::debug!(session = %self.session, "playback sink dropped without a result");
            self.finish(PlaybackEvent::Failed("dropped".to_string()));
        }
    }
}

/// A speech synthesis capability
pub trait SynthesisBackend: Send {
    /// Voices currently available
    fn voices(&self) -> Vec<Voice>;

    /// Start speaking; lifecycle is reported through `sink`
    ///
    /// Dropping `sink` without an outcome reports a failure, so cancelled
    /// utterances should [`detach`](PlaybackSink::detach) it.
    ///
    /// # Errors
    ///
    /// Returns error if the utterance cannot be started
    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> Result<(), OutputError>;

    /// Silence whatever is playing; pending callbacks may still arrive
    fn cancel(&mut self);
}

/// Speech output adapter owned by the coordinator
pub struct SpeechOutput {
    backend: Option<Box<dyn SynthesisBackend>>,
    voices: Option<Vec<Voice>>,
}

impl SpeechOutput {
    /// Create an adapter over `backend`
    #[must_use]
    pub fn new(backend: Box<dyn SynthesisBackend>) -> Self {
        Self {
            backend: Some(backend),
            voices: None,
        }
    }

    /// Create an adapter for an environment without synthesis
    #[must_use]
    pub const fn unsupported() -> Self {
        Self {
            backend: None,
            voices: None,
        }
    }

    /// Whether a synthesis backend is present
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.backend.is_some()
    }

    /// Speak `text` at `volume` as playback session `session`
    ///
    /// Any utterance already in progress is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Unsupported`] without a backend, or the backend's
    /// failure
    pub fn speak(
        &mut self,
        session: SessionId,
        text: &str,
        volume: f32,
        events: &EventSender,
    ) -> Result<(), OutputError> {
        if self.backend.is_none() {
            return Err(OutputError::Unsupported);
        }

        let voice = select_voice(self.voices()).map(|v| v.id.clone());
        let Some(backend) = self.backend.as_mut() else {
            return Err(OutputError::Unsupported);
        };
        backend.cancel();

        match &voice {
            Some(id) => tracing::debug!(session = %session, voice = %id, volume, "speaking"),
            None => tracing::debug!(session = %session, volume, "speaking with default voice"),
        }

        let utterance = Utterance {
            text: text.to_string(),
            volume: volume.clamp(0.0, 1.0),
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
            voice,
        };
        backend.speak(utterance, PlaybackSink::new(session, events.clone()))
    }

    /// Silence the current utterance
    pub fn cancel(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.cancel();
        }
    }

    /// Forget the cached voice list so the next utterance re-queries it
    pub fn voices_changed(&mut self) {
        self.voices = None;
        tracing::debug!("voice list invalidated");
    }

    /// Voice list, queried on first use
    pub fn voices(&mut self) -> &[Voice] {
        let backend = self.backend.as_ref();
        self.voices.get_or_insert_with(|| {
            let voices = backend.map(|b| b.voices()).unwrap_or_default();
            tracing::debug!(
                voices = ?voices.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
                "loaded voices"
            );
            voices
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, default: bool) -> Voice {
        Voice {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            lang: "en-US".to_string(),
            default,
        }
    }

    #[test]
    fn test_select_voice_prefers_female() {
        let voices = vec![
            voice("Google US English", false),
            voice("Samantha", false),
            voice("Microsoft Zira Female", false),
        ];
        assert_eq!(select_voice(&voices).unwrap().name, "Microsoft Zira Female");
    }

    #[test]
    fn test_select_voice_falls_back_in_order() {
        let voices = vec![voice("Samantha", false), voice("Google UK English", false)];
        assert_eq!(select_voice(&voices).unwrap().name, "Google UK English");

        let voices = vec![voice("Alex", true), voice("Samantha", false)];
        assert_eq!(select_voice(&voices).unwrap().name, "Samantha");

        let voices = vec![voice("Alex", false), voice("Fred", true)];
        assert_eq!(select_voice(&voices).unwrap().name, "Fred");
    }

    #[test]
    fn test_select_voice_none() {
        assert!(select_voice(&[]).is_none());
        assert!(select_voice(&[voice("Alex", false)]).is_none());
    }

    fn playback_events(rx: &mut crate::event::EventReceiver) -> Vec<PlaybackEvent> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                CoordinatorEvent::Playback { event, .. } => event,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_sink_reports_one_outcome() {
        let (tx, mut rx) = crate::event::channel();
        let sink = PlaybackSink::new(SessionId(3), tx);
        sink.started();
        sink.finished();

        assert_eq!(
            playback_events(&mut rx),
            vec![PlaybackEvent::Started, PlaybackEvent::Finished]
        );
    }

    #[test]
    fn test_dropped_sink_reports_failure() {
        let (tx, mut rx) = crate::event::channel();
        let sink = PlaybackSink::new(SessionId(4), tx);
        sink.started();
        drop(sink);

        assert_eq!(
            playback_events(&mut rx),
            vec![
                PlaybackEvent::Started,
                PlaybackEvent::Failed("dropped".to_string())
            ]
        );
    }

    #[test]
    fn test_detached_sink_is_silent() {
        let (tx, mut rx) = crate::event::channel();
        PlaybackSink::new(SessionId(5), tx).detach();
        assert!(playback_events(&mut rx).is_empty());
    }

    #[test]
    fn test_unsupported_adapter() {
        let (tx, _rx) = crate::event::channel();
        let mut output = SpeechOutput::unsupported();
        assert_eq!(
            output.speak(SessionId(1), "hi", 1.0, &tx),
            Err(OutputError::Unsupported)
        );
        assert!(output.voices().is_empty());
    }
}
