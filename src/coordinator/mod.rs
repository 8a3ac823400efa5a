//! Conversation coordinator
//!
//! Owns the conversation and drives the listen, generate, speak cycle. All
//! mutation happens through `&mut self`: commands come from the presentation
//! layer, and asynchronous outcomes come back as [`CoordinatorEvent`]s that the
//! host loop feeds to [`Coordinator::handle_event`]. Each event carries the
//! identity of the session or request it belongs to and is dropped unless that
//! identity is still live.

mod message;
mod notice;
mod state;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::event::{self, CoordinatorEvent, Epoch, EventReceiver, EventSender, RequestId, SessionId};
use crate::generation::{GenerationError, TextGenerator};
use crate::voice::{InputError, PlaybackEvent, RecognitionOutcome, SpeechInput, SpeechOutput};

pub use message::{ConversationMessage, GREETING, GREETING_ID, Speaker};
pub use notice::{Notice, NoticeKind, NoticeLevel, generation_banner};
pub use state::{
    ConversationSnapshot, ConversationState, GenerationRequest, PlaybackSession, PlaybackStatus,
    RecordingSession, VolumeLevel,
};

/// Minimum time between the starts of two generation requests
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

/// The conversation state machine
pub struct Coordinator {
    input: SpeechInput,
    output: SpeechOutput,
    generator: Arc<dyn TextGenerator>,
    events: EventSender,

    messages: Vec<ConversationMessage>,
    next_message_id: u64,
    next_session_id: u64,
    next_request_id: u64,
    epoch: Epoch,

    recording: Option<RecordingSession>,
    playback: Option<PlaybackSession>,
    pending: Option<GenerationRequest>,
    last_request: Option<Instant>,

    volume: VolumeLevel,
    banner: Option<String>,
    last_notice: Option<Notice>,
    notices: VecDeque<Notice>,
}

impl Coordinator {
    /// Create a coordinator and the receiver its events arrive on
    ///
    /// The host loop must forward everything received to [`Self::handle_event`].
    #[must_use]
    pub fn new(
        input: SpeechInput,
        output: SpeechOutput,
        generator: Arc<dyn TextGenerator>,
    ) -> (Self, EventReceiver) {
        let (events, rx) = event::channel();
        let coordinator = Self {
            input,
            output,
            generator,
            events,
            messages: vec![ConversationMessage::greeting()],
            next_message_id: GREETING_ID + 1,
            next_session_id: 1,
            next_request_id: 1,
            epoch: Epoch::default(),
            recording: None,
            playback: None,
            pending: None,
            last_request: None,
            volume: VolumeLevel::default(),
            banner: None,
            last_notice: None,
            notices: VecDeque::new(),
        };
        (coordinator, rx)
    }

    /// Sender for injecting events, e.g. [`CoordinatorEvent::VoicesChanged`]
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    // ---- commands ----

    /// Begin a recording session
    pub fn start_listening(&mut self) {
        if self.pending.is_some() {
            self.notify(Notice::error(
                NoticeKind::ReplyPending,
                "Please wait for the current reply.",
            ));
            return;
        }
        if !self.input.is_supported() {
            self.notify(Notice::from(&InputError::Unsupported));
            return;
        }
        match self.recording {
            Some(recording) if recording.active => {
                self.notify(Notice::from(&InputError::AlreadyListening));
                return;
            }
            Some(recording) => {
                tracing::debug!(session = %recording.id, "previous recording still finishing");
                self.notify(Notice::info(
                    NoticeKind::RecordingFinishing,
                    "Finishing the previous recording.",
                ));
                return;
            }
            None => {}
        }

        // Keep the microphone from picking up the reply
        if self.playback.is_some() {
            self.cancel_playback();
        }

        let session = self.next_session();
        match self.input.start_listening(session, &self.events) {
            Ok(()) => {
                self.recording = Some(RecordingSession {
                    id: session,
                    active: true,
                });
                tracing::info!(session = %session, "listening");
                self.notify(Notice::success(NoticeKind::ListeningStarted, "Listening..."));
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "failed to start listening");
                self.notify(Notice::from(&e));
            }
        }
    }

    /// Ask the live recording to finish with what it has heard
    pub fn stop_listening(&mut self) {
        let Some(recording) = self.recording.as_mut().filter(|r| r.active) else {
            return;
        };
        recording.active = false;
        tracing::debug!(session = %recording.id, "stop requested");
        self.input.stop_listening();
    }

    /// Submit one user utterance for a reply
    pub fn submit_utterance(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.notify(Notice::error(
                NoticeKind::EmptyUtterance,
                "Nothing to send. Please say or type something.",
            ));
            return;
        }

        let now = Instant::now();
        if self
            .last_request
            .is_some_and(|last| now.duration_since(last) < MIN_REQUEST_INTERVAL)
        {
            tracing::debug!("utterance rejected, too soon after last request");
            self.notify(Notice::error(
                NoticeKind::RateLimitedLocally,
                "Please wait a moment before sending another message.",
            ));
            return;
        }
        if self.pending.is_some() {
            self.notify(Notice::error(
                NoticeKind::ReplyPending,
                "Please wait for the current reply.",
            ));
            return;
        }
        if self.is_recording() {
            self.notify(Notice::error(
                NoticeKind::RecordingActive,
                "Finish recording before sending a message.",
            ));
            return;
        }

        self.push_message(text.to_string(), Speaker::User, false);
        self.last_request = Some(now);
        self.banner = None;
        self.dispatch(text.to_string(), now);
    }

    /// Silence the reply being spoken
    pub fn stop_speaking(&mut self) {
        if self.playback.is_none() {
            return;
        }
        self.cancel_playback();
        self.notify(Notice::info(NoticeKind::SpeechStopped, "Speech stopped."));
    }

    /// Reset to a fresh conversation
    ///
    /// Results of requests issued before the reset are discarded when they
    /// arrive. The local rate limit keeps running across resets.
    pub fn clear_conversation(&mut self) {
        self.cancel_playback();
        if self.recording.take().is_some() {
            self.input.abort();
        }

        self.epoch = self.epoch.next();
        self.pending = None;
        self.messages = vec![ConversationMessage::greeting()];
        self.next_message_id = GREETING_ID + 1;
        self.volume = VolumeLevel::Full;
        self.banner = None;

        tracing::info!(epoch = %self.epoch, "conversation cleared");
        self.notify(Notice::info(
            NoticeKind::ConversationCleared,
            "Conversation cleared.",
        ));
    }

    /// Step the volume Full, Half, Muted and back
    pub fn toggle_volume(&mut self) {
        self.volume = self.volume.next();
        tracing::debug!(volume = self.volume.as_f32(), "volume changed");
        self.notify(Notice::info(
            NoticeKind::VolumeChanged,
            format!("Volume: {}", self.volume),
        ));

        let Some(text) = self.playback.as_ref().map(|p| p.text.clone()) else {
            return;
        };
        if self.volume.is_muted() {
            self.cancel_playback();
        } else {
            self.start_playback(&text);
        }
    }

    // ---- events ----

    /// Apply one asynchronous outcome
    pub fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Recognition { session, outcome } => {
                self.on_recognition(session, outcome);
            }
            CoordinatorEvent::Generation {
                epoch,
                request,
                outcome,
            } => self.on_generation(epoch, request, outcome),
            CoordinatorEvent::Playback { session, event } => self.on_playback(session, event),
            CoordinatorEvent::VoicesChanged => self.output.voices_changed(),
        }
    }

    fn on_recognition(&mut self, session: SessionId, outcome: RecognitionOutcome) {
        self.input.finish(session);
        if self.recording.is_none_or(|r| r.id != session) {
            tracing::trace!(session = %session, "stale recognition outcome dropped");
            return;
        }
        self.recording = None;

        match outcome {
            RecognitionOutcome::Transcript(text) => {
                tracing::info!(session = %session, chars = text.len(), "transcript received");
                self.submit_utterance(&text);
            }
            RecognitionOutcome::Failed(e) => {
                tracing::warn!(session = %session, error = %e, "recognition failed");
                self.notify(Notice::from(&e));
            }
            RecognitionOutcome::Ended => {
                tracing::debug!(session = %session, "recording ended without speech");
            }
        }
    }

    fn on_generation(
        &mut self,
        epoch: Epoch,
        request: RequestId,
        outcome: Result<String, GenerationError>,
    ) {
        if epoch != self.epoch || self.pending.as_ref().is_none_or(|p| p.id != request) {
            tracing::debug!(request = %request, epoch = %epoch, "stale generation result dropped");
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        let elapsed_ms = pending.started_at.elapsed().as_millis();

        match outcome {
            Ok(text) => {
                tracing::info!(request = %request, elapsed_ms, "reply received");
                self.push_message(text.clone(), Speaker::Assistant, false);
                if !self.volume.is_muted() {
                    self.start_playback(&text);
                }
            }
            Err(e) => {
                tracing::warn!(
                    request = %request,
                    elapsed_ms,
                    kind = e.kind(),
                    error = %e,
                    "reply failed"
                );
                self.push_message(e.fallback_text().to_string(), Speaker::Assistant, true);
                self.banner = Some(generation_banner(&e));
                self.notify(Notice::from(&e));
            }
        }
    }

    fn on_playback(&mut self, session: SessionId, event: PlaybackEvent) {
        let Some(playback) = self.playback.as_mut().filter(|p| p.id == session) else {
            tracing::trace!(session = %session, ?event, "stale playback event dropped");
            return;
        };

        match event {
            PlaybackEvent::Started => playback.status = PlaybackStatus::Speaking,
            PlaybackEvent::Finished => {
                playback.status = PlaybackStatus::Finished;
                tracing::debug!(session = %session, "playback finished");
                self.playback = None;
            }
            PlaybackEvent::Failed(reason) => {
                playback.status = PlaybackStatus::Failed;
                tracing::warn!(session = %session, %reason, "playback failed");
                self.playback = None;
                self.notify(Notice::error(
                    NoticeKind::PlaybackError,
                    "Failed to speak response.",
                ));
            }
        }
    }

    // ---- internals ----

    fn dispatch(&mut self, prompt: String, started_at: Instant) {
        let request = RequestId(self.next_request_id);
        self.next_request_id += 1;
        let epoch = self.epoch;

        self.pending = Some(GenerationRequest {
            id: request,
            epoch,
            prompt: prompt.clone(),
            started_at,
        });
        tracing::debug!(request = %request, epoch = %epoch, "generation dispatched");

        let generator = Arc::clone(&self.generator);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = generator.generate(&prompt).await;
            let _ = events.send(CoordinatorEvent::Generation {
                epoch,
                request,
                outcome,
            });
        });
    }

    fn start_playback(&mut self, text: &str) {
        let session = self.next_session();
        let volume = self.volume.as_f32();

        // The adapter cancels whatever was playing
        self.playback = None;
        match self.output.speak(session, text, volume, &self.events) {
            Ok(()) => {
                self.playback = Some(PlaybackSession {
                    id: session,
                    text: text.to_string(),
                    volume,
                    status: PlaybackStatus::Pending,
                });
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "failed to start playback");
                self.notify(Notice::from(&e));
            }
        }
    }

    fn cancel_playback(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.status = PlaybackStatus::Cancelled;
            tracing::debug!(session = %playback.id, "playback cancelled");
        }
        self.output.cancel();
    }

    fn push_message(&mut self, text: String, speaker: Speaker, is_error: bool) {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(ConversationMessage {
            id,
            text,
            speaker,
            is_error,
        });
    }

    const fn next_session(&mut self) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        id
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => {
                tracing::debug!(kind = ?notice.kind, message = %notice.message, "error notice");
            }
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::trace!(kind = ?notice.kind, message = %notice.message, "notice");
            }
        }
        self.last_notice = Some(notice.clone());
        self.notices.push_back(notice);
    }

    // ---- observation ----

    /// Current state, derived from the live session slots
    #[must_use]
    pub fn state(&self) -> ConversationState {
        if self.is_recording() {
            ConversationState::Listening
        } else if self.pending.is_some() {
            ConversationState::AwaitingGeneration
        } else if self.playback.is_some() {
            ConversationState::Speaking
        } else {
            ConversationState::Idle
        }
    }

    /// Everything the presentation layer renders
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages.clone(),
            is_recording: self.is_recording(),
            is_speaking: self.is_speaking(),
            is_awaiting_reply: self.is_awaiting_reply(),
            volume: self.volume,
            last_notice: self.last_notice.clone(),
            banner: self.banner.clone(),
        }
    }

    /// Take every notice not yet handed out
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.is_some_and(|r| r.active)
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.playback.is_some()
    }

    #[must_use]
    pub const fn is_awaiting_reply(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub const fn volume(&self) -> VolumeLevel {
        self.volume
    }

    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    #[must_use]
    pub const fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The live recording session, if any
    #[must_use]
    pub const fn recording(&self) -> Option<&RecordingSession> {
        self.recording.as_ref()
    }

    /// The live playback session, if any
    #[must_use]
    pub const fn playback(&self) -> Option<&PlaybackSession> {
        self.playback.as_ref()
    }

    /// The outstanding generation request, if any
    #[must_use]
    pub const fn pending_request(&self) -> Option<&GenerationRequest> {
        self.pending.as_ref()
    }
}
