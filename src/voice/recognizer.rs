//! Microphone + Whisper recognition backend
//!
//! Each session runs on its own thread: capture from the default input device,
//! wait for one utterance to end, then transcribe it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::runtime::Handle;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::detector::{UtteranceDetector, UtteranceState};
use super::input::{InputError, RecognitionBackend, RecognitionConfig, RecognitionSink};
use super::stt::SpeechToText;
use crate::{Error, Result};

/// How often captured audio is drained into the detector (100ms)
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct SessionControl {
    stop: AtomicBool,
    abort: AtomicBool,
}

impl SessionControl {
    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }
}

struct LiveSession {
    control: Arc<SessionControl>,
    _thread: JoinHandle<()>,
}

/// Recognizes one utterance at a time from the default microphone
pub struct CaptureRecognizer {
    stt: SpeechToText,
    runtime: Handle,
    live: Option<LiveSession>,
}

impl CaptureRecognizer {
    /// Create a recognizer transcribing through `stt`
    ///
    /// Must be called from within a tokio runtime; transcription requests run on it.
    ///
    /// # Errors
    ///
    /// Returns error if there is no current tokio runtime
    pub fn new(stt: SpeechToText) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Stt(format!("recognizer needs a tokio runtime: {e}")))?;

        Ok(Self {
            stt,
            runtime,
            live: None,
        })
    }
}

impl RecognitionBackend for CaptureRecognizer {
    fn start(
        &mut self,
        config: &RecognitionConfig,
        sink: RecognitionSink,
    ) -> std::result::Result<(), InputError> {
        // A finished session's thread may still be winding down
        self.abort();

        let control = Arc::new(SessionControl::default());
        let session = sink.session();
        let stt = self.stt.clone();
        let runtime = self.runtime.clone();
        let language = config.language().to_string();
        let thread_control = Arc::clone(&control);

        let thread = std::thread::Builder::new()
            .name(format!("recognizer-{session}"))
            .spawn(move || run_session(&stt, &runtime, &language, &thread_control, sink))
            .map_err(|e| InputError::Other(e.to_string()))?;

        self.live = Some(LiveSession {
            control,
            _thread: thread,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(live) = &self.live {
            live.control.stop.store(true, Ordering::Release);
        }
    }

    fn abort(&mut self) {
        if let Some(live) = self.live.take() {
            live.control.abort.store(true, Ordering::Release);
        }
    }
}

fn run_session(
    stt: &SpeechToText,
    runtime: &Handle,
    language: &str,
    control: &SessionControl,
    sink: RecognitionSink,
) {
    let mut capture = match AudioCapture::open() {
        Ok(capture) => capture,
        Err(e) => {
            tracing::warn!(error = %e, "microphone unavailable");
            sink.fail(InputError::AudioCapture);
            return;
        }
    };

    if let Err(e) = capture.start() {
        tracing::warn!(error = %e, "microphone failed to start");
        sink.fail(InputError::AudioCapture);
        return;
    }

    let mut detector = UtteranceDetector::new();
    loop {
        std::thread::sleep(POLL_INTERVAL);

        if control.aborted() {
            capture.stop();
            sink.detach();
            return;
        }

        let state = detector.process(&capture.take_buffer());
        if control.stop_requested()
            || matches!(state, UtteranceState::Complete | UtteranceState::TimedOut)
        {
            break;
        }
    }
    capture.stop();

    if !detector.heard_speech() {
        if detector.state() == UtteranceState::TimedOut {
            sink.fail(InputError::NoSpeech);
        }
        // Stopped before anything was said: dropping the sink reports `Ended`
        return;
    }

    let wav = match samples_to_wav(&detector.take_speech(), SAMPLE_RATE) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode utterance");
            sink.fail(InputError::Other("encoding".to_string()));
            return;
        }
    };

    let result = runtime.block_on(stt.transcribe(wav, language));
    if control.aborted() {
        sink.detach();
        return;
    }

    match result {
        Ok(text) => sink.transcript(&text),
        Err(Error::Http(e)) => {
            tracing::warn!(error = %e, "transcription request failed");
            sink.fail(InputError::Other("network".to_string()));
        }
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed");
            sink.fail(InputError::Other("service-not-allowed".to_string()));
        }
    }
}
