//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use speechbot::voice::{
    InputError, OutputError, PlaybackSink, RecognitionBackend, RecognitionConfig, RecognitionSink,
    SynthesisBackend, Utterance, Voice,
};
use speechbot::{
    Coordinator, CoordinatorEvent, EventReceiver, GenerationError, SpeechInput, SpeechOutput,
    TextGenerator,
};

/// Recognition backend driven by the test
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    inner: Arc<Mutex<RecognizerLog>>,
}

#[derive(Default)]
struct RecognizerLog {
    sink: Option<RecognitionSink>,
    starts: usize,
    stops: usize,
    aborts: usize,
    fail_start: Option<InputError>,
}

impl ScriptedRecognizer {
    /// Make the next start fail with `error`
    pub fn fail_next_start(&self, error: InputError) {
        self.inner.lock().unwrap().fail_start = Some(error);
    }

    /// Finish the live session with a transcript
    pub fn say(&self, text: &str) {
        let sink = self.take_sink();
        sink.transcript(text);
    }

    /// Finish the live session with a platform error code
    pub fn error(&self, code: &str) {
        let sink = self.take_sink();
        sink.error(code);
    }

    /// End the live session without a result
    pub fn end(&self) {
        drop(self.take_sink());
    }

    pub fn starts(&self) -> usize {
        self.inner.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.inner.lock().unwrap().stops
    }

    pub fn aborts(&self) -> usize {
        self.inner.lock().unwrap().aborts
    }

    pub fn has_session(&self) -> bool {
        self.inner.lock().unwrap().sink.is_some()
    }

    fn take_sink(&self) -> RecognitionSink {
        self.inner
            .lock()
            .unwrap()
            .sink
            .take()
            .expect("no live recognition session")
    }
}

impl RecognitionBackend for ScriptedRecognizer {
    fn start(
        &mut self,
        _config: &RecognitionConfig,
        sink: RecognitionSink,
    ) -> Result<(), InputError> {
        let mut log = self.inner.lock().unwrap();
        if let Some(error) = log.fail_start.take() {
            sink.detach();
            return Err(error);
        }
        log.starts += 1;
        log.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.inner.lock().unwrap().stops += 1;
    }

    fn abort(&mut self) {
        let mut log = self.inner.lock().unwrap();
        log.aborts += 1;
        if let Some(sink) = log.sink.take() {
            sink.detach();
        }
    }
}

/// Synthesis backend that records every utterance
#[derive(Clone)]
pub struct RecordingSynthesizer {
    inner: Arc<Mutex<SynthesizerLog>>,
}

struct SynthesizerLog {
    voices: Vec<Voice>,
    voice_queries: usize,
    spoken: Vec<Utterance>,
    sink: Option<PlaybackSink>,
    /// Sinks of replaced utterances, kept alive so they stay silent
    retired: Vec<PlaybackSink>,
    cancels: usize,
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::with_voices(vec![Voice {
            id: "default".to_string(),
            name: "Default".to_string(),
            lang: "en-US".to_string(),
            default: true,
        }])
    }
}

impl RecordingSynthesizer {
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SynthesizerLog {
                voices,
                voice_queries: 0,
                spoken: Vec::new(),
                sink: None,
                retired: Vec::new(),
                cancels: 0,
            })),
        }
    }

    pub fn set_voices(&self, voices: Vec<Voice>) {
        self.inner.lock().unwrap().voices = voices;
    }

    /// Every utterance handed to the backend, in order
    pub fn spoken(&self) -> Vec<Utterance> {
        self.inner.lock().unwrap().spoken.clone()
    }

    pub fn cancels(&self) -> usize {
        self.inner.lock().unwrap().cancels
    }

    pub fn voice_queries(&self) -> usize {
        self.inner.lock().unwrap().voice_queries
    }

    /// Report that the latest utterance became audible
    pub fn start_audio(&self) {
        let log = self.inner.lock().unwrap();
        log.sink.as_ref().expect("nothing is playing").started();
    }

    /// Finish the latest utterance
    pub fn finish(&self) {
        let sink = self.inner.lock().unwrap().sink.take().expect("nothing is playing");
        sink.finished();
    }

    /// Fail the latest utterance
    pub fn fail(&self, reason: &str) {
        let sink = self.inner.lock().unwrap().sink.take().expect("nothing is playing");
        sink.failed(reason);
    }

    /// Drop the latest utterance's sink without reporting an outcome
    pub fn drop_sink(&self) {
        let sink = self.inner.lock().unwrap().sink.take().expect("nothing is playing");
        drop(sink);
    }
}

impl SynthesisBackend for RecordingSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        let mut log = self.inner.lock().unwrap();
        log.voice_queries += 1;
        log.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> Result<(), OutputError> {
        let mut log = self.inner.lock().unwrap();
        log.spoken.push(utterance);
        if let Some(old) = log.sink.replace(sink) {
            log.retired.push(old);
        }
        Ok(())
    }

    fn cancel(&mut self) {
        self.inner.lock().unwrap().cancels += 1;
    }
}

/// Text generator returning a fixed outcome
pub struct StubGenerator {
    outcome: Result<String, GenerationError>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubGenerator {
    pub fn replying(text: &str) -> Self {
        Self::with_outcome(Ok(text.to_string()))
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<String, GenerationError>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer only after `delay` has passed
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// A coordinator wired to scripted backends
pub struct Harness {
    pub coordinator: Coordinator,
    pub events: EventReceiver,
    pub recognizer: ScriptedRecognizer,
    pub synthesizer: RecordingSynthesizer,
    pub calls: Arc<AtomicUsize>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(generator: StubGenerator) -> Self {
        Self::with_synthesizer(generator, RecordingSynthesizer::default())
    }

    pub fn with_synthesizer(generator: StubGenerator, synthesizer: RecordingSynthesizer) -> Self {
        let recognizer = ScriptedRecognizer::default();
        let calls = generator.calls();
        let prompts = generator.prompts();
        let (coordinator, events) = Coordinator::new(
            SpeechInput::new(Box::new(recognizer.clone()), RecognitionConfig::default()),
            SpeechOutput::new(Box::new(synthesizer.clone())),
            Arc::new(generator),
        );

        Self {
            coordinator,
            events,
            recognizer,
            synthesizer,
            calls,
            prompts,
        }
    }

    /// Number of generation requests that reached the generator
    pub fn generation_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait for the next event and apply it
    pub async fn step(&mut self) {
        let event = self.next_event().await;
        self.coordinator.handle_event(event);
    }

    /// Wait for the next event without applying it
    pub async fn next_event(&mut self) -> CoordinatorEvent {
        tokio::time::timeout(Duration::from_secs(60), self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Apply every event that is already queued, letting spawned tasks run first
    pub async fn settle(&mut self) -> usize {
        let mut applied = 0;
        loop {
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            let mut progressed = false;
            while let Ok(event) = self.events.try_recv() {
                self.coordinator.handle_event(event);
                applied += 1;
                progressed = true;
            }
            if !progressed {
                return applied;
            }
        }
    }

    /// Texts of all messages, greeting included
    pub fn texts(&self) -> Vec<String> {
        self.coordinator
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}
