//! End-of-utterance detection
//!
//! Decides when a single spoken utterance is over using frame energy: speech
//! starts when energy crosses a threshold and ends after a run of silence.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech for a usable utterance (0.3 s)
const MIN_SPEECH_SAMPLES: usize = (SAMPLE_RATE as usize) * 3 / 10;

/// Trailing silence that ends an utterance (0.8 s)
const END_SILENCE_SAMPLES: usize = (SAMPLE_RATE as usize) * 8 / 10;

/// Silence before any speech after which the session gives up (5 s)
const NO_SPEECH_SAMPLES: usize = (SAMPLE_RATE as usize) * 5;

/// Where the detector is within one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    /// Nothing heard yet
    Waiting,
    /// Speech in progress
    Speaking,
    /// Enough speech followed by enough silence
    Complete,
    /// Gave up waiting for speech
    TimedOut,
}

/// Tracks a single utterance across captured chunks
#[derive(Debug)]
pub struct UtteranceDetector {
    state: UtteranceState,
    speech: Vec<f32>,
    silence_counter: usize,
    waited: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector waiting for speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: UtteranceState::Waiting,
            speech: Vec::new(),
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Feed captured samples; returns the state after processing
    pub fn process(&mut self, samples: &[f32]) -> UtteranceState {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            UtteranceState::Waiting => {
                if is_speech {
                    self.state = UtteranceState::Speaking;
                    self.speech.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += samples.len();
                    if self.waited > NO_SPEECH_SAMPLES {
                        tracing::debug!("no speech before timeout");
                        self.state = UtteranceState::TimedOut;
                    }
                }
            }
            UtteranceState::Speaking => {
                self.speech.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > END_SILENCE_SAMPLES {
                    if self.speech.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech.len(), "utterance complete");
                        self.state = UtteranceState::Complete;
                    } else {
                        // A blip, not an utterance
                        tracing::trace!("speech too short, waiting again");
                        self.speech.clear();
                        self.silence_counter = 0;
                        self.state = UtteranceState::Waiting;
                    }
                }
            }
            UtteranceState::Complete | UtteranceState::TimedOut => {}
        }

        self.state
    }

    /// Whether any speech has been captured
    #[must_use]
    pub fn heard_speech(&self) -> bool {
        self.speech.len() > MIN_SPEECH_SAMPLES
    }

    /// Take the captured speech, leaving the buffer empty
    pub fn take_speech(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech)
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> UtteranceState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
