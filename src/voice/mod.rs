//! Voice processing module
//!
//! The coordinator talks to two adapters, [`SpeechInput`] and [`SpeechOutput`],
//! which wrap pluggable recognition and synthesis backends. The bundled
//! backends use the microphone + Whisper ([`CaptureRecognizer`]) and `OpenAI`
//! TTS + speakers ([`CloudSynthesizer`]).

mod capture;
mod detector;
mod input;
mod output;
mod playback;
mod recognizer;
mod stt;
mod synthesizer;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use detector::{UtteranceDetector, UtteranceState};
pub use input::{
    InputError, RecognitionBackend, RecognitionConfig, RecognitionOutcome, RecognitionSink,
    SpeechInput,
};
pub use output::{
    OutputError, PlaybackEvent, PlaybackSink, SPEECH_PITCH, SPEECH_RATE, SpeechOutput,
    SynthesisBackend, Utterance, Voice, select_voice,
};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, PlaybackEnd, decode_mp3};
pub use recognizer::CaptureRecognizer;
pub use stt::SpeechToText;
pub use synthesizer::CloudSynthesizer;
pub use tts::TextToSpeech;
