//! `OpenAI` TTS + speaker synthesis backend

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;

use super::output::{OutputError, PlaybackSink, SynthesisBackend, Utterance, Voice};
use super::playback::{AudioPlayback, PlaybackEnd, decode_mp3};
use super::tts::TextToSpeech;
use crate::{Error, Result};

/// Voice used when the utterance names none
const DEFAULT_VOICE: &str = "alloy";

/// Voices offered by the `OpenAI` speech API, with display names
const VOICE_CATALOGUE: [(&str, &str); 6] = [
    ("alloy", "Alloy (Neutral)"),
    ("echo", "Echo (Male)"),
    ("fable", "Fable (Neutral)"),
    ("onyx", "Onyx (Male)"),
    ("nova", "Nova (Female)"),
    ("shimmer", "Shimmer (Female)"),
];

/// Speaks utterances through `OpenAI` TTS and the default output device
pub struct CloudSynthesizer {
    tts: TextToSpeech,
    runtime: Handle,
    current: Option<Arc<AtomicBool>>,
}

impl CloudSynthesizer {
    /// Create a synthesizer backed by `tts`
    ///
    /// Must be called from within a tokio runtime; synthesis runs on it.
    ///
    /// # Errors
    ///
    /// Returns error if there is no current tokio runtime
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Tts(format!("synthesizer needs a tokio runtime: {e}")))?;

        Ok(Self {
            tts,
            runtime,
            current: None,
        })
    }
}

impl SynthesisBackend for CloudSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        VOICE_CATALOGUE
            .iter()
            .map(|(id, name)| Voice {
                id: (*id).to_string(),
                name: (*name).to_string(),
                lang: "en-US".to_string(),
                default: *id == DEFAULT_VOICE,
            })
            .collect()
    }

    fn speak(
        &mut self,
        utterance: Utterance,
        sink: PlaybackSink,
    ) -> std::result::Result<(), OutputError> {
        self.cancel();

        let cancel = Arc::new(AtomicBool::new(false));
        self.current = Some(Arc::clone(&cancel));
        let tts = self.tts.clone();

        self.runtime.spawn(async move {
            let voice = utterance.voice.as_deref().unwrap_or(DEFAULT_VOICE);
            let mp3 = match tts.synthesize(&utterance.text, voice, utterance.rate).await {
                Ok(mp3) => mp3,
                Err(e) => {
                    tracing::warn!(
                        session = %sink.session(),
                        error = %e,
                        "speech synthesis failed"
                    );
                    if cancel.load(Ordering::Acquire) {
                        sink.detach();
                    } else {
                        sink.failed(e.to_string());
                    }
                    return;
                }
            };

            if cancel.load(Ordering::Acquire) {
                sink.detach();
                return;
            }

            // A panic drops the sink, which reports the failure
            let volume = utterance.volume;
            let played = tokio::task::spawn_blocking(move || {
                play_utterance(&mp3, volume, &cancel, sink);
            })
            .await;
            if let Err(e) = played {
                tracing::error!(error = %e, "playback task panicked");
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(flag) = self.current.take() {
            flag.store(true, Ordering::Release);
            tracing::debug!("playback cancelled");
        }
    }
}

fn play_utterance(mp3: &[u8], volume: f32, cancel: &AtomicBool, sink: PlaybackSink) {
    let result = decode_mp3(mp3).and_then(|samples| {
        let playback = AudioPlayback::open()?;
        playback.play(samples, volume, cancel, || sink.started())
    });

    match result {
        Ok(PlaybackEnd::Completed) => sink.finished(),
        Ok(PlaybackEnd::Cancelled) => sink.detach(),
        Err(e) => {
            tracing::warn!(session = %sink.session(), error = %e, "playback failed");
            if cancel.load(Ordering::Acquire) {
                sink.detach();
            } else {
                sink.failed(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::output::select_voice;
    use super::*;

    #[tokio::test]
    async fn test_catalogue_selection() {
        let tts = TextToSpeech::new_openai("sk-test".into(), "tts-1".to_string()).unwrap();
        let synth = CloudSynthesizer::new(tts).unwrap();
        let voices = synth.voices();

        assert_eq!(voices.len(), VOICE_CATALOGUE.len());
        assert_eq!(voices.iter().filter(|v| v.default).count(), 1);
        assert_eq!(select_voice(&voices).unwrap().id, "nova");
    }

    #[test]
    fn test_requires_runtime() {
        let tts = TextToSpeech::new_openai("sk-test".into(), "tts-1".to_string()).unwrap();
        assert!(CloudSynthesizer::new(tts).is_err());
    }
}
