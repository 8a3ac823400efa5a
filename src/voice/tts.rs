//! Text-to-speech (TTS) over the `OpenAI` speech API

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Speech synthesis endpoint
const TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Synthesizes speech from text
#[derive(Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new_openai(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url: TTS_URL.to_string(),
        })
    }

    /// Point the synthesizer at a different endpoint
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Synthesize `text` with `voice` at `speed`
    ///
    /// Returns MP3 bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed,
        };

        tracing::debug!(chars = text.len(), voice, "requesting speech");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
