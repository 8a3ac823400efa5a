//! Configuration management for speechbot

pub mod file;

use secrecy::SecretString;

use file::SpeechbotConfigFile;

/// Default Gemini models endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default recognition locale
pub const DEFAULT_LOCALE: &str = "en-US";

/// Speechbot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Text-generation service configuration
    pub generation: GenerationConfig,

    /// Voice configuration
    pub voice: VoiceConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Gemini API key (text generation)
    pub gemini: Option<SecretString>,

    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<SecretString>,
}

/// Text-generation service configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL of the models endpoint, without the model path segment
    pub base_url: String,

    /// Model identifier
    pub model: String,
}

impl GenerationConfig {
    /// Full `generateContent` endpoint for the configured model
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone input and spoken replies
    pub enabled: bool,

    /// Recognition locale
    pub locale: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: DEFAULT_LOCALE.to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// Priority is env > toml > default.
    #[must_use]
    pub fn load(disable_voice: bool) -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok(), disable_voice)
    }

    /// Resolve configuration from an explicit file overlay and env lookup
    pub fn from_sources<F>(fc: SpeechbotConfigFile, env: F, disable_voice: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_keys = ApiKeys {
            gemini: env("GEMINI_API_KEY")
                .or(fc.api_keys.gemini)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            base_url: env("SPEECHBOT_GEMINI_URL")
                .or(fc.generation.base_url)
                .unwrap_or(defaults.base_url),
            model: env("SPEECHBOT_GEMINI_MODEL")
                .or(fc.generation.model)
                .unwrap_or(defaults.model),
        };

        let env_disabled = env("SPEECHBOT_DISABLE_VOICE")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            enabled: !disable_voice && !env_disabled && fc.voice.enabled.unwrap_or(true),
            locale: env("SPEECHBOT_LOCALE")
                .or(fc.voice.locale)
                .unwrap_or(defaults.locale),
            stt_model: env("SPEECHBOT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_model: env("SPEECHBOT_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Self {
            api_keys,
            generation,
            voice,
        }
    }
}
