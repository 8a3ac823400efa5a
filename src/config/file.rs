//! TOML configuration file loading
//!
//! Supports `~/.config/speechbot/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SpeechbotConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Text-generation service configuration
    #[serde(default)]
    pub generation: GenerationFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub gemini: Option<String>,
    pub openai: Option<String>,
}

/// Text-generation service configuration
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    /// Base URL of the models endpoint
    pub base_url: Option<String>,

    /// Model identifier (e.g. "gemini-1.5-flash")
    pub model: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone input and spoken replies
    pub enabled: Option<bool>,

    /// Recognition locale (e.g. "en-US")
    pub locale: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,
}

/// Default config file location: `~/.config/speechbot/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("speechbot").join("config.toml"))
}

/// Load the config file from its default location
///
/// A missing or unreadable file yields the empty overlay; problems are logged
/// rather than returned so a broken file never blocks startup.
#[must_use]
pub fn load_config_file() -> SpeechbotConfigFile {
    let Some(path) = config_file_path() else {
        return SpeechbotConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return SpeechbotConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(fc) => {
            tracing::info!(path = %path.display(), "loaded config file");
            fc
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
            SpeechbotConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<SpeechbotConfigFile> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}
