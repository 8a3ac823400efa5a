//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches `OpenAI` TTS MP3 output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often the playing thread checks for completion or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a playback run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// All samples were played
    Completed,
    /// The cancel flag was raised
    Cancelled,
}

/// Plays decoded speech on the default output device
///
/// Blocking; run it on a blocking thread.
pub struct AudioPlayback {
    device: cpal::Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if there is no output device or none supports 24kHz
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        };

        // Prefer mono, fall back to stereo
        let supported = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play mono `samples` scaled by `volume` until done or `cancel` is raised
    ///
    /// `on_start` runs once the stream is audible.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn play(
        &self,
        samples: Vec<f32>,
        volume: f32,
        cancel: &AtomicBool,
        on_start: impl FnOnce(),
    ) -> Result<PlaybackEnd> {
        if samples.is_empty() {
            on_start();
            return Ok(PlaybackEnd::Completed);
        }

        let channels = usize::from(self.config.channels);
        let total = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let gain = volume.clamp(0.0, 1.0);

        let stream_samples = Arc::clone(&samples);
        let stream_position = Arc::clone(&position);
        let stream_error = Arc::new(Mutex::new(None::<String>));
        let error_slot = Arc::clone(&stream_error);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = stream_position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = stream_samples.get(pos).map_or(0.0, |s| s * gain);
                        frame.fill(sample);
                        if pos < stream_samples.len() {
                            pos += 1;
                        }
                    }
                    stream_position.store(pos, Ordering::Relaxed);
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    if let Ok(mut slot) = error_slot.lock() {
                        *slot = Some(err.to_string());
                    }
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        on_start();

        let expected =
            Duration::from_millis((total as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE));
        let deadline = Instant::now() + expected + Duration::from_millis(500);

        let end = loop {
            if cancel.load(Ordering::Acquire) {
                break PlaybackEnd::Cancelled;
            }
            if let Some(err) = stream_error.lock().ok().and_then(|mut e| e.take()) {
                return Err(Error::Audio(err));
            }
            if position.load(Ordering::Relaxed) >= total || Instant::now() > deadline {
                // Let the device drain its last buffer
                std::thread::sleep(Duration::from_millis(100));
                break PlaybackEnd::Completed;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        drop(stream);
        tracing::debug!(samples = total, ?end, "playback done");
        Ok(end)
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) if frame.channels == 2 => {
                samples.extend(frame.data.chunks(2).map(|chunk| {
                    let left = f32::from(chunk[0]) / 32768.0;
                    let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                    f32::midpoint(left, right)
                }));
            }
            Ok(frame) => {
                samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_mp3(&[]).unwrap().is_empty());
    }
}
