//! Offline audio source backed by a WAV file.

use super::downmix::append_downmixed_samples;
use super::resample::resample;
use super::AudioSource;
use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Plays a recorded utterance into the voice pipeline instead of the microphone.
pub struct WavSource {
    path: PathBuf,
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSource for WavSource {
    fn describe(&self) -> String {
        format!("WAV file '{}'", self.path.display())
    }

    /// Returns at most `duration` of audio from the start of the file.
    fn capture(&mut self, duration: Duration, sample_rate: u32) -> Result<Vec<f32>> {
        let (mono, file_rate) = read_mono(&self.path)?;
        let samples = resample(&mono, file_rate, sample_rate);
        let limit = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Ok(samples.into_iter().take(limit).collect())
    }
}

/// Decode `path` to mono f32 samples and return them with the file's rate.
pub fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let mut mono = Vec::with_capacity(reader.len() as usize / channels);
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => {
            let samples = reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?;
            append_downmixed_samples(&mut mono, &samples, channels, |s| s);
        }
        (SampleFormat::Int, bits @ 1..=32) => {
            let scale = (1u64 << (bits - 1)) as f32;
            let samples = reader
                .samples::<i32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?;
            append_downmixed_samples(&mut mono, &samples, channels, |s| s as f32 / scale);
        }
        (format, bits) => {
            return Err(anyhow!(
                "unsupported WAV encoding: {format:?} with {bits} bits per sample"
            ))
        }
    }
    Ok((mono, spec.sample_rate))
}
