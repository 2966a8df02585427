//! System microphone recording via CPAL.
//!
//! Handles device enumeration, format conversion, and sample rate
//! normalization. Captures come back as mono f32 PCM at the requested rate.

use super::downmix::{append_downmixed_samples, i16_to_f32, u16_to_f32};
use super::meter::rms_db;
use super::resample::resample;
use super::AudioSource;
use crate::{lock_or_recover, log_debug};
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// Names of every input device the default host exposes.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open `preferred_device` by name, or the host default.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self { device })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Record for exactly `duration` and return mono samples at `sample_rate`.
    pub fn record_for(&self, duration: Duration, sample_rate: u32) -> Result<Vec<f32>> {
        let default_config = self.device.default_input_config()?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.clone().into();
        let device_sample_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let device_name = self.device_name();

        log_debug(&format!(
            "Recorder config: device={device_name} format={format:?} sample_rate={device_sample_rate}Hz channels={channels}"
        ));

        // cpal delivers samples on its own callback thread.
        let expected_samples =
            (duration.as_secs_f64() * device_sample_rate as f64).ceil() as usize;
        let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(expected_samples)));
        let sink = Arc::clone(&buffer);

        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

        let stream = match format {
            SampleFormat::F32 => self.device.build_input_stream(
                &device_config,
                move |data: &[f32], _| {
                    let mut buf = lock_or_recover(&sink, "audio capture");
                    append_downmixed_samples(&mut buf, data, channels, |sample| sample);
                },
                err_fn,
                None,
            )?,
            SampleFormat::I16 => self.device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    let mut buf = lock_or_recover(&sink, "audio capture");
                    append_downmixed_samples(&mut buf, data, channels, i16_to_f32);
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    let mut buf = lock_or_recover(&sink, "audio capture");
                    append_downmixed_samples(&mut buf, data, channels, u16_to_f32);
                },
                err_fn,
                None,
            )?,
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play()?;
        std::thread::sleep(duration);
        if let Err(err) = stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
        drop(stream);

        let mut samples = std::mem::take(&mut *lock_or_recover(&buffer, "audio capture"));
        if samples.is_empty() {
            return Err(anyhow!(
                "no samples captured from '{device_name}'; check microphone permissions and availability. {}",
                mic_permission_hint()
            ));
        }
        samples.truncate(expected_samples);
        log_debug(&format!(
            "captured {} samples at {:.1} dBFS",
            samples.len(),
            rms_db(&samples)
        ));

        Ok(resample(&samples, device_sample_rate, sample_rate))
    }
}

impl AudioSource for Recorder {
    fn describe(&self) -> String {
        format!("microphone '{}'", self.device_name())
    }

    fn capture(&mut self, duration: Duration, sample_rate: u32) -> Result<Vec<f32>> {
        self.record_for(duration, sample_rate)
    }
}

pub(crate) fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
