use super::defaults::{
    MAX_BAUD, MAX_PORT_NAME_LEN, MAX_READ_TIMEOUT_MS, MAX_VOICE_CAPTURE_MS, MAX_VOICE_NUMCEP,
    MAX_VOICE_SAMPLE_RATE, MIN_BAUD, MIN_READ_TIMEOUT_MS, MIN_VOICE_CAPTURE_MS,
    MIN_VOICE_SAMPLE_RATE,
};
use super::{AppConfig, PortConfig, VoiceConfig};
use anyhow::{bail, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

impl AppConfig {
    /// Check CLI values and normalize free-text fields.
    pub fn validate(&mut self) -> Result<()> {
        self.port = self.port.trim().to_string();
        if self.port.is_empty() {
            bail!("--port must not be empty");
        }
        if self.port.len() > MAX_PORT_NAME_LEN || !port_name_re().is_match(&self.port) {
            bail!(
                "--port must be a device path or name (letters, digits, '/', '\\', '.', '_', '-', ':'), got '{}'",
                self.port
            );
        }

        if !(MIN_BAUD..=MAX_BAUD).contains(&self.baud) {
            bail!(
                "--baud must be between {MIN_BAUD} and {MAX_BAUD}, got {}",
                self.baud
            );
        }
        if !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms) {
            bail!(
                "--read-timeout-ms must be between {MIN_READ_TIMEOUT_MS} and {MAX_READ_TIMEOUT_MS}, got {}",
                self.read_timeout_ms
            );
        }
        if !(MIN_VOICE_CAPTURE_MS..=MAX_VOICE_CAPTURE_MS).contains(&self.voice_capture_ms) {
            bail!(
                "--voice-capture-ms must be between {MIN_VOICE_CAPTURE_MS} and {MAX_VOICE_CAPTURE_MS}, got {}",
                self.voice_capture_ms
            );
        }
        if !(MIN_VOICE_SAMPLE_RATE..=MAX_VOICE_SAMPLE_RATE).contains(&self.voice_sample_rate) {
            bail!(
                "--voice-sample-rate must be between {MIN_VOICE_SAMPLE_RATE} and {MAX_VOICE_SAMPLE_RATE} Hz, got {}",
                self.voice_sample_rate
            );
        }
        if !(1..=MAX_VOICE_NUMCEP).contains(&self.voice_numcep) {
            bail!(
                "--voice-numcep must be between 1 and {MAX_VOICE_NUMCEP}, got {}",
                self.voice_numcep
            );
        }

        if self.log_file.as_os_str().is_empty() {
            bail!("--log-file must not be empty");
        }
        if self.log_file.is_dir() {
            bail!("--log-file '{}' is a directory", self.log_file.display());
        }

        if let Some(wav) = &self.voice_wav {
            if !wav.is_file() {
                bail!("--voice-wav '{}' does not exist", wav.display());
            }
        }
        if let Some(replay) = &self.replay {
            if !replay.is_file() {
                bail!("--replay '{}' does not exist", replay.display());
            }
        }
        if self.replay.is_some() && self.send.is_some() {
            bail!("--replay and --send cannot be combined");
        }

        Ok(())
    }

    /// File logging is on when requested and not vetoed by `--no-logs`.
    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            port: self.port.clone(),
            baud: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    /// Snapshot the CLI-controlled voice settings for the pipeline.
    pub fn voice_config(&self) -> VoiceConfig {
        VoiceConfig {
            capture: Duration::from_millis(self.voice_capture_ms),
            sample_rate: self.voice_sample_rate,
            numcep: self.voice_numcep,
        }
    }
}

fn port_name_re() -> &'static Regex {
    static PORT_NAME_RE: OnceLock<Regex> = OnceLock::new();
    PORT_NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9/\\._:\-]+$").expect("port name regex should compile")
    })
}
