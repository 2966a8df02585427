//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::Command;
pub use defaults::{
    default_port, DEFAULT_BAUD, DEFAULT_LOG_FILE, DEFAULT_MODEL_FILE, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_VOICE_CAPTURE_MS, DEFAULT_VOICE_NUMCEP, DEFAULT_VOICE_SAMPLE_RATE,
};

/// CLI options for the GroundLink console.
#[derive(Debug, Parser, Clone)]
#[command(about = "GroundLink ground-station controller", author, version)]
pub struct AppConfig {
    /// Serial device connected to the sensor unit
    #[arg(long, env = "GROUNDLINK_PORT", default_value_t = default_port())]
    pub port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    /// How long one serial read may block before polling again (milliseconds)
    #[arg(long = "read-timeout-ms", default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,

    /// CSV file every event and command is appended to
    #[arg(long = "log-file", env = "GROUNDLINK_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Voice classifier model (JSON linear model)
    #[arg(long, env = "GROUNDLINK_MODEL", default_value = DEFAULT_MODEL_FILE)]
    pub model: PathBuf,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Length of one voice command recording (milliseconds)
    #[arg(long = "voice-capture-ms", default_value_t = DEFAULT_VOICE_CAPTURE_MS)]
    pub voice_capture_ms: u64,

    /// Sample rate the voice pipeline works at (Hz)
    #[arg(long = "voice-sample-rate", default_value_t = DEFAULT_VOICE_SAMPLE_RATE)]
    pub voice_sample_rate: u32,

    /// Number of cepstral coefficients fed to the classifier
    #[arg(long = "voice-numcep", default_value_t = DEFAULT_VOICE_NUMCEP)]
    pub voice_numcep: usize,

    /// Classify this WAV file instead of recording from the microphone
    #[arg(long = "voice-wav", value_name = "FILE")]
    pub voice_wav: Option<PathBuf>,

    /// Print detected serial ports and exit
    #[arg(long = "list-ports", default_value_t = false)]
    pub list_ports: bool,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print logged records containing FILTER (all records without one) and exit
    #[arg(long, value_name = "FILTER", num_args = 0..=1, default_missing_value = "")]
    pub history: Option<String>,

    /// Send a single command to the unit and exit
    #[arg(long, value_enum, value_name = "COMMAND")]
    pub send: Option<SendTarget>,

    /// Decode a captured file of inbound lines instead of opening the serial port
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "GROUNDLINK_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "GROUNDLINK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow raw wire text in the debug log
    #[arg(
        long = "log-content",
        env = "GROUNDLINK_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

/// Commands accepted by `--send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SendTarget {
    On,
    Off,
    GetTemp,
    GetLight,
}

impl SendTarget {
    pub fn command(self) -> Command {
        match self {
            SendTarget::On => Command::TurnOn,
            SendTarget::Off => Command::TurnOff,
            SendTarget::GetTemp => Command::RequestTemperature,
            SendTarget::GetLight => Command::RequestLight,
        }
    }
}

/// Serial settings handed to the link when it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
}

/// Tunable parameters for one voice command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub capture: Duration,
    pub sample_rate: u32,
    pub numcep: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            capture: Duration::from_millis(DEFAULT_VOICE_CAPTURE_MS),
            sample_rate: DEFAULT_VOICE_SAMPLE_RATE,
            numcep: DEFAULT_VOICE_NUMCEP,
        }
    }
}
