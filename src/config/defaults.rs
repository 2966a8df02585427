pub const DEFAULT_BAUD: u32 = 9_600;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_LOG_FILE: &str = "sensor_data_log.csv";
pub const DEFAULT_MODEL_FILE: &str = "voice_model.json";
pub const DEFAULT_VOICE_CAPTURE_MS: u64 = 2_000;
pub const DEFAULT_VOICE_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_VOICE_NUMCEP: usize = 13;

pub(super) const MIN_BAUD: u32 = 300;
pub(super) const MAX_BAUD: u32 = 4_000_000;
pub(super) const MIN_READ_TIMEOUT_MS: u64 = 10;
pub(super) const MAX_READ_TIMEOUT_MS: u64 = 60_000;
pub(super) const MIN_VOICE_CAPTURE_MS: u64 = 250;
pub(super) const MAX_VOICE_CAPTURE_MS: u64 = 10_000;
pub(super) const MIN_VOICE_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_VOICE_SAMPLE_RATE: u32 = 48_000;
/// Cepstra come out of a 26-band filterbank, so more than 26 is meaningless.
pub(super) const MAX_VOICE_NUMCEP: usize = 26;
pub(super) const MAX_PORT_NAME_LEN: usize = 256;

/// Platform-typical name of the first USB CDC serial device.
pub fn default_port() -> String {
    #[cfg(target_os = "windows")]
    {
        "COM3".to_string()
    }
    #[cfg(target_os = "macos")]
    {
        "/dev/cu.usbmodem1".to_string()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "/dev/ttyACM0".to_string()
    }
}
