//! Audio input for the voice pipeline.
//!
//! Every source hands back a fixed-length capture of mono f32 PCM at the rate
//! the pipeline asks for, whatever the device or file delivers natively.

mod downmix;
mod meter;
mod recorder;
mod resample;
mod wav;

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use meter::{rms_db, SILENCE_DB};
pub use recorder::Recorder;
pub use wav::{read_mono, WavSource};

/// Something that can record one utterance.
pub trait AudioSource: Send {
    /// Short label for logs and error messages.
    fn describe(&self) -> String;

    /// Block for up to `duration` and return mono samples at `sample_rate`.
    fn capture(&mut self, duration: Duration, sample_rate: u32) -> Result<Vec<f32>>;
}

/// Audio source shared between the console and voice jobs.
pub type SharedAudio = Arc<Mutex<dyn AudioSource>>;

/// Wrap a concrete source for sharing.
pub fn shared(source: impl AudioSource + 'static) -> SharedAudio {
    Arc::new(Mutex::new(source))
}
