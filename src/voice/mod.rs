//! Spoken ON/OFF commands: capture, MFCC features, classification, dispatch.
//!
//! A run walks `Idle → Capturing → Extracting → Classifying → Dispatched`.
//! Anything that goes wrong before the last step aborts the run with a
//! [`VoicePipelineError`] and nothing is written to the link.

mod classifier;
mod features;
mod job;
#[cfg(test)]
mod tests;

use crate::audio::SharedAudio;
use crate::config::VoiceConfig;
use crate::control::{CommandError, CommandOrigin, CommandSender};
use crate::link::LinkError;
use crate::lock_or_recover;
use crate::protocol::Command;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub use classifier::{command_for_label, Classifier, LinearModel};
pub use features::{FeatureVector, MfccExtractor};
pub use job::{start_voice_job, VoiceJob};

/// Where a voice run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStage {
    /// Resting state between runs. Never reported as progress; a run ends
    /// with [`VoiceUpdate::Completed`] or [`VoiceUpdate::Failed`] instead.
    #[default]
    Idle,
    Capturing,
    Extracting,
    Classifying,
    Dispatched,
}

impl VoiceStage {
    pub fn label(self) -> &'static str {
        match self {
            VoiceStage::Idle => "idle",
            VoiceStage::Capturing => "listening",
            VoiceStage::Extracting => "extracting features",
            VoiceStage::Classifying => "classifying",
            VoiceStage::Dispatched => "dispatched",
        }
    }
}

/// Result of a run that reached the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceOutcome {
    pub label: i64,
    pub command: Command,
    /// Set when the command went out but its log row could not be written.
    pub log_error: Option<String>,
}

/// Progress reported to voice subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "voice", rename_all = "snake_case")]
pub enum VoiceUpdate {
    Stage { stage: VoiceStage },
    Completed { outcome: VoiceOutcome },
    Failed { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum VoicePipelineError {
    #[error("no audio input is available")]
    AudioUnavailable,

    #[error("voice classifier is not loaded")]
    ClassifierNotLoaded,

    #[error("voice model '{}' could not be loaded: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("audio capture returned no samples")]
    EmptyCapture,

    #[error("classifier expects {expected} features, got {actual}")]
    FeatureLength { expected: usize, actual: usize },

    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("classifier returned unexpected label {0}")]
    UnexpectedLabel(i64),

    #[error("voice command could not be sent")]
    Send(#[from] LinkError),

    #[error("a voice command is already in progress")]
    Busy,

    #[error("voice worker panicked")]
    WorkerPanicked,
}

/// Capture source, feature extractor, and classifier for one station.
pub struct VoicePipeline {
    audio: Option<SharedAudio>,
    classifier: Option<Arc<dyn Classifier>>,
    config: VoiceConfig,
    extractor: MfccExtractor,
}

impl VoicePipeline {
    pub fn new(
        audio: Option<SharedAudio>,
        classifier: Option<Arc<dyn Classifier>>,
        config: VoiceConfig,
    ) -> Self {
        let extractor = MfccExtractor::new(config.sample_rate, config.numcep);
        Self {
            audio,
            classifier,
            config,
            extractor,
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Check everything a run needs without touching the audio device.
    pub fn preflight(&self) -> Result<(), VoicePipelineError> {
        if self.audio.is_none() {
            return Err(VoicePipelineError::AudioUnavailable);
        }
        let Some(classifier) = &self.classifier else {
            return Err(VoicePipelineError::ClassifierNotLoaded);
        };
        if classifier.feature_len() != self.extractor.numcep() {
            return Err(VoicePipelineError::FeatureLength {
                expected: classifier.feature_len(),
                actual: self.extractor.numcep(),
            });
        }
        Ok(())
    }

    /// Run every stage on the calling thread, reporting each transition.
    pub fn run(
        &self,
        sender: &CommandSender,
        progress: &mut dyn FnMut(VoiceStage),
    ) -> Result<VoiceOutcome, VoicePipelineError> {
        self.preflight()?;
        let (Some(audio), Some(classifier)) = (&self.audio, &self.classifier) else {
            return Err(VoicePipelineError::AudioUnavailable);
        };

        progress(VoiceStage::Capturing);
        let samples = {
            let mut source = lock_or_recover(audio, "voice audio source");
            crate::log_debug(&format!("voice capture from {}", source.describe()));
            source
                .capture(self.config.capture, self.config.sample_rate)
                .map_err(|err| VoicePipelineError::Capture(format!("{err:#}")))?
        };
        if samples.is_empty() {
            return Err(VoicePipelineError::EmptyCapture);
        }

        progress(VoiceStage::Extracting);
        let features = self.extractor.extract(&samples);

        progress(VoiceStage::Classifying);
        let label = classifier.predict(&features)?;
        let command = command_for_label(label)?;
        crate::log_debug(&format!("voice label {label} -> {command}"));

        let log_error = match sender.send(command, CommandOrigin::Voice) {
            Ok(_) => None,
            Err(CommandError::Link(err)) => return Err(err.into()),
            Err(CommandError::Journal(err)) => Some(crate::error_chain(&err)),
        };
        progress(VoiceStage::Dispatched);
        tracing::info!(label, command = %command, "voice command dispatched");

        Ok(VoiceOutcome {
            label,
            command,
            log_error,
        })
    }
}

/// Load the JSON linear model at `path` as the station's classifier.
pub fn load_classifier(path: &std::path::Path) -> Result<Arc<dyn Classifier>, VoicePipelineError> {
    let model = LinearModel::load(path)?;
    crate::log_debug(&format!(
        "voice model loaded from {} ({} features)",
        path.display(),
        model.weights.len()
    ));
    let classifier: Arc<dyn Classifier> = Arc::new(model);
    Ok(classifier)
}
