//! Binary classifier that turns a feature vector into an ON/OFF label.

use super::features::FeatureVector;
use super::VoicePipelineError;
use crate::protocol::Command;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Opaque model: fixed-length features in, integer label out.
pub trait Classifier: Send + Sync {
    /// Number of features `predict` expects.
    fn feature_len(&self) -> usize;

    fn predict(&self, features: &FeatureVector) -> Result<i64, VoicePipelineError>;
}

/// Map a label to the command it stands for.
///
/// Only `1` and `0` are meaningful; anything else is rejected instead of
/// falling back to either command.
pub fn command_for_label(label: i64) -> Result<Command, VoicePipelineError> {
    match label {
        1 => Ok(Command::TurnOn),
        0 => Ok(Command::TurnOff),
        other => Err(VoicePipelineError::UnexpectedLabel(other)),
    }
}

/// Logistic-regression style linear model exported as JSON.
///
/// ```json
/// { "weights": [..], "bias": 0.1, "mean": [..], "scale": [..], "classes": [0, 1] }
/// ```
///
/// `mean`/`scale` standardize the input when present. The decision value
/// `w·x + b` picks `classes[1]` when positive and `classes[0]` otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub mean: Option<Vec<f64>>,
    #[serde(default)]
    pub scale: Option<Vec<f64>>,
    #[serde(default = "default_classes")]
    pub classes: [i64; 2],
}

fn default_classes() -> [i64; 2] {
    [0, 1]
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, VoicePipelineError> {
        let load_err = |reason: String| VoicePipelineError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| load_err(err.to_string()))?;
        let model: LinearModel =
            serde_json::from_str(&text).map_err(|err| load_err(err.to_string()))?;
        model.check().map_err(load_err)?;
        Ok(model)
    }

    fn check(&self) -> Result<(), String> {
        let n = self.weights.len();
        if n == 0 {
            return Err("model has no weights".to_string());
        }
        if let Some(mean) = &self.mean {
            if mean.len() != n {
                return Err(format!("mean has {} entries, expected {n}", mean.len()));
            }
        }
        if let Some(scale) = &self.scale {
            if scale.len() != n {
                return Err(format!("scale has {} entries, expected {n}", scale.len()));
            }
            if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err("scale entries must be finite and non-zero".to_string());
            }
        }
        Ok(())
    }

    /// Raw decision value for already length-checked features.
    pub fn decision(&self, features: &[f64]) -> f64 {
        let mut z = self.bias;
        for (idx, (w, x)) in self.weights.iter().zip(features).enumerate() {
            let mut x = *x;
            if let Some(mean) = &self.mean {
                x -= mean[idx];
            }
            if let Some(scale) = &self.scale {
                x /= scale[idx];
            }
            z += w * x;
        }
        z
    }
}

impl Classifier for LinearModel {
    fn feature_len(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, features: &FeatureVector) -> Result<i64, VoicePipelineError> {
        if features.len() != self.weights.len() {
            return Err(VoicePipelineError::FeatureLength {
                expected: self.weights.len(),
                actual: features.len(),
            });
        }
        let z = self.decision(features.as_slice());
        if !z.is_finite() {
            return Err(VoicePipelineError::Classifier(format!(
                "non-finite decision value {z}"
            )));
        }
        Ok(if z > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}
