//! ONNX inference using tract
//!
//! Loads the pretrained SpectraCNN1D artifact and runs it on normalized
//! feature vectors. Inference is synchronous and fast enough to run inline
//! in the poll loop.

use super::{check_shape, softmax, Classifier, CLASS_LABELS, INPUT_LENGTH, LABELS_VERSION};
use crate::error::ListenerError;
use crate::models::{Classification, LabelScore};
use anyhow::{Context, Result};
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::debug;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// tract-backed classifier over the fixed label set.
pub struct OnnxClassifier {
    model: TractModel,
    model_version: String,
}

impl OnnxClassifier {
    /// Load and optimize the ONNX artifact at `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("Failed to parse ONNX model at {}", path.display()))?
            .with_input_fact(0, f32::fact([1, 1, INPUT_LENGTH]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        debug!(path = %path.display(), labels = LABELS_VERSION, "Model loaded");
        Ok(Self {
            model,
            model_version: LABELS_VERSION.to_string(),
        })
    }

    /// Feature vector as the model's (1, 1, L) f32 input tensor.
    fn features_to_tensor(features: &[f64]) -> Result<Tensor, ListenerError> {
        let data: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array3::from_shape_vec((1, 1, INPUT_LENGTH), data)
            .map_err(|e| ListenerError::Inference(e.to_string()))?;
        Ok(array.into())
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, features: &[f64]) -> Result<Classification, ListenerError> {
        check_shape(features.len())?;

        let input = Self::features_to_tensor(features)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| ListenerError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| ListenerError::Inference("no output from model".to_string()))?;

        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| ListenerError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();
        if logits.len() != CLASS_LABELS.len() {
            return Err(ListenerError::Inference(format!(
                "model produced {} logits, expected {}",
                logits.len(),
                CLASS_LABELS.len()
            )));
        }

        let probabilities = CLASS_LABELS
            .iter()
            .zip(softmax(&logits))
            .map(|(label, probability)| LabelScore {
                label: (*label).to_string(),
                probability,
            })
            .collect();

        Ok(Classification {
            probabilities,
            model_version: self.model_version.clone(),
        })
    }
}
