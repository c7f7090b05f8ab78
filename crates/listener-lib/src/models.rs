//! Core data models for the spectra listener

use crate::error::ListenerError;
use serde::{Deserialize, Serialize};

/// Minimal spectrum metadata returned by the broker's search endpoint
/// when `minimalPayload` is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumSummary {
    pub id: i64,
    pub obj_id: String,
    #[serde(default)]
    pub instrument_id: Option<i64>,
    #[serde(default)]
    pub modified: Option<String>,
}

/// Full spectrum payload with the raw sample arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
    pub id: i64,
    pub obj_id: String,
    pub wavelengths: Vec<f64>,
    pub fluxes: Vec<f64>,
}

impl Spectrum {
    /// Pair the wavelength and flux arrays into samples, failing on
    /// mismatched lengths.
    pub fn samples(&self) -> Result<Vec<(f64, f64)>, ListenerError> {
        if self.wavelengths.len() != self.fluxes.len() {
            return Err(ListenerError::MalformedSpectrum {
                id: self.id,
                detail: format!(
                    "{} wavelengths but {} fluxes",
                    self.wavelengths.len(),
                    self.fluxes.len()
                ),
            });
        }
        Ok(self
            .wavelengths
            .iter()
            .copied()
            .zip(self.fluxes.iter().copied())
            .collect())
    }
}

/// One (label, probability) pair of a classification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: f32,
}

/// Probability distribution over the model's label set, in training order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub probabilities: Vec<LabelScore>,
    pub model_version: String,
}

impl Classification {
    /// Highest-probability label, if any.
    pub fn best(&self) -> Option<&LabelScore> {
        self.probabilities.iter().max_by(|a, b| {
            a.probability
                .partial_cmp(&b.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Source detail consumed by the log reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: String,
    #[serde(default)]
    pub tns_name: Option<String>,
    #[serde(default)]
    pub classifications: Vec<SourceClassification>,
}

/// A human/pipeline classification already attached to a source on the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClassification {
    pub classification: String,
    pub probability: f64,
}
