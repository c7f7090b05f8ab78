//! Spectrum classification
//!
//! Wraps the pretrained 1-D CNN behind a small trait so the poll loop can be
//! exercised without a model artifact on disk.

mod onnx;

pub use onnx::OnnxClassifier;

use crate::error::ListenerError;
use crate::models::Classification;

/// Input vector length the model was trained on.
pub const INPUT_LENGTH: usize = 4650;

/// Class labels in the model's training order.
///
/// The order is part of the model contract: index `i` of the raw logits
/// corresponds to `CLASS_LABELS[i]`. Change only together with the model
/// artifact and bump [`LABELS_VERSION`].
pub const CLASS_LABELS: [&str; 10] = [
    "AGN",
    "Cataclysmic",
    "II",
    "IIP",
    "IIb",
    "IIn",
    "Ia",
    "Ib",
    "Ic",
    "Tidal Disruption Event",
];

/// Label-set revision shipped with `SpectraCNN1D_4650.onnx`.
pub const LABELS_VERSION: &str = "spectra-cnn1d-4650/v1";

/// A classifier mapping a normalized feature vector to a probability
/// distribution over [`CLASS_LABELS`].
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &[f64]) -> Result<Classification, ListenerError>;
}

/// Reject vectors the model was not trained on.
pub(crate) fn check_shape(len: usize) -> Result<(), ListenerError> {
    if len != INPUT_LENGTH {
        return Err(ListenerError::ShapeMismatch {
            expected: INPUT_LENGTH,
            actual: len,
        });
    }
    Ok(())
}

/// Numerically stable softmax over raw logits.
pub(crate) fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_is_a_distribution() {
        let probs = softmax(&[1.0, 2.0, 3.0, -4.0, 0.5]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
        assert!(probs.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn test_softmax_orders_by_logit() {
        let probs = softmax(&[0.1, 5.0, -2.0]);
        assert!(probs[1] > probs[0]);
        assert!(probs[0] > probs[2]);
    }

    #[test]
    fn test_softmax_large_logits_stay_finite() {
        let probs = softmax(&[1000.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_check_shape() {
        assert!(check_shape(INPUT_LENGTH).is_ok());
        match check_shape(10) {
            Err(ListenerError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, INPUT_LENGTH);
                assert_eq!(actual, 10);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_label_set_is_fixed() {
        assert_eq!(CLASS_LABELS.len(), 10);
        // Spot-check the contract ordering.
        assert_eq!(CLASS_LABELS[0], "AGN");
        assert_eq!(CLASS_LABELS[6], "Ia");
        assert_eq!(CLASS_LABELS[9], "Tidal Disruption Event");
    }
}
