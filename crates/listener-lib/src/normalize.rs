//! Wavelength-grid normalization of raw spectra
//!
//! Converts an irregularly sampled (wavelength, flux) sequence into a
//! fixed-length zero-mean/unit-variance vector on a canonical grid, the
//! representation the classifier was trained on. Pure functions, no I/O.

use crate::classifier::INPUT_LENGTH;
use crate::error::ListenerError;

/// The canonical resampling grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub min_wavelength: f64,
    pub max_wavelength: f64,
    pub length: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            min_wavelength: 3850.0,
            max_wavelength: 8500.0,
            length: INPUT_LENGTH,
        }
    }
}

/// Normalize raw samples onto `grid`.
///
/// Non-finite sample pairs are discarded; fewer than two finite pairs is an
/// error. The flux is linearly interpolated onto `grid.length` evenly spaced
/// wavelengths, clamping to the boundary flux outside the sampled span
/// rather than extrapolating. The result is z-scored over its finite
/// entries; a constant signal yields the all-zero vector instead of a
/// division by zero.
pub fn normalize(samples: &[(f64, f64)], grid: &GridSpec) -> Result<Vec<f64>, ListenerError> {
    let mut cleaned: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .filter(|(w, f)| w.is_finite() && f.is_finite())
        .collect();
    if cleaned.len() < 2 {
        return Err(ListenerError::InsufficientData {
            finite: cleaned.len(),
        });
    }

    // The broker does not guarantee wavelength order.
    cleaned.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let resampled = resample(&cleaned, grid);
    Ok(zscore(resampled))
}

/// Linearly resample sorted samples onto the grid, flat beyond the span.
fn resample(sorted: &[(f64, f64)], grid: &GridSpec) -> Vec<f64> {
    let denom = grid.length.saturating_sub(1).max(1) as f64;
    let step = (grid.max_wavelength - grid.min_wavelength) / denom;
    (0..grid.length)
        .map(|i| interpolate(sorted, grid.min_wavelength + step * i as f64))
        .collect()
}

/// Linear interpolation between the two samples bracketing `x`, clamped to
/// the boundary flux outside the sampled span.
fn interpolate(sorted: &[(f64, f64)], x: f64) -> f64 {
    let first = sorted[0];
    let last = sorted[sorted.len() - 1];
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }

    // First sample with wavelength >= x; the bracket is [idx - 1, idx].
    let idx = sorted.partition_point(|(w, _)| *w < x);
    let (w_lo, f_lo) = sorted[idx - 1];
    let (w_hi, f_hi) = sorted[idx];
    if w_hi == w_lo {
        return f_lo;
    }
    let t = (x - w_lo) / (w_hi - w_lo);
    f_lo + t * (f_hi - f_lo)
}

/// Zero-mean/unit-variance over the finite entries; non-finite entries keep
/// their position. A zero-variance signal maps to the all-zero vector.
fn zscore(values: Vec<f64>) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![0.0; values.len()];
    }

    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
    let std = var.sqrt();

    if std > 0.0 {
        values.into_iter().map(|v| (v - mean) / std).collect()
    } else {
        vec![0.0; values.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(values: &[f64]) -> (f64, f64) {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        (mean, var.sqrt())
    }

    #[test]
    fn test_output_length_and_moments() {
        let samples: Vec<(f64, f64)> = (0..100)
            .map(|i| (4000.0 + i as f64 * 40.0, (i as f64 * 0.3).sin()))
            .collect();
        let out = normalize(&samples, &GridSpec::default()).unwrap();
        assert_eq!(out.len(), INPUT_LENGTH);

        let (mean, std) = stats(&out);
        assert!(mean.abs() < 1e-9, "mean was {}", mean);
        assert!((std - 1.0).abs() < 1e-9, "std was {}", std);
    }

    #[test]
    fn test_constant_flux_yields_zero_vector() {
        let samples: Vec<(f64, f64)> = (0..50)
            .map(|i| (4000.0 + i as f64 * 100.0, 3.25))
            .collect();
        let out = normalize(&samples, &GridSpec::default()).unwrap();
        assert_eq!(out.len(), INPUT_LENGTH);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_too_few_finite_samples() {
        let samples = vec![(4000.0, 1.0), (f64::NAN, 2.0), (5000.0, f64::INFINITY)];
        match normalize(&samples, &GridSpec::default()) {
            Err(ListenerError::InsufficientData { finite }) => assert_eq!(finite, 1),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        match normalize(&[], &GridSpec::default()) {
            Err(ListenerError::InsufficientData { finite }) => assert_eq!(finite, 0),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_pairs_are_dropped() {
        let samples = vec![
            (4000.0, 1.0),
            (f64::NAN, 100.0),
            (4500.0, f64::NAN),
            (5000.0, 2.0),
            (6000.0, 1.0),
        ];
        // Must behave exactly as if only the three finite pairs existed.
        let clean = vec![(4000.0, 1.0), (5000.0, 2.0), (6000.0, 1.0)];
        let a = normalize(&samples, &GridSpec::default()).unwrap();
        let b = normalize(&clean, &GridSpec::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let sorted = vec![(4000.0, 1.0), (5000.0, 2.0), (6000.0, 1.5)];
        let shuffled = vec![(6000.0, 1.5), (4000.0, 1.0), (5000.0, 2.0)];
        let a = normalize(&sorted, &GridSpec::default()).unwrap();
        let b = normalize(&shuffled, &GridSpec::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_flat_extrapolation_end_to_end() {
        // Triangle spectrum: flux 1.0 at both edges, 2.0 in the middle.
        let samples = vec![(4000.0, 1.0), (5000.0, 2.0), (6000.0, 1.0)];
        let grid = GridSpec::default();
        let out = normalize(&samples, &grid).unwrap();
        assert_eq!(out.len(), 4650);

        let (mean, std) = stats(&out);
        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);

        // Every grid point below 4000 and above 6000 must carry the
        // normalized boundary flux.
        let step = (grid.max_wavelength - grid.min_wavelength) / (grid.length - 1) as f64;
        let below: Vec<f64> = (0..grid.length)
            .filter(|i| grid.min_wavelength + step * (*i as f64) < 4000.0)
            .map(|i| out[i])
            .collect();
        let above: Vec<f64> = (0..grid.length)
            .filter(|i| grid.min_wavelength + step * *i as f64 > 6000.0)
            .map(|i| out[i])
            .collect();
        assert!(!below.is_empty());
        assert!(!above.is_empty());
        for v in &below {
            assert!((v - below[0]).abs() < 1e-12);
        }
        for v in &above {
            assert!((v - below[0]).abs() < 1e-12, "both edges share flux 1.0");
        }
        // The peak at 5000 must normalize above the edges.
        let peak_idx = ((5000.0 - grid.min_wavelength) / step).round() as usize;
        assert!(out[peak_idx] > below[0]);
    }

    #[test]
    fn test_interpolation_midpoint() {
        let sorted = vec![(4000.0, 1.0), (5000.0, 3.0)];
        assert_eq!(interpolate(&sorted, 4500.0), 2.0);
        assert_eq!(interpolate(&sorted, 3000.0), 1.0);
        assert_eq!(interpolate(&sorted, 9000.0), 3.0);
    }

    #[test]
    fn test_duplicate_wavelengths_do_not_divide_by_zero() {
        let sorted = vec![(4000.0, 1.0), (4000.0, 5.0), (5000.0, 2.0)];
        let v = interpolate(&sorted, 4000.0);
        assert!(v.is_finite());
    }
}
