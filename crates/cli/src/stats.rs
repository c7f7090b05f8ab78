//! Per-class agreement statistics
//!
//! Compares the model's top label against the broker's highest-probability
//! classification, grouped by broker class. Entries without a usable broker
//! classification are left out of the aggregation.

use crate::parse::LogEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Agreement statistics for one broker class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassStats {
    pub broker_class: String,
    pub samples: usize,
    pub matches: usize,
    /// Distinct model labels seen for this broker class, sorted.
    pub model_labels: Vec<String>,
}

impl ClassStats {
    /// Fraction of samples where the model agreed, as a percentage.
    pub fn agreement_percent(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            100.0 * self.matches as f64 / self.samples as f64
        }
    }
}

/// Aggregate entries into per-class statistics, keyed and returned in
/// broker-class order.
pub fn compute_class_stats(entries: &[LogEntry]) -> Vec<ClassStats> {
    let mut by_class: BTreeMap<String, (usize, usize, BTreeSet<String>)> = BTreeMap::new();

    for entry in entries {
        let Some(broker_label) = entry.best_broker_label() else {
            continue;
        };
        let (samples, matches, model_labels) = by_class.entry(broker_label.to_string()).or_default();
        *samples += 1;
        if entry.model_label == broker_label {
            *matches += 1;
        }
        model_labels.insert(entry.model_label.clone());
    }

    by_class
        .into_iter()
        .map(|(broker_class, (samples, matches, model_labels))| ClassStats {
            broker_class,
            samples,
            matches,
            model_labels: model_labels.into_iter().collect(),
        })
        .collect()
}
