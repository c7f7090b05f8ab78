//! Results log parsing
//!
//! Reads the append-only log written by the listener's local reporter.
//! Entries are separated by a 40-dash line and hold one `Key: value` pair
//! per line. Lines that do not match a known key are ignored so the parser
//! tolerates partial or hand-edited entries.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

const ENTRY_SEPARATOR: &str = "----------------------------------------";

/// One classification taken from a log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelProbability {
    pub label: String,
    /// Percentage in [0, 100].
    pub percent: f64,
}

/// One fully parsed log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub object_id: String,
    pub spectrum_id: i64,
    pub tns_name: Option<String>,
    /// Broker classifications in log order.
    pub broker_classifications: Vec<LabelProbability>,
    /// The model's top label.
    pub model_label: String,
}

impl LogEntry {
    /// Highest-probability broker classification, with TDE label variants
    /// folded together. `None` when the entry carries no usable broker
    /// classification (empty, or flagged as a duplicate).
    pub fn best_broker_label(&self) -> Option<&str> {
        self.broker_classifications
            .iter()
            .max_by(|a, b| a.percent.total_cmp(&b.percent))
            .map(|c| c.label.as_str())
    }
}

/// Parse the results log at `path` into entries. Entries missing a required
/// field are skipped rather than failing the whole file.
pub fn parse_log_file(path: &Path) -> Result<Vec<LogEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading results log {}", path.display()))?;
    Ok(parse_log(&content))
}

/// Parse log content into entries.
pub fn parse_log(content: &str) -> Vec<LogEntry> {
    content
        .split(ENTRY_SEPARATOR)
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(block: &str) -> Option<LogEntry> {
    let mut object_id = None;
    let mut spectrum_id = None;
    let mut tns_name = None;
    let mut broker_classifications = Vec::new();
    let mut model_label = None;

    for line in block.lines() {
        if let Some(value) = field(line, "Object ID:") {
            object_id = Some(value.to_string());
        } else if let Some(value) = field(line, "Spectrum ID:") {
            spectrum_id = value.parse::<i64>().ok();
        } else if let Some(value) = field(line, "TNS name:") {
            tns_name = match value {
                "N/A" | "" => None,
                name => Some(name.to_string()),
            };
        } else if let Some(value) = field(line, "SkyPortal classifications:") {
            broker_classifications = parse_classifications(value);
        } else if let Some(value) = field(line, "Model classification:") {
            model_label = parse_label(value);
        }
    }

    Some(LogEntry {
        object_id: object_id?,
        spectrum_id: spectrum_id?,
        tns_name,
        broker_classifications,
        model_label: model_label?,
    })
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key).map(str::trim)
}

/// Parse a `Label (prob=X.XXX%) - Label (prob=Y.YYY%) - ` sequence.
/// Entries flagged as duplicates are discarded wholesale since their
/// classifications describe a different spectrum.
fn parse_classifications(value: &str) -> Vec<LabelProbability> {
    if value.to_lowercase().contains("duplicate") {
        return Vec::new();
    }

    value
        .split(" - ")
        .filter_map(parse_scored_label)
        .collect()
}

fn parse_scored_label(segment: &str) -> Option<LabelProbability> {
    let open = segment.find("(prob=")?;
    let rest = &segment[open + "(prob=".len()..];
    let close = rest.find("%)")?;
    let percent = rest[..close].parse::<f64>().ok()?;
    let label = segment[..open].trim();
    if label.is_empty() {
        return None;
    }
    Some(LabelProbability {
        label: canonical_label(label),
        percent,
    })
}

/// Top model label from a `Label (prob=X.XXX%)` line, or the line itself
/// when no probability is attached (e.g. `unclassified`).
fn parse_label(value: &str) -> Option<String> {
    let label = match value.find("(prob=") {
        Some(open) => value[..open].trim(),
        None => value.trim(),
    };
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// Brokers abbreviate tidal disruption events inconsistently; fold every
/// variant mentioning "Event" onto the canonical long form.
fn canonical_label(label: &str) -> String {
    if label.contains("Event") {
        "Tidal Disruption Event".to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LOG: &str = "\
Object ID: ZTF25aaaaaaa
Spectrum ID: 42
TNS name: SN 2025xyz
SkyPortal classifications: Ia (prob=90.000%) - II (prob=5.000%) -
Model classification: Ia (prob=80.123%)
----------------------------------------
Object ID: ZTF25bbbbbbb
Spectrum ID: 43
TNS name: N/A
SkyPortal classifications:
Model classification: II (prob=55.000%)
----------------------------------------
";

    #[test]
    fn test_parses_entries() {
        let entries = parse_log(SAMPLE_LOG);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].object_id, "ZTF25aaaaaaa");
        assert_eq!(entries[0].spectrum_id, 42);
        assert_eq!(entries[0].tns_name.as_deref(), Some("SN 2025xyz"));
        assert_eq!(entries[0].broker_classifications.len(), 2);
        assert_eq!(entries[0].model_label, "Ia");

        assert_eq!(entries[1].tns_name, None);
        assert!(entries[1].broker_classifications.is_empty());
        assert_eq!(entries[1].model_label, "II");
    }

    #[test]
    fn test_best_broker_label_picks_highest() {
        let entries = parse_log(SAMPLE_LOG);
        assert_eq!(entries[0].best_broker_label(), Some("Ia"));
        assert_eq!(entries[1].best_broker_label(), None);
    }

    #[test]
    fn test_duplicate_entries_carry_no_classifications() {
        let log = "\
Object ID: ZTF25ccccccc
Spectrum ID: 44
TNS name: N/A
SkyPortal classifications: duplicate of ZTF25aaaaaaa (prob=99.000%) -
Model classification: Ia (prob=70.000%)
----------------------------------------
";
        let entries = parse_log(log);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].broker_classifications.is_empty());
    }

    #[test]
    fn test_tde_variants_are_folded() {
        let log = "\
Object ID: ZTF25ddddddd
Spectrum ID: 45
TNS name: N/A
SkyPortal classifications: Tidal Disruption Event (prob=60.000%) -
Model classification: Tidal Disruption Event (prob=88.000%)
----------------------------------------
Object ID: ZTF25eeeeeee
Spectrum ID: 46
TNS name: N/A
SkyPortal classifications: TDE Event (prob=60.000%) -
Model classification: Ia (prob=40.000%)
----------------------------------------
";
        let entries = parse_log(log);
        assert_eq!(
            entries[0].best_broker_label(),
            Some("Tidal Disruption Event")
        );
        assert_eq!(
            entries[1].best_broker_label(),
            Some("Tidal Disruption Event")
        );
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let log = "\
Object ID: ZTF25fffffff
TNS name: N/A
----------------------------------------
";
        assert!(parse_log(log).is_empty());
    }

    #[test]
    fn test_unclassified_model_line() {
        let log = "\
Object ID: ZTF25ggggggg
Spectrum ID: 47
TNS name: N/A
SkyPortal classifications: Ia (prob=90.000%) -
Model classification: unclassified
----------------------------------------
";
        let entries = parse_log(log);
        assert_eq!(entries[0].model_label, "unclassified");
    }
}
