//! Result reporting
//!
//! Turns a classification result into a persisted artifact: either an entry
//! in the local results log plus a probability chart, or a comment posted
//! back to the broker with the chart attached.

mod plot;

pub use plot::render_probability_chart;

use crate::broker::{CommentAttachment, SpectraBroker};
use crate::models::{Classification, Spectrum};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Name of the append-only results log inside the results directory.
pub const RESULTS_LOG: &str = "ml_results.log";

/// Consumes classification results.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, spectrum: &Spectrum, result: &Classification) -> Result<()>;
}

fn chart_path(results_dir: &Path, spectrum: &Spectrum) -> PathBuf {
    results_dir.join(format!("{}_{}_probs.png", spectrum.obj_id, spectrum.id))
}

fn best_line(result: &Classification) -> String {
    match result.best() {
        Some(best) => format!("{} (prob={:.3}%)", best.label, best.probability * 100.0),
        None => "unclassified".to_string(),
    }
}

/// Appends classification results to a local log file and writes the
/// probability chart next to it.
pub struct LogReporter {
    broker: Arc<dyn SpectraBroker>,
    results_dir: PathBuf,
}

impl LogReporter {
    pub fn new(broker: Arc<dyn SpectraBroker>, results_dir: PathBuf) -> Self {
        Self {
            broker,
            results_dir,
        }
    }

    fn log_path(&self) -> PathBuf {
        self.results_dir.join(RESULTS_LOG)
    }
}

#[async_trait]
impl Reporter for LogReporter {
    async fn report(&self, spectrum: &Spectrum, result: &Classification) -> Result<()> {
        let chart = chart_path(&self.results_dir, spectrum);
        render_probability_chart(result, &chart)?;

        let source = self
            .broker
            .get_source(&spectrum.obj_id)
            .await
            .with_context(|| format!("fetching source {}", spectrum.obj_id))?;

        let broker_classifications: String = source
            .classifications
            .iter()
            .map(|c| format!("{} (prob={:.3}%) - ", c.classification, c.probability * 100.0))
            .collect();

        let mut entry = String::new();
        entry.push_str(&format!("Object ID: {}\n", spectrum.obj_id));
        entry.push_str(&format!("Spectrum ID: {}\n", spectrum.id));
        entry.push_str(&format!(
            "TNS name: {}\n",
            source.tns_name.as_deref().unwrap_or("N/A")
        ));
        entry.push_str(&format!(
            "SkyPortal classifications: {broker_classifications}\n"
        ));
        entry.push_str(&format!("Model classification: {}\n", best_line(result)));
        entry.push_str(&format!("{}\n", "-".repeat(40)));

        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening results log {}", path.display()))?;
        file.write_all(entry.as_bytes())
            .context("writing results log entry")?;

        info!(
            spectrum_id = spectrum.id,
            obj_id = %spectrum.obj_id,
            log = %path.display(),
            "Result logged"
        );
        Ok(())
    }
}

/// Posts classification results as broker comments with the chart attached.
pub struct CommentReporter {
    broker: Arc<dyn SpectraBroker>,
    results_dir: PathBuf,
}

impl CommentReporter {
    pub fn new(broker: Arc<dyn SpectraBroker>, results_dir: PathBuf) -> Self {
        Self {
            broker,
            results_dir,
        }
    }
}

#[async_trait]
impl Reporter for CommentReporter {
    async fn report(&self, spectrum: &Spectrum, result: &Classification) -> Result<()> {
        let chart = chart_path(&self.results_dir, spectrum);
        render_probability_chart(result, &chart)?;

        let bytes = std::fs::read(&chart)
            .with_context(|| format!("reading chart {}", chart.display()))?;
        let attachment = CommentAttachment {
            name: chart
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "probs.png".to_string()),
            body_base64: BASE64.encode(bytes),
        };

        let text = format!(
            "Machine learning classification using spectra:\n\nBest result: {}\n",
            best_line(result)
        );
        self.broker
            .post_comment(&spectrum.obj_id, &text, Some(&attachment))
            .await
            .with_context(|| format!("posting comment on {}", spectrum.obj_id))?;

        info!(
            spectrum_id = spectrum.id,
            obj_id = %spectrum.obj_id,
            "Result posted to broker"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::SpectraQuery;
    use crate::error::ListenerError;
    use crate::models::{LabelScore, SourceClassification, SourceInfo, SpectrumSummary};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubBroker {
        source: SourceInfo,
        comments: Mutex<Vec<(String, String, bool)>>,
    }

    impl StubBroker {
        fn new(source: SourceInfo) -> Self {
            Self {
                source,
                comments: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpectraBroker for StubBroker {
        async fn search_spectra(
            &self,
            _query: &SpectraQuery,
        ) -> Result<Vec<SpectrumSummary>, ListenerError> {
            Ok(Vec::new())
        }

        async fn get_spectrum(&self, id: i64) -> Result<Spectrum, ListenerError> {
            Err(ListenerError::FetchFailed {
                status: 404,
                detail: format!("no spectrum {id}"),
            })
        }

        async fn get_source(&self, _obj_id: &str) -> Result<SourceInfo, ListenerError> {
            Ok(self.source.clone())
        }

        async fn post_comment(
            &self,
            obj_id: &str,
            text: &str,
            attachment: Option<&CommentAttachment>,
        ) -> Result<(), ListenerError> {
            self.comments.lock().unwrap().push((
                obj_id.to_string(),
                text.to_string(),
                attachment.is_some(),
            ));
            Ok(())
        }
    }

    fn test_spectrum() -> Spectrum {
        Spectrum {
            id: 42,
            obj_id: "ZTF25aaaaaaa".to_string(),
            wavelengths: vec![4000.0, 5000.0],
            fluxes: vec![1.0, 2.0],
        }
    }

    fn test_result() -> Classification {
        Classification {
            probabilities: vec![
                LabelScore {
                    label: "Ia".to_string(),
                    probability: 0.8,
                },
                LabelScore {
                    label: "II".to_string(),
                    probability: 0.2,
                },
            ],
            model_version: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_reporter_appends_entry_and_chart() {
        let dir = TempDir::new().unwrap();
        let broker = Arc::new(StubBroker::new(SourceInfo {
            id: "ZTF25aaaaaaa".to_string(),
            tns_name: Some("SN 2025xyz".to_string()),
            classifications: vec![SourceClassification {
                classification: "Ia".to_string(),
                probability: 0.9,
            }],
        }));
        let reporter = LogReporter::new(broker, dir.path().to_path_buf());

        reporter
            .report(&test_spectrum(), &test_result())
            .await
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join(RESULTS_LOG)).unwrap();
        assert!(log.contains("Object ID: ZTF25aaaaaaa"));
        assert!(log.contains("Spectrum ID: 42"));
        assert!(log.contains("TNS name: SN 2025xyz"));
        assert!(log.contains("Ia (prob=90.000%)"));
        assert!(log.contains("Model classification: Ia (prob=80.000%)"));
        assert!(log.contains(&"-".repeat(40)));

        let chart = dir.path().join("ZTF25aaaaaaa_42_probs.png");
        assert!(chart.exists());
        assert!(std::fs::metadata(&chart).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_log_reporter_entries_accumulate() {
        let dir = TempDir::new().unwrap();
        let broker = Arc::new(StubBroker::new(SourceInfo {
            id: "ZTF25aaaaaaa".to_string(),
            tns_name: None,
            classifications: Vec::new(),
        }));
        let reporter = LogReporter::new(broker, dir.path().to_path_buf());

        reporter
            .report(&test_spectrum(), &test_result())
            .await
            .unwrap();
        reporter
            .report(&test_spectrum(), &test_result())
            .await
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join(RESULTS_LOG)).unwrap();
        assert_eq!(log.matches("Object ID:").count(), 2);
        assert!(log.contains("TNS name: N/A"));
    }

    #[tokio::test]
    async fn test_comment_reporter_posts_with_attachment() {
        let dir = TempDir::new().unwrap();
        let broker = Arc::new(StubBroker::new(SourceInfo {
            id: "ZTF25aaaaaaa".to_string(),
            tns_name: None,
            classifications: Vec::new(),
        }));
        let reporter = CommentReporter::new(broker.clone(), dir.path().to_path_buf());

        reporter
            .report(&test_spectrum(), &test_result())
            .await
            .unwrap();

        let comments = broker.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        let (obj_id, text, has_attachment) = &comments[0];
        assert_eq!(obj_id, "ZTF25aaaaaaa");
        assert!(text.contains("Best result: Ia (prob=80.000%)"));
        assert!(has_attachment);
    }
}
