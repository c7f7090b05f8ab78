//! Spectra poll loop
//!
//! Drives the fetch -> filter -> process-each -> sleep cycle against the
//! broker. Candidates are handled strictly sequentially; the ledger is
//! updated only after a candidate has been classified and reported, so a
//! crash at any point causes at most a harmless reprocessing.

use crate::broker::{SpectraBroker, SpectraQuery};
use crate::classifier::Classifier;
use crate::error::ListenerError;
use crate::ledger::ProcessedLedger;
use crate::models::SpectrumSummary;
use crate::normalize::{normalize, GridSpec};
use crate::report::Reporter;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the spectra poll loop.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Instrument IDs whose spectra are watched.
    pub instrument_ids: Vec<i64>,
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Width of the sliding modified-time window. Wider than the poll
    /// interval on purpose; the ledger handles the resulting overlap.
    pub lookback: TimeDelta,
    /// Pause between candidates, to bound the request rate.
    pub candidate_pause: Duration,
    /// Backoff after a failed batch query.
    pub fetch_backoff: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            instrument_ids: Vec::new(),
            poll_interval: Duration::from_secs(120),
            lookback: TimeDelta::days(1),
            candidate_pause: Duration::from_millis(500),
            fetch_backoff: Duration::from_secs(10),
        }
    }
}

/// Half-open `[after, before)` modified-time range queried in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl PollWindow {
    /// The window ending now.
    pub fn current(lookback: TimeDelta) -> Self {
        let before = Utc::now();
        Self {
            after: before - lookback,
            before,
        }
    }
}

/// Counters for one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Unseen candidates after the ledger filter.
    pub candidates: usize,
    pub processed: usize,
    pub failed: usize,
}

/// The poll loop and the state it owns.
pub struct SpectraMonitor {
    broker: Arc<dyn SpectraBroker>,
    classifier: Arc<dyn Classifier>,
    reporter: Arc<dyn Reporter>,
    ledger: ProcessedLedger,
    grid: GridSpec,
    config: MonitorConfig,
}

impl SpectraMonitor {
    pub fn new(
        broker: Arc<dyn SpectraBroker>,
        classifier: Arc<dyn Classifier>,
        reporter: Arc<dyn Reporter>,
        ledger: ProcessedLedger,
        config: MonitorConfig,
    ) -> Self {
        Self {
            broker,
            classifier,
            reporter,
            ledger,
            grid: GridSpec::default(),
            config,
        }
    }

    /// Run until a shutdown signal arrives. No cycle outcome terminates the
    /// loop; batch failures only shorten the sleep to the fetch backoff.
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            lookback_hours = self.config.lookback.num_hours(),
            instruments = ?self.config.instrument_ids,
            "Starting spectra monitor"
        );

        loop {
            let sleep_for = match self.run_cycle().await {
                Ok(stats) if stats.candidates > 0 => {
                    info!(
                        candidates = stats.candidates,
                        processed = stats.processed,
                        failed = stats.failed,
                        "Cycle complete"
                    );
                    self.config.poll_interval
                }
                Ok(_) => {
                    debug!("No new spectra");
                    self.config.poll_interval
                }
                Err(e) => {
                    warn!(error = %e, "Spectra query failed, backing off");
                    self.config.fetch_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.recv() => {
                    info!("Shutting down spectra monitor");
                    break;
                }
            }
        }
    }

    /// One fetch -> filter -> process-each pass over the current window.
    ///
    /// Only the batch query can fail the cycle; per-candidate errors are
    /// logged, counted, and leave the candidate unmarked for the next cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleStats, ListenerError> {
        let window = PollWindow::current(self.config.lookback);
        let query = SpectraQuery {
            instrument_ids: self.config.instrument_ids.clone(),
            modified_after: Some(window.after),
            modified_before: Some(window.before),
            minimal: true,
            ..Default::default()
        };

        let summaries = self.broker.search_spectra(&query).await?;
        let fresh: Vec<SpectrumSummary> = summaries
            .into_iter()
            .filter(|s| !self.ledger.contains(s.id))
            .collect();

        let mut stats = CycleStats {
            candidates: fresh.len(),
            ..Default::default()
        };
        if !fresh.is_empty() {
            info!(count = fresh.len(), until = %window.before, "Found new spectra");
        }

        for (i, summary) in fresh.iter().enumerate() {
            match self.process_candidate(summary).await {
                Ok(()) => stats.processed += 1,
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        spectrum_id = summary.id,
                        obj_id = %summary.obj_id,
                        error = %format!("{e:#}"),
                        "Failed to process spectrum"
                    );
                }
            }
            if i + 1 < fresh.len() {
                tokio::time::sleep(self.config.candidate_pause).await;
            }
        }

        Ok(stats)
    }

    /// Fetch, normalize, classify and report one candidate, marking it in
    /// the ledger only after every step succeeded.
    async fn process_candidate(&mut self, summary: &SpectrumSummary) -> Result<()> {
        let spectrum = self
            .broker
            .get_spectrum(summary.id)
            .await
            .context("fetching spectrum detail")?;
        let samples = spectrum.samples()?;
        let features = normalize(&samples, &self.grid)?;
        let result = self.classifier.classify(&features)?;

        self.reporter
            .report(&spectrum, &result)
            .await
            .context("reporting result")?;
        self.ledger.add(summary.id)?;

        if let Some(best) = result.best() {
            info!(
                spectrum_id = spectrum.id,
                obj_id = %spectrum.obj_id,
                label = %best.label,
                probability = best.probability,
                "Spectrum classified"
            );
        }
        Ok(())
    }

    /// Number of identifiers recorded as processed.
    pub fn processed_count(&self) -> usize {
        self.ledger.len()
    }
}
