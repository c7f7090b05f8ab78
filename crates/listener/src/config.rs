//! Listener configuration
//!
//! Typed configuration built from the command line once at startup. All
//! validation happens here so the rest of the daemon can rely on the values.

use crate::Cli;
use anyhow::{bail, Result};
use chrono::TimeDelta;
use listener_lib::monitor::MonitorConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub broker_url: String,
    pub token: String,
    pub poll_interval: Duration,
    pub lookback: TimeDelta,
    pub instrument_ids: Vec<i64>,
    pub model_path: PathBuf,
    pub cache_dir: PathBuf,
    pub results_dir: PathBuf,
    pub publish_to_broker: bool,
    pub clear_cache_on_start: bool,
}

impl ListenerConfig {
    /// Build and validate the configuration from parsed flags.
    pub fn from_cli(cli: &Cli, token: String) -> Result<Self> {
        if cli.instance.trim().is_empty() {
            bail!("broker instance URL must not be empty");
        }
        if cli.lookback < 0 {
            bail!("lookback must be a non-negative number of days");
        }
        if cli.instruments.is_empty() {
            bail!("at least one instrument ID is required");
        }

        Ok(Self {
            broker_url: cli.instance.clone(),
            token,
            poll_interval: Duration::from_secs(cli.interval),
            lookback: TimeDelta::days(cli.lookback),
            instrument_ids: cli.instruments.clone(),
            model_path: cli.model.clone(),
            cache_dir: cli.cache_dir.clone(),
            results_dir: cli.results_dir.clone(),
            publish_to_broker: cli.publish,
            clear_cache_on_start: cli.clear_cache,
        })
    }

    /// The poll-loop slice of this configuration.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            instrument_ids: self.instrument_ids.clone(),
            poll_interval: self.poll_interval,
            lookback: self.lookback,
            ..MonitorConfig::default()
        }
    }
}
