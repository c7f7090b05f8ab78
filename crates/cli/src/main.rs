//! Spectra listener results CLI
//!
//! A command-line tool for inspecting the listener's results log: listing
//! parsed entries and comparing the model's labels against the broker's
//! existing classifications.

mod output;
mod parse;
mod stats;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Spectra listener results CLI
#[derive(Parser)]
#[command(name = "spectra")]
#[command(author, version, about = "Inspect spectra-listener results logs", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Per-class agreement between model and broker classifications
    Accuracy {
        /// Path to the results log
        #[arg(long, default_value = "ml_results/ml_results.log")]
        log: PathBuf,
    },

    /// List parsed log entries
    Entries {
        /// Path to the results log
        #[arg(long, default_value = "ml_results/ml_results.log")]
        log: PathBuf,
    },
}

#[derive(Tabled, Serialize)]
struct AccuracyRow {
    #[tabled(rename = "Broker class")]
    broker_class: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Agreement")]
    agreement: String,
    #[tabled(rename = "Model labels seen")]
    model_labels: String,
}

#[derive(Tabled, Serialize)]
struct EntryRow {
    #[tabled(rename = "Object ID")]
    object_id: String,
    #[tabled(rename = "Spectrum ID")]
    spectrum_id: i64,
    #[tabled(rename = "TNS name")]
    tns_name: String,
    #[tabled(rename = "Broker best")]
    broker_best: String,
    #[tabled(rename = "Model label")]
    model_label: String,
}

fn show_accuracy(log: &PathBuf, format: output::OutputFormat) -> Result<()> {
    let entries = parse::parse_log_file(log)?;
    let class_stats = stats::compute_class_stats(&entries);

    match format {
        output::OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&class_stats)?);
        }
        output::OutputFormat::Table => {
            let rows: Vec<AccuracyRow> = class_stats
                .iter()
                .map(|s| AccuracyRow {
                    broker_class: s.broker_class.clone(),
                    samples: s.samples,
                    agreement: output::color_agreement(s.agreement_percent()),
                    model_labels: s.model_labels.join(", "),
                })
                .collect();
            output::print_table(&rows, format);

            let classified: usize = class_stats.iter().map(|s| s.samples).sum();
            output::print_info(&format!(
                "{} entries, {} with a broker classification",
                entries.len(),
                classified
            ));
        }
    }
    Ok(())
}

fn show_entries(log: &PathBuf, format: output::OutputFormat) -> Result<()> {
    let entries = parse::parse_log_file(log)?;
    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            object_id: e.object_id.clone(),
            spectrum_id: e.spectrum_id,
            tns_name: e.tns_name.clone().unwrap_or_else(|| "N/A".to_string()),
            broker_best: e.best_broker_label().unwrap_or("-").to_string(),
            model_label: e.model_label.clone(),
        })
        .collect();
    output::print_table(&rows, format);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Accuracy { log } => show_accuracy(log, cli.format)?,
        Commands::Entries { log } => show_entries(log, cli.format)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_log(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_accuracy_runs_on_real_log() {
        let log = write_log(
            "Object ID: ZTF25aaaaaaa\n\
             Spectrum ID: 42\n\
             TNS name: N/A\n\
             SkyPortal classifications: Ia (prob=90.000%) -\n\
             Model classification: Ia (prob=80.000%)\n\
             ----------------------------------------\n",
        );
        show_accuracy(&log.path().to_path_buf(), output::OutputFormat::Json).unwrap();
    }

    #[test]
    fn test_entries_runs_on_empty_log() {
        let log = write_log("");
        show_entries(&log.path().to_path_buf(), output::OutputFormat::Table).unwrap();
    }

    #[test]
    fn test_missing_log_is_an_error() {
        let path = PathBuf::from("/nonexistent/ml_results.log");
        assert!(show_accuracy(&path, output::OutputFormat::Table).is_err());
    }
}
