//! Durable set of already-processed spectrum identifiers
//!
//! One flat append-only file per downstream action namespace, one decimal id
//! per line. The ledger is the only persisted state of the daemon: any id
//! present has been classified and reported at least once, so overlapping
//! poll windows and restarts never reprocess it.

use crate::error::ListenerError;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LEDGER_SUFFIX: &str = "processed_ids.txt";

pub struct ProcessedLedger {
    path: PathBuf,
    seen: HashSet<i64>,
}

impl ProcessedLedger {
    /// Open the ledger for `namespace` under `cache_dir`.
    ///
    /// A missing file is an empty ledger; an existing file that cannot be
    /// read or parsed is fatal, since running with unknown processed-state
    /// would double-report spectra.
    pub fn open(cache_dir: &Path, namespace: &str) -> Result<Self, ListenerError> {
        fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(format!("{namespace}_{LEDGER_SUFFIX}"));

        let seen = match fs::read_to_string(&path) {
            Ok(content) => parse_ids(&content).map_err(|detail| ListenerError::CorruptLedger {
                path: path.clone(),
                detail,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                return Err(ListenerError::CorruptLedger {
                    path,
                    detail: e.to_string(),
                })
            }
        };

        info!(path = %path.display(), entries = seen.len(), "Ledger loaded");
        Ok(Self { path, seen })
    }

    pub fn contains(&self, id: i64) -> bool {
        self.seen.contains(&id)
    }

    /// Record an identifier as processed. Idempotent: re-adding a present id
    /// touches neither memory nor disk. The append is a single write of one
    /// line followed by fsync, so a crash leaves the entry fully recorded or
    /// absent.
    pub fn add(&mut self, id: i64) -> Result<(), ListenerError> {
        if !self.seen.insert(id) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{id}\n").as_bytes())?;
        file.sync_all()?;

        debug!(id, path = %self.path.display(), "Ledger entry recorded");
        Ok(())
    }

    /// Drop every entry of this namespace, on disk and in memory.
    pub fn clear(&mut self) -> Result<(), ListenerError> {
        self.seen.clear();
        if self.path.exists() {
            fs::write(&self.path, b"")?;
        }
        info!(path = %self.path.display(), "Ledger cleared");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_ids(content: &str) -> Result<HashSet<i64>, String> {
    let mut seen = HashSet::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line
            .parse::<i64>()
            .map_err(|e| format!("line {}: {e}", lineno + 1))?;
        seen.insert(id);
    }
    Ok(seen)
}
