//! Document sinks: where parsed documents and skip records go.
//!
//! The indexer that ultimately consumes documents lives outside this crate.
//! [`JsonLinesSink`] hands them over as one JSON object per line; the same
//! file doubles as the skip log read back by `requeue`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::error::{ProcessorError, Result};
use crate::model::document::{ProcessOutcome, SkipRecord};

/// Receives every outcome the pipeline produces.
pub trait DocumentSink: Send + Sync {
    fn accept(&self, outcome: &ProcessOutcome) -> Result<()>;
}

/// Appends outcomes to a JSON Lines file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<LineWriter<File>>,
}

impl JsonLinesSink {
    /// Open (or create) the sink file in append mode.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProcessorError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ProcessorError::io(&path, e))?;
        info!(path = %path.display(), "Writing documents");
        Ok(Self {
            path,
            writer: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSink for JsonLinesSink {
    fn accept(&self, outcome: &ProcessOutcome) -> Result<()> {
        let mut line =
            serde_json::to_vec(outcome).map_err(|e| ProcessorError::Sink(e.to_string()))?;
        line.push(b'\n');
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer
            .write_all(&line)
            .map_err(|e| ProcessorError::io(&self.path, e))
    }
}

/// Logs outcomes without storing them. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl DocumentSink for LogSink {
    fn accept(&self, outcome: &ProcessOutcome) -> Result<()> {
        match outcome {
            ProcessOutcome::Document(doc) => info!(
                file = %doc.source_path.display(),
                subject = %doc.subject,
                attachments = doc.attachments.len(),
                "Document"
            ),
            ProcessOutcome::Skipped(skip) => info!(
                file = %skip.path.display(),
                reason = %skip.reason,
                "Skipped"
            ),
        }
        Ok(())
    }
}

/// Keeps outcomes in memory, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<ProcessOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far.
    pub fn outcomes(&self) -> Vec<ProcessOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn documents(&self) -> usize {
        self.outcomes().iter().filter(|o| o.is_document()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes().iter().filter(|o| !o.is_document()).count()
    }
}

impl DocumentSink for MemorySink {
    fn accept(&self, outcome: &ProcessOutcome) -> Result<()> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }
}

/// Read the skip records back out of a JSON Lines sink file.
///
/// Lines that are not valid outcomes are logged and ignored.
pub fn read_skip_records(path: &Path) -> Result<Vec<SkipRecord>> {
    let file = File::open(path).map_err(|e| ProcessorError::io(path, e))?;
    let mut skips = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ProcessorError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ProcessOutcome>(&line) {
            Ok(ProcessOutcome::Skipped(skip)) => skips.push(skip),
            Ok(ProcessOutcome::Document(_)) => {}
            Err(e) => warn!(
                path = %path.display(),
                line = number + 1,
                error = %e,
                "Ignoring malformed sink line"
            ),
        }
    }
    Ok(skips)
}
