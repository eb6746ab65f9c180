//! Per-file parsing pipeline: read, parse, extract attachments, build a document.
//!
//! Failures never escape [`Pipeline::process`]; they become [`SkipRecord`]s so
//! the partition can move on to its next file.

pub mod attachments;
pub mod message;

use tracing::{debug, error};

use crate::config::ParserConfig;
use crate::error::{ProcessorError, Result};
use crate::model::candidate::CandidateFile;
use crate::model::document::{ParsedEmailDocument, ProcessOutcome, SkipRecord};

/// Parses candidate files into documents.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: ParserConfig,
}

impl Pipeline {
    pub fn new(options: ParserConfig) -> Self {
        Self { options }
    }

    /// Process one file, turning any failure into a skip record.
    pub fn process(&self, file: &CandidateFile) -> ProcessOutcome {
        match self.parse_file(file) {
            Ok(doc) => {
                debug!(
                    file = %file.path.display(),
                    attachments = doc.attachments.len(),
                    "Parsed message"
                );
                ProcessOutcome::Document(Box::new(doc))
            }
            Err(e) => {
                error!(file = %file.path.display(), error = %e, "Cannot parse email; skipping");
                ProcessOutcome::Skipped(SkipRecord::new(&file.path, e))
            }
        }
    }

    /// Read and parse one file.
    pub fn parse_file(&self, file: &CandidateFile) -> Result<ParsedEmailDocument> {
        let meta = std::fs::metadata(&file.path).map_err(|e| ProcessorError::io(&file.path, e))?;
        if meta.len() > self.options.max_message_size {
            return Err(ProcessorError::MessageTooLarge {
                path: file.path.clone(),
                size: meta.len(),
                limit: self.options.max_message_size,
            });
        }
        let raw = std::fs::read(&file.path).map_err(|e| ProcessorError::io(&file.path, e))?;
        message::parse_document(&raw, file, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_candidate(dir: &std::path::Path, name: &str, body: &[u8]) -> CandidateFile {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        CandidateFile::from_path(path).unwrap()
    }

    #[test]
    fn test_process_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_candidate(
            dir.path(),
            "ok.noidx",
            b"From: a@example.com\r\nSubject: Hello\r\n\r\nBody\r\n",
        );
        let outcome = Pipeline::default().process(&file);
        assert!(outcome.is_document());
        assert_eq!(outcome.path(), file.path.as_path());
    }

    #[test]
    fn test_missing_file_becomes_skip() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = write_candidate(dir.path(), "gone.noidx", b"x");
        std::fs::remove_file(&file.path).unwrap();
        file.size = 0;

        match Pipeline::default().process(&file) {
            ProcessOutcome::Skipped(skip) => {
                assert_eq!(skip.path, file.path);
                assert!(skip.reason.contains("I/O error"));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_oversize_file_becomes_skip() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_candidate(
            dir.path(),
            "big.noidx",
            b"From: a@example.com\r\nSubject: Hello\r\n\r\nBody\r\n",
        );
        let pipeline = Pipeline::new(ParserConfig {
            max_message_size: 10,
            ..ParserConfig::default()
        });
        assert!(matches!(
            pipeline.parse_file(&file),
            Err(ProcessorError::MessageTooLarge { limit: 10, .. })
        ));
        assert!(!pipeline.process(&file).is_document());
    }
}
