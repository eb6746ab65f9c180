//! Pipeline output: parsed documents and skip records.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// A successfully parsed email file, ready for the indexing sink.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParsedEmailDocument {
    /// Hex SHA-256 of the raw file bytes.
    pub id: String,

    /// Path of the source file.
    pub source_path: PathBuf,

    /// Domain root directory name.
    pub domain: String,

    /// Mailbox directory name.
    pub mailbox: String,

    /// Raw file size in bytes.
    pub size: u64,

    /// The `Message-ID` header value, without angle brackets.
    pub message_id: Option<String>,

    /// Decoded subject line.
    pub subject: String,

    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,

    /// Parsed `Date:` header, if present and valid.
    pub date: Option<DateTime<Utc>>,

    /// The `In-Reply-To` message id, if present.
    pub in_reply_to: Option<String>,

    /// Message-IDs from the `References` header.
    pub references: Vec<String>,

    /// Raw header block (everything before the first blank line).
    pub raw_headers: String,

    /// Plain-text body (from `text/plain`, or stripped from HTML).
    pub body_text: Option<String>,

    /// Extracted attachments, in body-part order.
    pub attachments: Vec<Attachment>,

    /// When the pipeline produced this document.
    pub processed_at: DateTime<Utc>,
}

/// A file the pipeline could not turn into a document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SkipRecord {
    pub path: PathBuf,
    pub reason: String,
    pub skipped_at: DateTime<Utc>,
}

impl SkipRecord {
    pub fn new(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
            skipped_at: Utc::now(),
        }
    }
}

/// What the pipeline hands to the sink for each file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Document(Box<ParsedEmailDocument>),
    Skipped(SkipRecord),
}

impl ProcessOutcome {
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    /// Path of the file this outcome is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Document(doc) => &doc.source_path,
            Self::Skipped(skip) => &skip.path,
        }
    }
}
