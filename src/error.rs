//! Centralized error types for mailproc.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailproc library.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// None of the configured search roots exist on disk.
    #[error("None of the configured search directories exist: {0:?}")]
    NoSearchRoots(Vec<PathBuf>),

    /// A ready file could not be renamed because the pending name is taken.
    #[error("Cannot rename '{from}' to '{to}': target already exists")]
    RenameCollision { from: PathBuf, to: PathBuf },

    /// Stripping the ready suffix leaves nothing of the file name.
    #[error("Cannot derive a pending name for '{0}'")]
    InvalidFileName(PathBuf),

    /// The file could not be parsed as a mail message.
    #[error("Parse error in '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The file exceeds the configured maximum message size.
    #[error("'{path}' is {size} bytes, above the {limit} byte limit")]
    MessageTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Processing a single file took longer than the configured timeout.
    #[error("Timed out after {secs}s processing '{path}'")]
    Timeout { path: PathBuf, secs: u64 },

    /// The document sink rejected an outcome.
    #[error("Sink error: {0}")]
    Sink(String),

    /// A blocking worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Worker(String),

    /// The scheduler is already running.
    #[error("Processing loop is already running")]
    AlreadyRunning,

    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from the configuration provider.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The key is not one of the recognized configuration keys.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// The key exists but holds a different type than requested.
    #[error("Configuration key '{key}' is a {found}, not a {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The value is syntactically fine but semantically unusable.
    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The configuration file could not be read or written.
    #[error("Cannot access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Cannot parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Convenience alias for `Result<T, ProcessorError>`.
pub type Result<T> = std::result::Result<T, ProcessorError>;

impl ProcessorError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl ConfigError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
