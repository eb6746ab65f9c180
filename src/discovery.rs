//! File discovery: walks domain roots and mailboxes for eligible email files.
//!
//! Layout: `<root>/<mailbox>/<file>`. The root directory name must match the
//! domain pattern and the mailbox name the username pattern. A file is
//! eligible when it is a regular file larger than [`MIN_CANDIDATE_SIZE`], is
//! not read-only, and has a non-blank name.
//!
//! Files ending in the ready suffix are renamed to the pending suffix as they
//! are discovered. Nothing here serializes concurrent passes: a caller that
//! runs discovery next to a [`Scheduler`](crate::scheduler::Scheduler) holds
//! the shared [`ClaimLock`](crate::scheduler::ClaimLock) around the call.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::DirEntry;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{compile_pattern, Config, ConfigKey};
use crate::error::{ConfigError, ProcessorError, Result};
use crate::model::candidate::{CandidateFile, MIN_CANDIDATE_SIZE};

/// Scans search roots for candidate files.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    domain_pattern: Regex,
    username_pattern: Regex,
    ready_suffix: String,
    pending_suffix: String,
    dry_run: bool,
}

impl FileDiscovery {
    /// Compile the patterns and suffixes from a configuration snapshot.
    pub fn new(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            domain_pattern: compile_pattern(ConfigKey::DomainPattern, &config.search.domain_pattern)?,
            username_pattern: compile_pattern(
                ConfigKey::UsernamePattern,
                &config.search.username_pattern,
            )?,
            ready_suffix: config.files.ready_suffix.clone(),
            pending_suffix: config.files.pending_suffix.clone(),
            dry_run: false,
        })
    }

    /// In dry-run mode ready files are logged with their pending name but
    /// nothing on disk is renamed.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Return the eligible files under `roots`, in root → mailbox → name order.
    pub fn discover(&self, roots: &[PathBuf]) -> Vec<CandidateFile> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();

        for root in self.valid_roots(roots) {
            self.scan_root(root, &mut found, &mut seen);
        }

        info!(count = found.len(), "Discovery finished");
        found
    }

    /// Drop missing roots (warning once per root), roots whose name does not
    /// match the domain pattern, and duplicates.
    fn valid_roots<'a>(&self, roots: &'a [PathBuf]) -> Vec<&'a Path> {
        let mut reported = HashSet::new();
        let mut unique = HashSet::new();
        let mut valid = Vec::new();

        for root in roots {
            if !root.is_dir() {
                if reported.insert(root) {
                    warn!(dir = %root.display(), "Ignoring search directory; it does not exist");
                }
                continue;
            }
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| root.to_string_lossy());
            if !self.domain_pattern.is_match(&name) {
                debug!(dir = %root.display(), "Ignoring search directory; name is not a domain");
                continue;
            }
            if unique.insert(root) {
                valid.push(root.as_path());
            }
        }
        valid
    }

    fn scan_root(&self, root: &Path, found: &mut Vec<CandidateFile>, seen: &mut HashSet<PathBuf>) {
        info!(dir = %root.display(), "Scanning domain directory");
        let domain = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let entries = match sorted_entries(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %root.display(), error = %e, "Cannot read domain directory");
                return;
            }
        };

        let mailboxes: Vec<DirEntry> = entries
            .into_iter()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| self.username_pattern.is_match(&e.file_name().to_string_lossy()))
            .collect();
        debug!(dir = %root.display(), mailboxes = mailboxes.len(), "Found mailboxes");

        for mailbox in mailboxes {
            self.scan_mailbox(&mailbox.path(), &domain, found, seen);
        }
    }

    fn scan_mailbox(
        &self,
        dir: &Path,
        domain: &str,
        found: &mut Vec<CandidateFile>,
        seen: &mut HashSet<PathBuf>,
    ) {
        let mailbox = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entries = match sorted_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read mailbox directory");
                return;
            }
        };

        let before = found.len();
        for entry in entries {
            let Some(size) = eligible_size(&entry) else {
                continue;
            };
            let original = entry.path();
            let (path, was_ready) = match self.claim(&original) {
                Ok(Some(renamed)) => (renamed, true),
                Ok(None) => (original, false),
                Err(e) => {
                    warn!(file = %original.display(), error = %e, "Excluding file");
                    continue;
                }
            };
            if seen.insert(path.clone()) {
                found.push(CandidateFile {
                    path,
                    size,
                    was_ready,
                    read_only: false,
                    domain: domain.to_string(),
                    mailbox: mailbox.clone(),
                });
            }
        }
        debug!(
            mailbox = %dir.display(),
            files = found.len() - before,
            "Scanned mailbox"
        );
    }

    /// Rename a ready file to its pending name.
    ///
    /// Returns the path to process from now on, or `None` if the file does
    /// not carry the ready suffix. In dry-run mode that is the original path.
    fn claim(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(name) = path.file_name() else {
            return Ok(None);
        };
        if !name.as_encoded_bytes().ends_with(self.ready_suffix.as_bytes()) {
            return Ok(None);
        }
        let Some(pending) = pending_name(name, &self.ready_suffix, &self.pending_suffix) else {
            return Err(ProcessorError::InvalidFileName(path.to_path_buf()));
        };
        let target = path.with_file_name(pending);
        if target.exists() {
            return Err(ProcessorError::RenameCollision {
                from: path.to_path_buf(),
                to: target,
            });
        }
        if self.dry_run {
            info!(from = %path.display(), to = %target.display(), "Dry run: would claim ready file");
            return Ok(Some(path.to_path_buf()));
        }
        std::fs::rename(path, &target).map_err(|e| ProcessorError::io(path, e))?;
        debug!(from = %path.display(), to = %target.display(), "Claimed ready file");
        Ok(Some(target))
    }
}

/// Compute the pending name for a ready file name.
///
/// The ready suffix is stripped, trailing dots and whitespace are trimmed,
/// and the pending suffix is appended. Bytes before the suffix are kept as
/// they are. Returns `None` if nothing is left of the name.
pub fn pending_name(
    file_name: &OsStr,
    ready_suffix: &str,
    pending_suffix: &str,
) -> Option<OsString> {
    let stem = file_name
        .as_encoded_bytes()
        .strip_suffix(ready_suffix.as_bytes())?;
    let keep = stem
        .iter()
        .rposition(|&b| !(b == b'.' || b.is_ascii_whitespace()))
        .map_or(0, |last| last + 1);
    if keep == 0 {
        return None;
    }
    let mut pending = os_string_from_bytes(&stem[..keep])?;
    pending.push(pending_suffix);
    Some(pending)
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: &[u8]) -> Option<OsString> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(bytes).to_os_string())
}

/// Names that are not valid UTF-8 are left alone off Unix.
#[cfg(not(unix))]
fn os_string_from_bytes(bytes: &[u8]) -> Option<OsString> {
    std::str::from_utf8(bytes).ok().map(OsString::from)
}

/// Size of the entry if it is an eligible candidate file.
fn eligible_size(entry: &DirEntry) -> Option<u64> {
    if entry.file_name().to_string_lossy().trim().is_empty() {
        return None;
    }
    let meta = entry.metadata().ok()?;
    if !meta.is_file() || meta.len() <= MIN_CANDIDATE_SIZE || meta.permissions().readonly() {
        return None;
    }
    Some(meta.len())
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<DirEntry>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}
