//! Files found by discovery.

use std::path::{Path, PathBuf};

use crate::error::{ProcessorError, Result};

/// Smallest file size (exclusive) that can hold a meaningful message.
pub const MIN_CANDIDATE_SIZE: u64 = 128;

/// An email file eligible for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Current path (after any ready → pending rename).
    pub path: PathBuf,

    /// Size in bytes at discovery time.
    pub size: u64,

    /// `true` if the file carried the ready suffix and was renamed during discovery.
    pub was_ready: bool,

    /// Read-only flag as last observed or set by this process.
    pub read_only: bool,

    /// Name of the domain root directory the file was found under.
    pub domain: String,

    /// Name of the mailbox directory the file was found in.
    pub mailbox: String,
}

impl CandidateFile {
    /// Build a candidate from an existing path, reading its metadata.
    ///
    /// Domain and mailbox are taken from the two parent directories.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| ProcessorError::io(&path, e))?;
        let mailbox_dir = path.parent();
        let mailbox = dir_name(mailbox_dir);
        let domain = dir_name(mailbox_dir.and_then(Path::parent));
        Ok(Self {
            size: meta.len(),
            read_only: meta.permissions().readonly(),
            was_ready: false,
            path,
            domain,
            mailbox,
        })
    }

    /// File name as a lossy string.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Flip the read-only flag on disk. Locked files are invisible to discovery.
    pub fn set_locked(&mut self, locked: bool) -> Result<()> {
        set_read_only(&self.path, locked)?;
        self.read_only = locked;
        Ok(())
    }
}

/// Set or clear the read-only attribute of a file.
///
/// On Unix locking clears every write bit and unlocking restores only the
/// owner write bit, so group and other permissions never widen.
pub fn set_read_only(path: &Path, read_only: bool) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|e| ProcessorError::io(path, e))?;
    let mut perms = meta.permissions();
    if perms.readonly() == read_only {
        return Ok(());
    }
    apply_read_only(&mut perms, read_only);
    std::fs::set_permissions(path, perms).map_err(|e| ProcessorError::io(path, e))
}

#[cfg(unix)]
fn apply_read_only(perms: &mut std::fs::Permissions, read_only: bool) {
    use std::os::unix::fs::PermissionsExt;

    let mode = perms.mode();
    perms.set_mode(if read_only { mode & !0o222 } else { mode | 0o200 });
}

#[cfg(not(unix))]
fn apply_read_only(perms: &mut std::fs::Permissions, read_only: bool) {
    perms.set_readonly(read_only);
}

/// Read the read-only attribute of a file.
pub fn is_read_only(path: &Path) -> Result<bool> {
    let meta = std::fs::metadata(path).map_err(|e| ProcessorError::io(path, e))?;
    Ok(meta.permissions().readonly())
}

fn dir_name(dir: Option<&Path>) -> String {
    dir.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_reads_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = dir.path().join("example.com").join("alice");
        std::fs::create_dir_all(&mailbox).unwrap();
        let file = mailbox.join("1.noidx");
        std::fs::write(&file, vec![b'x'; 200]).unwrap();

        let candidate = CandidateFile::from_path(&file).unwrap();
        assert_eq!(candidate.size, 200);
        assert_eq!(candidate.domain, "example.com");
        assert_eq!(candidate.mailbox, "alice");
        assert_eq!(candidate.file_name(), "1.noidx");
        assert!(!candidate.read_only);
    }

    #[test]
    fn test_lock_and_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("msg.noidx");
        std::fs::write(&file, b"data").unwrap();

        let mut candidate = CandidateFile::from_path(&file).unwrap();
        candidate.set_locked(true).unwrap();
        assert!(candidate.read_only);
        assert!(is_read_only(&file).unwrap());

        candidate.set_locked(false).unwrap();
        assert!(!is_read_only(&file).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_round_trip_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        for original in [0o600, 0o640, 0o644] {
            let file = dir.path().join(format!("{original:o}.noidx"));
            std::fs::write(&file, b"data").unwrap();
            std::fs::set_permissions(&file, std::fs::Permissions::from_mode(original)).unwrap();
            let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;

            set_read_only(&file, true).unwrap();
            assert_eq!(mode(&file), original & !0o222);
            set_read_only(&file, false).unwrap();
            assert_eq!(mode(&file), original, "mode changed for {original:o}");
        }
    }
}
