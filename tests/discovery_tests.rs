//! Integration tests for file discovery over domain/mailbox trees.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use mailproc::config::Config;
use mailproc::discovery::FileDiscovery;
use mailproc::model::candidate::{is_read_only, set_read_only};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.search.directories = vec![root.to_path_buf()];
    config
}

fn sorted_paths(discovery: &FileDiscovery, root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = discovery
        .discover(&[root.to_path_buf()])
        .into_iter()
        .map(|c| c.path)
        .collect();
    paths.sort();
    paths
}

// ─── Example scenario: 3 eligible files and one tiny file ───────────

#[test]
fn test_example_scenario() {
    let temp = TempDir::new().unwrap();
    let root = temp.child("example.com");
    let mailbox = root.child("alice");
    mailbox.child("1.noidx").write_file(&fixture("plain.eml")).unwrap();
    mailbox.child("2.eml").write_file(&fixture("plain.eml")).unwrap();
    mailbox.child("3.noidx").write_file(&fixture("report.eml")).unwrap();
    mailbox.child("tiny.noidx").write_binary(&[b'x'; 50]).unwrap();

    let discovery = FileDiscovery::new(&Config::default()).unwrap();
    let found = discovery.discover(&[root.path().to_path_buf()]);

    let names: Vec<String> = found.iter().map(|c| c.file_name()).collect();
    assert_eq!(names, vec!["1.noidx", "2.noidx", "3.noidx"]);
    assert!(found.iter().all(|c| c.domain == "example.com" && c.mailbox == "alice"));
    assert_eq!(found.iter().filter(|c| c.was_ready).count(), 1);

    mailbox.child("2.eml").assert(predicate::path::missing());
    mailbox.child("2.noidx").assert(predicate::path::exists());
    mailbox.child("tiny.noidx").assert(predicate::path::exists());
}

// ─── Discovery is idempotent once ready files are claimed ───────────

#[test]
fn test_discovery_idempotent() {
    let temp = TempDir::new().unwrap();
    let root = temp.child("mail.example.org");
    for (mailbox, name) in [("bob", "a.eml"), ("bob", "b.noidx"), ("carol", "c.eml")] {
        root.child(mailbox)
            .child(name)
            .write_file(&fixture("plain.eml"))
            .unwrap();
    }

    let discovery = FileDiscovery::new(&config_for(root.path())).unwrap();
    let first = sorted_paths(&discovery, root.path());
    let second = sorted_paths(&discovery, root.path());
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert!(first
        .iter()
        .all(|p| p.extension().is_some_and(|ext| ext == "noidx")));
}

// ─── A ready file is renamed exactly once ───────────────────────────

#[test]
fn test_ready_file_renamed_once() {
    let temp = TempDir::new().unwrap();
    let mailbox = temp.child("example.com").child("dave");
    mailbox.child("msg .eml").write_file(&fixture("plain.eml")).unwrap();

    let discovery = FileDiscovery::new(&Config::default()).unwrap();
    let found = discovery.discover(&[temp.child("example.com").path().to_path_buf()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, mailbox.child("msg.noidx").path().to_path_buf());

    let again = discovery.discover(&[temp.child("example.com").path().to_path_buf()]);
    assert_eq!(again.len(), 1);
    assert!(!again[0].was_ready);
}

// ─── Rename collision leaves both files alone ───────────────────────

#[test]
fn test_rename_collision_excludes_ready_file() {
    let temp = TempDir::new().unwrap();
    let mailbox = temp.child("example.com").child("erin");
    mailbox.child("42.eml").write_file(&fixture("plain.eml")).unwrap();
    mailbox.child("42.noidx").write_file(&fixture("report.eml")).unwrap();

    let discovery = FileDiscovery::new(&Config::default()).unwrap();
    let found = discovery.discover(&[temp.child("example.com").path().to_path_buf()]);

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_name(), "42.noidx");
    mailbox.child("42.eml").assert(predicate::path::exists());
}

// ─── Locked (read-only) files are invisible ─────────────────────────

#[test]
fn test_read_only_files_are_skipped() {
    let temp = TempDir::new().unwrap();
    let mailbox = temp.child("example.com").child("frank");
    mailbox.child("open.noidx").write_file(&fixture("plain.eml")).unwrap();
    mailbox.child("locked.noidx").write_file(&fixture("plain.eml")).unwrap();
    set_read_only(mailbox.child("locked.noidx").path(), true).unwrap();

    let discovery = FileDiscovery::new(&Config::default()).unwrap();
    let found = discovery.discover(&[temp.child("example.com").path().to_path_buf()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_name(), "open.noidx");
    assert!(is_read_only(mailbox.child("locked.noidx").path()).unwrap());

    // Let the temp dir clean up.
    set_read_only(mailbox.child("locked.noidx").path(), false).unwrap();
}

// ─── Files outside mailboxes are ignored ────────────────────────────

#[test]
fn test_files_directly_under_root_are_ignored() {
    let temp = TempDir::new().unwrap();
    let root = temp.child("example.com");
    root.child("stray.noidx").write_file(&fixture("plain.eml")).unwrap();
    root.child("grace").child("1.noidx").write_file(&fixture("plain.eml")).unwrap();

    let discovery = FileDiscovery::new(&Config::default()).unwrap();
    let found = discovery.discover(&[root.path().to_path_buf()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].mailbox, "grace");
}
