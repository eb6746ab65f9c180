//! Integration tests for the batch scheduler: capacity gate, round selection,
//! partitioning, locking, and stop/drain.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use tokio::sync::watch;

use mailproc::config::Config;
use mailproc::error::Result;
use mailproc::model::candidate::{is_read_only, set_read_only};
use mailproc::model::document::ProcessOutcome;
use mailproc::scheduler::{ClaimLock, RunOptions, Scheduler, TickOutcome};
use mailproc::sink::{DocumentSink, MemorySink};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Build `<temp>/example.com/alice` with `count` pending copies of plain.eml.
fn mail_tree(count: usize) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.child("example.com");
    for i in 0..count {
        root.child("alice")
            .child(format!("{i:04}.noidx"))
            .write_file(&fixture("plain.eml"))
            .unwrap();
    }
    let root = root.path().to_path_buf();
    (temp, root)
}

fn config(root: &Path, max_emails: usize, core_use: i32) -> Config {
    let mut config = Config::default();
    config.search.directories = vec![root.to_path_buf()];
    config.processing.max_emails = max_emails;
    config.processing.core_use = core_use;
    config
}

fn scheduler(config: Config, sink: Arc<dyn DocumentSink>, available: usize) -> Scheduler {
    let (_tx, rx) = watch::channel(Arc::new(config));
    Scheduler::new(
        rx,
        sink,
        RunOptions {
            seed: Some(11),
            ..Default::default()
        },
    )
    .with_available_parallelism(available)
}

fn unlock_all(root: &Path) {
    for entry in std::fs::read_dir(root.join("alice")).unwrap() {
        set_read_only(&entry.unwrap().path(), false).unwrap();
    }
}

/// Records whether each file was read-only when its outcome arrived.
#[derive(Default)]
struct LockProbe {
    seen: Mutex<Vec<bool>>,
}

impl DocumentSink for LockProbe {
    fn accept(&self, outcome: &ProcessOutcome) -> Result<()> {
        let locked = is_read_only(outcome.path())?;
        self.seen.lock().unwrap().push(locked);
        Ok(())
    }
}

// ─── Example scenario: 3 files, capacity 2 → one partition ──────────

#[tokio::test]
async fn test_small_round_is_single_partition() {
    let (temp, root) = mail_tree(3);
    temp.child("example.com/alice/tiny.noidx")
        .write_binary(&[b'x'; 50])
        .unwrap();

    let sink = Arc::new(MemorySink::new());
    let mut scheduler = scheduler(config(&root, 10, 2), sink.clone(), 4);

    let outcome = scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            round: 3,
            partitions: vec![3]
        }
    );
    let reports = scheduler.wait_for_workers().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].documents, 3);
    assert_eq!(sink.documents(), 3);
    assert!(!is_read_only(&root.join("alice/tiny.noidx")).unwrap());

    unlock_all(&root);
}

// ─── Capacity gate: no discovery when every slot is busy ────────────

#[tokio::test]
async fn test_saturated_tick_does_not_discover() {
    let temp = TempDir::new().unwrap();
    let ready = temp.child("example.com/alice/1.eml");
    ready.write_file(&fixture("plain.eml")).unwrap();
    let root = temp.child("example.com").path().to_path_buf();

    let mut scheduler = scheduler(config(&root, 10, 2), Arc::new(MemorySink::new()), 4);
    let held = scheduler.slots().try_reserve(2, 2);
    assert_eq!(held.len(), 2);

    let outcome = scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Saturated {
            running: 2,
            capacity: 2
        }
    );
    ready.assert(predicate::path::exists());
    temp.child("example.com/alice/1.noidx")
        .assert(predicate::path::missing());

    drop(held);
    assert!(matches!(
        scheduler.tick().await.unwrap(),
        TickOutcome::Dispatched { round: 1, .. }
    ));
    scheduler.wait_for_workers().await;
    temp.child("example.com/alice/1.noidx")
        .assert(predicate::path::exists());

    unlock_all(&root);
}

// ─── Truncation and partition sizes on a large round ────────────────

#[tokio::test]
async fn test_large_round_is_truncated_and_split() {
    let (_temp, root) = mail_tree(150);
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = scheduler(config(&root, 123, 4), sink.clone(), 8);

    let outcome = scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            round: 123,
            partitions: vec![30, 30, 30, 33]
        }
    );
    scheduler.wait_for_workers().await;
    assert_eq!(sink.documents(), 123);

    let mut locked = 0;
    for entry in std::fs::read_dir(root.join("alice")).unwrap() {
        if is_read_only(&entry.unwrap().path()).unwrap() {
            locked += 1;
        }
    }
    assert_eq!(locked, 123, "exactly the round stays locked");

    // The next tick only sees the 27 files left over.
    assert_eq!(
        scheduler.tick().await.unwrap(),
        TickOutcome::Dispatched {
            round: 27,
            partitions: vec![27]
        }
    );
    scheduler.wait_for_workers().await;
    assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Idle);

    unlock_all(&root);
}

// ─── Files are locked before workers see them ───────────────────────

#[tokio::test]
async fn test_files_locked_before_dispatch() {
    let (_temp, root) = mail_tree(5);
    let probe = Arc::new(LockProbe::default());
    let mut scheduler = scheduler(config(&root, 10, 1), probe.clone(), 4);

    scheduler.tick().await.unwrap();
    scheduler.wait_for_workers().await;

    let seen = probe.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![true; 5]);

    unlock_all(&root);
}

// ─── Stop drains partitions that are already running ────────────────

#[tokio::test]
async fn test_stop_drains_running_partitions() {
    let (_temp, root) = mail_tree(4);
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = scheduler(config(&root, 10, 2), sink.clone(), 2);

    scheduler.tick().await.unwrap();
    let stop = scheduler.stop_handle();
    stop.stop();
    let summary = scheduler.run().await;

    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.files_dispatched, 4);
    assert_eq!(summary.documents, 4);
    assert_eq!(sink.documents(), 4);

    unlock_all(&root);
}

// ─── Dry run: one tick, nothing renamed or locked ───────────────────

#[tokio::test]
async fn test_dry_run_leaves_files_untouched() {
    let temp = TempDir::new().unwrap();
    let mailbox = temp.child("example.com/alice");
    mailbox.child("1.eml").write_file(&fixture("plain.eml")).unwrap();
    mailbox.child("2.noidx").write_file(&fixture("report.eml")).unwrap();
    let root = temp.child("example.com").path().to_path_buf();

    let sink = Arc::new(MemorySink::new());
    let (_tx, rx) = watch::channel(Arc::new(config(&root, 10, -1)));
    let scheduler = Scheduler::new(
        rx,
        sink.clone(),
        RunOptions {
            dry_run: true,
            ..Default::default()
        },
    );
    let summary = scheduler.run().await;

    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.documents, 2);
    mailbox.child("1.eml").assert(predicate::path::exists());
    mailbox.child("1.noidx").assert(predicate::path::missing());
    assert!(!is_read_only(mailbox.child("2.noidx").path()).unwrap());
}

// ─── Foreground mode runs partitions inline ─────────────────────────

#[tokio::test]
async fn test_foreground_tick_completes_inline() {
    let (_temp, root) = mail_tree(3);
    let sink = Arc::new(MemorySink::new());
    let (_tx, rx) = watch::channel(Arc::new(config(&root, 10, 2)));
    let mut scheduler = Scheduler::new(
        rx,
        sink.clone(),
        RunOptions {
            foreground: true,
            ..Default::default()
        },
    );

    scheduler.tick().await.unwrap();
    assert_eq!(sink.documents(), 3);
    assert_eq!(scheduler.slots().running(), 0);
    assert_eq!(scheduler.summary().documents, 3);

    unlock_all(&root);
}

// ─── A shared claim lock holds the tick back ────────────────────────

#[tokio::test]
async fn test_tick_waits_for_shared_claim_lock() {
    let temp = TempDir::new().unwrap();
    let ready = temp.child("example.com/alice/1.eml");
    ready.write_file(&fixture("plain.eml")).unwrap();
    let root = temp.child("example.com").path().to_path_buf();

    let claim_lock = ClaimLock::new();
    let mut scheduler = scheduler(config(&root, 10, 1), Arc::new(MemorySink::new()), 2)
        .with_claim_lock(claim_lock.clone());

    let held = claim_lock.hold();
    let tick = tokio::spawn(async move {
        let outcome = scheduler.tick().await.unwrap();
        scheduler.wait_for_workers().await;
        outcome
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!tick.is_finished());
    ready.assert(predicate::path::exists());

    drop(held);
    let outcome = tick.await.unwrap();
    assert!(matches!(outcome, TickOutcome::Dispatched { round: 1, .. }));
    temp.child("example.com/alice/1.noidx")
        .assert(predicate::path::exists());

    unlock_all(&root);
}
