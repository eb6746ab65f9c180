//! Integration tests for the parsing pipeline, partition workers, and sinks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use mailproc::config::{ParserConfig, SkipPolicy};
use mailproc::control::requeue;
use mailproc::model::candidate::{is_read_only, CandidateFile};
use mailproc::model::document::ProcessOutcome;
use mailproc::pipeline::Pipeline;
use mailproc::scheduler::worker::{run_partition, WorkerContext};
use mailproc::sink::{read_skip_records, JsonLinesSink, MemorySink};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn context(sink: Arc<dyn mailproc::sink::DocumentSink>, policy: SkipPolicy) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        pipeline: Arc::new(Pipeline::new(ParserConfig::default())),
        sink,
        timeout: None,
        skip_policy: policy,
        dry_run: false,
    })
}

/// Copy fixtures into a mailbox and lock them the way the scheduler does.
fn locked_partition(temp: &TempDir, files: &[(&str, Option<&str>)]) -> Vec<CandidateFile> {
    let mailbox = temp.child("example.com").child("alice");
    files
        .iter()
        .map(|(name, source)| {
            let child = mailbox.child(*name);
            match source {
                Some(source) => child.write_file(&fixture(source)).unwrap(),
                None => child.write_binary(&[0u8; 512]).unwrap(),
            }
            let mut file = CandidateFile::from_path(child.path()).unwrap();
            file.set_locked(true).unwrap();
            file
        })
        .collect()
}

// ─── One bad file does not stop its partition ───────────────────────

#[tokio::test]
async fn test_parse_failure_is_isolated() {
    let temp = TempDir::new().unwrap();
    let files = locked_partition(
        &temp,
        &[
            ("1.noidx", Some("plain.eml")),
            ("2.noidx", None),
            ("3.noidx", Some("report.eml")),
            ("4.noidx", Some("plain.eml")),
        ],
    );

    let sink = Arc::new(MemorySink::new());
    let report = run_partition(0, files, context(sink.clone(), SkipPolicy::KeepLocked)).await;
    assert_eq!(report.documents, 3);
    assert_eq!(report.skipped, 1);

    let outcomes = sink.outcomes();
    let kinds: Vec<bool> = outcomes.iter().map(ProcessOutcome::is_document).collect();
    assert_eq!(kinds, vec![true, false, true, true]);
    assert!(outcomes[1].path().ends_with("2.noidx"));

    // Keep-locked leaves the failed file read-only.
    assert!(is_read_only(outcomes[1].path()).unwrap());
}

// ─── Documents carry metadata and attachments ───────────────────────

#[test]
fn test_document_from_report_fixture() {
    let temp = TempDir::new().unwrap();
    let files = locked_partition(&temp, &[("report.noidx", Some("report.eml"))]);

    let doc = match Pipeline::default().process(&files[0]) {
        ProcessOutcome::Document(doc) => doc,
        ProcessOutcome::Skipped(skip) => panic!("unexpected skip: {}", skip.reason),
    };
    assert_eq!(doc.domain, "example.com");
    assert_eq!(doc.mailbox, "alice");
    assert_eq!(doc.subject, "Monthly report");
    assert_eq!(doc.message_id.as_deref(), Some("report-2024-09@example.com"));
    assert_eq!(doc.from[0].address, "reports@example.com");
    assert!(doc
        .body_text
        .as_deref()
        .is_some_and(|body| body.contains("September report")));

    let names: Vec<&str> = doc.attachments.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["september.csv", "raw.bin"]);
    assert!(!doc.attachments[0].is_binary);
    assert!(doc.attachments[1].is_binary);
    assert_eq!(doc.attachments[1].size, 10);
}

// ─── Skips written to the JSON Lines sink can be requeued ───────────

#[tokio::test]
async fn test_skip_records_round_trip_through_requeue() {
    let temp = TempDir::new().unwrap();
    let files = locked_partition(
        &temp,
        &[("good.noidx", Some("plain.eml")), ("bad.noidx", None)],
    );
    let sink_path = temp.child("out").child("documents.jsonl");
    let sink = Arc::new(JsonLinesSink::open(sink_path.path()).unwrap());

    let report = run_partition(7, files, context(sink, SkipPolicy::KeepLocked)).await;
    assert_eq!(report.skipped, 1);

    let skips = read_skip_records(sink_path.path()).unwrap();
    assert_eq!(skips.len(), 1);
    assert!(skips[0].path.ends_with("bad.noidx"));
    assert!(is_read_only(&skips[0].path).unwrap());

    let requeued = requeue(&skips);
    assert_eq!(requeued.released.len(), 1);
    assert!(!is_read_only(&skips[0].path).unwrap());

    let good = temp.child("example.com/alice/good.noidx");
    assert!(is_read_only(good.path()).unwrap());
}

// ─── Release policy unlocks failures immediately ────────────────────

#[tokio::test]
async fn test_release_policy_unlocks_failed_file() {
    let temp = TempDir::new().unwrap();
    let files = locked_partition(
        &temp,
        &[("good.noidx", Some("plain.eml")), ("bad.noidx", None)],
    );

    let sink = Arc::new(MemorySink::new());
    run_partition(1, files, context(sink, SkipPolicy::Release)).await;

    let mailbox = temp.child("example.com/alice");
    assert!(is_read_only(mailbox.child("good.noidx").path()).unwrap());
    assert!(!is_read_only(mailbox.child("bad.noidx").path()).unwrap());
}

// ─── Oversized files are skipped without parsing ────────────────────

#[test]
fn test_oversized_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    let files = locked_partition(&temp, &[("big.noidx", Some("report.eml"))]);
    let pipeline = Pipeline::new(ParserConfig {
        max_message_size: 200,
        ..ParserConfig::default()
    });
    match pipeline.process(&files[0]) {
        ProcessOutcome::Skipped(skip) => assert!(skip.reason.contains("byte limit")),
        ProcessOutcome::Document(_) => panic!("oversized file was parsed"),
    }
}
