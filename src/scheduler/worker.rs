//! Partition workers: process one partition start to finish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SkipPolicy;
use crate::error::ProcessorError;
use crate::model::candidate::{set_read_only, CandidateFile};
use crate::model::document::{ProcessOutcome, SkipRecord};
use crate::pipeline::Pipeline;
use crate::sink::DocumentSink;

/// Everything a worker needs, shared by all partitions of a run.
pub struct WorkerContext {
    pub pipeline: Arc<Pipeline>,
    pub sink: Arc<dyn DocumentSink>,
    /// Per-file limit; `None` processes without a timeout.
    pub timeout: Option<Duration>,
    pub skip_policy: SkipPolicy,
    /// Files were not locked, so there is nothing to release.
    pub dry_run: bool,
}

/// What one partition did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionReport {
    pub id: usize,
    pub files: usize,
    pub documents: usize,
    pub skipped: usize,
    pub elapsed_ms: u64,
}

/// Process every file of a partition in order.
///
/// Never fails: per-file errors become skip records, sink errors are logged.
pub async fn run_partition(
    id: usize,
    files: Vec<CandidateFile>,
    ctx: Arc<WorkerContext>,
) -> PartitionReport {
    let start = Instant::now();
    let mut report = PartitionReport {
        id,
        files: files.len(),
        ..Default::default()
    };
    info!(partition = id, files = files.len(), "Partition started");

    for file in files {
        let outcome = process_one(&ctx, file).await;
        match &outcome {
            ProcessOutcome::Document(_) => report.documents += 1,
            ProcessOutcome::Skipped(_) => report.skipped += 1,
        }
        deliver(&ctx, id, outcome).await;
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        partition = id,
        documents = report.documents,
        skipped = report.skipped,
        elapsed_ms = report.elapsed_ms,
        "Partition finished"
    );
    report
}

/// Run the pipeline for one file on the blocking pool.
async fn process_one(ctx: &WorkerContext, file: CandidateFile) -> ProcessOutcome {
    let path = file.path.clone();
    let pipeline = Arc::clone(&ctx.pipeline);
    let task = tokio::task::spawn_blocking(move || pipeline.process(&file));

    let joined = match ctx.timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                // The blocking task keeps running detached; its result is dropped.
                let e = ProcessorError::Timeout {
                    path: path.clone(),
                    secs: limit.as_secs(),
                };
                warn!(file = %path.display(), error = %e, "Skipping file");
                return ProcessOutcome::Skipped(SkipRecord::new(path, e));
            }
        },
        None => task.await,
    };

    joined.unwrap_or_else(|join_err| {
        let e = ProcessorError::Worker(join_err.to_string());
        error!(file = %path.display(), error = %e, "Skipping file");
        ProcessOutcome::Skipped(SkipRecord::new(path, e))
    })
}

/// Hand an outcome to the sink on the blocking pool, releasing the file
/// first when it was skipped under [`SkipPolicy::Release`].
async fn deliver(ctx: &WorkerContext, partition: usize, outcome: ProcessOutcome) {
    let sink = Arc::clone(&ctx.sink);
    let release = !ctx.dry_run && ctx.skip_policy == SkipPolicy::Release;
    let handed = tokio::task::spawn_blocking(move || {
        if let (true, ProcessOutcome::Skipped(skip)) = (release, &outcome) {
            release_skipped(skip);
        }
        if let Err(e) = sink.accept(&outcome) {
            error!(partition, file = %outcome.path().display(), error = %e, "Sink rejected outcome");
        }
    })
    .await;
    if let Err(e) = handed {
        error!(partition, error = %e, "Sink hand-off failed");
    }
}

fn release_skipped(skip: &SkipRecord) {
    match set_read_only(&skip.path, false) {
        Ok(()) => debug!(file = %skip.path.display(), "Released skipped file"),
        Err(e) => warn!(file = %skip.path.display(), error = %e, "Cannot release skipped file"),
    }
}
