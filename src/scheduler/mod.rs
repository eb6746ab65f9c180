//! The batch scheduler: periodic discover → select → partition → lock → dispatch.
//!
//! Each tick first checks capacity. When every partition slot is taken the
//! tick is skipped without touching the filesystem. Otherwise a round is
//! claimed under the claim lock (discovery, shuffle, truncate, split, and
//! the read-only flip all happen before the lock is released) and each
//! partition is handed to its own tokio task.

pub mod partition;
pub mod slots;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use humansize::{format_size, BINARY};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::discovery::FileDiscovery;
use crate::error::{ProcessorError, Result};
use crate::model::candidate::CandidateFile;
use crate::pipeline::Pipeline;
use crate::sink::DocumentSink;

use partition::{available_parallelism, effective_capacity, select_round, split_round};
use slots::{PartitionSlots, SlotGuard};
use worker::{run_partition, PartitionReport, WorkerContext};

/// How a scheduler run behaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// One immediate tick, no renames, no locks.
    pub dry_run: bool,
    /// Run partitions on the scheduler task instead of spawning them.
    pub foreground: bool,
    /// Seed for the round shuffle.
    pub seed: Option<u64>,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every slot was taken; nothing was discovered.
    Saturated { running: usize, capacity: usize },
    /// Discovery found nothing to do.
    Idle,
    /// A round was claimed and dispatched; one entry per partition size.
    Dispatched { round: usize, partitions: Vec<usize> },
}

/// Totals over a whole scheduler run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub ticks: usize,
    pub saturated_ticks: usize,
    pub rounds: usize,
    pub partitions: usize,
    pub files_dispatched: usize,
    pub documents: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn record(&mut self, report: &PartitionReport) {
        self.documents += report.documents;
        self.skipped += report.skipped;
    }
}

/// Cooperative stop signal shared with the controller.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopHandle {
    /// Request a stop. No new rounds start; running partitions drain.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested.
    pub async fn wait(&self) {
        if self.is_stopped() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

/// The critical section around claiming a round: discovery, selection and
/// the read-only flip.
///
/// Anything else that renames or unlocks mail files while a scheduler is
/// running (requeue, an embedding host running its own discovery) shares the
/// scheduler's lock via [`Scheduler::with_claim_lock`] and holds it around
/// that work.
#[derive(Debug, Clone, Default)]
pub struct ClaimLock {
    inner: Arc<Mutex<()>>,
}

impl ClaimLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is free and hold it for the guard's lifetime.
    pub fn hold(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claimed round, ready for dispatch.
struct ClaimedRound {
    round: usize,
    bytes: u64,
    partitions: Vec<Vec<CandidateFile>>,
    guards: Vec<SlotGuard>,
}

/// Periodically claims rounds of email files and dispatches them.
pub struct Scheduler {
    config: watch::Receiver<Arc<Config>>,
    sink: Arc<dyn DocumentSink>,
    options: RunOptions,
    available: usize,
    slots: PartitionSlots,
    claim_lock: ClaimLock,
    stop: StopHandle,
    rng: StdRng,
    workers: JoinSet<PartitionReport>,
    next_partition: usize,
    summary: RunSummary,
}

impl Scheduler {
    pub fn new(
        config: watch::Receiver<Arc<Config>>,
        sink: Arc<dyn DocumentSink>,
        options: RunOptions,
    ) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            sink,
            options,
            available: available_parallelism(),
            slots: PartitionSlots::new(),
            claim_lock: ClaimLock::new(),
            stop: StopHandle::default(),
            rng,
            workers: JoinSet::new(),
            next_partition: 0,
            summary: RunSummary::default(),
        }
    }

    /// Override the number of logical processors used for capacity.
    pub fn with_available_parallelism(mut self, available: usize) -> Self {
        self.available = available.max(1);
        self
    }

    /// Share a claim lock with other code that touches the mail tree.
    pub fn with_claim_lock(mut self, claim_lock: ClaimLock) -> Self {
        self.claim_lock = claim_lock;
        self
    }

    pub fn claim_lock(&self) -> ClaimLock {
        self.claim_lock.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The running-partition counter. Holding slots from outside makes the
    /// scheduler see them as busy.
    pub fn slots(&self) -> PartitionSlots {
        self.slots.clone()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Tick until stopped, then drain running partitions.
    pub async fn run(mut self) -> RunSummary {
        info!(
            dry_run = self.options.dry_run,
            foreground = self.options.foreground,
            available = self.available,
            "Scheduler started"
        );
        loop {
            if !self.options.dry_run {
                let interval = self.current_config().search_interval();
                debug!(secs = interval.as_secs(), "Sleeping until next tick");
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = self.stop.wait() => {}
                }
            }
            if self.stop.is_stopped() {
                break;
            }
            self.reap_finished();
            match self.tick().await {
                Ok(outcome) => debug!(?outcome, "Tick finished"),
                Err(e) => error!(error = %e, "Tick failed"),
            }
            if self.options.dry_run {
                break;
            }
        }

        let running = self.workers.len();
        if running > 0 {
            info!(partitions = running, "Waiting for running partitions");
        }
        self.wait_for_workers().await;
        info!(
            ticks = self.summary.ticks,
            rounds = self.summary.rounds,
            documents = self.summary.documents,
            skipped = self.summary.skipped,
            "Scheduler stopped"
        );
        self.summary
    }

    /// Run one scheduling step.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        self.summary.ticks += 1;
        let config = self.current_config();
        let capacity = effective_capacity(
            config.processing.use_multithreading,
            config.processing.core_use,
            self.available,
        );
        let running = self.slots.running();
        if running >= capacity {
            warn!(running, capacity, "All partition slots busy, skipping this tick");
            self.summary.saturated_ticks += 1;
            return Ok(TickOutcome::Saturated { running, capacity });
        }

        let claimed = self.claim_round(&config, capacity).await?;
        if claimed.partitions.is_empty() {
            info!("No files to process");
            return Ok(TickOutcome::Idle);
        }

        let sizes: Vec<usize> = claimed.partitions.iter().map(Vec::len).collect();
        info!(
            files = claimed.round,
            size = %format_size(claimed.bytes, BINARY),
            partitions = sizes.len(),
            "Dispatching round"
        );
        self.summary.rounds += 1;
        self.summary.partitions += sizes.len();
        self.summary.files_dispatched += sizes.iter().sum::<usize>();

        let ctx = Arc::new(WorkerContext {
            pipeline: Arc::new(Pipeline::new(config.parser.clone())),
            sink: Arc::clone(&self.sink),
            timeout: config.file_timeout(),
            skip_policy: config.processing.skip_policy,
            dry_run: self.options.dry_run,
        });
        for (files, slot) in claimed.partitions.into_iter().zip(claimed.guards) {
            let id = self.next_partition;
            self.next_partition += 1;
            if self.options.foreground {
                let report = run_partition(id, files, Arc::clone(&ctx)).await;
                drop(slot);
                self.summary.record(&report);
            } else {
                let ctx = Arc::clone(&ctx);
                self.workers.spawn(async move {
                    let _slot = slot;
                    run_partition(id, files, ctx).await
                });
            }
        }

        Ok(TickOutcome::Dispatched {
            round: claimed.round,
            partitions: sizes,
        })
    }

    /// Wait for every spawned partition and fold its report into the summary.
    pub async fn wait_for_workers(&mut self) -> Vec<PartitionReport> {
        let mut reports = Vec::new();
        while let Some(joined) = self.workers.join_next().await {
            self.collect(joined, &mut reports);
        }
        reports
    }

    fn reap_finished(&mut self) {
        let mut reports = Vec::new();
        while let Some(joined) = self.workers.try_join_next() {
            self.collect(joined, &mut reports);
        }
        if !reports.is_empty() {
            debug!(partitions = reports.len(), "Reaped finished partitions");
        }
    }

    fn collect(
        &mut self,
        joined: std::result::Result<PartitionReport, tokio::task::JoinError>,
        reports: &mut Vec<PartitionReport>,
    ) {
        match joined {
            Ok(report) => {
                self.summary.record(&report);
                reports.push(report);
            }
            Err(e) => error!(error = %e, "Partition task failed"),
        }
    }

    /// Discover, select, split and lock a round while holding the claim lock.
    async fn claim_round(&mut self, config: &Config, capacity: usize) -> Result<ClaimedRound> {
        let discovery = FileDiscovery::new(config)?.with_dry_run(self.options.dry_run);
        let roots = config.search.directories.clone();
        let max_emails = config.processing.max_emails;
        let seed: u64 = self.rng.gen();
        let slots = self.slots.clone();
        let claim_lock = self.claim_lock.clone();
        let dry_run = self.options.dry_run;

        tokio::task::spawn_blocking(move || {
            let _claim = claim_lock.hold();
            let candidates = discovery.discover(&roots);
            let found = candidates.len();
            let round = select_round(candidates, max_emails, &mut StdRng::seed_from_u64(seed));
            debug!(found, selected = round.len(), "Selected round");

            let free = capacity.saturating_sub(slots.running());
            let mut partitions = split_round(round, free);
            if !dry_run {
                for files in &mut partitions {
                    lock_partition(files);
                }
                partitions.retain(|files| !files.is_empty());
            }

            let guards = slots.try_reserve(capacity, partitions.len());
            if guards.len() < partitions.len() {
                for files in partitions.drain(guards.len()..) {
                    if !dry_run {
                        unlock_partition(files);
                    }
                }
            }

            ClaimedRound {
                round: partitions.iter().map(Vec::len).sum(),
                bytes: partitions.iter().flatten().map(|f| f.size).sum(),
                partitions,
                guards,
            }
        })
        .await
        .map_err(|e| ProcessorError::Worker(e.to_string()))
    }

    fn current_config(&mut self) -> Arc<Config> {
        if self.config.has_changed().unwrap_or(false) {
            info!("Configuration changed, applying on this tick");
        }
        self.config.borrow_and_update().clone()
    }
}

/// Flip every file to read-only, dropping those that cannot be locked.
fn lock_partition(files: &mut Vec<CandidateFile>) {
    files.retain_mut(|file| match file.set_locked(true) {
        Ok(()) => true,
        Err(e) => {
            warn!(file = %file.path.display(), error = %e, "Cannot lock file, dropping it");
            false
        }
    });
}

fn unlock_partition(files: Vec<CandidateFile>) {
    for mut file in files {
        if let Err(e) = file.set_locked(false) {
            warn!(file = %file.path.display(), error = %e, "Cannot unlock file");
        }
    }
}
