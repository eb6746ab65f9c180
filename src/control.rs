//! Operator commands: start, stop, reload configuration, requeue.
//!
//! The [`Controller`] owns the configuration store and at most one running
//! scheduler loop. Both the CLI subcommands and the interactive console go
//! through it.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConfigKey, ConfigStore, ConfigValue};
use crate::error::{ConfigError, ProcessorError, Result};
use crate::model::candidate::set_read_only;
use crate::model::document::SkipRecord;
use crate::scheduler::slots::PartitionSlots;
use crate::scheduler::{ClaimLock, RunOptions, RunSummary, Scheduler, StopHandle};
use crate::sink::{DocumentSink, LogSink};

/// Flags accepted by `start`.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub dry_run: bool,
    pub foreground: bool,
    /// Overrides `processing.core_use`.
    pub max_cores: Option<i32>,
    /// Overrides `processing.max_emails`.
    pub max_emails: Option<usize>,
    /// Seed for the round shuffle.
    pub seed: Option<u64>,
}

/// Which file `reload_config` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    Load,
    LoadDefaults,
}

/// Snapshot of the controller state.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub running: bool,
    pub stopping: bool,
    pub partitions: usize,
}

/// Result of a requeue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequeueReport {
    pub released: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

struct RunningLoop {
    stop: StopHandle,
    slots: PartitionSlots,
    handle: JoinHandle<RunSummary>,
}

/// Starts and stops the processing loop.
pub struct Controller {
    store: Arc<ConfigStore>,
    sink: Arc<dyn DocumentSink>,
    available: Option<usize>,
    claim_lock: ClaimLock,
    running: Mutex<Option<RunningLoop>>,
}

impl Controller {
    pub fn new(store: Arc<ConfigStore>, sink: Arc<dyn DocumentSink>) -> Self {
        Self {
            store,
            sink,
            available: None,
            claim_lock: ClaimLock::new(),
            running: Mutex::new(None),
        }
    }

    /// Override the logical processor count the scheduler sees.
    pub fn with_available_parallelism(mut self, available: usize) -> Self {
        self.available = Some(available);
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Start the scheduler loop on the current Tokio runtime.
    ///
    /// Fails if a loop is already running, an override is invalid, or none
    /// of the configured search directories exist.
    pub fn start(&self, options: StartOptions) -> Result<()> {
        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(ProcessorError::AlreadyRunning);
        }

        let mut config = (*self.store.snapshot()).clone();
        if let Some(cores) = options.max_cores {
            config.set(ConfigKey::CoreUse, ConfigValue::Int(i64::from(cores)))?;
        }
        if let Some(max) = options.max_emails {
            let max = i64::try_from(max).unwrap_or(i64::MAX);
            config.set(ConfigKey::MaxEmails, ConfigValue::Int(max))?;
        }
        config.validate()?;

        let roots = &config.search.directories;
        if !roots.iter().any(|root| root.is_dir()) {
            return Err(ProcessorError::NoSearchRoots(roots.clone()));
        }
        // Overrides only take effect once every check has passed.
        self.store.replace(config.clone())?;

        let sink: Arc<dyn DocumentSink> = if options.dry_run {
            Arc::new(LogSink)
        } else {
            Arc::clone(&self.sink)
        };
        let mut scheduler = Scheduler::new(
            self.store.subscribe(),
            sink,
            RunOptions {
                dry_run: options.dry_run,
                foreground: options.foreground,
                seed: options.seed,
            },
        )
        .with_claim_lock(self.claim_lock.clone());
        if let Some(available) = self.available {
            scheduler = scheduler.with_available_parallelism(available);
        }

        info!(
            dry_run = options.dry_run,
            foreground = options.foreground,
            roots = roots.len(),
            max_emails = config.processing.max_emails,
            core_use = config.processing.core_use,
            "Starting processing loop"
        );
        *running = Some(RunningLoop {
            stop: scheduler.stop_handle(),
            slots: scheduler.slots(),
            handle: tokio::spawn(scheduler.run()),
        });
        Ok(())
    }

    /// Ask the loop to stop. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        match self.lock_running().as_ref() {
            Some(run) if !run.handle.is_finished() => {
                info!("Stop requested, draining running partitions");
                run.stop.stop();
                true
            }
            _ => false,
        }
    }

    /// Wait for the loop to finish and return its summary.
    pub async fn join(&self) -> Result<Option<RunSummary>> {
        let Some(run) = self.lock_running().take() else {
            return Ok(None);
        };
        let summary = run
            .handle
            .await
            .map_err(|e| ProcessorError::Worker(e.to_string()))?;
        Ok(Some(summary))
    }

    pub fn is_running(&self) -> bool {
        self.lock_running()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    pub fn status(&self) -> Status {
        match self.lock_running().as_ref() {
            Some(run) if !run.handle.is_finished() => Status {
                running: true,
                stopping: run.stop.is_stopped(),
                partitions: run.slots.running(),
            },
            _ => Status {
                running: false,
                stopping: false,
                partitions: 0,
            },
        }
    }

    /// Re-read configuration. A running loop picks it up on its next tick.
    pub fn reload_config(&self, source: ReloadSource) -> std::result::Result<(), ConfigError> {
        match source {
            ReloadSource::Load => self.store.load(),
            ReloadSource::LoadDefaults => self.store.load_defaults(),
        }
    }

    /// Clear the read-only flag of every skipped file that still exists so
    /// the next discovery pass picks it up again.
    ///
    /// Runs on the blocking pool under the claim lock shared with the loop.
    pub async fn requeue(&self, records: Vec<SkipRecord>) -> Result<RequeueReport> {
        let claim_lock = self.claim_lock.clone();
        tokio::task::spawn_blocking(move || {
            let _claim = claim_lock.hold();
            requeue(&records)
        })
        .await
        .map_err(|e| ProcessorError::Worker(e.to_string()))
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// See [`Controller::requeue`].
pub fn requeue(records: &[SkipRecord]) -> RequeueReport {
    let paths: BTreeSet<&PathBuf> = records.iter().map(|r| &r.path).collect();
    let mut report = RequeueReport::default();
    for path in paths {
        if !path.is_file() {
            report.missing.push(path.clone());
            continue;
        }
        match set_read_only(path, false) {
            Ok(()) => report.released.push(path.clone()),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Cannot requeue file");
                report.failed.push(path.clone());
            }
        }
    }
    info!(
        released = report.released.len(),
        missing = report.missing.len(),
        failed = report.failed.len(),
        "Requeue finished"
    );
    report
}
