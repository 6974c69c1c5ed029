//! Reaper manager: registration surface plus the cancellable cycle worker.
//!
//! One manager owns one worker thread. The cycle body runs the tree walker
//! over every (volume, folder rule) in registration order, then the space
//! evictor over every volume, then blocks on the cancel channel with the
//! trigger interval as timeout — that `recv_timeout` is the only suspension
//! point, so cancellation never interrupts an in-flight pass. A panic inside
//! the pass body is caught, reported as a `Deletion` fault, and the next
//! trigger still fires.

#![allow(missing_docs)]

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::errors::{Result, SfrError};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::platform::pal::Filesystem;
use crate::rules::model::{FolderOptions, VolumeSet};
use crate::sweep::evictor::SpaceEvictor;
use crate::sweep::walker::TreeWalker;

/// Aggregate result of one full pass, for the `once` command and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub files_deleted: u64,
    pub folders_deleted: u64,
    pub bytes_freed: u64,
    pub evicted_files: u64,
    pub evicted_bytes: u64,
    pub errors: u64,
}

struct Worker {
    cancel_tx: Sender<()>,
    join: thread::JoinHandle<()>,
}

/// Owns the configuration hierarchy and the background deletion cycle.
pub struct ReaperManager {
    volumes: Mutex<VolumeSet>,
    trigger: Duration,
    trigger_hours: u64,
    fs: Arc<dyn Filesystem>,
    logger: Option<ActivityLoggerHandle>,
    worker: Mutex<Option<Worker>>,
}

impl ReaperManager {
    /// Create a manager that triggers a pass every `trigger_hours` hours.
    #[must_use]
    pub fn new(trigger_hours: u64, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            volumes: Mutex::new(VolumeSet::new()),
            trigger: Duration::from_secs(trigger_hours * 3600),
            trigger_hours,
            fs,
            logger: None,
            worker: Mutex::new(None),
        }
    }

    /// Override the trigger interval at sub-hour resolution (tests, demos).
    #[must_use]
    pub fn with_trigger_interval(mut self, trigger: Duration) -> Self {
        self.trigger = trigger;
        self
    }

    /// Attach an activity logger; events flow from every subsequent pass.
    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the full registration hierarchy from a loaded config file.
    pub fn from_config(config: &Config, fs: Arc<dyn Filesystem>) -> Result<Self> {
        let manager = Self::new(config.trigger_hours, fs);
        for volume in &config.volumes {
            manager.add_volume(
                &volume.root,
                volume.min_free_space_gb,
                volume.max_used_space_gb,
            )?;
            for folder in &volume.folders {
                manager.add_folder_rule(&volume.root, &folder.path, folder.options())?;
                for file in &folder.files {
                    manager.add_file_rule(
                        &volume.root,
                        &folder.path,
                        &file.extension,
                        file.max_age_days,
                    )?;
                }
            }
        }
        Ok(manager)
    }

    // ──────────────────── registration ────────────────────

    /// Register a volume. Running cycles keep their snapshot; changes apply
    /// from the next `start()`.
    pub fn add_volume(
        &self,
        root: impl AsRef<Path>,
        min_free_space_gb: u64,
        max_used_space_gb: u64,
    ) -> Result<()> {
        self.volumes
            .lock()
            .add_volume(root, min_free_space_gb, max_used_space_gb)
    }

    /// Register a folder rule under an existing volume.
    pub fn add_folder_rule(
        &self,
        volume_root: impl AsRef<Path>,
        path: impl Into<PathBuf>,
        options: FolderOptions,
    ) -> Result<()> {
        self.volumes.lock().add_folder_rule(volume_root, path, options)
    }

    /// Register a file rule under an existing folder rule.
    pub fn add_file_rule(
        &self,
        volume_root: impl AsRef<Path>,
        folder_path: impl AsRef<Path>,
        extension: &str,
        max_age_days: u32,
    ) -> Result<()> {
        self.volumes
            .lock()
            .add_file_rule(volume_root, folder_path, extension, max_age_days)
    }

    /// Snapshot of the current hierarchy.
    #[must_use]
    pub fn volume_set(&self) -> VolumeSet {
        self.volumes.lock().clone()
    }

    // ──────────────────── lifecycle ────────────────────

    /// Launch the cycle worker. Idempotent: a live worker makes this a no-op;
    /// a finished or never-started one is replaced with a fresh worker and a
    /// fresh cancel channel.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.as_ref() {
            if !worker.join.is_finished() {
                return Ok(());
            }
        }

        let snapshot = Arc::new(self.volumes.lock().clone());
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let fs = Arc::clone(&self.fs);
        let logger = self.logger.clone();
        let trigger = self.trigger;

        if let Some(logger) = &logger {
            logger.send(ActivityEvent::DaemonStarted {
                trigger_hours: self.trigger_hours,
                volumes: snapshot.volume_count(),
            });
        }

        let join = thread::Builder::new()
            .name("sfr-reaper".to_string())
            .spawn(move || cycle_worker(&cancel_rx, trigger, fs.as_ref(), &snapshot, logger.as_ref()))
            .map_err(|e| SfrError::StartingDeletion {
                details: format!("failed to spawn cycle worker: {e}"),
            })?;

        *slot = Some(Worker { cancel_tx, join });
        Ok(())
    }

    /// Request cancellation. Observed at the next sleep boundary; an
    /// in-flight pass always completes. Fails with `StoppingDeletion` when no
    /// worker was ever started.
    pub fn stop(&self) -> Result<()> {
        let slot = self.worker.lock();
        let Some(worker) = slot.as_ref() else {
            return Err(SfrError::StoppingDeletion {
                details: "manager was never started".to_string(),
            });
        };
        // Full means a cancel is already pending, Disconnected means the
        // worker already exited; both count as a successful stop request.
        let _ = worker.cancel_tx.try_send(());
        Ok(())
    }

    /// Whether a cycle worker is currently alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.join.is_finished())
    }

    /// Block until the current worker (if any) exits.
    pub fn wait(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.join.join();
        }
    }

    /// Run one synchronous pass outside the scheduler (the `once` command).
    #[must_use]
    pub fn run_pass_now(&self) -> PassSummary {
        let snapshot = self.volumes.lock().clone();
        run_pass(self.fs.as_ref(), &snapshot, self.logger.as_ref())
    }
}

impl Drop for ReaperManager {
    fn drop(&mut self) {
        // Dropping the cancel sender disconnects the worker at its next sleep
        // boundary; no join, per the cooperative model.
        let _ = self.worker.lock().take();
    }
}

// ──────────────────── cycle worker ────────────────────

fn cycle_worker(
    cancel_rx: &Receiver<()>,
    trigger: Duration,
    fs: &dyn Filesystem,
    volumes: &VolumeSet,
    logger: Option<&ActivityLoggerHandle>,
) {
    loop {
        // Fault isolation: the pass never kills the cycle. The next trigger
        // is the de facto retry.
        let pass = catch_unwind(AssertUnwindSafe(|| run_pass(fs, volumes, logger)));
        if pass.is_err() {
            let fault = SfrError::Deletion {
                details: "deletion pass panicked".to_string(),
            };
            eprintln!("[{}] {fault}", fault.code());
            if let Some(logger) = logger {
                logger.error(&fault);
            }
        }

        match cancel_rx.recv_timeout(trigger) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(logger) = logger {
        logger.send(ActivityEvent::DaemonStopped {
            reason: "cancelled".to_string(),
        });
    }
}

/// One full pass: age-based pruning over every (volume, folder rule), then
/// eviction over every volume. Eviction always sees post-pruning free space.
fn run_pass(
    fs: &dyn Filesystem,
    volumes: &VolumeSet,
    logger: Option<&ActivityLoggerHandle>,
) -> PassSummary {
    let started = Instant::now();
    let mut summary = PassSummary::default();

    if let Some(logger) = logger {
        logger.send(ActivityEvent::PassStarted {
            volumes: volumes.volume_count(),
        });
    }

    let walker = TreeWalker::new(fs, Local::now());
    for volume in volumes.volumes() {
        for rule in volume.folder_rules() {
            match walker.walk(rule) {
                Ok(outcome) => {
                    summary.files_deleted += outcome.deleted_files.len() as u64;
                    summary.folders_deleted += outcome.deleted_dirs.len() as u64;
                    summary.bytes_freed += outcome.bytes_freed();
                    summary.errors += outcome.errors.len() as u64;
                    if let Some(logger) = logger {
                        for (path, size_bytes) in &outcome.deleted_files {
                            logger.send(ActivityEvent::FileDeleted {
                                path: path.display().to_string(),
                                size_bytes: *size_bytes,
                            });
                        }
                        for path in &outcome.deleted_dirs {
                            logger.send(ActivityEvent::FolderDeleted {
                                path: path.display().to_string(),
                            });
                        }
                        for err in &outcome.errors {
                            logger.error(err);
                        }
                    }
                }
                Err(err) => {
                    summary.errors += 1;
                    if let Some(logger) = logger {
                        logger.error(&err);
                    }
                }
            }
        }
    }

    let evictor = SpaceEvictor::new(fs);
    for volume in volumes.volumes() {
        match evictor.evict(volume) {
            Ok(outcome) => {
                summary.evicted_files += outcome.deleted_files.len() as u64;
                summary.evicted_bytes += outcome.bytes_freed;
                summary.errors += outcome.errors.len() as u64;
                if let Some(logger) = logger {
                    if outcome.deficit_bytes > 0 {
                        logger.send(ActivityEvent::EvictionTriggered {
                            volume: volume.root().display().to_string(),
                            deficit_bytes: outcome.deficit_bytes,
                        });
                        for (path, size_bytes) in &outcome.deleted_files {
                            logger.send(ActivityEvent::FileDeleted {
                                path: path.display().to_string(),
                                size_bytes: *size_bytes,
                            });
                        }
                        logger.send(ActivityEvent::EvictionCompleted {
                            volume: volume.root().display().to_string(),
                            bytes_freed: outcome.bytes_freed,
                            files_deleted: outcome.deleted_files.len() as u64,
                        });
                    }
                    for err in &outcome.errors {
                        logger.error(err);
                    }
                }
            }
            Err(err) => {
                // Volume unqueryable: skip it, other volumes still run.
                summary.errors += 1;
                if let Some(logger) = logger {
                    logger.error(&err);
                }
            }
        }
    }

    if let Some(logger) = logger {
        logger.send(ActivityEvent::PassCompleted {
            files_deleted: summary.files_deleted,
            folders_deleted: summary.folders_deleted,
            bytes_freed: summary.bytes_freed + summary.evicted_bytes,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
    }

    summary
}

// ──────────────────── tests ────────────────────
