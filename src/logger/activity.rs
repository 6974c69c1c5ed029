//! Activity logger thread: non-blocking event fan-in over a bounded channel.
//!
//! A single dedicated thread owns the [`JsonlWriter`]; the deletion worker and
//! lifecycle callers send [`ActivityEvent`]s through a cheaply-cloneable
//! handle. Sends use `try_send` so a slow or broken log can never stall a
//! deletion pass; overflow is counted and reported on the next successful
//! write.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::core::errors::{Result, SfrError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the manager, walker, and evictor.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        trigger_hours: u64,
        volumes: usize,
    },
    DaemonStopped {
        reason: String,
    },
    PassStarted {
        volumes: usize,
    },
    PassCompleted {
        files_deleted: u64,
        folders_deleted: u64,
        bytes_freed: u64,
        duration_ms: u64,
    },
    FileDeleted {
        path: String,
        size_bytes: u64,
    },
    FolderDeleted {
        path: String,
    },
    EvictionTriggered {
        volume: String,
        deficit_bytes: u64,
    },
    EvictionCompleted {
        volume: String,
        bytes_freed: u64,
        files_deleted: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel requesting graceful shutdown of the logger thread.
    Shutdown,
}

/// Thread-safe handle for sending log events. Never blocks.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
    join: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. If the channel is full the event
    /// is dropped and counted; a disconnected channel during shutdown is fine.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an error through the activity log.
    pub fn error(&self, err: &SfrError) {
        self.send(ActivityEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    /// Events dropped to back-pressure so far.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request shutdown and wait for the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
        if let Some(join) = self.join.lock().take() {
            let _ = join.join();
        }
    }
}

/// Spawn the logger thread. The handle is `Clone + Send` and shared across
/// the manager and its worker.
pub fn spawn_logger(config: JsonlConfig) -> Result<ActivityLoggerHandle> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_in_thread = Arc::clone(&dropped);

    let join = thread::Builder::new()
        .name("sfr-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped_in_thread))
        .map_err(|e| SfrError::StartingDeletion {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok(ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
        join: Arc::new(Mutex::new(Some(join))),
    })
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            trigger_hours,
            volumes,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.details = Some(format!("trigger_hours={trigger_hours} volumes={volumes}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped { reason } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!("reason={reason}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::PassStarted { volumes } => {
            let mut e = LogEntry::new(EventType::PassStart, Severity::Info);
            e.details = Some(format!("volumes={volumes}"));
            e
        }
        ActivityEvent::PassCompleted {
            files_deleted,
            folders_deleted,
            bytes_freed,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::PassComplete, Severity::Info);
            e.files_deleted = Some(*files_deleted);
            e.folders_deleted = Some(*folders_deleted);
            e.bytes_freed = Some(*bytes_freed);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FileDeleted { path, size_bytes } => {
            let mut e = LogEntry::new(EventType::FileDelete, Severity::Info);
            e.path = Some(path.clone());
            e.size = Some(*size_bytes);
            e.ok = Some(true);
            e
        }
        ActivityEvent::FolderDeleted { path } => {
            let mut e = LogEntry::new(EventType::FolderDelete, Severity::Info);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::EvictionTriggered {
            volume,
            deficit_bytes,
        } => {
            let mut e = LogEntry::new(EventType::EvictionTrigger, Severity::Warning);
            e.volume = Some(volume.clone());
            e.deficit_bytes = Some(*deficit_bytes);
            e
        }
        ActivityEvent::EvictionCompleted {
            volume,
            bytes_freed,
            files_deleted,
        } => {
            let mut e = LogEntry::new(EventType::EvictionComplete, Severity::Info);
            e.volume = Some(volume.clone());
            e.bytes_freed = Some(*bytes_freed);
            e.files_deleted = Some(*files_deleted);
            e.ok = Some(true);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Warning);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}

// ──────────────────── tests ────────────────────
