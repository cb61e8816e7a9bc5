//! Activity logger: a dedicated thread owns the [`JsonlWriter`]; every other
//! thread sends [`ActivityEvent`]s through a bounded crossbeam channel.
//!
//! Sends use `try_send`, so a slow disk never stalls the dashboard or a prune.
//! Events that do not fit are counted and reported on the next write.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::config::LoggingConfig;
use crate::core::errors::{Result, VsError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 1024;

/// Things worth recording about a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    SessionStarted {
        version: String,
        backend: String,
        config_hash: String,
    },
    SessionStopped {
        reason: String,
        uptime_secs: u64,
    },
    InventoryLoaded {
        backend: String,
        volumes: usize,
        orphans: usize,
        duration_ms: u64,
    },
    InventoryFailed {
        backend: String,
        code: String,
        message: String,
    },
    VolumeRemoved {
        name: String,
        size_bytes: i64,
        project: String,
        duration_ms: u64,
    },
    VolumeRemovalFailed {
        name: String,
        code: String,
        message: String,
    },
    PlanApplied {
        succeeded: usize,
        failed: usize,
        skipped: usize,
        bytes_reclaimed: i64,
        duration_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Ask the logger thread to flush and exit.
    Shutdown,
}

/// Cheap, cloneable sender side of the logger.
#[derive(Clone, Debug)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Queue an event without blocking; a full queue drops it.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Ask the thread to flush and stop. Blocks only until the request is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Start the logger thread writing to the configured activity log.
pub fn spawn_logger(
    config: &LoggingConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    spawn_with(JsonlConfig::from(config), CHANNEL_CAPACITY)
}

/// Start the logger thread with an explicit sink and queue size.
pub fn spawn_with(
    jsonl: JsonlConfig,
    capacity: usize,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("volsweep-logger".to_string())
        .spawn(move || run_logger(&rx, jsonl, &dropped))
        .map_err(|e| VsError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn run_logger(rx: &Receiver<ActivityEvent>, jsonl: JsonlConfig, dropped: &AtomicU64) {
    let mut writer = JsonlWriter::open(jsonl);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut entry = LogEntry::new(EventType::Error, Severity::Warning);
            entry.count = usize::try_from(lost).ok();
            entry.details = Some(format!("{lost} activity events dropped (queue full)"));
            writer.write_entry(&entry);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        if let Some(entry) = to_entry(&event) {
            writer.write_entry(&entry);
        }
    }

    writer.sync();
}

fn to_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::SessionStarted {
            version,
            backend,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.backend = Some(backend.clone());
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::SessionStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::SessionStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e
        }
        ActivityEvent::InventoryLoaded {
            backend,
            volumes,
            orphans,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::InventoryLoad, Severity::Info);
            e.backend = Some(backend.clone());
            e.count = Some(*volumes);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!("orphans={orphans}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::InventoryFailed {
            backend,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::InventoryLoad, Severity::Error);
            e.backend = Some(backend.clone());
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::VolumeRemoved {
            name,
            size_bytes,
            project,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::VolumeRemove, Severity::Info);
            e.volume = Some(name.clone());
            e.size = Some(*size_bytes);
            if !project.is_empty() {
                e.project = Some(project.clone());
            }
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::VolumeRemovalFailed {
            name,
            code,
            message,
        } => {
            let mut e = LogEntry::new(EventType::VolumeRemove, Severity::Warning);
            e.volume = Some(name.clone());
            e.ok = Some(false);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::PlanApplied {
            succeeded,
            failed,
            skipped,
            bytes_reclaimed,
            duration_ms,
        } => {
            let severity = if *failed == 0 {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::PlanApply, severity);
            e.count = Some(*succeeded);
            e.size = Some(*bytes_reclaimed);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(*failed == 0);
            e.details = Some(format!("failed={failed} skipped={skipped}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}
