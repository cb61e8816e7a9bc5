//! Append-only JSONL activity sink.
//!
//! Each record is serialized to one line and written with a single
//! `write_all`, so a concurrent `tail -f` never sees a partial record.
//!
//! When the primary file cannot be opened or written the sink steps down:
//! primary file, then the optional fallback file, then stderr with a
//! `[VSW-JSONL]` prefix, then silent discard. Logging never fails a command.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::LoggingConfig;
use crate::core::errors::{Result, VsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Event identifiers written in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionStop,
    InventoryLoad,
    VolumeRemove,
    PlanApply,
    Error,
}

/// One line of the activity log. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            backend: None,
            volume: None,
            size: None,
            project: None,
            count: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Where lines currently go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkLevel {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

impl SinkLevel {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }
}

/// File locations and rotation limits for the sink.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the active file would exceed this many bytes.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
}

impl From<&LoggingConfig> for JsonlConfig {
    fn from(cfg: &LoggingConfig) -> Self {
        Self {
            path: cfg.activity_log.clone(),
            fallback_path: cfg.fallback_log.clone(),
            max_size_bytes: cfg.max_size_bytes,
            max_rotated_files: cfg.max_rotated_files,
        }
    }
}

/// Rotating line writer with a degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<BufWriter<File>>,
    level: SinkLevel,
    size: u64,
}

impl JsonlWriter {
    /// Open the primary file, stepping down the chain when that fails.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            level: SinkLevel::Discard,
            size: 0,
        };
        match append_to(&writer.config.path) {
            Ok((file, size)) => writer.attach(file, size, SinkLevel::Primary),
            Err(_) => writer.open_fallback(),
        }
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(err) => eprintln!("[VSW-JSONL] cannot serialize log entry: {err}"),
        }
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Flush and push data to disk.
    pub fn sync(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
            let _ = file.get_ref().sync_data();
        }
    }

    #[must_use]
    pub const fn level(&self) -> SinkLevel {
        self.level
    }

    /// Bytes in the active file.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    fn attach(&mut self, file: File, size: u64, level: SinkLevel) {
        self.file = Some(BufWriter::new(file));
        self.size = size;
        self.level = level;
    }

    fn active_path(&self) -> Option<&Path> {
        match self.level {
            SinkLevel::Primary => Some(&self.config.path),
            SinkLevel::Fallback => self.config.fallback_path.as_deref(),
            SinkLevel::Stderr | SinkLevel::Discard => None,
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.file.is_some() && self.size.saturating_add(len) > self.config.max_size_bytes {
            self.rotate();
        }
        match self.level {
            SinkLevel::Primary | SinkLevel::Fallback => {
                let written = self
                    .file
                    .as_mut()
                    .is_some_and(|file| file.write_all(line.as_bytes()).is_ok());
                if written {
                    self.size += len;
                } else {
                    self.step_down();
                    self.write_line(line);
                }
            }
            SinkLevel::Stderr => {
                if write!(io::stderr(), "[VSW-JSONL] {line}").is_err() {
                    self.level = SinkLevel::Discard;
                }
            }
            SinkLevel::Discard => {}
        }
    }

    fn open_fallback(&mut self) {
        self.file = None;
        let opened = self
            .config
            .fallback_path
            .clone()
            .map(|path| (append_to(&path), path));
        match opened {
            Some((Ok((file, size)), path)) => {
                eprintln!(
                    "[VSW-JSONL] activity log unavailable, writing to {}",
                    path.display()
                );
                self.attach(file, size, SinkLevel::Fallback);
            }
            _ => {
                eprintln!("[VSW-JSONL] activity log unavailable, writing to stderr");
                self.level = SinkLevel::Stderr;
            }
        }
    }

    fn step_down(&mut self) {
        self.file = None;
        match self.level {
            SinkLevel::Primary => self.open_fallback(),
            SinkLevel::Fallback => {
                eprintln!("[VSW-JSONL] fallback log failed, writing to stderr");
                self.level = SinkLevel::Stderr;
            }
            SinkLevel::Stderr | SinkLevel::Discard => self.level = SinkLevel::Discard,
        }
    }

    /// `<path>` becomes `<path>.1`, older generations shift up, the oldest is dropped.
    fn rotate(&mut self) {
        self.flush();
        self.file = None;
        let Some(base) = self.active_path().map(Path::to_path_buf) else {
            return;
        };
        let keep = self.config.max_rotated_files;
        if keep == 0 {
            let _ = fs::remove_file(&base);
        } else {
            let _ = fs::remove_file(generation(&base, keep));
            for n in (1..keep).rev() {
                let _ = fs::rename(generation(&base, n), generation(&base, n + 1));
            }
            let _ = fs::rename(&base, generation(&base, 1));
        }
        match append_to(&base) {
            Ok((file, size)) => {
                let level = self.level;
                self.attach(file, size, level);
            }
            Err(_) => self.step_down(),
        }
    }
}

fn append_to(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| VsError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| VsError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

fn generation(base: &Path, n: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}
