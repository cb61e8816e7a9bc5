//! Live adapter that shells out to the `docker` CLI.
//!
//! One `docker volume ls` drives the listing, one `docker ps -a` feeds the
//! attachment index, and each volume is enriched with `docker volume inspect`.
//! Inspect failures degrade that single record; cancellation aborts the call.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use crate::core::config::BackendConfig;
use crate::core::context::Context;
use crate::core::errors::{ErrorKind, Result, VsError};
use crate::inventory::{AttachmentIndex, Container, SIZE_UNKNOWN, Volume};
use crate::provider::command::{CommandOutput, run_command};
use crate::provider::{InventoryProvider, validate_volume_name};

const BACKEND: &str = "docker-cli";

static IN_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bin use\b").expect("in-use pattern is valid"));
static NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no such volume|not found").expect("not-found pattern is valid")
});
static DAEMON_DOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cannot connect to the docker daemon|is the docker daemon running|error during connect")
        .expect("daemon pattern is valid")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeRow {
    name: String,
    #[serde(default)]
    driver: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerRow {
    #[serde(default)]
    names: String,
    #[serde(default)]
    mounts: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    usage_data: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsageData {
    size: i64,
}

/// Provider backed by the `docker` binary.
#[derive(Debug)]
pub struct DockerCliProvider {
    binary: String,
    command_timeout: Duration,
    project_label: String,
    closed: AtomicBool,
}

impl DockerCliProvider {
    /// Probe `docker version` under the connect timeout.
    pub fn connect(config: &BackendConfig, ctx: &Context) -> Result<Self> {
        let provider = Self::unprobed(config);
        let probe_ctx = ctx.child_with_timeout(config.connect_timeout());
        let output = run_command(
            &provider.binary,
            &["version", "--format", "{{.Server.Version}}"],
            &probe_ctx,
            BACKEND,
            "connect",
        )
        .map_err(|err| match err {
            VsError::Cancelled { .. } if !ctx.is_cancelled() => VsError::Unavailable {
                backend: BACKEND,
                details: format!(
                    "daemon did not answer within {}ms",
                    config.connect_timeout_ms
                ),
            },
            other => other,
        })?;
        if !output.success() {
            return Err(VsError::Unavailable {
                backend: BACKEND,
                details: first_line(&output.stderr, "docker version failed"),
            });
        }
        Ok(provider)
    }

    /// Build without probing the daemon.
    #[must_use]
    pub fn unprobed(config: &BackendConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            command_timeout: config.command_timeout(),
            project_label: config.project_label.clone(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(VsError::Unavailable {
                backend: BACKEND,
                details: "provider closed".to_string(),
            });
        }
        Ok(())
    }

    fn run(&self, ctx: &Context, args: &[&str], operation: &str) -> Result<CommandOutput> {
        self.ensure_open()?;
        let child = ctx.child_with_timeout(self.command_timeout);
        run_command(&self.binary, args, &child, BACKEND, operation).map_err(|err| match err {
            // Per-command timeout is a backend failure; only the caller's
            // own cancellation surfaces as Cancelled.
            VsError::Cancelled { .. } if !ctx.is_cancelled() => VsError::Backend {
                operation: operation.to_string(),
                details: format!("timed out after {}ms", self.command_timeout.as_millis()),
            },
            other => other,
        })
    }

    /// Container listing; `None` when it cannot be read.
    fn list_containers(&self, ctx: &Context) -> Result<Option<Vec<Container>>> {
        match self.run(
            ctx,
            &["ps", "-a", "--no-trunc", "--format", "{{json .}}"],
            "list containers",
        ) {
            Ok(output) if output.success() => Ok(Some(parse_container_rows(&output.stdout))),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::Cancelled => Err(err),
            Err(_) => Ok(None),
        }
    }

    fn inspect(&self, ctx: &Context, name: &str) -> Result<InspectRecord> {
        known_name(name)?;
        let operation = format!("inspect volume {name}");
        let output = self.run(ctx, &["volume", "inspect", name], &operation)?;
        if !output.success() {
            return Err(classify_failure(name, &operation, &output.stderr));
        }
        parse_inspect(&output.stdout)?.ok_or_else(|| VsError::not_found(name))
    }

    fn build_volume(&self, record: InspectRecord, attached: Vec<String>) -> Volume {
        let project = record
            .labels
            .as_ref()
            .and_then(|labels| labels.get(&self.project_label))
            .cloned()
            .unwrap_or_default();
        let size = record.usage_data.map_or(SIZE_UNKNOWN, |usage| usage.size);
        Volume::new(record.name, record.driver, size, attached, project, Utc::now())
    }
}

impl InventoryProvider for DockerCliProvider {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_volumes(&self, ctx: &Context) -> Result<Vec<Volume>> {
        let output = self.run(ctx, &["volume", "ls", "--format", "{{json .}}"], "list volumes")?;
        if !output.success() {
            return Err(classify_failure("", "list volumes", &output.stderr));
        }
        let rows = parse_volume_rows(&output.stdout);
        let containers = self.list_containers(ctx)?;
        let index = AttachmentIndex::build(containers.as_deref());

        let mut volumes = Vec::with_capacity(rows.len());
        for row in rows {
            ctx.check("list volumes")?;
            match self.inspect(ctx, &row.name) {
                Ok(record) => {
                    let attached = index.attachments(&record.name);
                    volumes.push(self.build_volume(record, attached));
                }
                Err(err) if err.kind() == ErrorKind::Cancelled => return Err(err),
                Err(_) => volumes.push(Volume::degraded(row.name, row.driver, Utc::now())),
            }
        }
        Ok(volumes)
    }

    fn get_volume_details(&self, ctx: &Context, name: &str) -> Result<Volume> {
        let record = self.inspect(ctx, name)?;
        let containers = self.list_containers(ctx)?;
        let attached = AttachmentIndex::build(containers.as_deref()).attachments(&record.name);
        Ok(self.build_volume(record, attached))
    }

    fn remove_volume(&self, ctx: &Context, name: &str) -> Result<()> {
        known_name(name)?;
        let operation = format!("remove volume {name}");
        let output = self.run(ctx, &["volume", "rm", name], &operation)?;
        if output.success() {
            Ok(())
        } else {
            Err(classify_failure(name, &operation, &output.stderr))
        }
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// A name docker would reject cannot name an existing volume; fail before spawning.
fn known_name(name: &str) -> Result<()> {
    validate_volume_name(name).map_err(|_| VsError::not_found(name))
}

/// Map CLI stderr to the provider error taxonomy.
fn classify_failure(name: &str, operation: &str, stderr: &str) -> VsError {
    let details = first_line(stderr, "command failed without output");
    if DAEMON_DOWN.is_match(stderr) {
        VsError::Unavailable {
            backend: BACKEND,
            details,
        }
    } else if IN_USE.is_match(stderr) {
        VsError::InUse {
            name: name.to_string(),
            details,
        }
    } else if NOT_FOUND.is_match(stderr) {
        VsError::not_found(name)
    } else {
        VsError::Backend {
            operation: operation.to_string(),
            details,
        }
    }
}

fn first_line(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// One JSON object per line; malformed lines are skipped.
fn parse_volume_rows(stdout: &str) -> Vec<VolumeRow> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<VolumeRow>(line).ok())
        .filter(|row| !row.name.is_empty())
        .collect()
}

fn parse_container_rows(stdout: &str) -> Vec<Container> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<ContainerRow>(line).ok())
        .filter_map(|row| {
            let name = row
                .names
                .split(',')
                .map(|n| n.trim().trim_start_matches('/'))
                .find(|n| !n.is_empty())?
                .to_string();
            let mounts = row
                .mounts
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            Some(Container::new(name, mounts))
        })
        .collect()
}

fn parse_inspect(stdout: &str) -> Result<Option<InspectRecord>> {
    let records: Vec<InspectRecord> = serde_json::from_str(stdout.trim())?;
    Ok(records.into_iter().next())
}
