//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, VsError};

/// Upper bound on concurrent removals during a prune.
pub const MAX_PRUNE_PARALLELISM: usize = 32;

/// Full volsweep configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub mock: MockConfig,
    pub prune: PruneConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Which inventory source to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Shell out to the `docker` CLI.
    #[default]
    DockerCli,
    /// Synthetic in-memory inventory.
    Mock,
}

impl BackendKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DockerCli => "docker-cli",
            Self::Mock => "mock",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "docker-cli" | "docker" => Ok(Self::DockerCli),
            "mock" | "synthetic" => Ok(Self::Mock),
            other => Err(VsError::ConfigParse {
                context: "backend",
                details: format!("unknown backend {other:?} (expected docker-cli or mock)"),
            }),
        }
    }
}

/// Live backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub binary: String,
    pub command_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Volume label carrying the project/group name.
    pub project_label: String,
}

/// Synthetic inventory shape for the mock backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MockConfig {
    pub seed: u64,
    pub volume_count: usize,
    pub container_count: usize,
}

/// Plan application knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PruneConfig {
    pub parallelism: usize,
    /// Cap on removals per apply; 0 attempts every selected volume.
    pub max_batch: usize,
    /// Ask before removing anything.
    pub confirm: bool,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub activity_log: PathBuf,
    pub fallback_log: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Interactive dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Auto-refresh interval; 0 means refresh only on request.
    pub refresh_ms: u64,
    pub start_pane: StartPane,
}

/// Pane shown when the dashboard opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPane {
    #[default]
    Table,
    Details,
    Plan,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            binary: "docker".to_string(),
            command_timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
            project_label: "com.docker.compose.project".to_string(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            volume_count: 12,
            container_count: 5,
        }
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            max_batch: 0,
            confirm: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activity_log: data_dir().join("activity.jsonl"),
            fallback_log: None,
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 0,
            start_pane: StartPane::default(),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[VSW-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("volsweep")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("volsweep")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| VsError::io(&path_buf, source))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(VsError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON so the digest is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("VOLSWEEP_BACKEND") {
            self.backend.kind = BackendKind::parse(&raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_DOCKER_BINARY") {
            self.backend.binary = raw;
        }
        if let Some(raw) = lookup("VOLSWEEP_COMMAND_TIMEOUT_MS") {
            self.backend.command_timeout_ms = parse_env("VOLSWEEP_COMMAND_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_CONNECT_TIMEOUT_MS") {
            self.backend.connect_timeout_ms = parse_env("VOLSWEEP_CONNECT_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_PROJECT_LABEL") {
            self.backend.project_label = raw;
        }
        if let Some(raw) = lookup("VOLSWEEP_MOCK_SEED") {
            self.mock.seed = parse_env("VOLSWEEP_MOCK_SEED", &raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_PRUNE_PARALLELISM") {
            self.prune.parallelism = parse_env("VOLSWEEP_PRUNE_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_LOG_ENABLED") {
            self.logging.enabled = parse_env("VOLSWEEP_LOG_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("VOLSWEEP_ACTIVITY_LOG") {
            self.logging.activity_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("VOLSWEEP_DASHBOARD_REFRESH_MS") {
            self.dashboard.refresh_ms = parse_env("VOLSWEEP_DASHBOARD_REFRESH_MS", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.binary.trim().is_empty() {
            return Err(VsError::InvalidConfig {
                details: "backend.binary must not be empty".to_string(),
            });
        }
        if self.backend.command_timeout_ms == 0 {
            return Err(VsError::InvalidConfig {
                details: "backend.command_timeout_ms must be > 0".to_string(),
            });
        }
        if self.backend.connect_timeout_ms == 0 {
            return Err(VsError::InvalidConfig {
                details: "backend.connect_timeout_ms must be > 0".to_string(),
            });
        }
        if self.backend.project_label.trim().is_empty() {
            return Err(VsError::InvalidConfig {
                details: "backend.project_label must not be empty".to_string(),
            });
        }
        if !(1..=MAX_PRUNE_PARALLELISM).contains(&self.prune.parallelism) {
            return Err(VsError::InvalidConfig {
                details: format!(
                    "prune.parallelism must be in [1,{MAX_PRUNE_PARALLELISM}], got {}",
                    self.prune.parallelism
                ),
            });
        }
        if self.logging.enabled && self.logging.max_size_bytes < 1024 {
            return Err(VsError::InvalidConfig {
                details: format!(
                    "logging.max_size_bytes ({}) must be >= 1024",
                    self.logging.max_size_bytes
                ),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| VsError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, Config, StartPane, VsError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.backend.kind, BackendKind::DockerCli);
        assert_eq!(cfg.backend.project_label, "com.docker.compose.project");
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut changed = cfg.clone();
        changed.prune.parallelism = 4;
        let after = changed.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, cfg.stable_hash().expect("hash should compute"));
    }

    #[test]
    fn zero_parallelism_rejected() {
        let mut cfg = Config::default();
        cfg.prune.parallelism = 0;
        let err = cfg.validate().expect_err("expected parallelism error");
        assert!(err.to_string().contains("parallelism"));
    }

    #[test]
    fn excessive_parallelism_rejected() {
        let mut cfg = Config::default();
        cfg.prune.parallelism = 64;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut cfg = Config::default();
        cfg.backend.command_timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.backend.connect_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("VOLSWEEP_BACKEND", "mock"),
            ("VOLSWEEP_MOCK_SEED", "99"),
            ("VOLSWEEP_PRUNE_PARALLELISM", "3"),
            ("VOLSWEEP_LOG_ENABLED", "false"),
            ("VOLSWEEP_ACTIVITY_LOG", "/tmp/vsw/activity.jsonl"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.backend.kind, BackendKind::Mock);
        assert_eq!(cfg.mock.seed, 99);
        assert_eq!(cfg.prune.parallelism, 3);
        assert!(!cfg.logging.enabled);
        assert_eq!(
            cfg.logging.activity_log,
            PathBuf::from("/tmp/vsw/activity.jsonl")
        );
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("VOLSWEEP_COMMAND_TIMEOUT_MS", "soon")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid number should fail");
        match err {
            VsError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("VOLSWEEP_COMMAND_TIMEOUT_MS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn env_unknown_backend_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("VOLSWEEP_BACKEND", "podman-rest")]);
        assert!(
            cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
                .is_err()
        );
    }

    #[test]
    fn toml_sections_parse() {
        let raw = r#"
            [backend]
            kind = "mock"
            binary = "/usr/local/bin/docker"

            [prune]
            parallelism = 2

            [dashboard]
            start_pane = "plan"
        "#;
        let cfg: Config = toml::from_str(raw).expect("toml should parse");
        assert_eq!(cfg.backend.kind, BackendKind::Mock);
        assert_eq!(cfg.backend.binary, "/usr/local/bin/docker");
        assert_eq!(cfg.backend.command_timeout_ms, 15_000);
        assert_eq!(cfg.prune.parallelism, 2);
        assert_eq!(cfg.dashboard.start_pane, StartPane::Plan);
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mock]\nseed = 42\n").expect("write config");
        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.mock.seed, 42);
        assert_eq!(cfg.config_file, path);
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = Config::load(Some(Path::new("/nonexistent/volsweep/config.toml")))
            .expect_err("missing explicit path must fail");
        assert!(matches!(err, VsError::MissingConfig { .. }));
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[prune\nparallelism = ").expect("write config");
        let err = Config::load(Some(&path)).expect_err("malformed toml must fail");
        assert_eq!(err.code(), "VSW-1003");
    }
}
