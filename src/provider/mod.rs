//! Inventory provider contract and backend selection.
//!
//! Every backend (live `docker` CLI adapter, synthetic/mock source) implements
//! [`InventoryProvider`]. The session layer only ever talks to the trait, so it
//! is fully testable against [`mock::MockProvider`].
//!
//! Contract shared by all implementations:
//! - `list_volumes` returns every known volume. A failed per-volume detail
//!   lookup yields a degraded record ([`Volume::degraded`]) instead of dropping
//!   the volume or failing the call. Only cancellation or an unreachable backend
//!   fails the whole call.
//! - `get_volume_details` fails with `NotFound` for unknown names.
//! - `remove_volume` fails with `InUse` or `NotFound`; on success the volume is
//!   gone from later listings. There is no dry-run at this layer.
//! - `close` is idempotent.

pub mod command;
pub mod docker_cli;
pub mod mock;

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::core::config::{BackendKind, Config};
use crate::core::context::Context;
use crate::core::errors::{Result, VsError};
use crate::inventory::Volume;

/// Capability interface over a volume inventory backend.
pub trait InventoryProvider: Send + Sync {
    /// Short backend identifier used in logs and errors.
    fn backend_name(&self) -> &'static str;
    fn list_volumes(&self, ctx: &Context) -> Result<Vec<Volume>>;
    fn get_volume_details(&self, ctx: &Context, name: &str) -> Result<Volume>;
    fn remove_volume(&self, ctx: &Context, name: &str) -> Result<()>;
    fn close(&self) -> Result<()>;
}

static VOLUME_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("volume name pattern is valid")
});

/// Reject names that could be mistaken for CLI flags or carry shell metacharacters.
pub fn validate_volume_name(name: &str) -> Result<()> {
    if VOLUME_NAME.is_match(name) {
        Ok(())
    } else {
        Err(VsError::InvalidVolumeName {
            name: name.to_string(),
        })
    }
}

/// Construct the configured backend.
///
/// The live adapter probes the daemon under the connect timeout; an unreachable
/// backend surfaces as [`VsError::Unavailable`].
pub fn connect(config: &Config, ctx: &Context) -> Result<Arc<dyn InventoryProvider>> {
    match config.backend.kind {
        BackendKind::DockerCli => {
            let provider = docker_cli::DockerCliProvider::connect(&config.backend, ctx)?;
            Ok(Arc::new(provider))
        }
        BackendKind::Mock => Ok(Arc::new(mock::MockProvider::synthetic(
            config.mock.seed,
            config.mock.volume_count,
            config.mock.container_count,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_volume_names() {
        for name in [
            "pgdata",
            "shop_db-data",
            "a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8a9b0c1d2e3f4a5b6c7d8e9f0a1b2",
            "my.volume",
        ] {
            assert!(validate_volume_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_flag_like_and_unsafe_names() {
        for name in ["", "-f", "--all", "a b", "x;rm", "../etc", "_leading"] {
            let err = validate_volume_name(name).expect_err("name should be rejected");
            assert_eq!(err.code(), "VSW-2005", "{name}");
        }
    }

    #[test]
    fn connect_builds_mock_backend() {
        let mut config = Config::default();
        config.backend.kind = BackendKind::Mock;
        config.mock.volume_count = 4;
        let provider = connect(&config, &Context::background()).expect("mock connects");
        assert_eq!(provider.backend_name(), "mock");
        let volumes = provider
            .list_volumes(&Context::background())
            .expect("mock lists");
        assert_eq!(volumes.len(), 4);
    }
}
