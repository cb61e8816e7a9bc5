//! In-memory provider for deterministic tests and the synthetic demo backend.
//!
//! Honors the same contract as the live adapter, including degrade-not-drop on
//! injected detail failures, `InUse` for referenced volumes, idempotent close,
//! and cancellation checks between volumes.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::context::Context;
use crate::core::errors::{Result, VsError};
use crate::inventory::{AttachmentIndex, Container, SIZE_UNKNOWN, Volume};
use crate::provider::InventoryProvider;

const BACKEND: &str = "mock";

/// A volume as the mock backend stores it (attachments come from containers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockVolume {
    pub name: String,
    pub driver: String,
    pub size_bytes: i64,
    pub project: String,
}

/// Failure injected into `remove_volume` for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    InUse,
    NotFound,
    Backend(String),
}

#[derive(Debug, Default)]
struct MockState {
    volumes: Vec<MockVolume>,
    containers: Vec<Container>,
    containers_unavailable: bool,
    detail_failures: HashSet<String>,
    removal_failures: HashMap<String, MockFailure>,
    unavailable: Option<String>,
    closed: bool,
    close_calls: usize,
    removal_attempts: Vec<String>,
}

/// Mutable in-memory inventory behind the provider trait.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_volume(
        self,
        name: &str,
        driver: &str,
        size_bytes: i64,
        project: &str,
    ) -> Self {
        self.state.lock().volumes.push(MockVolume {
            name: name.to_string(),
            driver: driver.to_string(),
            size_bytes,
            project: project.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_container(self, name: &str, mounts: &[&str]) -> Self {
        self.state
            .lock()
            .containers
            .push(Container::new(name, mounts.iter().copied()));
        self
    }

    /// Make detail enrichment fail for `name` (listing degrades, details error).
    #[must_use]
    pub fn fail_details_for(self, name: &str) -> Self {
        self.state.lock().detail_failures.insert(name.to_string());
        self
    }

    /// Make `remove_volume(name)` fail with the given failure.
    #[must_use]
    pub fn fail_removal(self, name: &str, failure: MockFailure) -> Self {
        self.state
            .lock()
            .removal_failures
            .insert(name.to_string(), failure);
        self
    }

    /// Pretend the container listing cannot be read.
    #[must_use]
    pub fn containers_unavailable(self) -> Self {
        self.state.lock().containers_unavailable = true;
        self
    }

    /// Make every call fail as if the backend were unreachable.
    #[must_use]
    pub fn unavailable(self, details: &str) -> Self {
        self.state.lock().unavailable = Some(details.to_string());
        self
    }

    /// Reproducible random inventory with compose projects, orphans and unknown sizes.
    #[must_use]
    pub fn synthetic(seed: u64, volume_count: usize, container_count: usize) -> Self {
        const PROJECTS: [&str; 5] = ["shop", "blog", "metrics", "ci", ""];
        const KINDS: [&str; 5] = ["data", "cache", "logs", "db", "uploads"];
        const ROLES: [&str; 4] = ["web", "worker", "db", "proxy"];

        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = MockState::default();

        for i in 0..volume_count {
            let project = PROJECTS[rng.random_range(0..PROJECTS.len())];
            let name = if project.is_empty() {
                format!("{:016x}{:016x}", rng.random::<u64>(), rng.random::<u64>())
            } else {
                format!("{project}_{}_{i}", KINDS[rng.random_range(0..KINDS.len())])
            };
            let size_bytes = if rng.random_bool(0.2) {
                SIZE_UNKNOWN
            } else {
                let magnitude: u32 = rng.random_range(10..34);
                (1i64 << magnitude) + rng.random_range(0..1024)
            };
            state.volumes.push(MockVolume {
                name,
                driver: "local".to_string(),
                size_bytes,
                project: project.to_string(),
            });
        }

        // Only the first part of the inventory is ever mounted, so orphans remain.
        let mountable = (volume_count * 3 / 5).max(1).min(volume_count);
        for i in 0..container_count {
            if mountable == 0 {
                break;
            }
            let role = ROLES[rng.random_range(0..ROLES.len())];
            let mount_count = rng.random_range(1..=2usize);
            let mounts: Vec<String> = (0..mount_count)
                .map(|_| state.volumes[rng.random_range(0..mountable)].name.clone())
                .collect();
            state
                .containers
                .push(Container::new(format!("{role}-{i}"), mounts));
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Detach a container, e.g. to simulate `docker rm` between refreshes.
    pub fn remove_container(&self, name: &str) {
        self.state.lock().containers.retain(|c| c.name != name);
    }

    /// Clear an injected removal failure.
    pub fn clear_removal_failure(&self, name: &str) {
        self.state.lock().removal_failures.remove(name);
    }

    /// Names currently stored, in listing order.
    #[must_use]
    pub fn volume_names(&self) -> Vec<String> {
        self.state
            .lock()
            .volumes
            .iter()
            .map(|v| v.name.clone())
            .collect()
    }

    /// Names passed to `remove_volume`, in call order.
    #[must_use]
    pub fn removal_attempts(&self) -> Vec<String> {
        self.state.lock().removal_attempts.clone()
    }

    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl MockState {
    fn ensure_reachable(&self) -> Result<()> {
        if let Some(details) = &self.unavailable {
            return Err(VsError::Unavailable {
                backend: BACKEND,
                details: details.clone(),
            });
        }
        if self.closed {
            return Err(VsError::Unavailable {
                backend: BACKEND,
                details: "provider closed".to_string(),
            });
        }
        Ok(())
    }

    fn attachment_index(&self) -> AttachmentIndex {
        if self.containers_unavailable {
            AttachmentIndex::build(None)
        } else {
            AttachmentIndex::build(Some(&self.containers))
        }
    }

    fn enrich(&self, volume: &MockVolume, index: &AttachmentIndex) -> Volume {
        Volume::new(
            volume.name.clone(),
            volume.driver.clone(),
            volume.size_bytes,
            index.attachments(&volume.name),
            volume.project.clone(),
            Utc::now(),
        )
    }
}

impl InventoryProvider for MockProvider {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_volumes(&self, ctx: &Context) -> Result<Vec<Volume>> {
        ctx.check("list volumes")?;
        let state = self.state.lock();
        state.ensure_reachable()?;

        let index = state.attachment_index();
        let mut volumes = Vec::with_capacity(state.volumes.len());
        for volume in &state.volumes {
            ctx.check("list volumes")?;
            if state.detail_failures.contains(&volume.name) {
                volumes.push(Volume::degraded(
                    volume.name.clone(),
                    volume.driver.clone(),
                    Utc::now(),
                ));
            } else {
                volumes.push(state.enrich(volume, &index));
            }
        }
        Ok(volumes)
    }

    fn get_volume_details(&self, ctx: &Context, name: &str) -> Result<Volume> {
        ctx.check("inspect volume")?;
        let state = self.state.lock();
        state.ensure_reachable()?;

        let volume = state
            .volumes
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| VsError::not_found(name))?;
        if state.detail_failures.contains(name) {
            return Err(VsError::Backend {
                operation: format!("inspect volume {name}"),
                details: "injected detail failure".to_string(),
            });
        }
        Ok(state.enrich(volume, &state.attachment_index()))
    }

    fn remove_volume(&self, ctx: &Context, name: &str) -> Result<()> {
        ctx.check("remove volume")?;
        let mut state = self.state.lock();
        state.ensure_reachable()?;
        state.removal_attempts.push(name.to_string());

        match state.removal_failures.get(name) {
            Some(MockFailure::InUse) => {
                return Err(VsError::InUse {
                    name: name.to_string(),
                    details: "volume is in use".to_string(),
                });
            }
            Some(MockFailure::NotFound) => return Err(VsError::not_found(name)),
            Some(MockFailure::Backend(details)) => {
                return Err(VsError::Backend {
                    operation: format!("remove volume {name}"),
                    details: details.clone(),
                });
            }
            None => {}
        }

        let Some(position) = state.volumes.iter().position(|v| v.name == name) else {
            return Err(VsError::not_found(name));
        };
        let users: Vec<String> = state
            .containers
            .iter()
            .filter(|c| c.mounts_volume(name))
            .map(|c| c.name.clone())
            .collect();
        if !users.is_empty() {
            return Err(VsError::InUse {
                name: name.to_string(),
                details: users.join(", "),
            });
        }
        state.volumes.remove(position);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.closed = true;
        Ok(())
    }
}
