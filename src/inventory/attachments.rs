//! Attachment resolution: which containers reference which volume.
//!
//! Resolution never fails. An unavailable container listing (`None`) or an
//! empty one simply leaves every volume without attachments, i.e. orphaned.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A running or stopped container and the volume names it mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub mounts: Vec<String>,
}

impl Container {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, mounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            mounts: mounts.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn mounts_volume(&self, volume: &str) -> bool {
        self.mounts.iter().any(|m| m == volume)
    }
}

/// Distinct container names mounting `volume`, in discovery order.
#[must_use]
pub fn resolve_attachments(containers: Option<&[Container]>, volume: &str) -> Vec<String> {
    let mut attached: Vec<String> = Vec::new();
    for container in containers.unwrap_or_default() {
        if container.mounts_volume(volume) && !attached.contains(&container.name) {
            attached.push(container.name.clone());
        }
    }
    attached
}

/// Precomputed volume → containers map for resolving a whole inventory in one pass.
#[derive(Debug, Clone, Default)]
pub struct AttachmentIndex {
    by_volume: HashMap<String, Vec<String>>,
    available: bool,
}

impl AttachmentIndex {
    /// Build from a container listing; `None` means the listing was unavailable.
    #[must_use]
    pub fn build(containers: Option<&[Container]>) -> Self {
        let Some(containers) = containers else {
            return Self::default();
        };
        let mut by_volume: HashMap<String, Vec<String>> = HashMap::new();
        for container in containers {
            for mount in &container.mounts {
                let names = by_volume.entry(mount.clone()).or_default();
                if !names.contains(&container.name) {
                    names.push(container.name.clone());
                }
            }
        }
        Self {
            by_volume,
            available: true,
        }
    }

    /// Attachments for `volume`; empty when unknown or the listing was unavailable.
    #[must_use]
    pub fn attachments(&self, volume: &str) -> Vec<String> {
        self.by_volume.get(volume).cloned().unwrap_or_default()
    }

    /// Whether a container listing backed this index.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet() -> Vec<Container> {
        vec![
            Container::new("web", ["shop_data", "shop_cache"]),
            Container::new("worker", ["shop_data"]),
            Container::new("db", ["pg_data"]),
            // Same container name listed twice (e.g. renamed replica) must not duplicate.
            Container::new("web", ["shop_data"]),
        ]
    }

    #[test]
    fn resolves_in_discovery_order_without_duplicates() {
        let containers = fleet();
        assert_eq!(
            resolve_attachments(Some(&containers), "shop_data"),
            vec!["web".to_string(), "worker".to_string()]
        );
        assert_eq!(
            resolve_attachments(Some(&containers), "pg_data"),
            vec!["db".to_string()]
        );
    }

    #[test]
    fn unreferenced_volume_resolves_empty() {
        let containers = fleet();
        assert!(resolve_attachments(Some(&containers), "stale").is_empty());
    }

    #[test]
    fn mount_match_is_exact_not_substring() {
        let containers = vec![Container::new("web", ["shop_data_v2"])];
        assert!(resolve_attachments(Some(&containers), "shop_data").is_empty());
    }

    #[test]
    fn unavailable_listing_degrades_to_orphan() {
        assert!(resolve_attachments(None, "shop_data").is_empty());
        assert!(resolve_attachments(Some(&[]), "shop_data").is_empty());

        let index = AttachmentIndex::build(None);
        assert!(!index.is_available());
        assert!(index.attachments("shop_data").is_empty());
    }

    #[test]
    fn index_agrees_with_direct_resolution() {
        let containers = fleet();
        let index = AttachmentIndex::build(Some(&containers));
        assert!(index.is_available());
        for volume in ["shop_data", "shop_cache", "pg_data", "stale"] {
            assert_eq!(
                index.attachments(volume),
                resolve_attachments(Some(&containers), volume),
                "mismatch for {volume}"
            );
        }
    }
}
