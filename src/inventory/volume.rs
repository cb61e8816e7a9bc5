//! Canonical volume record and its derived orphan status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::units::format_size;

/// Sentinel byte size meaning "not measured".
pub const SIZE_UNKNOWN: i64 = -1;

/// One volume as seen by the most recent inventory read.
///
/// `attached` and `orphan` are private so the orphan flag can only be derived:
/// every constructor and [`Volume::with_attachments`] recompute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VolumeRecord")]
pub struct Volume {
    /// Unique, stable handle used for lookup and deletion.
    pub name: String,
    /// Storage driver tag (e.g. `local`).
    pub driver: String,
    /// Size in bytes, or [`SIZE_UNKNOWN`].
    pub size_bytes: i64,
    /// Grouping label; empty means ungrouped.
    pub project: String,
    /// When the record was last read successfully.
    pub last_seen: DateTime<Utc>,
    attached: Vec<String>,
    orphan: bool,
}

impl Volume {
    /// Build a record; negative sizes collapse to [`SIZE_UNKNOWN`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        driver: impl Into<String>,
        size_bytes: i64,
        attached: Vec<String>,
        project: impl Into<String>,
        last_seen: DateTime<Utc>,
    ) -> Self {
        let orphan = attached.is_empty();
        Self {
            name: name.into(),
            driver: driver.into(),
            size_bytes: size_bytes.max(SIZE_UNKNOWN),
            project: project.into(),
            last_seen,
            attached,
            orphan,
        }
    }

    /// Record for a volume whose detail lookup failed: unknown size, no
    /// attachments, orphan, no project.
    #[must_use]
    pub fn degraded(name: impl Into<String>, driver: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self::new(name, driver, SIZE_UNKNOWN, Vec::new(), "", last_seen)
    }

    /// Same record with a new attachment list; orphan status follows.
    #[must_use]
    pub fn with_attachments(mut self, attached: Vec<String>) -> Self {
        self.orphan = attached.is_empty();
        self.attached = attached;
        self
    }

    /// Container names bound to this volume, in discovery order.
    #[must_use]
    pub fn attached(&self) -> &[String] {
        &self.attached
    }

    #[must_use]
    pub const fn is_orphan(&self) -> bool {
        self.orphan
    }

    #[must_use]
    pub const fn size_known(&self) -> bool {
        self.size_bytes >= 0
    }

    #[must_use]
    pub fn size_human(&self) -> String {
        format_size(self.size_bytes)
    }

    #[must_use]
    pub const fn status_label(&self) -> &'static str {
        if self.orphan { "ORPHAN" } else { "ACTIVE" }
    }

    /// Comma-joined attachments, `<none>` when empty.
    #[must_use]
    pub fn attached_label(&self, separator: &str) -> String {
        if self.attached.is_empty() {
            "<none>".to_string()
        } else {
            self.attached.join(separator)
        }
    }

    /// Project label, `<none>` when ungrouped.
    #[must_use]
    pub fn project_label(&self) -> &str {
        if self.project.is_empty() {
            "<none>"
        } else {
            &self.project
        }
    }
}

/// Wire shape accepted on deserialization; `orphan` is ignored and re-derived.
#[derive(Deserialize)]
struct VolumeRecord {
    name: String,
    driver: String,
    size_bytes: i64,
    #[serde(default)]
    attached: Vec<String>,
    #[serde(default)]
    project: String,
    last_seen: DateTime<Utc>,
}

impl From<VolumeRecord> for Volume {
    fn from(r: VolumeRecord) -> Self {
        Self::new(r.name, r.driver, r.size_bytes, r.attached, r.project, r.last_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn orphan_derives_from_attachments() {
        let active = Volume::new("a", "local", 2048, vec!["web".into()], "shop", ts());
        assert!(!active.is_orphan());
        assert_eq!(active.status_label(), "ACTIVE");

        let orphan = Volume::new("b", "local", 0, Vec::new(), "", ts());
        assert!(orphan.is_orphan());
        assert_eq!(orphan.status_label(), "ORPHAN");
    }

    #[test]
    fn with_attachments_recomputes_orphan() {
        let v = Volume::new("a", "local", 10, vec!["web".into()], "", ts());
        let detached = v.with_attachments(Vec::new());
        assert!(detached.is_orphan());
        let reattached = detached.with_attachments(vec!["db".into()]);
        assert!(!reattached.is_orphan());
        assert_eq!(reattached.attached(), ["db".to_string()]);
    }

    #[test]
    fn degraded_record_uses_sentinels() {
        let v = Volume::degraded("c", "local", ts());
        assert_eq!(v.size_bytes, SIZE_UNKNOWN);
        assert!(v.attached().is_empty());
        assert!(v.is_orphan());
        assert_eq!(v.project, "");
        assert_eq!(v.size_human(), "?");
    }

    #[test]
    fn negative_sizes_collapse_to_sentinel() {
        let v = Volume::new("d", "local", -77, Vec::new(), "", ts());
        assert_eq!(v.size_bytes, SIZE_UNKNOWN);
        assert!(!v.size_known());
    }

    #[test]
    fn labels_use_none_placeholders() {
        let v = Volume::new("e", "local", 1, Vec::new(), "", ts());
        assert_eq!(v.attached_label(","), "<none>");
        assert_eq!(v.project_label(), "<none>");

        let w = Volume::new("f", "local", 1, vec!["a".into(), "b".into()], "p", ts());
        assert_eq!(w.attached_label(", "), "a, b");
        assert_eq!(w.project_label(), "p");
    }

    #[test]
    fn deserialization_rederives_orphan() {
        let json = r#"{"name":"g","driver":"local","size_bytes":5,"attached":[],"project":"","last_seen":"2026-10-19T12:00:00Z","orphan":false}"#;
        let v: Volume = serde_json::from_str(json).expect("volume json");
        assert!(v.is_orphan());

        let round = serde_json::to_value(&v).expect("serialize");
        assert_eq!(round["orphan"], true);
    }
}
