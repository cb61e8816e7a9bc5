//! Session state: snapshot, active pane, cursor and the marked set.
//!
//! Marks are keyed by volume name, not row index, so a refresh that reorders
//! or resizes the inventory can never re-target a mark at a different volume.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::core::config::StartPane;
use crate::core::errors::ErrorKind;
use crate::inventory::Volume;
use crate::session::plan::{ApplyOutcome, PrunePlan};

/// Which view is active. Exactly one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Pane {
    #[default]
    Table,
    Details,
    Plan,
}

impl Pane {
    /// Table → Details → Plan → Table.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Table => Self::Details,
            Self::Details => Self::Plan,
            Self::Plan => Self::Table,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Table => "Volumes",
            Self::Details => "Details",
            Self::Plan => "Prune plan",
        }
    }
}

impl From<StartPane> for Pane {
    fn from(p: StartPane) -> Self {
        match p {
            StartPane::Table => Self::Table,
            StartPane::Details => Self::Details,
            StartPane::Plan => Self::Plan,
        }
    }
}

/// Outcome of the most recent inventory read.
///
/// `Failed` is kept distinct from a loaded-but-empty inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loaded { at: DateTime<Utc> },
    Failed { kind: ErrorKind, message: String },
}

/// Single-writer session state; mutate it only through [`super::update::update`].
#[derive(Debug, Clone, Default)]
pub struct SessionModel {
    pub(super) snapshot: Vec<Volume>,
    pub(super) pane: Pane,
    pub(super) cursor: usize,
    pub(super) marked: BTreeSet<String>,
    pub(super) load_state: LoadState,
    pub(super) ever_loaded: bool,
    pub(super) confirm_required: bool,
    pub(super) awaiting_confirm: bool,
    pub(super) last_outcome: Option<ApplyOutcome>,
    pub(super) notice: Option<String>,
    pub(super) quit: bool,
}

impl SessionModel {
    #[must_use]
    pub fn new(start: Pane, confirm_required: bool) -> Self {
        Self {
            pane: start,
            confirm_required,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> &[Volume] {
        &self.snapshot
    }

    #[must_use]
    pub const fn pane(&self) -> Pane {
        self.pane
    }

    /// Cursor row; always `< snapshot().len()` when the snapshot is non-empty.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn current_volume(&self) -> Option<&Volume> {
        self.snapshot.get(self.cursor)
    }

    /// Marked volume names.
    #[must_use]
    pub const fn marked(&self) -> &BTreeSet<String> {
        &self.marked
    }

    /// Marked rows of the current snapshot, ascending.
    #[must_use]
    pub fn marked_indices(&self) -> Vec<usize> {
        self.snapshot
            .iter()
            .enumerate()
            .filter(|(_, v)| self.marked.contains(&v.name))
            .map(|(i, _)| i)
            .collect()
    }

    #[must_use]
    pub fn is_marked(&self, index: usize) -> bool {
        self.snapshot
            .get(index)
            .is_some_and(|v| self.marked.contains(&v.name))
    }

    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.snapshot.iter().filter(|v| v.is_orphan()).count()
    }

    #[must_use]
    pub const fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// True when the last read failed; the snapshot may be stale or empty.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self.load_state, LoadState::Failed { .. })
    }

    #[must_use]
    pub const fn awaiting_confirm(&self) -> bool {
        self.awaiting_confirm
    }

    #[must_use]
    pub const fn last_outcome(&self) -> Option<&ApplyOutcome> {
        self.last_outcome.as_ref()
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    /// Marked volumes in snapshot order with their reclaimable total. Never
    /// calls the backend.
    #[must_use]
    pub fn compute_plan(&self) -> PrunePlan {
        PrunePlan::new(
            self.snapshot
                .iter()
                .filter(|v| self.marked.contains(&v.name))
                .cloned()
                .collect(),
        )
    }

    /// Swap in a new snapshot, dropping marks for vanished names and following
    /// the cursor's volume by name (clamped index when it disappeared).
    pub(super) fn replace_snapshot(&mut self, snapshot: Vec<Volume>) {
        let focused = self.current_volume().map(|v| v.name.clone());
        self.marked
            .retain(|name| snapshot.iter().any(|v| &v.name == name));
        self.cursor = focused
            .and_then(|name| snapshot.iter().position(|v| v.name == name))
            .unwrap_or_else(|| self.cursor.min(snapshot.len().saturating_sub(1)));
        self.snapshot = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SIZE_UNKNOWN;

    fn vol(name: &str, size: i64, attached: &[&str]) -> Volume {
        Volume::new(
            name,
            "local",
            size,
            attached.iter().map(|s| (*s).to_string()).collect(),
            "",
            Utc::now(),
        )
    }

    #[test]
    fn pane_cycle_has_period_three() {
        for start in [Pane::Table, Pane::Details, Pane::Plan] {
            assert_eq!(start.next().next().next(), start);
            assert_ne!(start.next(), start);
        }
    }

    #[test]
    fn start_pane_maps_from_config() {
        assert_eq!(Pane::from(StartPane::Plan), Pane::Plan);
        assert_eq!(Pane::from(StartPane::Table), Pane::Table);
    }

    #[test]
    fn refresh_follows_cursor_by_name() {
        let mut model = SessionModel::new(Pane::Table, true);
        model.replace_snapshot(vec![vol("a", 1, &[]), vol("b", 2, &[]), vol("c", 3, &[])]);
        model.cursor = 1;
        model.marked.insert("c".into());

        model.replace_snapshot(vec![vol("c", 3, &[]), vol("x", 9, &[]), vol("b", 2, &[])]);
        assert_eq!(model.current_volume().map(|v| v.name.as_str()), Some("b"));
        assert_eq!(model.marked_indices(), vec![0]);
    }

    #[test]
    fn refresh_clamps_cursor_when_volume_vanishes() {
        let mut model = SessionModel::new(Pane::Table, true);
        model.replace_snapshot(vec![vol("a", 1, &[]), vol("b", 2, &[]), vol("c", 3, &[])]);
        model.cursor = 2;
        model.marked.insert("c".into());
        model.marked.insert("a".into());

        model.replace_snapshot(vec![vol("a", 1, &[])]);
        assert_eq!(model.cursor(), 0);
        assert_eq!(model.marked().len(), 1);
        assert!(model.marked().contains("a"));

        model.replace_snapshot(Vec::new());
        assert_eq!(model.cursor(), 0);
        assert!(model.marked().is_empty());
        assert!(model.current_volume().is_none());
    }

    #[test]
    fn plan_lists_marked_in_snapshot_order() {
        let mut model = SessionModel::new(Pane::Table, true);
        model.replace_snapshot(vec![
            vol("A", 2048, &["web"]),
            vol("B", SIZE_UNKNOWN, &[]),
            vol("C", 10, &[]),
        ]);
        model.marked.insert("B".into());
        model.marked.insert("A".into());

        let plan = model.compute_plan();
        assert_eq!(plan.names(), vec!["A", "B"]);
        assert_eq!(plan.total_reclaimable_bytes, 2048);
        assert_eq!(model.orphan_count(), 2);
    }
}
