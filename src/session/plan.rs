//! Prune plans and their execution against a provider.
//!
//! A [`PrunePlan`] is a pure preview: building one never touches the backend.
//! [`PruneExecutor::execute`] is the only place removals are issued. Each
//! volume is attempted independently; one failure never stops the others.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use serde::{Deserialize, Serialize};

use crate::core::config::PruneConfig;
use crate::core::context::Context;
use crate::core::errors::{ErrorKind, VsError};
use crate::core::units::format_size;
use crate::inventory::Volume;
use crate::logger::{ActivityEvent, ActivityLoggerHandle};
use crate::provider::InventoryProvider;

/// A failed removal, kept as plain data so it can travel through session messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalError {
    pub name: String,
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl RemovalError {
    #[must_use]
    pub fn from_error(name: &str, err: &VsError) -> Self {
        Self {
            name: name.to_string(),
            kind: err.kind(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for RemovalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Selected volumes plus the bytes removing them would free.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PrunePlan {
    /// Selected volumes in snapshot order.
    pub selected: Vec<Volume>,
    /// Sum of known sizes; unknown sizes add nothing.
    pub total_reclaimable_bytes: i64,
    /// Selected volumes whose size is unknown.
    pub unknown_size_count: usize,
}

impl PrunePlan {
    #[must_use]
    pub fn new(selected: Vec<Volume>) -> Self {
        let total_reclaimable_bytes = selected
            .iter()
            .filter(|v| v.size_known())
            .map(|v| v.size_bytes)
            .fold(0i64, i64::saturating_add);
        let unknown_size_count = selected.iter().filter(|v| !v.size_known()).count();
        Self {
            selected,
            total_reclaimable_bytes,
            unknown_size_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.selected.iter().map(|v| v.name.clone()).collect()
    }

    #[must_use]
    pub fn total_human(&self) -> String {
        format_size(self.total_reclaimable_bytes)
    }
}

/// Result of applying a plan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Removed volumes, in plan order.
    pub succeeded: Vec<String>,
    pub failed: BTreeMap<String, RemovalError>,
    /// Volumes beyond the batch limit that were not attempted.
    pub skipped: Vec<String>,
    pub bytes_reclaimed: i64,
}

impl ApplyOutcome {
    /// Every volume in `plan` failed with the same error.
    #[must_use]
    pub fn all_failed(plan: &PrunePlan, err: &VsError) -> Self {
        Self {
            failed: plan
                .selected
                .iter()
                .map(|v| (v.name.clone(), RemovalError::from_error(&v.name, err)))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Every selected volume was attempted and removed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// One-line summary for status bars and CLI output.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "removed {} volume(s), reclaimed {}",
            self.succeeded.len(),
            format_size(self.bytes_reclaimed)
        );
        if !self.failed.is_empty() {
            text.push_str(&format!(", {} failed", self.failed.len()));
        }
        if !self.skipped.is_empty() {
            text.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        text
    }
}

/// Executor knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneOptions {
    pub parallelism: usize,
    pub max_batch: usize,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self::from(&PruneConfig::default())
    }
}

impl From<&PruneConfig> for PruneOptions {
    fn from(cfg: &PruneConfig) -> Self {
        Self {
            parallelism: cfg.parallelism,
            max_batch: cfg.max_batch,
        }
    }
}

type Attempt = (usize, Result<(), RemovalError>, Duration);

/// Issues removals for a plan and records what happened.
pub struct PruneExecutor {
    options: PruneOptions,
    logger: Option<ActivityLoggerHandle>,
}

impl PruneExecutor {
    #[must_use]
    pub fn new(options: PruneOptions, logger: Option<ActivityLoggerHandle>) -> Self {
        Self { options, logger }
    }

    /// Remove the planned volumes, at most `max_batch` of them when it is non-zero.
    ///
    /// The outcome depends only on per-volume results, never on completion order.
    pub fn execute(
        &self,
        provider: &dyn InventoryProvider,
        ctx: &Context,
        plan: &PrunePlan,
    ) -> ApplyOutcome {
        let start = Instant::now();
        let limit = match self.options.max_batch {
            0 => plan.len(),
            cap => plan.len().min(cap),
        };
        let (batch, rest) = plan.selected.split_at(limit);

        let workers = self.options.parallelism.clamp(1, batch.len().max(1));
        let attempts = if workers == 1 {
            batch
                .iter()
                .enumerate()
                .map(|(i, volume)| attempt(provider, ctx, i, volume))
                .collect()
        } else {
            attempt_parallel(provider, ctx, batch, workers)
        };

        let mut results: Vec<Option<(Result<(), RemovalError>, Duration)>> =
            vec![None; batch.len()];
        for (i, result, elapsed) in attempts {
            results[i] = Some((result, elapsed));
        }

        let mut outcome = ApplyOutcome {
            skipped: rest.iter().map(|v| v.name.clone()).collect(),
            ..ApplyOutcome::default()
        };
        for (volume, slot) in batch.iter().zip(results) {
            let (result, elapsed) = slot.unwrap_or_else(|| {
                let err = VsError::ChannelClosed {
                    component: "prune worker",
                };
                (Err(RemovalError::from_error(&volume.name, &err)), Duration::ZERO)
            });
            match result {
                Ok(()) => {
                    if volume.size_known() {
                        outcome.bytes_reclaimed =
                            outcome.bytes_reclaimed.saturating_add(volume.size_bytes);
                    }
                    outcome.succeeded.push(volume.name.clone());
                    self.log(ActivityEvent::VolumeRemoved {
                        name: volume.name.clone(),
                        size_bytes: volume.size_bytes,
                        project: volume.project.clone(),
                        duration_ms: millis(elapsed),
                    });
                }
                Err(failure) => {
                    self.log(ActivityEvent::VolumeRemovalFailed {
                        name: failure.name.clone(),
                        code: failure.code.clone(),
                        message: failure.message.clone(),
                    });
                    outcome.failed.insert(volume.name.clone(), failure);
                }
            }
        }

        self.log(ActivityEvent::PlanApplied {
            succeeded: outcome.succeeded.len(),
            failed: outcome.failed.len(),
            skipped: outcome.skipped.len(),
            bytes_reclaimed: outcome.bytes_reclaimed,
            duration_ms: millis(start.elapsed()),
        });
        outcome
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

fn attempt(provider: &dyn InventoryProvider, ctx: &Context, index: usize, volume: &Volume) -> Attempt {
    let started = Instant::now();
    let result = provider
        .remove_volume(ctx, &volume.name)
        .map_err(|err| RemovalError::from_error(&volume.name, &err));
    (index, result, started.elapsed())
}

/// Scoped workers pull indices from a shared queue and report back on a channel.
fn attempt_parallel(
    provider: &dyn InventoryProvider,
    ctx: &Context,
    batch: &[Volume],
    workers: usize,
) -> Vec<Attempt> {
    let (work_tx, work_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<Attempt>();
    for i in 0..batch.len() {
        let _ = work_tx.send(i);
    }
    drop(work_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(i) = work_rx.recv() {
                    if result_tx.send(attempt(provider, ctx, i, &batch[i])).is_err() {
                        return;
                    }
                }
            });
        }
    });
    drop(result_tx);

    result_rx.into_iter().collect()
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SIZE_UNKNOWN;
    use crate::provider::mock::{MockFailure, MockProvider};
    use chrono::Utc;

    fn vol(name: &str, size: i64) -> Volume {
        Volume::new(name, "local", size, Vec::new(), "", Utc::now())
    }

    fn provider() -> MockProvider {
        MockProvider::new()
            .with_volume("A", "local", 2048, "web")
            .with_volume("B", "local", SIZE_UNKNOWN, "")
            .with_volume("C", "local", 512, "")
            .with_volume("D", "local", 0, "")
            .fail_removal("B", MockFailure::InUse)
    }

    #[test]
    fn plan_total_skips_unknown_sizes_but_keeps_them_selected() {
        let plan = PrunePlan::new(vec![vol("A", 2048), vol("B", SIZE_UNKNOWN)]);
        assert_eq!(plan.names(), vec!["A", "B"]);
        assert_eq!(plan.total_reclaimable_bytes, 2048);
        assert_eq!(plan.unknown_size_count, 1);
        assert_eq!(plan.total_human(), "2.0 KB");
    }

    #[test]
    fn empty_plan_totals_zero() {
        let plan = PrunePlan::new(Vec::new());
        assert!(plan.is_empty());
        assert_eq!(plan.total_reclaimable_bytes, 0);
    }

    #[test]
    fn failures_are_isolated_per_volume() {
        let provider = provider();
        let plan = PrunePlan::new(vec![vol("A", 2048), vol("B", SIZE_UNKNOWN), vol("C", 512)]);
        let executor = PruneExecutor::new(PruneOptions::default(), None);
        let outcome = executor.execute(&provider, &Context::background(), &plan);

        assert_eq!(outcome.succeeded, vec!["A", "C"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed["B"].kind, ErrorKind::InUse);
        assert_eq!(outcome.bytes_reclaimed, 2560);
        assert!(outcome.skipped.is_empty());
        assert_eq!(provider.volume_names(), vec!["B", "D"]);
    }

    #[test]
    fn parallel_outcome_matches_sequential() {
        let plan = PrunePlan::new(vec![
            vol("A", 2048),
            vol("B", SIZE_UNKNOWN),
            vol("C", 512),
            vol("D", 0),
        ]);
        let sequential = PruneExecutor::new(
            PruneOptions {
                parallelism: 1,
                max_batch: 0,
            },
            None,
        )
        .execute(&provider(), &Context::background(), &plan);
        let parallel = PruneExecutor::new(
            PruneOptions {
                parallelism: 4,
                max_batch: 0,
            },
            None,
        )
        .execute(&provider(), &Context::background(), &plan);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn batch_limit_reports_skipped_remainder() {
        let provider = provider();
        let plan = PrunePlan::new(vec![vol("A", 2048), vol("C", 512), vol("D", 0)]);
        let executor = PruneExecutor::new(
            PruneOptions {
                parallelism: 1,
                max_batch: 2,
            },
            None,
        );
        let outcome = executor.execute(&provider, &Context::background(), &plan);
        assert_eq!(outcome.succeeded, vec!["A", "C"]);
        assert_eq!(outcome.skipped, vec!["D"]);
        assert!(outcome.summary().contains("1 skipped"));
        assert_eq!(provider.removal_attempts(), vec!["A", "C"]);
    }

    #[test]
    fn default_options_attempt_every_selected_volume() {
        let mut provider = MockProvider::new();
        let mut selected = Vec::new();
        for i in 0..150 {
            let name = format!("v{i:03}");
            provider = provider.with_volume(&name, "local", 1, "");
            selected.push(vol(&name, 1));
        }
        let plan = PrunePlan::new(selected);
        let outcome =
            PruneExecutor::new(PruneOptions::default(), None).execute(&provider, &Context::background(), &plan);
        assert_eq!(outcome.succeeded.len(), 150);
        assert!(outcome.skipped.is_empty());
        assert!(outcome.is_complete());
        assert!(provider.volume_names().is_empty());
    }

    #[test]
    fn skipped_volumes_leave_the_outcome_incomplete() {
        let outcome = ApplyOutcome {
            succeeded: vec!["A".into()],
            skipped: vec!["B".into()],
            ..ApplyOutcome::default()
        };
        assert!(!outcome.has_failures());
        assert!(!outcome.is_complete());
    }

    #[test]
    fn cancelled_context_fails_every_item_as_cancelled() {
        let provider = provider();
        let ctx = Context::background();
        ctx.cancel();
        let plan = PrunePlan::new(vec![vol("A", 2048), vol("C", 512)]);
        let outcome = PruneExecutor::new(PruneOptions::default(), None).execute(&provider, &ctx, &plan);
        assert!(outcome.succeeded.is_empty());
        assert!(outcome.failed.values().all(|f| f.kind == ErrorKind::Cancelled));
        assert_eq!(provider.volume_names().len(), 4);
    }

    #[test]
    fn all_failed_marks_every_selected_volume() {
        let plan = PrunePlan::new(vec![vol("A", 1), vol("B", 2)]);
        let err = VsError::Unavailable {
            backend: "mock",
            details: "down".into(),
        };
        let outcome = ApplyOutcome::all_failed(&plan, &err);
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.failed.values().all(|f| f.kind == ErrorKind::Unavailable));
    }
}
