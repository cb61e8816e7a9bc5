//! Session state machine and the driver that connects it to a provider.
//!
//! [`update::update`] is the pure reducer. [`Session`] owns the model, feeds it
//! messages, and executes the [`update::SessionCmd`]s it returns against the
//! provider. Front ends (CLI, dashboard) only inject messages and read the model.

pub mod model;
pub mod plan;
pub mod update;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

pub use model::{LoadState, Pane, SessionModel};
pub use plan::{ApplyOutcome, PruneExecutor, PruneOptions, PrunePlan, RemovalError};
pub use update::{SessionCmd, SessionMsg, update};

use crate::core::config::Config;
use crate::core::context::Context;
use crate::core::errors::{Result, VsError};
use crate::inventory::Volume;
use crate::logger::{ActivityEvent, ActivityLoggerHandle};
use crate::provider::InventoryProvider;

/// How a session should behave, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub start_pane: Pane,
    pub confirm: bool,
    pub prune: PruneOptions,
    pub logger: Option<ActivityLoggerHandle>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_pane: Pane::Table,
            confirm: true,
            prune: PruneOptions::default(),
            logger: None,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn from_config(config: &Config, logger: Option<ActivityLoggerHandle>) -> Self {
        Self {
            start_pane: config.dashboard.start_pane.into(),
            confirm: config.prune.confirm,
            prune: PruneOptions::from(&config.prune),
            logger,
        }
    }
}

/// A running session: model plus the provider it reads from.
///
/// A session built with [`Session::unavailable`] has no provider; it renders
/// an explicit failure state and every backend command fails with `Unavailable`.
pub struct Session {
    model: SessionModel,
    provider: Option<Arc<dyn InventoryProvider>>,
    unavailable_reason: Option<String>,
    executor: PruneExecutor,
    logger: Option<ActivityLoggerHandle>,
}

impl Session {
    #[must_use]
    pub fn new(provider: Arc<dyn InventoryProvider>, options: SessionOptions) -> Self {
        Self {
            model: SessionModel::new(options.start_pane, options.confirm),
            provider: Some(provider),
            unavailable_reason: None,
            executor: PruneExecutor::new(options.prune, options.logger.clone()),
            logger: options.logger,
        }
    }

    /// Session for a backend that could not be reached at startup.
    #[must_use]
    pub fn unavailable(error: &VsError, options: SessionOptions) -> Self {
        let mut session = Self {
            model: SessionModel::new(options.start_pane, options.confirm),
            provider: None,
            unavailable_reason: Some(error.to_string()),
            executor: PruneExecutor::new(options.prune, options.logger.clone()),
            logger: options.logger,
        };
        update(
            &mut session.model,
            SessionMsg::InventoryFailed {
                kind: error.kind(),
                message: error.to_string(),
            },
        );
        session
    }

    #[must_use]
    pub const fn model(&self) -> &SessionModel {
        &self.model
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.provider.as_ref().map_or("none", |p| p.backend_name())
    }

    /// Startup hook: first inventory read. The model's [`LoadState`] tells a
    /// failed read apart from an empty inventory.
    pub fn start(&mut self, ctx: &Context) -> &LoadState {
        if self.provider.is_some() {
            self.dispatch(ctx, SessionMsg::RequestRefresh);
        }
        self.model.load_state()
    }

    /// Re-read the inventory now; returns the error when the read failed.
    pub fn refresh(&mut self, ctx: &Context) -> Result<usize> {
        let loaded = self.load(ctx);
        let result = loaded.as_ref().map(Vec::len).map_err(clone_error);
        let msg = match loaded {
            Ok(volumes) => SessionMsg::InventoryLoaded(volumes),
            Err(err) => SessionMsg::InventoryFailed {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        self.dispatch(ctx, msg);
        result
    }

    /// Apply a message and run every command it produces.
    ///
    /// Returns `false` once the session has been asked to quit.
    pub fn dispatch(&mut self, ctx: &Context, msg: SessionMsg) -> bool {
        let mut pending = VecDeque::from([msg]);
        while let Some(msg) = pending.pop_front() {
            let cmd = update(&mut self.model, msg);
            self.run(ctx, cmd, &mut pending);
        }
        !self.model.should_quit()
    }

    /// Remove every marked volume, then refresh.
    pub fn apply_plan(&mut self, ctx: &Context) -> ApplyOutcome {
        let plan = self.model.compute_plan();
        let outcome = self.execute(ctx, &plan);
        self.dispatch(ctx, SessionMsg::ApplyFinished(outcome.clone()));
        outcome
    }

    /// Fresh details for the volume under the cursor.
    pub fn inspect_current(&self, ctx: &Context) -> Result<Volume> {
        let name = self
            .model
            .current_volume()
            .map(|v| v.name.clone())
            .ok_or_else(|| VsError::not_found("<no selection>"))?;
        self.provider()?.get_volume_details(ctx, &name)
    }

    /// Release the provider. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        match self.provider.take() {
            Some(provider) => provider.close(),
            None => Ok(()),
        }
    }

    fn provider(&self) -> Result<&Arc<dyn InventoryProvider>> {
        self.provider.as_ref().ok_or_else(|| VsError::Unavailable {
            backend: "none",
            details: self
                .unavailable_reason
                .clone()
                .unwrap_or_else(|| "session closed".to_string()),
        })
    }

    fn run(&mut self, ctx: &Context, cmd: SessionCmd, pending: &mut VecDeque<SessionMsg>) {
        match cmd {
            SessionCmd::None | SessionCmd::Quit => {}
            SessionCmd::FetchInventory => {
                let msg = match self.load(ctx) {
                    Ok(volumes) => SessionMsg::InventoryLoaded(volumes),
                    Err(err) => SessionMsg::InventoryFailed {
                        kind: err.kind(),
                        message: err.to_string(),
                    },
                };
                pending.push_back(msg);
            }
            SessionCmd::ApplyPlan(names) => {
                let plan = PrunePlan::new(
                    self.model
                        .snapshot()
                        .iter()
                        .filter(|v| names.contains(&v.name))
                        .cloned()
                        .collect(),
                );
                let outcome = self.execute(ctx, &plan);
                pending.push_back(SessionMsg::ApplyFinished(outcome));
            }
        }
    }

    fn load(&self, ctx: &Context) -> Result<Vec<Volume>> {
        let provider = self.provider()?;
        let started = Instant::now();
        match provider.list_volumes(ctx) {
            Ok(volumes) => {
                self.log(ActivityEvent::InventoryLoaded {
                    backend: provider.backend_name().to_string(),
                    volumes: volumes.len(),
                    orphans: volumes.iter().filter(|v| v.is_orphan()).count(),
                    duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
                Ok(volumes)
            }
            Err(err) => {
                self.log(ActivityEvent::InventoryFailed {
                    backend: provider.backend_name().to_string(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn execute(&self, ctx: &Context, plan: &PrunePlan) -> ApplyOutcome {
        match self.provider() {
            Ok(provider) => self.executor.execute(provider.as_ref(), ctx, plan),
            Err(err) => ApplyOutcome::all_failed(plan, &err),
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// `VsError` is not `Clone` (it can carry an `io::Error`); rebuild the parts
/// callers branch on.
fn clone_error(err: &VsError) -> VsError {
    match err {
        VsError::Unavailable { backend, details } => VsError::Unavailable {
            backend: *backend,
            details: details.clone(),
        },
        VsError::Cancelled { operation } => VsError::cancelled(operation.clone()),
        VsError::NotFound { name } => VsError::not_found(name.clone()),
        other => VsError::Runtime {
            details: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::inventory::SIZE_UNKNOWN;
    use crate::provider::mock::{MockFailure, MockProvider};

    fn session_with(provider: MockProvider) -> (Session, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let dyn_provider: Arc<dyn InventoryProvider> = provider.clone();
        (Session::new(dyn_provider, SessionOptions::default()), provider)
    }

    #[test]
    fn start_loads_inventory() {
        let (mut session, _) = session_with(
            MockProvider::new()
                .with_volume("A", "local", 2048, "")
                .with_container("web", &["A"]),
        );
        assert!(matches!(
            session.start(&Context::background()),
            LoadState::Loaded { .. }
        ));
        assert_eq!(session.model().snapshot().len(), 1);
    }

    #[test]
    fn start_against_down_backend_reports_failure() {
        let (mut session, _) = session_with(MockProvider::new().unavailable("daemon down"));
        let state = session.start(&Context::background()).clone();
        assert!(matches!(
            state,
            LoadState::Failed {
                kind: ErrorKind::Unavailable,
                ..
            }
        ));
    }

    #[test]
    fn unavailable_session_fails_commands_without_panicking() {
        let err = VsError::Unavailable {
            backend: "docker-cli",
            details: "no daemon".into(),
        };
        let mut session = Session::unavailable(&err, SessionOptions::default());
        assert!(session.model().is_degraded());
        assert_eq!(session.backend_name(), "none");
        assert!(session.refresh(&Context::background()).is_err());
        let outcome = session.apply_plan(&Context::background());
        assert!(outcome.succeeded.is_empty());
        assert!(session.close().is_ok());
    }

    #[test]
    fn confirmed_apply_through_dispatch_refreshes() {
        let (mut session, provider) = session_with(
            MockProvider::new()
                .with_volume("A", "local", 2048, "")
                .with_volume("B", "local", SIZE_UNKNOWN, "")
                .fail_removal("B", MockFailure::InUse),
        );
        let ctx = Context::background();
        session.start(&ctx);
        session.dispatch(&ctx, SessionMsg::MarkAllOrphans);
        session.dispatch(&ctx, SessionMsg::OpenPlan);
        session.dispatch(&ctx, SessionMsg::RequestApply);
        assert!(session.model().awaiting_confirm());
        session.dispatch(&ctx, SessionMsg::ConfirmApply);

        let outcome = session.model().last_outcome().expect("outcome recorded");
        assert_eq!(outcome.succeeded, vec!["A"]);
        assert_eq!(outcome.failed["B"].kind, ErrorKind::InUse);
        let names: Vec<&str> = session.model().snapshot().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["B"]);
        assert_eq!(provider.volume_names(), vec!["B"]);
        // B failed and still exists, so it stays marked.
        assert!(session.model().marked().contains("B"));
    }

    #[test]
    fn inspect_current_refetches_details() {
        let (mut session, _) = session_with(
            MockProvider::new()
                .with_volume("A", "local", 10, "shop")
                .with_container("web", &["A"]),
        );
        let ctx = Context::background();
        session.start(&ctx);
        let details = session.inspect_current(&ctx).expect("details");
        assert_eq!(details.project, "shop");
        assert_eq!(details.attached(), ["web".to_string()]);
    }

    #[test]
    fn inspect_with_empty_snapshot_is_not_found() {
        let (mut session, _) = session_with(MockProvider::new());
        let ctx = Context::background();
        session.start(&ctx);
        let err = session.inspect_current(&ctx).expect_err("nothing selected");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn close_is_idempotent_and_reaches_provider() {
        let (mut session, provider) = session_with(MockProvider::new());
        session.close().expect("close");
        session.close().expect("close again");
        assert_eq!(provider.close_calls(), 1);
        drop(session);
        assert_eq!(provider.close_calls(), 1);
    }

    #[test]
    fn quit_stops_dispatch() {
        let (mut session, _) = session_with(MockProvider::new());
        assert!(!session.dispatch(&Context::background(), SessionMsg::Quit));
    }
}
