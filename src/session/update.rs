//! Pure reducer for the session state machine.
//!
//! `update()` applies one message to the model and returns the side effect the
//! driver should run next. It performs no I/O.

use chrono::Utc;

use crate::core::errors::ErrorKind;
use crate::inventory::Volume;
use crate::session::model::{LoadState, Pane, SessionModel};
use crate::session::plan::ApplyOutcome;

/// Intents and results fed into the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMsg {
    /// Table → Details → Plan → Table.
    CyclePane,
    OpenPlan,
    /// Table ↔ Details; from Plan, go to Details.
    ToggleDetails,
    MoveCursor(isize),
    /// Flip the mark on a row of the current snapshot; out of range is ignored.
    ToggleMark(usize),
    ToggleMarkAtCursor,
    MarkAllOrphans,
    ClearMarks,
    RequestRefresh,
    /// A fresh snapshot arrived.
    InventoryLoaded(Vec<Volume>),
    InventoryFailed { kind: ErrorKind, message: String },
    /// Ask to apply the current plan (may require confirmation).
    RequestApply,
    ConfirmApply,
    CancelApply,
    ApplyFinished(ApplyOutcome),
    Quit,
}

/// Side effects requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCmd {
    None,
    FetchInventory,
    /// Remove these volumes, in order.
    ApplyPlan(Vec<String>),
    Quit,
}

pub fn update(model: &mut SessionModel, msg: SessionMsg) -> SessionCmd {
    match msg {
        SessionMsg::CyclePane => {
            model.pane = model.pane.next();
            SessionCmd::None
        }
        SessionMsg::OpenPlan => {
            model.pane = Pane::Plan;
            SessionCmd::None
        }
        SessionMsg::ToggleDetails => {
            model.pane = if model.pane == Pane::Details {
                Pane::Table
            } else {
                Pane::Details
            };
            SessionCmd::None
        }
        SessionMsg::MoveCursor(delta) => {
            if let Some(last) = model.snapshot.len().checked_sub(1) {
                let target = if delta.is_negative() {
                    model.cursor.saturating_sub(delta.unsigned_abs())
                } else {
                    model.cursor.saturating_add(delta.unsigned_abs())
                };
                model.cursor = target.min(last);
            }
            SessionCmd::None
        }
        SessionMsg::ToggleMark(index) => {
            toggle_mark(model, index);
            SessionCmd::None
        }
        SessionMsg::ToggleMarkAtCursor => {
            let index = model.cursor;
            toggle_mark(model, index);
            SessionCmd::None
        }
        SessionMsg::MarkAllOrphans => {
            let orphans: Vec<String> = model
                .snapshot
                .iter()
                .filter(|v| v.is_orphan())
                .map(|v| v.name.clone())
                .collect();
            model.notice = Some(format!("marked {} orphan volume(s)", orphans.len()));
            model.marked.extend(orphans);
            SessionCmd::None
        }
        SessionMsg::ClearMarks => {
            model.marked.clear();
            model.awaiting_confirm = false;
            SessionCmd::None
        }
        SessionMsg::RequestRefresh => SessionCmd::FetchInventory,
        SessionMsg::InventoryLoaded(snapshot) => {
            model.replace_snapshot(snapshot);
            model.load_state = LoadState::Loaded { at: Utc::now() };
            model.ever_loaded = true;
            SessionCmd::None
        }
        SessionMsg::InventoryFailed { kind, message } => {
            if model.ever_loaded {
                // Keep the last good snapshot on screen but flag it.
                model.notice = Some(format!("refresh failed, showing last snapshot: {message}"));
            } else {
                model.replace_snapshot(Vec::new());
            }
            model.load_state = LoadState::Failed { kind, message };
            SessionCmd::None
        }
        SessionMsg::RequestApply => {
            let plan = model.compute_plan();
            if plan.is_empty() {
                model.notice = Some("nothing marked".to_string());
                SessionCmd::None
            } else if model.confirm_required {
                model.awaiting_confirm = true;
                model.notice = Some(format!(
                    "remove {} volume(s), reclaiming {}? [y/N]",
                    plan.len(),
                    plan.total_human()
                ));
                SessionCmd::None
            } else {
                SessionCmd::ApplyPlan(plan.names())
            }
        }
        SessionMsg::ConfirmApply => {
            if !model.awaiting_confirm {
                return SessionCmd::None;
            }
            model.awaiting_confirm = false;
            let names = model.compute_plan().names();
            if names.is_empty() {
                SessionCmd::None
            } else {
                model.notice = Some(format!("removing {} volume(s)…", names.len()));
                SessionCmd::ApplyPlan(names)
            }
        }
        SessionMsg::CancelApply => {
            if model.awaiting_confirm {
                model.awaiting_confirm = false;
                model.notice = Some("apply cancelled".to_string());
            }
            SessionCmd::None
        }
        SessionMsg::ApplyFinished(outcome) => {
            model.notice = Some(outcome.summary());
            model.last_outcome = Some(outcome);
            SessionCmd::FetchInventory
        }
        SessionMsg::Quit => {
            model.quit = true;
            SessionCmd::Quit
        }
    }
}

fn toggle_mark(model: &mut SessionModel, index: usize) {
    let Some(name) = model.snapshot.get(index).map(|v| v.name.clone()) else {
        return;
    };
    if !model.marked.remove(&name) {
        model.marked.insert(name);
    }
}
