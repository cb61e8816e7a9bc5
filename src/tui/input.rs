//! Key bindings: terminal key events to session messages.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::session::{Pane, SessionModel, SessionMsg};

const PAGE: isize = 10;

/// Resolve a key press against the current model. `None` means ignore.
#[must_use]
pub fn resolve_key(key: &KeyEvent, model: &SessionModel) -> Option<SessionMsg> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(SessionMsg::Quit);
    }
    if model.awaiting_confirm() {
        return Some(match key.code {
            KeyCode::Char('y' | 'Y') => SessionMsg::ConfirmApply,
            _ => SessionMsg::CancelApply,
        });
    }

    let msg = match key.code {
        KeyCode::Up | KeyCode::Char('k') => SessionMsg::MoveCursor(-1),
        KeyCode::Down | KeyCode::Char('j') => SessionMsg::MoveCursor(1),
        KeyCode::PageUp => SessionMsg::MoveCursor(-PAGE),
        KeyCode::PageDown => SessionMsg::MoveCursor(PAGE),
        KeyCode::Home => SessionMsg::MoveCursor(isize::MIN),
        KeyCode::End => SessionMsg::MoveCursor(isize::MAX),
        KeyCode::Char(' ') => SessionMsg::ToggleMarkAtCursor,
        KeyCode::Char('o') => SessionMsg::MarkAllOrphans,
        KeyCode::Char('c') => SessionMsg::ClearMarks,
        KeyCode::Enter => SessionMsg::ToggleDetails,
        KeyCode::Tab => SessionMsg::CyclePane,
        KeyCode::Char('p') => SessionMsg::OpenPlan,
        KeyCode::Char('a') if model.pane() == Pane::Plan => SessionMsg::RequestApply,
        KeyCode::Char('r') => SessionMsg::RequestRefresh,
        KeyCode::Char('q') | KeyCode::Esc => SessionMsg::Quit,
        _ => return None,
    };
    Some(msg)
}
