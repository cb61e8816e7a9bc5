//! Dashboard event loop.
//!
//! Paints frames from [`render::compose`], turns key presses into
//! [`SessionMsg`]s via [`resolve_key`], and re-reads the inventory on
//! a fixed interval. The session does all backend work; this module owns the
//! terminal only.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event};
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use super::input::resolve_key;
use super::render::{self, Line, Tone};
use super::terminal_guard::TerminalGuard;
use crate::core::context::Context;
use crate::inventory::Volume;
use crate::session::{Pane, Session, SessionMsg};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Details for the focused volume, fetched once per name until the inventory changes.
struct DetailsCache {
    name: String,
    result: Result<Volume, String>,
}

/// Run the interactive dashboard until the user quits or `ctx` is cancelled.
///
/// `refresh` of `None` disables the automatic re-read; `r` still works.
pub fn run(session: &mut Session, ctx: &Context, refresh: Option<Duration>) -> io::Result<()> {
    let _guard = TerminalGuard::new()?;
    let mut stdout = io::stdout();
    run_inner(&mut stdout, session, ctx, refresh)
}

fn run_inner(
    stdout: &mut io::Stdout,
    session: &mut Session,
    ctx: &Context,
    refresh: Option<Duration>,
) -> io::Result<()> {
    let mut details: Option<DetailsCache> = None;
    let mut last_refresh = Instant::now();

    loop {
        if ctx.is_cancelled() || session.model().should_quit() {
            return Ok(());
        }

        if session.model().pane() == Pane::Details {
            refresh_details(session, ctx, &mut details);
        }
        let (cols, rows) = TerminalGuard::size();
        let view = details.as_ref().map(|d| d.result.as_ref().map_err(String::as_str));
        let frame = render::compose(session.model(), session.backend_name(), view, usize::from(rows));
        paint(stdout, &frame, cols)?;

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(msg) = resolve_key(&key, session.model()) {
                        let refreshing = matches!(msg, SessionMsg::RequestRefresh);
                        if reloads_inventory(&msg) {
                            details = None;
                        }
                        if !session.dispatch(ctx, msg) {
                            return Ok(());
                        }
                        if refreshing {
                            last_refresh = Instant::now();
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(interval) = refresh
            && last_refresh.elapsed() >= interval
            && !session.model().awaiting_confirm()
        {
            details = None;
            session.dispatch(ctx, SessionMsg::RequestRefresh);
            last_refresh = Instant::now();
        }
    }
}

/// Messages whose handling re-reads or mutates the backend inventory.
fn reloads_inventory(msg: &SessionMsg) -> bool {
    matches!(
        msg,
        SessionMsg::RequestRefresh | SessionMsg::RequestApply | SessionMsg::ConfirmApply
    )
}

fn refresh_details(session: &Session, ctx: &Context, cache: &mut Option<DetailsCache>) {
    let Some(name) = session.model().current_volume().map(|v| v.name.clone()) else {
        *cache = None;
        return;
    };
    if cache.as_ref().is_some_and(|c| c.name == name) {
        return;
    }
    let result = session.inspect_current(ctx).map_err(|e| e.to_string());
    *cache = Some(DetailsCache { name, result });
}

fn paint(stdout: &mut io::Stdout, frame: &[Line], cols: u16) -> io::Result<()> {
    queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
    let width = usize::from(cols);
    for (row, line) in frame.iter().enumerate() {
        let Ok(row) = u16::try_from(row) else { break };
        let text: String = line.text.chars().take(width).collect();
        queue!(stdout, MoveTo(0, row))?;
        if matches!(line.tone, Tone::Title | Tone::Cursor | Tone::Alert) {
            queue!(stdout, SetAttribute(Attribute::Bold))?;
        }
        if line.tone == Tone::Cursor {
            queue!(stdout, SetAttribute(Attribute::Reverse))?;
        }
        queue!(
            stdout,
            SetForegroundColor(tone_color(line.tone)),
            Print(text),
            SetAttribute(Attribute::Reset)
        )?;
    }
    stdout.flush()
}

const fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Title => Color::Cyan,
        Tone::Normal | Tone::Cursor => Color::White,
        Tone::Dim => Color::DarkGrey,
        Tone::Orphan => Color::Yellow,
        Tone::Alert => Color::Red,
        Tone::Notice => Color::Green,
    }
}
