//! RAII terminal lifecycle guard.
//!
//! [`TerminalGuard`] enables raw mode, enters the alternate screen and hides
//! the cursor; [`Drop`] undoes all three, including on early error returns. A
//! panic hook restores the terminal before the panic message is printed.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};

/// Set while the terminal is in raw mode; the panic hook checks it.
static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the terminal in dashboard mode for as long as it lives.
pub struct TerminalGuard {
    hook_installed: bool,
}

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);
        if let Err(err) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            restore_terminal();
            return Err(err);
        }

        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));

        Ok(Self {
            hook_installed: true,
        })
    }

    /// Terminal dimensions, falling back to 80x24 when unknown.
    #[must_use]
    pub fn size() -> (u16, u16) {
        terminal::size()
            .ok()
            .filter(|&(cols, rows)| cols > 0 && rows > 0)
            .unwrap_or((80, 24))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.hook_installed {
            let _ = panic::take_hook();
        }
        restore_terminal();
    }
}

/// Leave the alternate screen and raw mode. Only the first call does work.
fn restore_terminal() {
    if RAW_MODE_ACTIVE.swap(false, Ordering::SeqCst) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = stdout.flush();
    }
}
