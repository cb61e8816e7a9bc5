//! SIGINT/SIGTERM handling for the binary.
//!
//! Signals set a shared flag via `signal-hook`; the flag backs a [`Context`],
//! so an in-flight listing or prune stops at its next cancellation check and
//! any running backend subprocess is killed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::context::Context;

/// Shutdown flag shared between the signal handler and the main thread.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Register SIGINT and SIGTERM. Registration is best-effort; failures are
    /// reported on stderr and leave the process with default signal behavior.
    #[must_use]
    pub fn install() -> Self {
        let signal = Self::detached();
        for (name, sig) in [("SIGINT", SIGINT), ("SIGTERM", SIGTERM)] {
            if let Err(e) = signal_hook::flag::register(sig, Arc::clone(&signal.flag)) {
                eprintln!("[VSW-SIGNAL] failed to register {name}: {e}");
            }
        }
        signal
    }

    /// A flag with no OS hooks attached.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Root context cancelled when a shutdown signal arrives.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::from_flag(Arc::clone(&self.flag))
    }
}
