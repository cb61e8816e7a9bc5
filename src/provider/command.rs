//! Deadline-aware subprocess runner for CLI-backed providers.

use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::context::Context;
use crate::core::errors::{Result, VsError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of one finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `-1` when the process was terminated by a signal.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Run `program args...` until it exits or `ctx` is done.
///
/// A missing binary maps to [`VsError::Unavailable`]. When the context is
/// cancelled or its deadline passes the child is killed and reaped, and the
/// call fails with [`VsError::Cancelled`] naming `operation`.
pub fn run_command(
    program: &str,
    args: &[&str],
    ctx: &Context,
    backend: &'static str,
    operation: &str,
) -> Result<CommandOutput> {
    ctx.check(operation)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| match source.kind() {
            IoErrorKind::NotFound | IoErrorKind::PermissionDenied => VsError::Unavailable {
                backend,
                details: format!("cannot execute {program}: {source}"),
            },
            _ => VsError::io(PathBuf::from(program), source),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                kill_and_reap(&mut child);
                return Err(VsError::io(PathBuf::from(program), source));
            }
        }
        if ctx.is_cancelled() {
            kill_and_reap(&mut child);
            return Err(VsError::cancelled(operation));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
