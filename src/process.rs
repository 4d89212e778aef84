//! Bounded external commands
//!
//! The signer, the timestamp tooling and the content sniffer all shell
//! out. Every such call goes through [`run_with_timeout`], which feeds
//! stdin, drains stdout/stderr on helper threads, and kills the child if
//! it outlives its deadline.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from running an external command
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} exited with {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "a signal".to_string()))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("IO error talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Captured result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub program: String,
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Turn a non-zero exit into [`ProcessError::Failed`].
    pub fn check(self) -> Result<Self, ProcessError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ProcessError::Failed {
                program: self.program,
                code: self.status.code(),
                stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            })
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Run `command` to completion, writing `stdin` to it first.
pub fn run_with_timeout(
    mut command: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let io_err = |source: io::Error| ProcessError::Io {
        program: program.clone(),
        source,
    };

    tracing::debug!(program = %program, "Running external command");

    let mut child = command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout_handle = drain(child.stdout.take());
    let stderr_handle = drain(child.stderr.take());

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A child that exits without reading its input closes the pipe.
        match pipe.write_all(data) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(e) => {
                kill(&mut child);
                return Err(io_err(e));
            }
        }
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(io_err)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                kill(&mut child);
                tracing::warn!(program = %program, timeout_secs = timeout.as_secs(), "External command timed out");
                return Err(ProcessError::TimedOut {
                    program: program.clone(),
                    timeout,
                });
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let stdout = join_drain(stdout_handle).map_err(io_err)?;
    let stderr = join_drain(stderr_handle).map_err(io_err)?;

    Ok(CommandOutput {
        program,
        status,
        stdout,
        stderr,
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "output reader panicked"))),
        None => Ok(Vec::new()),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
