// ABOUTME: Runs multiplexer commands as child processes with a bounded wait
//
// The gateway never blocks longer than the configured timeout: a child that
// overruns is killed and reported as `RunError::TimedOut`.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured result of one finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("I/O error waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// True when the program itself is missing from PATH
    pub fn is_missing_program(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Something that can run the multiplexer binary with arguments
///
/// The production runner spawns `tmux`; tests script the outputs.
pub trait CommandRunner: Send + Sync {
    fn run(&self, args: &[String]) -> Result<CommandOutput, RunError>;
}

/// Spawns a real program and waits at most `timeout` for it
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn tmux(timeout: Duration) -> Self {
        Self::new("tmux", timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn reap(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        debug!("kill of timed-out `{}` failed: {}", program, e);
    }
    let _ = child.wait();
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, RunError> {
        debug!("running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // fill the pipe buffer and stall until the timeout.
        let stdout = drain_pipe(child.stdout.take());
        let stderr = drain_pipe(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!("`{} {}` exceeded {:?}", self.program, args.join(" "), self.timeout);
                reap(&mut child, &self.program);
                return Err(RunError::TimedOut {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
            Err(source) => {
                reap(&mut child, &self.program);
                return Err(RunError::Wait {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        Ok(CommandOutput {
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}
