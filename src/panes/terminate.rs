// ABOUTME: Graceful agent shutdown: interrupt, SIGTERM, bounded wait, SIGKILL, then kill the pane
//
// Every target is interrupted and signalled before the wait starts, so
// stopping several panes at teardown shares one grace period.

use crate::panes::model::PaneId;
use crate::panes::status::process_alive;
use crate::tmux::gateway::Multiplexer;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long agents get to exit on their own
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    pub grace: Duration,
    pub poll: Duration,
    /// Process liveness check
    pub liveness: fn(u32) -> bool,
    /// Signal delivery
    pub signal: fn(u32, Signal),
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(1500),
            poll: Duration::from_millis(50),
            liveness: process_alive,
            signal: send_signal,
        }
    }
}

impl StopPolicy {
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            grace,
            ..Self::default()
        }
    }

    /// Never touches real processes; panes are still interrupted and killed
    #[cfg(test)]
    pub(crate) fn unsignalled() -> Self {
        Self {
            grace: Duration::ZERO,
            poll: Duration::from_millis(1),
            liveness: |_| false,
            signal: |_, _| {},
        }
    }
}

/// A pane to stop and the agent process running in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTarget {
    pub pane_id: PaneId,
    pub pid: Option<u32>,
}

/// Deliver `sig` to `pid`; a process that is already gone is ignored
pub fn send_signal(pid: u32, sig: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), sig) {
        debug!("{} to pid {} failed: {}", sig, pid, e);
    }
}

/// Stop every target, returning the pids that had to be killed
///
/// Sends `C-c` to each pane and SIGTERM to each pid, waits up to
/// `policy.grace` for the processes to exit, SIGKILLs the survivors, and
/// finally kills the panes. Every step is best effort.
pub fn terminate(gateway: &dyn Multiplexer, targets: &[StopTarget], policy: StopPolicy) -> Vec<u32> {
    for target in targets {
        if let Err(e) = gateway.send_keys(&target.pane_id, "C-c") {
            debug!("could not interrupt {}: {}", target.pane_id, e);
        }
        if let Some(pid) = target.pid {
            (policy.signal)(pid, Signal::SIGTERM);
        }
    }

    let deadline = Instant::now() + policy.grace;
    let mut alive: Vec<u32> = targets
        .iter()
        .filter_map(|t| t.pid)
        .filter(|pid| (policy.liveness)(*pid))
        .collect();
    while !alive.is_empty() && Instant::now() < deadline {
        thread::sleep(policy.poll);
        alive.retain(|pid| (policy.liveness)(*pid));
    }

    for pid in &alive {
        warn!("pid {} still running after {:?}; sending SIGKILL", pid, policy.grace);
        (policy.signal)(*pid, Signal::SIGKILL);
    }

    for target in targets {
        match gateway.kill_pane(&target.pane_id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("pane {} already gone", target.pane_id),
            Err(e) => warn!("failed to kill pane {}: {}", target.pane_id, e),
        }
    }
    if !targets.is_empty() {
        info!("stopped {} pane(s), {} forced", targets.len(), alive.len());
    }
    alive
}
