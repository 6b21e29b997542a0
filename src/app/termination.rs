// ABOUTME: Safety protocol: duplicate-launch detection, confirmed pane stop, double-cancel exit

use crate::panes::model::{Pane, PaneId, PaneStatus};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("pane {0} is still active; confirm to stop it")]
    ConfirmationRequired(PaneId),

    #[error("no such pane: {0}")]
    NotFound(PaneId),
}

/// A live pane already running `agent_id` in `worktree_path`
pub fn find_duplicate<'a>(
    panes: impl IntoIterator<Item = &'a Pane>,
    worktree_path: &Path,
    agent_id: &str,
) -> Option<PaneId> {
    panes
        .into_iter()
        .find(|p| p.status.is_live() && p.worktree_path == worktree_path && p.agent_id == agent_id)
        .map(|p| p.pane_id.clone())
}

/// May this pane be stopped now?
///
/// Running and waiting agents need an explicit confirmation; stopped or
/// not-yet-classified panes do not.
pub fn check_stop(pane: &Pane, confirmed: bool) -> Result<(), StopError> {
    match pane.status {
        PaneStatus::Running | PaneStatus::WaitingInput if !confirmed => {
            Err(StopError::ConfirmationRequired(pane.pane_id.clone()))
        }
        _ => Ok(()),
    }
}

/// Arm state of the double-cancel exit gesture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationArmState {
    pub armed: bool,
    pub armed_at: Option<Instant>,
}

/// What a cancel signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// First signal recorded; nothing else happens
    Armed,
    /// Tear everything down
    Shutdown,
}

/// Double-cancel exit: the second cancel within `window` confirms
#[derive(Debug, Clone)]
pub struct ExitGuard {
    window: Duration,
    state: TerminationArmState,
}

impl ExitGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: TerminationArmState::default(),
        }
    }

    pub fn state(&self) -> TerminationArmState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True while a first cancel is pending within the window
    pub fn is_armed(&self, now: Instant) -> bool {
        self.state
            .armed_at
            .is_some_and(|at| self.state.armed && now.saturating_duration_since(at) <= self.window)
    }

    /// Register a cancel signal at `now`
    ///
    /// With no panes there is nothing to protect, so the first signal exits.
    pub fn on_cancel(&mut self, now: Instant, has_panes: bool) -> CancelOutcome {
        if !has_panes || self.is_armed(now) {
            self.state = TerminationArmState::default();
            return CancelOutcome::Shutdown;
        }

        self.state = TerminationArmState {
            armed: true,
            armed_at: Some(now),
        };
        CancelOutcome::Armed
    }

    pub fn disarm(&mut self) {
        self.state = TerminationArmState::default();
    }
}
