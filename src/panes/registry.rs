// ABOUTME: Pane registry: the single owner and writer of pane metadata
//
// Every read-modify-write happens under one mutex, so the duplicate check and
// the pane split in `try_create` cannot interleave with another launch. The
// focus state lives under the same lock so removing a pane resets focus in
// the same critical section.

use crate::app::focus::FocusState;
use crate::app::termination::find_duplicate;
use crate::panes::layout::{layout_snapshot, position_of, MAX_ROWS_PER_COLUMN};
use crate::panes::model::{Pane, PaneId, PaneMarker, PaneStatus, Session, StatusSource};
use crate::panes::terminate::{terminate, StopPolicy, StopTarget};
use crate::tmux::gateway::{GatewayError, GatewayResult, Multiplexer, PaneHandle, SplitPlacement};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a launch was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreateError {
    #[error("an agent is already running for this worktree in pane {0}")]
    Duplicate(PaneId),

    #[error("failed to create pane: {0}")]
    GatewayFailed(#[source] GatewayError),

    #[error("no multiplexer session is open")]
    NoSession,
}

/// What a launch closure gets to work with
pub struct LaunchContext<'a> {
    pub session: &'a Session,
    pub marker: &'a PaneMarker,
    /// Where the new pane goes so the window matches the grid
    pub placement: &'a SplitPlacement,
    pub gateway: &'a dyn Multiplexer,
}

/// A status transition that actually changed a pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub pane_id: PaneId,
    pub from: PaneStatus,
    pub to: PaneStatus,
    pub source: StatusSource,
}

struct Entry {
    pane: Pane,
    /// Most recent captured output, for prompt matching
    tail: String,
    /// Consecutive poll ticks the multiplexer did not list this pane
    missing_ticks: u32,
}

#[derive(Default)]
struct Inner {
    session: Option<Session>,
    /// Creation order
    entries: Vec<Entry>,
    focus: FocusState,
}

impl Inner {
    fn entry_mut(&mut self, pane_id: &PaneId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.pane.pane_id == pane_id)
    }

    /// Split that puts the next pane in its grid cell
    ///
    /// A full column (or an empty grid) opens a new column; otherwise the
    /// pane goes below the last pane of the last column.
    fn next_placement(&self) -> SplitPlacement {
        let panes: Vec<Pane> = self.entries.iter().map(|e| e.pane.clone()).collect();
        let grid = layout_snapshot(&panes);
        match grid.last() {
            Some(column) if column.len() < MAX_ROWS_PER_COLUMN => SplitPlacement::Below {
                anchor: column[column.len() - 1].clone(),
            },
            Some(column) => SplitPlacement::NewColumn {
                anchor: column.first().cloned(),
            },
            None => SplitPlacement::NewColumn {
                anchor: self
                    .session
                    .as_ref()
                    .and_then(|s| s.handle.control_pane.clone()),
            },
        }
    }

    fn push(&mut self, pane: Pane) {
        self.entries.push(Entry {
            pane,
            tail: String::new(),
            missing_ticks: 0,
        });
        self.relayout();
    }

    fn relayout(&mut self) {
        let panes: Vec<Pane> = self.entries.iter().map(|e| e.pane.clone()).collect();
        let grid = layout_snapshot(&panes);
        for entry in &mut self.entries {
            if let Some((column, row)) = position_of(&grid, &entry.pane.pane_id) {
                entry.pane.column = column;
                entry.pane.row = row;
            }
        }
    }

    fn take(&mut self, pane_id: &PaneId) -> Option<Pane> {
        let index = self.entries.iter().position(|e| &e.pane.pane_id == pane_id)?;
        let entry = self.entries.remove(index);
        if self.focus.is_pane(pane_id) {
            self.focus = FocusState::BranchList;
        }
        self.relayout();
        Some(entry.pane)
    }
}

pub struct PaneRegistry {
    gateway: Arc<dyn Multiplexer>,
    inner: Mutex<Inner>,
    stop_policy: StopPolicy,
}

impl PaneRegistry {
    pub fn new(gateway: Arc<dyn Multiplexer>) -> Self {
        Self {
            gateway,
            inner: Mutex::new(Inner::default()),
            stop_policy: StopPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gateway(&self) -> &Arc<dyn Multiplexer> {
        &self.gateway
    }

    pub fn set_session(&self, session: Session) {
        self.lock().session = Some(session);
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn clear_session(&self) -> Option<Session> {
        self.lock().session.take()
    }

    /// Check for a duplicate, launch, and register, all under one lock
    ///
    /// `launch_fn` must create exactly one pane. If it fails nothing is
    /// registered.
    pub fn try_create<F>(
        &self,
        branch: &str,
        worktree_path: &Path,
        agent_id: &str,
        launch_fn: F,
    ) -> Result<PaneId, CreateError>
    where
        F: FnOnce(&LaunchContext<'_>) -> GatewayResult<PaneHandle>,
    {
        let mut inner = self.lock();
        let session = inner.session.clone().ok_or(CreateError::NoSession)?;

        if let Some(existing) =
            find_duplicate(inner.entries.iter().map(|e| &e.pane), worktree_path, agent_id)
        {
            debug!(
                "rejecting duplicate launch of {} in {} (pane {})",
                agent_id,
                worktree_path.display(),
                existing
            );
            return Err(CreateError::Duplicate(existing));
        }

        let marker = PaneMarker::generate(&session.session_name, branch, agent_id);
        let placement = inner.next_placement();
        let context = LaunchContext {
            session: &session,
            marker: &marker,
            placement: &placement,
            gateway: self.gateway.as_ref(),
        };
        let handle = launch_fn(&context).map_err(CreateError::GatewayFailed)?;

        let now = Instant::now();
        let pane = Pane {
            pane_id: handle.pane_id.clone(),
            session_name: session.session_name.clone(),
            branch: branch.to_string(),
            worktree_path: PathBuf::from(worktree_path),
            agent_id: agent_id.to_string(),
            marker,
            pid: handle.pid,
            column: 0,
            row: 0,
            status: PaneStatus::Unknown,
            status_source: StatusSource::Heuristic,
            last_activity_at: now,
            created_at: now,
            started_at: Utc::now(),
        };

        info!(
            "created pane {} for {} on {} ({})",
            pane.pane_id, agent_id, branch, pane.marker
        );
        inner.push(pane);
        Ok(handle.pane_id)
    }

    /// Register a pane that is already running in the session
    ///
    /// Used for panes left behind by an earlier instance. The pane gets a
    /// fresh marker, so hook events from its old marker are not matched and
    /// it stays on the heuristics. Refused like a launch when a live pane
    /// already holds the same worktree and agent.
    pub fn adopt(
        &self,
        branch: &str,
        worktree_path: &Path,
        agent_id: &str,
        handle: PaneHandle,
    ) -> Result<PaneId, CreateError> {
        let mut inner = self.lock();
        let session = inner.session.clone().ok_or(CreateError::NoSession)?;
        if inner.entries.iter().any(|e| e.pane.pane_id == handle.pane_id) {
            return Err(CreateError::Duplicate(handle.pane_id));
        }
        if let Some(existing) =
            find_duplicate(inner.entries.iter().map(|e| &e.pane), worktree_path, agent_id)
        {
            return Err(CreateError::Duplicate(existing));
        }

        let now = Instant::now();
        let pane = Pane {
            pane_id: handle.pane_id.clone(),
            session_name: session.session_name.clone(),
            branch: branch.to_string(),
            worktree_path: PathBuf::from(worktree_path),
            agent_id: agent_id.to_string(),
            marker: PaneMarker::generate(&session.session_name, branch, agent_id),
            pid: handle.pid,
            column: 0,
            row: 0,
            status: PaneStatus::Unknown,
            status_source: StatusSource::Heuristic,
            last_activity_at: now,
            created_at: now,
            started_at: Utc::now(),
        };
        info!("adopted pane {} running {} on {}", pane.pane_id, agent_id, branch);
        inner.push(pane);
        Ok(handle.pane_id)
    }

    /// Drop a pane's record, then stop its agent and kill the pane (best effort)
    ///
    /// Focus pointing at the pane is reset before the lock is released. The
    /// agent is interrupted and sent SIGTERM, and only force-killed when it
    /// outlives the stop policy's grace period.
    pub fn remove(&self, pane_id: &PaneId) -> Option<Pane> {
        let removed = self.lock().take(pane_id)?;
        info!("removed pane {} ({} on {})", pane_id, removed.agent_id, removed.branch);
        terminate(
            self.gateway.as_ref(),
            &[StopTarget {
                pane_id: pane_id.clone(),
                pid: removed.pid,
            }],
            self.stop_policy,
        );
        Some(removed)
    }

    /// Remove every pane; used at teardown
    ///
    /// All agents share one grace period.
    pub fn remove_all(&self) -> Vec<Pane> {
        let removed: Vec<Pane> = {
            let mut inner = self.lock();
            inner.focus = FocusState::BranchList;
            inner.entries.drain(..).map(|e| e.pane).collect()
        };
        let targets: Vec<StopTarget> = removed
            .iter()
            .map(|pane| StopTarget {
                pane_id: pane.pane_id.clone(),
                pid: pane.pid,
            })
            .collect();
        terminate(self.gateway.as_ref(), &targets, self.stop_policy);
        removed
    }

    /// Drop the record of a pane the multiplexer no longer lists
    ///
    /// No signals are sent; the pid may already belong to another process.
    pub(super) fn discard(&self, pane_id: &PaneId) -> Option<Pane> {
        let removed = self.lock().take(pane_id)?;
        info!("dropped vanished pane {} ({} on {})", pane_id, removed.agent_id, removed.branch);
        self.kill_best_effort(pane_id);
        Some(removed)
    }

    fn kill_best_effort(&self, pane_id: &PaneId) {
        match self.gateway.kill_pane(pane_id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("pane {} already gone", pane_id),
            Err(e) => warn!("failed to kill pane {}: {}", pane_id, e),
        }
    }

    /// Copy of every pane in creation order
    pub fn snapshot(&self) -> Vec<Pane> {
        self.lock().entries.iter().map(|e| e.pane.clone()).collect()
    }

    pub fn pane(&self, pane_id: &PaneId) -> Option<Pane> {
        self.lock()
            .entries
            .iter()
            .find(|e| &e.pane.pane_id == pane_id)
            .map(|e| e.pane.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn find_by_marker(&self, marker: &PaneMarker) -> Option<PaneId> {
        self.lock()
            .entries
            .iter()
            .find(|e| &e.pane.marker == marker)
            .map(|e| e.pane.pane_id.clone())
    }

    pub fn focus_state(&self) -> FocusState {
        self.lock().focus.clone()
    }

    /// Move focus; refused when it names a pane the registry does not hold
    pub fn set_focus(&self, focus: FocusState) -> bool {
        let mut inner = self.lock();
        if let FocusState::Pane(id) = &focus {
            if !inner.entries.iter().any(|e| &e.pane.pane_id == id) {
                return false;
            }
        }
        inner.focus = focus;
        true
    }

    pub fn tail(&self, pane_id: &PaneId) -> Option<String> {
        self.lock()
            .entries
            .iter()
            .find(|e| &e.pane.pane_id == pane_id)
            .map(|e| e.tail.clone())
    }

    /// Apply a status decision
    ///
    /// A hook update always wins, refreshes `last_activity_at`, and marks the
    /// pane hook-driven for good. Heuristic updates to a hook-driven pane are
    /// ignored. Returns the transition when the status actually changed.
    pub(super) fn update_status(
        &self,
        pane_id: &PaneId,
        status: PaneStatus,
        source: StatusSource,
        at: Instant,
    ) -> Option<StatusChange> {
        let mut inner = self.lock();
        let entry = inner.entry_mut(pane_id)?;
        let pane = &mut entry.pane;

        match source {
            StatusSource::Hook => {
                pane.status_source = StatusSource::Hook;
                pane.last_activity_at = at;
            }
            StatusSource::Heuristic if pane.is_hook_driven() => return None,
            StatusSource::Heuristic => {}
        }

        if pane.status == status {
            return None;
        }
        let change = StatusChange {
            pane_id: pane_id.clone(),
            from: pane.status,
            to: status,
            source,
        };
        pane.status = status;
        debug!("pane {} {} -> {} ({:?})", pane_id, change.from, change.to, source);
        Some(change)
    }

    /// Output arrived in a pane
    pub(super) fn record_output(&self, pane_id: &PaneId, at: Instant, tail: String) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entry_mut(pane_id) else {
            return false;
        };
        if at > entry.pane.last_activity_at {
            entry.pane.last_activity_at = at;
        }
        entry.tail = tail;
        true
    }

    /// Count one more poll tick without the pane in the listing
    pub(super) fn mark_missing(&self, pane_id: &PaneId) -> u32 {
        let mut inner = self.lock();
        inner.entry_mut(pane_id).map_or(0, |entry| {
            entry.missing_ticks += 1;
            entry.missing_ticks
        })
    }

    pub(super) fn clear_missing(&self, pane_id: &PaneId) {
        if let Some(entry) = self.lock().entry_mut(pane_id) {
            entry.missing_ticks = 0;
        }
    }

    /// Pane pid reported by the multiplexer, when the launch did not supply one
    pub(super) fn fill_pid(&self, pane_id: &PaneId, pid: u32) {
        if let Some(entry) = self.lock().entry_mut(pane_id) {
            entry.pane.pid.get_or_insert(pid);
        }
    }
}
