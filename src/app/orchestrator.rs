// ABOUTME: Interactive-session state and handlers: launch, stop, focus, exit, and the poll tick
//
// The orchestrator is driven by a single event loop. It is the only caller of
// the registry's write path for user actions, and it folds reader activity
// and spooled hook events into the status engine on that same loop.

use crate::app::events::{AppEvent, KeyContext};
use crate::app::focus::{FocusCoordinator, FocusState};
use crate::app::termination::{check_stop, find_duplicate, CancelOutcome, ExitGuard, StopError};
use crate::launch::{LaunchResolver, SESSION_MARKER_ENV};
use crate::notifier::spool::EventSpool;
use crate::panes::layout::{geometry, layout_snapshot, PaneRect};
use crate::panes::model::{Pane, PaneId, Session, SessionRecord};
use crate::panes::reader::{PaneActivity, ReaderPool};
use crate::panes::registry::{CreateError, PaneRegistry};
use crate::panes::status::{StatusEngine, TickReport};
use crate::tmux::gateway::{GatewayError, Multiplexer, PaneHandle, SessionHandle};
use crate::tmux::naming::generate_session_name;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Share of the window width kept for the branch list (control pane)
const BRANCH_LIST_WIDTH_PERCENT: u16 = 30;

/// Columns kept for the branch list in a window `width` cells wide
fn branch_list_width(width: u16) -> u16 {
    let share = u32::from(width) * u32::from(BRANCH_LIST_WIDTH_PERCENT) / 100;
    u16::try_from(share).unwrap_or(width)
}

/// Same directory, ignoring trailing separators
fn same_dir(a: &Path, b: &Path) -> bool {
    a.components().eq(b.components())
}

/// Does a pane's foreground command look like the agent gwt launches?
fn runs_agent(command: &str, agent_id: &str, program: &str) -> bool {
    let command = command.trim().to_lowercase();
    if command.is_empty() {
        return false;
    }
    let program = Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    command.contains(&agent_id.to_lowercase()) || (!program.is_empty() && command == program)
}

/// A branch the user can launch an agent on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEntry {
    pub name: String,
    pub worktree_path: PathBuf,
}

impl BranchEntry {
    pub fn new(name: impl Into<String>, worktree_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            worktree_path: worktree_path.into(),
        }
    }
}

pub struct OrchestratorOptions {
    pub repo_root: PathBuf,
    pub agent_id: String,
    /// Where session records are written
    pub sessions_dir: PathBuf,
    pub enable_mouse: bool,
}

pub struct Orchestrator {
    registry: Arc<PaneRegistry>,
    launcher: Arc<dyn LaunchResolver>,
    engine: StatusEngine,
    spool: EventSpool,
    exit_guard: ExitGuard,
    readers: Option<ReaderPool>,
    options: OrchestratorOptions,
    branches: Vec<BranchEntry>,
    selected: usize,
    pending_stop: Option<PaneId>,
    notice: Option<String>,
    should_quit: bool,
    /// The session was created by this instance, so teardown kills it
    owns_session: bool,
    orphans_checked: bool,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<PaneRegistry>,
        launcher: Arc<dyn LaunchResolver>,
        engine: StatusEngine,
        spool: EventSpool,
        exit_guard: ExitGuard,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            launcher,
            engine,
            spool,
            exit_guard,
            readers: None,
            options,
            branches: Vec::new(),
            selected: 0,
            pending_stop: None,
            notice: None,
            should_quit: false,
            owns_session: false,
            orphans_checked: false,
        }
    }

    #[must_use]
    pub fn with_readers(mut self, readers: ReaderPool) -> Self {
        self.readers = Some(readers);
        self
    }

    #[must_use]
    pub fn with_branches(mut self, branches: Vec<BranchEntry>) -> Self {
        self.branches = branches;
        self.selected = 0;
        self
    }

    pub fn registry(&self) -> &Arc<PaneRegistry> {
        &self.registry
    }

    fn gateway(&self) -> &Arc<dyn Multiplexer> {
        self.registry.gateway()
    }

    pub fn snapshot(&self) -> Vec<Pane> {
        self.registry.snapshot()
    }

    pub fn branches(&self) -> &[BranchEntry] {
        &self.branches
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_branch(&self) -> Option<&BranchEntry> {
        self.branches.get(self.selected)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn pending_stop(&self) -> Option<&PaneId> {
        self.pending_stop.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn key_context(&self) -> KeyContext {
        KeyContext {
            focus: self.registry.focus_state(),
            stop_pending: self.pending_stop.is_some(),
        }
    }

    /// Open (once) the multiplexer session for this repository
    pub fn ensure_session(&mut self) -> Result<Session, GatewayError> {
        if let Some(session) = self.registry.session() {
            return Ok(session);
        }

        let gateway = self.gateway();
        let existing = gateway.list_sessions()?;
        let repo_name = self
            .options
            .repo_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = generate_session_name(&repo_name, &existing);

        let handle = gateway.create_session(&name, &self.options.repo_root)?;
        if self.options.enable_mouse {
            if let Err(e) = gateway.enable_mouse(&handle) {
                warn!("could not enable mouse for {}: {}", name, e);
            }
        }

        let session = self.register_session(handle);
        self.owns_session = true;
        Ok(session)
    }

    /// Run inside the session that already holds `control`, gwt's own pane
    ///
    /// Agents split off beside the control pane and teardown leaves the
    /// session itself alone.
    pub fn adopt_session(&mut self, control: &PaneId) -> Result<Session, GatewayError> {
        if let Some(session) = self.registry.session() {
            return Ok(session);
        }
        let gateway = self.gateway();
        let handle = gateway.adopt_session(control)?;
        if self.options.enable_mouse {
            if let Err(e) = gateway.enable_mouse(&handle) {
                warn!("could not enable mouse for {}: {}", handle.name, e);
            }
        }
        let session = self.register_session(handle);
        self.owns_session = false;
        Ok(session)
    }

    fn register_session(&self, handle: SessionHandle) -> Session {
        let session = Session::new(handle, self.options.repo_root.clone());
        if let Err(e) = SessionRecord::new(&session).save(&self.options.sessions_dir) {
            warn!("could not write session record for {}: {}", session.session_name, e);
        }
        self.registry.set_session(session.clone());
        session
    }

    /// Register agent panes an earlier instance left running in the session
    ///
    /// A pane qualifies when its working directory is a known branch
    /// worktree and its foreground command is the configured agent. Runs
    /// once; later calls are no-ops.
    pub fn adopt_orphans(&mut self) -> Vec<PaneId> {
        let Some(session) = self.registry.session() else {
            return Vec::new();
        };
        let listing = match self.gateway().list_panes(&session.handle) {
            Ok(listing) => listing,
            Err(e) => {
                debug!("orphan scan deferred: {}", e);
                return Vec::new();
            }
        };
        self.orphans_checked = true;

        let mut adopted = Vec::new();
        for record in listing {
            if record.dead
                || session.handle.control_pane.as_ref() == Some(&record.pane_id)
                || self.registry.pane(&record.pane_id).is_some()
            {
                continue;
            }
            let Some(path) = record.current_path.as_deref() else {
                continue;
            };
            let Some(branch) = self
                .branches
                .iter()
                .find(|b| same_dir(&b.worktree_path, path))
                .cloned()
            else {
                continue;
            };
            let program = self
                .launcher
                .resolve_launch(&branch.name, &branch.worktree_path, &self.options.agent_id)
                .program;
            if !runs_agent(&record.command, &self.options.agent_id, &program) {
                continue;
            }

            let handle = PaneHandle {
                pane_id: record.pane_id.clone(),
                pid: record.pid,
            };
            match self.registry.adopt(
                &branch.name,
                &branch.worktree_path,
                &self.options.agent_id,
                handle,
            ) {
                Ok(pane_id) => {
                    if let Some(readers) = self.readers.as_mut() {
                        if let Err(e) = readers.spawn(pane_id.clone()) {
                            warn!("could not start activity reader for {}: {}", pane_id, e);
                        }
                    }
                    adopted.push(pane_id);
                }
                Err(e) => debug!("not adopting {}: {}", record.pane_id, e),
            }
        }

        if !adopted.is_empty() {
            info!("adopted {} agent pane(s) left in {}", adopted.len(), session.session_name);
            self.apply_layout();
        }
        adopted
    }

    /// Launch the configured agent on `branch`
    pub fn launch(&mut self, branch: &str, worktree_path: &Path) -> Result<PaneId, CreateError> {
        self.ensure_session().map_err(CreateError::GatewayFailed)?;

        let spec = self
            .launcher
            .resolve_launch(branch, worktree_path, &self.options.agent_id);
        let pane_id = self.registry.try_create(
            branch,
            worktree_path,
            &self.options.agent_id,
            move |ctx| {
                let spec = spec.with_env(SESSION_MARKER_ENV, ctx.marker.as_str());
                ctx.gateway.split_pane(&ctx.session.handle, ctx.placement, &spec)
            },
        )?;

        if let Some(readers) = self.readers.as_mut() {
            if let Err(e) = readers.spawn(pane_id.clone()) {
                warn!("could not start activity reader for {}: {}", pane_id, e);
            }
        }
        self.apply_layout();
        Ok(pane_id)
    }

    /// Stop a pane, honoring the confirmation rule
    pub fn request_stop(&mut self, pane_id: &PaneId, confirmed: bool) -> Result<Pane, StopError> {
        let pane = self
            .registry
            .pane(pane_id)
            .ok_or_else(|| StopError::NotFound(pane_id.clone()))?;
        check_stop(&pane, confirmed)?;

        if let Some(readers) = self.readers.as_mut() {
            readers.stop(pane_id);
        }
        let removed = self
            .registry
            .remove(pane_id)
            .ok_or_else(|| StopError::NotFound(pane_id.clone()))?;
        if self.pending_stop.as_ref() == Some(pane_id) {
            self.pending_stop = None;
        }
        self.apply_layout();
        Ok(removed)
    }

    /// Feed one cancel signal to the exit guard
    pub fn handle_cancel(&mut self, now: Instant) -> CancelOutcome {
        let outcome = self.exit_guard.on_cancel(now, !self.registry.is_empty());
        match outcome {
            CancelOutcome::Armed => {
                self.notice = Some(format!(
                    "Press Esc or Ctrl-C again within {}s to stop all agents and exit",
                    self.exit_guard.window().as_secs()
                ));
            }
            CancelOutcome::Shutdown => {
                self.shutdown();
                self.should_quit = true;
            }
        }
        outcome
    }

    /// Remove every pane and tear the session down
    pub fn shutdown(&mut self) {
        if let Some(readers) = self.readers.as_mut() {
            readers.stop_all();
        }
        let removed = self.registry.remove_all();
        self.pending_stop = None;

        if let Some(session) = self.registry.clear_session() {
            if self.owns_session {
                match self.gateway().kill_session(&session.handle) {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        debug!("session {} already gone", session.session_name);
                    }
                    Err(e) => warn!("failed to kill session {}: {}", session.session_name, e),
                }
            }
            if let Err(e) = SessionRecord::remove(&self.options.sessions_dir, &session.session_name) {
                warn!("could not delete session record {}: {}", session.session_name, e);
            }
            info!("shut down session {} ({} panes)", session.session_name, removed.len());
        }
    }

    /// Periodic reconciliation: pane listing, heuristics, spooled hook events
    pub fn poll_tick(&mut self, now: Instant) -> TickReport {
        let Some(session) = self.registry.session() else {
            return TickReport::default();
        };
        if !self.orphans_checked {
            self.adopt_orphans();
        }

        let listing = self.gateway().list_panes(&session.handle);
        let mut report = self.engine.tick(&self.registry, listing, now);

        for pane_id in &report.removed {
            if let Some(readers) = self.readers.as_mut() {
                readers.stop(pane_id);
            }
            if self.pending_stop.as_ref() == Some(pane_id) {
                self.pending_stop = None;
            }
        }

        let registry = &self.registry;
        let events = self
            .spool
            .drain(Utc::now(), |marker| registry.find_by_marker(marker).is_some());
        if !events.is_empty() {
            debug!("applying {} spooled hook events", events.len());
            report
                .changes
                .extend(self.engine.apply_hook_events(&self.registry, &events, now));
        }

        if !report.removed.is_empty() {
            self.apply_layout();
        }
        report
    }

    /// Output arrived in a pane
    pub fn on_activity(&self, activity: PaneActivity) {
        self.engine.record_activity(
            &self.registry,
            &activity.pane_id,
            activity.observed_at,
            activity.tail,
        );
    }

    /// Resize panes to the grid (best effort)
    pub fn apply_layout(&self) {
        let Some(session) = self.registry.session() else {
            return;
        };
        let (width, height) = match self.gateway().window_size(&session.handle) {
            Ok(size) => size,
            Err(e) => {
                debug!("skipping layout: {}", e);
                return;
            }
        };

        let list_width = branch_list_width(width);
        let area = PaneRect {
            x: list_width,
            y: 0,
            width: width.saturating_sub(list_width),
            height,
        };
        let grid = layout_snapshot(&self.registry.snapshot());
        for (pane_id, rect) in geometry(&grid, area) {
            if let Err(e) = self.gateway().resize_pane(&pane_id, rect.width, rect.height) {
                debug!("could not resize {}: {}", pane_id, e);
            }
        }
    }

    /// Live pane for a branch entry, if any
    fn live_pane_for(&self, branch: &BranchEntry) -> Option<PaneId> {
        find_duplicate(
            &self.registry.snapshot(),
            &branch.worktree_path,
            &self.options.agent_id,
        )
    }

    fn stop_target(&self) -> Option<PaneId> {
        match self.registry.focus_state() {
            FocusState::Pane(id) => Some(id),
            FocusState::BranchList => self.selected_branch().and_then(|b| self.live_pane_for(b)),
        }
    }

    fn activate_selected(&mut self) {
        let Some(branch) = self.selected_branch().cloned() else {
            return;
        };

        if let Some(existing) = self.live_pane_for(&branch) {
            if let Err(e) = FocusCoordinator::new(&self.registry).focus_pane(&existing) {
                self.notice = Some(format!("Could not focus {}: {}", branch.name, e));
            }
            return;
        }

        self.notice = match self.launch(&branch.name, &branch.worktree_path) {
            Ok(_) => Some(format!("Launched {} on {}", self.options.agent_id, branch.name)),
            Err(e) => {
                warn!("launch on {} failed: {}", branch.name, e);
                Some(format!("Launch on {} failed: {}", branch.name, e))
            }
        };
    }

    fn stop(&mut self, pane_id: PaneId, confirmed: bool) {
        let branch = self
            .registry
            .pane(&pane_id)
            .map(|p| p.branch)
            .unwrap_or_default();
        self.notice = match self.request_stop(&pane_id, confirmed) {
            Ok(pane) => Some(format!("Stopped {} on {}", pane.agent_id, pane.branch)),
            Err(StopError::ConfirmationRequired(id)) => {
                self.pending_stop = Some(id);
                Some(format!("Agent on {branch} is active. Stop it? (y to confirm)"))
            }
            Err(e) => Some(e.to_string()),
        };
    }

    /// Apply one user action
    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Cancel => {
                self.handle_cancel(now);
            }
            AppEvent::FocusNext => {
                if let Err(e) = FocusCoordinator::new(&self.registry).cycle_next() {
                    self.notice = Some(format!("Focus failed: {e}"));
                }
            }
            AppEvent::FocusPrevious => {
                if let Err(e) = FocusCoordinator::new(&self.registry).cycle_previous() {
                    self.notice = Some(format!("Focus failed: {e}"));
                }
            }
            AppEvent::SelectNext => {
                if self.selected + 1 < self.branches.len() {
                    self.selected += 1;
                }
            }
            AppEvent::SelectPrevious => {
                self.selected = self.selected.saturating_sub(1);
            }
            AppEvent::Activate => self.activate_selected(),
            AppEvent::RequestStop => match self.stop_target() {
                Some(id) => self.stop(id, false),
                None => self.notice = Some("No running agent selected".to_string()),
            },
            AppEvent::ConfirmStop => {
                if let Some(id) = self.pending_stop.take() {
                    self.stop(id, true);
                }
            }
            AppEvent::AbortStop => {
                self.pending_stop = None;
                self.notice = None;
            }
        }
    }
}
