// ABOUTME: In-memory multiplexer and orchestrator builders shared by integration tests

#![allow(dead_code)]

use gwt::app::orchestrator::{BranchEntry, Orchestrator, OrchestratorOptions};
use gwt::app::termination::ExitGuard;
use gwt::launch::{ConfiguredLauncher, LaunchSpec};
use gwt::notifier::EventSpool;
use gwt::panes::registry::PaneRegistry;
use gwt::panes::status::StatusEngine;
use gwt::panes::terminate::StopPolicy;
use gwt::tmux::{
    GatewayError, GatewayResult, Multiplexer, PaneHandle, PaneId, RawPaneRecord, SessionHandle,
    SplitPlacement,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Default)]
pub struct FakeState {
    /// Session name to the ids of its panes (control pane first)
    pub sessions: BTreeMap<String, Vec<PaneId>>,
    pub launches: Vec<LaunchSpec>,
    pub placements: Vec<SplitPlacement>,
    /// Keys sent to panes, in order
    pub keys: Vec<(PaneId, String)>,
    pub killed_panes: Vec<PaneId>,
    pub killed_sessions: Vec<String>,
    pub focused: Option<PaneId>,
    pub tails: BTreeMap<PaneId, String>,
    /// Foreground command and working directory reported by `list_panes`
    pub details: BTreeMap<PaneId, (String, PathBuf)>,
    pub next_pane: u32,
    pub fail_listing: bool,
}

/// Multiplexer that keeps sessions and panes in memory
#[derive(Debug, Default)]
pub struct FakeMultiplexer {
    state: Mutex<FakeState>,
}

impl FakeMultiplexer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Make a pane vanish as if its process exited and tmux closed it
    pub fn vanish(&self, pane: &PaneId) {
        for panes in self.state().sessions.values_mut() {
            panes.retain(|p| p != pane);
        }
    }

    /// A session some other instance already owns
    pub fn add_session(&self, name: &str) {
        let mut state = self.state();
        let control = Self::allocate(&mut state);
        state.sessions.insert(name.to_string(), vec![control]);
    }

    /// A pane started outside this instance, running `command` in `cwd`
    pub fn add_foreign_pane(&self, session: &str, command: &str, cwd: &Path) -> PaneId {
        let mut state = self.state();
        let id = Self::allocate(&mut state);
        state
            .sessions
            .entry(session.to_string())
            .or_default()
            .push(id.clone());
        state
            .details
            .insert(id.clone(), (command.to_string(), cwd.to_path_buf()));
        id
    }

    /// Control pane of a session added with [`Self::add_session`]
    pub fn control_pane(&self, session: &str) -> Option<PaneId> {
        self.state()
            .sessions
            .get(session)
            .and_then(|panes| panes.first().cloned())
    }

    pub fn set_tail(&self, pane: &PaneId, tail: &str) {
        self.state().tails.insert(pane.clone(), tail.to_string());
    }

    fn allocate(state: &mut FakeState) -> PaneId {
        let id = PaneId::new(format!("%{}", state.next_pane));
        state.next_pane += 1;
        id
    }
}

fn not_found(target: &str) -> GatewayError {
    GatewayError::NotFound {
        target: target.to_string(),
    }
}

impl Multiplexer for FakeMultiplexer {
    fn list_sessions(&self) -> GatewayResult<Vec<String>> {
        Ok(self.state().sessions.keys().cloned().collect())
    }

    fn create_session(&self, name: &str, _cwd: &Path) -> GatewayResult<SessionHandle> {
        let mut state = self.state();
        let control = Self::allocate(&mut state);
        state.sessions.insert(name.to_string(), vec![control.clone()]);
        let mut handle = SessionHandle::new(name);
        handle.control_pane = Some(control);
        Ok(handle)
    }

    fn adopt_session(&self, control: &PaneId) -> GatewayResult<SessionHandle> {
        let state = self.state();
        let name = state
            .sessions
            .iter()
            .find(|(_, panes)| panes.contains(control))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| not_found(control.as_str()))?;
        let mut handle = SessionHandle::new(name);
        handle.control_pane = Some(control.clone());
        Ok(handle)
    }

    fn kill_session(&self, session: &SessionHandle) -> GatewayResult<()> {
        let mut state = self.state();
        state
            .sessions
            .remove(&session.name)
            .ok_or_else(|| not_found(&session.name))?;
        state.killed_sessions.push(session.name.clone());
        Ok(())
    }

    fn split_pane(
        &self,
        session: &SessionHandle,
        placement: &SplitPlacement,
        launch: &LaunchSpec,
    ) -> GatewayResult<PaneHandle> {
        let mut state = self.state();
        if !state.sessions.contains_key(&session.name) {
            return Err(not_found(&session.name));
        }
        let pane_id = Self::allocate(&mut state);
        state.launches.push(launch.clone());
        state.placements.push(placement.clone());
        if let Some(panes) = state.sessions.get_mut(&session.name) {
            panes.push(pane_id.clone());
        }
        Ok(PaneHandle { pane_id, pid: None })
    }

    fn list_panes(&self, session: &SessionHandle) -> GatewayResult<Vec<RawPaneRecord>> {
        let state = self.state();
        if state.fail_listing {
            return Err(GatewayError::Transient {
                command: "list-panes".to_string(),
                reason: "timed out".to_string(),
            });
        }
        let panes = state
            .sessions
            .get(&session.name)
            .ok_or_else(|| not_found(&session.name))?;
        Ok(panes
            .iter()
            .map(|id| {
                let mut record = RawPaneRecord::new(id.clone(), session.name.clone());
                if let Some((command, cwd)) = state.details.get(id) {
                    record.command.clone_from(command);
                    record.current_path = Some(cwd.clone());
                }
                record
            })
            .collect())
    }

    fn kill_pane(&self, pane: &PaneId) -> GatewayResult<()> {
        let mut state = self.state();
        let mut found = false;
        for panes in state.sessions.values_mut() {
            let before = panes.len();
            panes.retain(|p| p != pane);
            found |= panes.len() != before;
        }
        if !found {
            return Err(not_found(pane.as_str()));
        }
        state.killed_panes.push(pane.clone());
        Ok(())
    }

    fn send_keys(&self, pane: &PaneId, keys: &str) -> GatewayResult<()> {
        let mut state = self.state();
        if !state.sessions.values().any(|panes| panes.contains(pane)) {
            return Err(not_found(pane.as_str()));
        }
        state.keys.push((pane.clone(), keys.to_string()));
        Ok(())
    }

    fn focus_pane(&self, pane: &PaneId) -> GatewayResult<()> {
        let mut state = self.state();
        if !state.sessions.values().any(|panes| panes.contains(pane)) {
            return Err(not_found(pane.as_str()));
        }
        state.focused = Some(pane.clone());
        Ok(())
    }

    fn enable_mouse(&self, _session: &SessionHandle) -> GatewayResult<()> {
        Ok(())
    }

    fn capture_tail(&self, pane: &PaneId, _lines: u16) -> GatewayResult<String> {
        let state = self.state();
        if !state.sessions.values().any(|panes| panes.contains(pane)) {
            return Err(not_found(pane.as_str()));
        }
        Ok(state.tails.get(pane).cloned().unwrap_or_default())
    }

    fn resize_pane(&self, _pane: &PaneId, _width: u16, _height: u16) -> GatewayResult<()> {
        Ok(())
    }

    fn window_size(&self, _session: &SessionHandle) -> GatewayResult<(u16, u16)> {
        Ok((200, 60))
    }
}

/// An orchestrator over a fake multiplexer, with its state under a temp dir
pub struct Harness {
    pub fake: Arc<FakeMultiplexer>,
    pub orchestrator: Orchestrator,
    pub spool: EventSpool,
    pub home: TempDir,
}

pub fn harness(branches: &[&str]) -> Harness {
    let home = TempDir::new().unwrap();
    let fake = FakeMultiplexer::new();
    let gateway: Arc<dyn Multiplexer> = fake.clone();
    let registry = Arc::new(
        PaneRegistry::new(gateway).with_stop_policy(StopPolicy::with_grace(Duration::ZERO)),
    );

    let events_dir = home.path().join("events");
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(ConfiguredLauncher::default()),
        StatusEngine::new(Duration::from_secs(60), vec!["[y/n]".to_string()])
            .with_liveness(|_| true),
        EventSpool::new(&events_dir, Duration::from_secs(30)),
        ExitGuard::new(Duration::from_secs(2)),
        OrchestratorOptions {
            repo_root: PathBuf::from("/repos/demo"),
            agent_id: "claude".to_string(),
            sessions_dir: home.path().join("sessions"),
            enable_mouse: true,
        },
    )
    .with_branches(
        branches
            .iter()
            .map(|b| BranchEntry::new(*b, worktree(b)))
            .collect(),
    );

    Harness {
        fake,
        orchestrator,
        spool: EventSpool::new(events_dir, Duration::from_secs(30)),
        home,
    }
}

pub fn worktree(branch: &str) -> PathBuf {
    PathBuf::from("/repos/demo-worktrees").join(branch)
}

impl Harness {
    pub fn launch(&mut self, branch: &str) -> PaneId {
        self.orchestrator.launch(branch, &worktree(branch)).unwrap()
    }
}
