// ABOUTME: tmux implementation of the multiplexer gateway
//
// Each operation is one (occasionally two) tmux invocations through a
// `CommandRunner`. Features missing from older tmux builds are replaced by
// reduced-fidelity equivalents instead of failing the operation:
// - `split-window -e` → `env K=V` prefix on the pane command
// - `split-window -f` → plain horizontal split of the anchor pane
// - `list-panes -F` → plain listing parsed for pane ids only
// - `capture-pane -J` → capture without joining wrapped lines

use crate::launch::LaunchSpec;
use crate::tmux::gateway::{
    GatewayError, GatewayResult, Multiplexer, PaneHandle, PaneId, RawPaneRecord, SessionHandle,
    SplitPlacement,
};
use crate::tmux::parse::{
    classify_failure, parse_fallback_pane_list, parse_pane_handle, parse_pane_records,
    parse_session_names, parse_window_size, strip_ansi_codes, PANE_LIST_FORMAT, SPLIT_FORMAT,
};
use crate::tmux::runner::{CommandRunner, ProcessRunner, RunError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session-level options applied right after a session is created
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub history_limit: u32,
    /// Root-table key that jumps back to the control pane (e.g. `C-g`)
    pub return_key: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            history_limit: 50_000,
            return_key: Some("C-g".to_string()),
        }
    }
}

/// Gateway backed by the `tmux` binary
pub struct TmuxGateway<R: CommandRunner = ProcessRunner> {
    runner: R,
    options: SessionOptions,
    /// Cleared the first time tmux rejects `split-window -e`
    split_env: AtomicBool,
    /// Cleared the first time tmux rejects `split-window -f`
    split_full: AtomicBool,
}

impl TmuxGateway<ProcessRunner> {
    /// Gateway that spawns `tmux`, waiting at most `timeout` per command
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(ProcessRunner::tmux(timeout))
    }
}

impl<R: CommandRunner> TmuxGateway<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            options: SessionOptions::default(),
            split_env: AtomicBool::new(true),
            split_full: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Declare up front whether `split-window -e` is available
    #[must_use]
    pub fn with_split_env(self, supported: bool) -> Self {
        self.split_env.store(supported, Ordering::Relaxed);
        self
    }

    /// Declare up front whether `split-window -f` is available
    #[must_use]
    pub fn with_full_split(self, supported: bool) -> Self {
        self.split_full.store(supported, Ordering::Relaxed);
        self
    }

    /// Create a detached session whose first pane runs `launch`
    ///
    /// Used to start gwt itself inside a new session before attaching to it.
    pub fn spawn_session(&self, name: &str, launch: &LaunchSpec) -> GatewayResult<()> {
        let cwd = launch.cwd.to_string_lossy();
        let mut args = strings(&["-d", "-s", name, "-c", &cwd]);
        args.push(launch.shell_command(true));
        self.tmux("new-session", name, &args)?;
        info!("created tmux session {} running {}", name, launch.program);
        Ok(())
    }

    fn tmux(&self, command: &str, target: &str, args: &[String]) -> GatewayResult<String> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(command.to_string());
        argv.extend_from_slice(args);

        let output = self.runner.run(&argv).map_err(|e| map_run_error(command, &e))?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(classify_failure(command, target, &output.stderr))
        }
    }

    fn apply_session_options(&self, session: &SessionHandle) {
        let name = session.name.as_str();
        let history = self.options.history_limit.to_string();
        if let Err(e) = self.tmux(
            "set-option",
            name,
            &strings(&["-t", name, "history-limit", &history]),
        ) {
            debug!("could not set history-limit on {}: {}", name, e);
        }

        let (Some(key), Some(control)) = (self.options.return_key.as_deref(), &session.control_pane)
        else {
            return;
        };
        if key.is_empty() {
            return;
        }
        if let Err(e) = self.tmux(
            "bind-key",
            name,
            &strings(&["-T", "root", key, "select-pane", "-t", control.as_str()]),
        ) {
            warn!("could not bind {} to return to the control pane: {}", key, e);
        }
    }

    fn split(
        &self,
        session: &SessionHandle,
        placement: &SplitPlacement,
        launch: &LaunchSpec,
        env_flags: bool,
        full: bool,
    ) -> GatewayResult<String> {
        let target = placement
            .anchor()
            .map_or(session.name.as_str(), PaneId::as_str);
        let cwd = launch.cwd.to_string_lossy();

        let mut args = vec!["-d".to_string()];
        if placement.opens_column() {
            args.push("-h".to_string());
            if full {
                args.push("-f".to_string());
            }
        } else {
            args.push("-v".to_string());
        }
        args.extend(strings(&["-t", target, "-c", &cwd, "-P", "-F", SPLIT_FORMAT]));
        if env_flags {
            for (key, value) in &launch.env {
                args.push("-e".to_string());
                args.push(format!("{key}={value}"));
            }
        }
        args.push(launch.shell_command(!env_flags));
        self.tmux("split-window", target, &args)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn map_run_error(command: &str, err: &RunError) -> GatewayError {
    if err.is_missing_program() {
        GatewayError::Unsupported {
            command: command.to_string(),
            reason: "tmux is not installed".to_string(),
        }
    } else {
        GatewayError::Transient {
            command: command.to_string(),
            reason: err.to_string(),
        }
    }
}

impl<R: CommandRunner> Multiplexer for TmuxGateway<R> {
    fn list_sessions(&self) -> GatewayResult<Vec<String>> {
        match self.tmux("list-sessions", "", &strings(&["-F", "#{session_name}"])) {
            Ok(out) => Ok(parse_session_names(&out)),
            // No server means no sessions
            Err(GatewayError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn create_session(&self, name: &str, cwd: &Path) -> GatewayResult<SessionHandle> {
        let cwd = cwd.to_string_lossy();
        let printed = self.tmux(
            "new-session",
            name,
            &strings(&["-d", "-s", name, "-c", &cwd, "-P", "-F", "#{pane_id}"]),
        );

        let control_pane = match printed {
            Ok(out) => parse_pane_handle(&out).map(|h| h.pane_id),
            Err(e) if e.is_unsupported() => {
                debug!("new-session -P unsupported ({}), retrying without it", e);
                self.tmux("new-session", name, &strings(&["-d", "-s", name, "-c", &cwd]))?;
                None
            }
            Err(e) => return Err(e),
        };

        let session = SessionHandle {
            name: name.to_string(),
            control_pane,
        };
        self.apply_session_options(&session);
        info!("created tmux session {}", name);
        Ok(session)
    }

    fn adopt_session(&self, control: &PaneId) -> GatewayResult<SessionHandle> {
        let target = control.as_str();
        let out = self.tmux(
            "display-message",
            target,
            &strings(&["-p", "-t", target, "#{session_name}"]),
        )?;
        let name = parse_session_names(&out)
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound {
                target: target.to_string(),
            })?;

        let session = SessionHandle {
            name,
            control_pane: Some(control.clone()),
        };
        self.apply_session_options(&session);
        info!("adopted tmux session {} (control pane {})", session.name, control);
        Ok(session)
    }

    fn kill_session(&self, session: &SessionHandle) -> GatewayResult<()> {
        self.tmux("kill-session", &session.name, &strings(&["-t", &session.name]))
            .map(|_| ())
    }

    fn split_pane(
        &self,
        session: &SessionHandle,
        placement: &SplitPlacement,
        launch: &LaunchSpec,
    ) -> GatewayResult<PaneHandle> {
        // Each rejected flag is dropped for good, so this ends after at most three tries
        let output = loop {
            let env_flags = !launch.env.is_empty() && self.split_env.load(Ordering::Relaxed);
            let full = placement.opens_column() && self.split_full.load(Ordering::Relaxed);
            match self.split(session, placement, launch, env_flags, full) {
                Ok(out) => break out,
                Err(e) if e.is_unsupported() && env_flags => {
                    info!("tmux rejected split-window -e ({}); passing env inline", e);
                    self.split_env.store(false, Ordering::Relaxed);
                }
                Err(e) if e.is_unsupported() && full => {
                    info!("tmux rejected split-window -f ({}); splitting the anchor pane", e);
                    self.split_full.store(false, Ordering::Relaxed);
                }
                Err(e) => return Err(e),
            }
        };

        parse_pane_handle(&output).ok_or_else(|| GatewayError::Transient {
            command: "split-window".to_string(),
            reason: format!("unexpected output {:?}", output.trim()),
        })
    }

    fn list_panes(&self, session: &SessionHandle) -> GatewayResult<Vec<RawPaneRecord>> {
        let name = session.name.as_str();
        match self.tmux("list-panes", name, &strings(&["-s", "-t", name, "-F", PANE_LIST_FORMAT])) {
            Ok(out) => Ok(parse_pane_records(&out, name)),
            Err(e) if e.is_unsupported() => {
                debug!("list-panes -F unsupported ({}), using plain listing", e);
                let out = self.tmux("list-panes", name, &strings(&["-s", "-t", name]))?;
                Ok(parse_fallback_pane_list(&out, name))
            }
            Err(e) => Err(e),
        }
    }

    fn kill_pane(&self, pane: &PaneId) -> GatewayResult<()> {
        self.tmux("kill-pane", pane.as_str(), &strings(&["-t", pane.as_str()]))
            .map(|_| ())
    }

    fn send_keys(&self, pane: &PaneId, keys: &str) -> GatewayResult<()> {
        self.tmux("send-keys", pane.as_str(), &strings(&["-t", pane.as_str(), keys]))
            .map(|_| ())
    }

    fn focus_pane(&self, pane: &PaneId) -> GatewayResult<()> {
        self.tmux("select-pane", pane.as_str(), &strings(&["-t", pane.as_str()]))
            .map(|_| ())
    }

    fn enable_mouse(&self, session: &SessionHandle) -> GatewayResult<()> {
        let name = session.name.as_str();
        match self.tmux("set-option", name, &strings(&["-t", name, "mouse", "on"])) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unsupported() => {
                // tmux < 2.1 splits mouse support into several options
                debug!("`mouse` option unsupported ({}), trying legacy options", e);
                for option in ["mode-mouse", "mouse-select-pane", "mouse-resize-pane"] {
                    self.tmux("set-option", name, &strings(&["-t", name, option, "on"]))?;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn capture_tail(&self, pane: &PaneId, lines: u16) -> GatewayResult<String> {
        let target = pane.as_str();
        let start = format!("-{lines}");
        let out = match self.tmux("capture-pane", target, &strings(&["-p", "-J", "-t", target, "-S", &start])) {
            Ok(out) => out,
            Err(e) if e.is_unsupported() => {
                self.tmux("capture-pane", target, &strings(&["-p", "-t", target, "-S", &start]))?
            }
            Err(e) => return Err(e),
        };
        Ok(strip_ansi_codes(&out))
    }

    fn resize_pane(&self, pane: &PaneId, width: u16, height: u16) -> GatewayResult<()> {
        let target = pane.as_str();
        self.tmux(
            "resize-pane",
            target,
            &strings(&["-t", target, "-x", &width.to_string(), "-y", &height.to_string()]),
        )
        .map(|_| ())
    }

    fn window_size(&self, session: &SessionHandle) -> GatewayResult<(u16, u16)> {
        let name = session.name.as_str();
        let out = self.tmux(
            "display-message",
            name,
            &strings(&["-p", "-t", name, "#{window_width}\t#{window_height}"]),
        )?;
        parse_window_size(&out).ok_or_else(|| GatewayError::Unsupported {
            command: "display-message".to_string(),
            reason: format!("window size not reported: {:?}", out.trim()),
        })
    }
}
