// ABOUTME: Multiplexer gateway contract: typed records, error set, and the trait the core talks through
//
// Everything that leaves the process toward the terminal multiplexer goes
// through `Multiplexer`. The registry, status engine, and activity readers
// only ever see these types, never raw tmux output.

use crate::launch::LaunchSpec;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Failure talking to the multiplexer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The session or pane the command targeted does not exist
    #[error("multiplexer target not found: {target}")]
    NotFound { target: String },

    /// The multiplexer rejected the command or a flag it uses
    #[error("multiplexer does not support `{command}`: {reason}")]
    Unsupported { command: String, reason: String },

    /// Anything that may succeed on retry (timeouts, server hiccups)
    #[error("multiplexer command `{command}` failed: {reason}")]
    Transient { command: String, reason: String },
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Opaque multiplexer pane handle (tmux `%N`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PaneId(String);

impl PaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaneId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A multiplexer session the gateway created or found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub name: String,
    /// Pane the session was created with; gwt keeps it as its control pane
    pub control_pane: Option<PaneId>,
}

impl SessionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control_pane: None,
        }
    }
}

/// Where a new pane goes relative to the panes already in the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitPlacement {
    /// Full-height column right of everything else (horizontal split).
    /// Without an anchor the session's active pane is split.
    NewColumn { anchor: Option<PaneId> },
    /// Below `anchor`, inside its column (vertical split)
    Below { anchor: PaneId },
}

impl SplitPlacement {
    pub fn anchor(&self) -> Option<&PaneId> {
        match self {
            Self::NewColumn { anchor } => anchor.as_ref(),
            Self::Below { anchor } => Some(anchor),
        }
    }

    pub fn opens_column(&self) -> bool {
        matches!(self, Self::NewColumn { .. })
    }
}

/// A freshly split pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneHandle {
    pub pane_id: PaneId,
    pub pid: Option<u32>,
}

/// Position and size of a pane in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneGeometry {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

/// One row of `list_panes` output
///
/// Only `pane_id` and `session` are guaranteed. The other fields are empty
/// when the multiplexer could only be queried in its reduced-fidelity mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPaneRecord {
    pub pane_id: PaneId,
    pub session: String,
    pub command: String,
    pub pid: Option<u32>,
    /// Process exited but the pane is being kept (tmux `remain-on-exit`)
    pub dead: bool,
    pub geometry: Option<PaneGeometry>,
    /// Working directory of the pane's foreground process
    pub current_path: Option<PathBuf>,
}

impl RawPaneRecord {
    pub fn new(pane_id: impl Into<PaneId>, session: impl Into<String>) -> Self {
        Self {
            pane_id: pane_id.into(),
            session: session.into(),
            command: String::new(),
            pid: None,
            dead: false,
            geometry: None,
            current_path: None,
        }
    }
}

impl From<String> for PaneId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Operations the core needs from a terminal multiplexer
///
/// Every call is synchronous and bounded by the implementation's timeout; a
/// timed-out call surfaces as [`GatewayError::Transient`].
#[cfg_attr(test, mockall::automock)]
pub trait Multiplexer: Send + Sync {
    /// Names of every session on the server (empty when no server runs)
    fn list_sessions(&self) -> GatewayResult<Vec<String>>;

    fn create_session(&self, name: &str, cwd: &Path) -> GatewayResult<SessionHandle>;

    /// Take over the session that already contains `control`
    ///
    /// Used when gwt itself runs inside the multiplexer: its own pane becomes
    /// the control pane and session options are applied as on creation.
    fn adopt_session(&self, control: &PaneId) -> GatewayResult<SessionHandle>;

    fn kill_session(&self, session: &SessionHandle) -> GatewayResult<()>;

    /// Start `launch` in a new pane of `session` at `placement`, without taking focus
    fn split_pane(
        &self,
        session: &SessionHandle,
        placement: &SplitPlacement,
        launch: &LaunchSpec,
    ) -> GatewayResult<PaneHandle>;

    fn list_panes(&self, session: &SessionHandle) -> GatewayResult<Vec<RawPaneRecord>>;

    fn kill_pane(&self, pane: &PaneId) -> GatewayResult<()>;

    /// Type `keys` (tmux key names such as `C-c`) into the pane
    fn send_keys(&self, pane: &PaneId, keys: &str) -> GatewayResult<()>;

    fn focus_pane(&self, pane: &PaneId) -> GatewayResult<()>;

    fn enable_mouse(&self, session: &SessionHandle) -> GatewayResult<()>;

    /// Last `lines` lines of the pane's visible output, escape sequences stripped
    fn capture_tail(&self, pane: &PaneId, lines: u16) -> GatewayResult<String>;

    fn resize_pane(&self, pane: &PaneId, width: u16, height: u16) -> GatewayResult<()>;

    /// Size of the session's active window as `(width, height)`
    fn window_size(&self, session: &SessionHandle) -> GatewayResult<(u16, u16)>;
}
