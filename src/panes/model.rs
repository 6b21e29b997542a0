// ABOUTME: Pane and session data model: status enums, pane markers, and the persisted session record

use crate::tmux::gateway::SessionHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub use crate::tmux::gateway::PaneId;

/// Inferred state of the agent running in a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneStatus {
    Running,
    WaitingInput,
    Stopped,
    #[default]
    Unknown,
}

impl PaneStatus {
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Running => "●",
            Self::WaitingInput => "?",
            Self::Stopped => "■",
            Self::Unknown => "·",
        }
    }

    /// The agent is blocked on the user
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::WaitingInput)
    }

    /// Counts as occupying its (worktree, agent) slot
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for PaneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::WaitingInput => "waiting",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Which channel last decided a pane's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Hook,
    #[default]
    Heuristic,
}

/// Key that routes hook events to a pane
///
/// Exported into the pane's environment and echoed back by the hook helper.
/// Contains only `[A-Za-z0-9._-]` so it doubles as a spool file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaneMarker(String);

impl PaneMarker {
    pub fn generate(session_name: &str, branch: &str, agent_id: &str) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}.{}.{}.{}",
            marker_component(session_name),
            marker_component(branch),
            marker_component(agent_id),
            &nonce[..8]
        ))
    }

    /// Accept an externally supplied marker if it is filesystem safe
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && !raw.starts_with('.')
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaneMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn marker_component(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if mapped.is_empty() {
        "_".to_string()
    } else {
        mapped
    }
}

/// One agent process bound to one branch/worktree
#[derive(Debug, Clone, PartialEq)]
pub struct Pane {
    pub pane_id: PaneId,
    pub session_name: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    pub agent_id: String,
    pub marker: PaneMarker,
    pub pid: Option<u32>,
    pub column: usize,
    pub row: usize,
    pub status: PaneStatus,
    pub status_source: StatusSource,
    pub last_activity_at: Instant,
    pub created_at: Instant,
    /// Wall-clock creation time, for display and serialization
    pub started_at: DateTime<Utc>,
}

impl Pane {
    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Uptime as `hh:mm:ss`
    pub fn uptime_string(&self) -> String {
        format_uptime(self.uptime())
    }

    /// Time since output or hook traffic was last seen, as of `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    pub fn is_hook_driven(&self) -> bool {
        self.status_source == StatusSource::Hook
    }
}

pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// The multiplexer session gwt owns for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_name: String,
    pub repo_root: PathBuf,
    pub handle: SessionHandle,
}

impl Session {
    pub fn new(handle: SessionHandle, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            session_name: handle.name.clone(),
            repo_root: repo_root.into(),
            handle,
        }
    }
}

/// The only state gwt persists: which session belongs to which repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_name: String,
    pub repo_root: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session: &Session) -> Self {
        Self {
            session_name: session.session_name.clone(),
            repo_root: session.repo_root.clone(),
            created_at: Utc::now(),
        }
    }

    fn path_in(dir: &Path, session_name: &str) -> PathBuf {
        dir.join(format!("{session_name}.json"))
    }

    /// Write to `<dir>/<session>.json`
    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path_in(dir, &self.session_name);
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn remove(dir: &Path, session_name: &str) -> io::Result<()> {
        match fs::remove_file(Self::path_in(dir, session_name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Every readable record in `dir`; unreadable files are skipped
    pub fn load_all(dir: &Path) -> io::Result<Vec<Self>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records: Vec<Self> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let content = fs::read_to_string(&path).ok()?;
                match serde_json::from_str(&content) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::debug!("skipping session record {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Most recently created record for `repo_root`
    pub fn find_for_repo(dir: &Path, repo_root: &Path) -> io::Result<Option<Self>> {
        Ok(Self::load_all(dir)?
            .into_iter()
            .find(|record| record.repo_root == repo_root))
    }
}
