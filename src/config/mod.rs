// ABOUTME: Configuration management for gwt
// Loads ~/.gwt/config.toml (or $GWT_HOME/config.toml) with per-section defaults

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides the gwt home directory (default `~/.gwt`)
pub const GWT_HOME_ENV: &str = "GWT_HOME";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine home directory; set GWT_HOME")]
    NoHome,

    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GwtConfig {
    #[serde(default)]
    pub panes: PanesConfig,

    #[serde(default)]
    pub exit: ExitConfig,

    #[serde(default)]
    pub tmux: TmuxConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Agent command lines keyed by agent id
    #[serde(default)]
    pub agents: HashMap<String, AgentCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanesConfig {
    /// Seconds without output before a heuristic pane counts as stopped
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often each activity reader captures its pane
    #[serde(default = "default_reader_interval_ms")]
    pub reader_interval_ms: u64,

    #[serde(default = "default_reader_join_timeout_ms")]
    pub reader_join_timeout_ms: u64,

    /// Lines of pane output kept for prompt matching
    #[serde(default = "default_tail_lines")]
    pub tail_lines: u16,

    /// Case-insensitive substrings that mark an interactive prompt
    #[serde(default = "default_prompt_markers")]
    pub prompt_markers: Vec<String>,
}

impl Default for PanesConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            reader_interval_ms: default_reader_interval_ms(),
            reader_join_timeout_ms: default_reader_join_timeout_ms(),
            tail_lines: default_tail_lines(),
            prompt_markers: default_prompt_markers(),
        }
    }
}

impl PanesConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn reader_interval(&self) -> Duration {
        Duration::from_millis(self.reader_interval_ms.max(1))
    }

    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Window in which a second cancel confirms exit
    #[serde(default = "default_confirm_window_ms")]
    pub confirm_window_ms: u64,

    /// How long a stopped agent gets to exit after SIGTERM before SIGKILL
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            confirm_window_ms: default_confirm_window_ms(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl ExitConfig {
    pub fn confirm_window(&self) -> Duration {
        Duration::from_millis(self.confirm_window_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmuxConfig {
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub enable_mouse: bool,

    /// Key bound in tmux's root table to jump back to gwt; empty disables it
    #[serde(default = "default_return_key")]
    pub return_key: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            enable_mouse: default_true(),
            return_key: default_return_key(),
            history_limit: default_history_limit(),
        }
    }
}

impl TmuxConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn return_key(&self) -> Option<&str> {
        let key = self.return_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Spool directory; defaults to `<gwt home>/events`
    #[serde(default)]
    pub events_dir: Option<PathBuf>,

    /// Events older than this when picked up are dropped
    #[serde(default = "default_event_expiry_secs")]
    pub event_expiry_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            events_dir: None,
            event_expiry_secs: default_event_expiry_secs(),
        }
    }
}

impl NotifierConfig {
    pub fn event_expiry(&self) -> Duration {
        Duration::from_secs(self.event_expiry_secs)
    }
}

/// Command line for one agent id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommand {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_idle_threshold_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_reader_interval_ms() -> u64 {
    250
}

fn default_reader_join_timeout_ms() -> u64 {
    500
}

fn default_tail_lines() -> u16 {
    40
}

fn default_prompt_markers() -> Vec<String> {
    [
        "[y/n]",
        "(y/n)",
        "[y/n]?",
        "do you want to",
        "allow this",
        "press enter",
        "continue?",
        "approve",
        "permission",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_confirm_window_ms() -> u64 {
    2000
}

fn default_stop_grace_ms() -> u64 {
    1500
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_return_key() -> String {
    "C-g".to_string()
}

fn default_history_limit() -> u32 {
    50_000
}

fn default_event_expiry_secs() -> u64 {
    30
}

/// Root directory for gwt state: `$GWT_HOME`, else `~/.gwt`
pub fn gwt_home() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os(GWT_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHome)?;
    Ok(home_dir.join(".gwt"))
}

impl GwtConfig {
    /// Load from `<gwt home>/config.toml`, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&gwt_home()?.join("config.toml"))
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Spool directory for hook events
    pub fn events_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.notifier.events_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(gwt_home()?.join("events")),
        }
    }

    /// Directory holding one record per live session
    pub fn sessions_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(gwt_home()?.join("sessions"))
    }
}
