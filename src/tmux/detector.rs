// ABOUTME: tmux environment detection: installation, version, and whether we run inside tmux

use crate::tmux::runner::{CommandRunner, RunError};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("tmux is not installed (looked for `tmux` on PATH)")]
    NotInstalled,

    #[error("tmux {0} is too old (requires 2.0+)")]
    TooOld(TmuxVersion),

    #[error("could not parse tmux version from {0:?}")]
    Unparsable(String),

    #[error(transparent)]
    Run(#[from] RunError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TmuxVersion {
    pub major: u32,
    pub minor: u32,
}

impl TmuxVersion {
    pub const fn is_supported(self) -> bool {
        self.major >= 2
    }

    /// `split-window -e KEY=VALUE` arrived in tmux 3.0
    pub const fn supports_split_env(self) -> bool {
        self.major >= 3
    }

    /// `split-window -f` (full-height column) arrived in tmux 2.3
    pub const fn supports_full_split(self) -> bool {
        self.major > 2 || (self.major == 2 && self.minor >= 3)
    }

    /// Parse `tmux -V` output such as `tmux 3.4`, `tmux 2.0a`, or `tmux next-3.5`
    pub fn parse(output: &str) -> Option<Self> {
        let word = output.split_whitespace().nth(1)?;
        let digits = word.trim_start_matches(|c: char| !c.is_ascii_digit());
        let clean: String = digits
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut parts = clean.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
        Some(Self { major, minor })
    }
}

impl fmt::Display for TmuxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// True when the current process runs inside a tmux client
pub fn is_inside_tmux() -> bool {
    std::env::var_os("TMUX").is_some_and(|v| !v.is_empty())
}

/// Confirm tmux is installed and new enough, returning its version
pub fn check_tmux(runner: &dyn CommandRunner) -> Result<TmuxVersion, DetectError> {
    if which::which("tmux").is_err() {
        return Err(DetectError::NotInstalled);
    }

    let output = runner.run(&["-V".to_string()]).map_err(|e| {
        if e.is_missing_program() {
            DetectError::NotInstalled
        } else {
            DetectError::Run(e)
        }
    })?;

    let version = TmuxVersion::parse(&output.stdout)
        .ok_or_else(|| DetectError::Unparsable(output.stdout.trim().to_string()))?;
    debug!("detected tmux {}", version);

    if !version.is_supported() {
        return Err(DetectError::TooOld(version));
    }
    Ok(version)
}
