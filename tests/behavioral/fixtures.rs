// ABOUTME: tmux probes and naming helpers for behavioral tests that need a real server
//
// Provides:
// - tmux_available(): Check if tmux is installed
// - require_tmux!(): Skip test if tmux unavailable
// - unique_session_name(): Session names that cannot collide between runs

use std::process::Command;
use uuid::Uuid;

/// True when a `tmux` binary answers `-V`
pub fn tmux_available() -> bool {
    Command::new("tmux")
        .args(["-V"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Macro to skip test if tmux is not available
#[macro_export]
macro_rules! require_tmux {
    () => {
        if !super::fixtures::tmux_available() {
            eprintln!("Skipping test: tmux not available");
            return Ok(());
        }
    };
}

/// Kill a session left behind by a failed assertion
pub fn cleanup_tmux_session(name: &str) {
    let _ = Command::new("tmux")
        .args(["kill-session", "-t", name])
        .output();
}

/// Ask tmux directly, bypassing the gateway under test
pub fn tmux_session_exists(name: &str) -> bool {
    Command::new("tmux")
        .args(["has-session", "-t", name])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// `gwt-test-{prefix}-{8 hex}`
pub fn unique_session_name(prefix: &str) -> String {
    format!("gwt-test-{}-{}", prefix, &Uuid::new_v4().to_string()[..8])
}
