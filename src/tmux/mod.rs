// ABOUTME: Multiplexer gateway for gwt, backed by tmux
//
// - gateway: the `Multiplexer` trait, typed records, and `GatewayError`
// - runner: bounded-timeout child process execution
// - command: `TmuxGateway`, the tmux implementation with feature fallbacks
// - parse: tabular output parsing and stderr classification
// - naming: `gwt-{repo}` session names
// - detector: tmux presence, version, and inside-tmux checks

pub mod command;
pub mod detector;
pub mod gateway;
pub mod naming;
pub mod parse;
pub mod runner;

pub use command::{SessionOptions, TmuxGateway};
pub use detector::{check_tmux, is_inside_tmux, DetectError, TmuxVersion};
pub use gateway::{
    GatewayError, GatewayResult, Multiplexer, PaneGeometry, PaneHandle, PaneId, RawPaneRecord,
    SessionHandle, SplitPlacement,
};
#[cfg(test)]
pub use gateway::MockMultiplexer;
pub use naming::{extract_repo_name, generate_session_name, is_gwt_session, sanitize_session_name};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunError};
