// ABOUTME: Parsers for tmux tabular output and stderr classification
//
// The rich list format is tab separated. When a tmux build rejects the
// format flags, the plain `list-panes` output is parsed instead; that path
// only recovers pane identity, which is the one field the core cannot lose.

use crate::tmux::gateway::{GatewayError, PaneGeometry, PaneHandle, PaneId, RawPaneRecord};
use lazy_static::lazy_static;
use std::path::PathBuf;
use regex::Regex;

lazy_static! {
    /// tmux pane identifiers look like `%17`
    static ref PANE_ID_REGEX: Regex = Regex::new(r"%\d+").unwrap();
    /// Color/style and cursor control sequences
    static ref ANSI_REGEX: Regex = Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").unwrap();
}

/// `-F` format used for the full-fidelity pane listing
pub const PANE_LIST_FORMAT: &str = "#{pane_id}\t#{session_name}\t#{pane_pid}\t#{pane_dead}\t#{pane_current_command}\t#{pane_left}\t#{pane_top}\t#{pane_width}\t#{pane_height}\t#{pane_current_path}";

/// `-F` format printed by `split-window -P`
pub const SPLIT_FORMAT: &str = "#{pane_id}\t#{pane_pid}";

/// Parse output produced with [`PANE_LIST_FORMAT`]
///
/// Lines without a recognisable pane id are skipped. Unparsable numeric
/// fields (old tmux versions print unknown variables as empty strings)
/// degrade to `None` rather than dropping the row.
pub fn parse_pane_records(output: &str, session: &str) -> Vec<RawPaneRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let pane_id = fields.first().map(|s| s.trim())?;
            if !PANE_ID_REGEX.is_match(pane_id) {
                return None;
            }

            let field = |idx: usize| fields.get(idx).map_or("", |s| s.trim());
            let session_name = if field(1).is_empty() { session } else { field(1) };

            let geometry = match (
                field(5).parse().ok(),
                field(6).parse().ok(),
                field(7).parse().ok(),
                field(8).parse().ok(),
            ) {
                (Some(left), Some(top), Some(width), Some(height)) => Some(PaneGeometry {
                    left,
                    top,
                    width,
                    height,
                }),
                _ => None,
            };

            Some(RawPaneRecord {
                pane_id: PaneId::new(pane_id),
                session: session_name.to_string(),
                command: field(4).to_string(),
                pid: field(2).parse().ok(),
                dead: field(3) == "1",
                geometry,
                current_path: Some(field(9))
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            })
        })
        .collect()
}

/// Parse the default `list-panes` output
///
/// Example line: `0.1: [80x24] [history 0/2000, 0 bytes] %3 (active)`
pub fn parse_fallback_pane_list(output: &str, session: &str) -> Vec<RawPaneRecord> {
    output
        .lines()
        .filter_map(|line| PANE_ID_REGEX.find(line))
        .map(|m| RawPaneRecord::new(m.as_str(), session))
        .collect()
}

/// Parse `split-window -P -F` output into a pane handle
pub fn parse_pane_handle(output: &str) -> Option<PaneHandle> {
    let line = output.lines().find(|l| !l.trim().is_empty())?;
    let mut fields = line.split('\t');
    let pane_id = fields.next().map(str::trim)?;
    if !PANE_ID_REGEX.is_match(pane_id) {
        return None;
    }
    let pid = fields.next().and_then(|p| p.trim().parse().ok());
    Some(PaneHandle {
        pane_id: PaneId::new(pane_id),
        pid,
    })
}

/// Parse `display-message -p '#{window_width}\t#{window_height}'`
pub fn parse_window_size(output: &str) -> Option<(u16, u16)> {
    let mut fields = output.trim().split('\t');
    let width = fields.next()?.trim().parse().ok()?;
    let height = fields.next()?.trim().parse().ok()?;
    Some((width, height))
}

/// Parse `list-sessions -F '#{session_name}'`
pub fn parse_session_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Remove terminal escape sequences from captured text
pub fn strip_ansi_codes(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").into_owned()
}

/// Map a failed tmux invocation to the gateway error taxonomy
pub fn classify_failure(command: &str, target: &str, stderr: &str) -> GatewayError {
    let lowered = stderr.to_lowercase();
    let reason = stderr.trim().to_string();

    let not_found = [
        "can't find",
        "no server running",
        "session not found",
        "no such",
        "no current",
        "error connecting to",
    ];
    let unsupported = [
        "unknown option",
        "unknown command",
        "invalid option",
        "unknown flag",
        "usage:",
        "unknown format",
        "command not found",
    ];

    if not_found.iter().any(|p| lowered.contains(p)) {
        GatewayError::NotFound {
            target: target.to_string(),
        }
    } else if unsupported.iter().any(|p| lowered.contains(p)) {
        GatewayError::Unsupported {
            command: command.to_string(),
            reason,
        }
    } else {
        GatewayError::Transient {
            command: command.to_string(),
            reason,
        }
    }
}
