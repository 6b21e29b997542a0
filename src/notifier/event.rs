// ABOUTME: Status events produced by the hook helper, and parsing of the hook JSON payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed hook payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("hook payload has no session marker and GWT_SESSION_MARKER is not set")]
    MissingMarker,

    #[error("hook payload has no event name")]
    MissingEvent,

    #[error("session marker {0:?} is not a valid gwt marker")]
    InvalidMarker(String),

    #[error("event spool I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Hook JSON as agents send it; unknown fields are ignored
#[derive(Debug, Default, Deserialize)]
struct HookPayload {
    #[serde(default)]
    session_marker: Option<String>,

    #[serde(default, alias = "hook_event_name")]
    event_name: Option<String>,

    #[serde(default)]
    notification_type: Option<String>,
}

/// One status notification waiting to be folded into a pane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub session_marker: String,
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl StatusEvent {
    /// Build an event from a hook payload
    ///
    /// `event_arg` (the helper's command-line event) overrides the payload's
    /// event name; `env_marker` fills in a marker the payload lacks. Blank
    /// input is treated as an empty object.
    pub fn from_payload(
        input: &str,
        event_arg: Option<&str>,
        env_marker: Option<&str>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, IngestError> {
        let payload: HookPayload = if input.trim().is_empty() {
            HookPayload::default()
        } else {
            serde_json::from_str(input)?
        };

        let event_name = non_blank(event_arg)
            .or_else(|| non_blank(payload.event_name.as_deref()))
            .ok_or(IngestError::MissingEvent)?;
        let session_marker = non_blank(payload.session_marker.as_deref())
            .or_else(|| non_blank(env_marker))
            .ok_or(IngestError::MissingMarker)?;

        Ok(Self {
            session_marker,
            event_name,
            notification_type: non_blank(payload.notification_type.as_deref()),
            observed_at,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
