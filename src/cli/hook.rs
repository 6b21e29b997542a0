// ABOUTME: `gwt hook`: one-shot helper that spools an agent hook event for the running instance
//
// Agents invoke this from their own hook configuration. It must finish fast
// and must never fail the agent: every error is logged to stderr and the
// process still exits successfully.

use super::HookArgs;
use crate::config::GwtConfig;
use crate::launch::SESSION_MARKER_ENV;
use crate::notifier::{EventSpool, IngestError, StatusEvent};
use anyhow::Result;
use chrono::Utc;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Parse `input` and spool the resulting event
pub fn ingest(
    input: &str,
    event_arg: Option<&str>,
    env_marker: Option<&str>,
    spool: &EventSpool,
) -> Result<PathBuf, IngestError> {
    let event = StatusEvent::from_payload(input, event_arg, env_marker, Utc::now())?;
    spool.enqueue(&event)
}

#[allow(clippy::unused_async)]
pub async fn execute(args: HookArgs) -> Result<()> {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        warn!("could not read hook payload: {}", e);
    }

    let config = match GwtConfig::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("using default config: {}", e);
            GwtConfig::default()
        }
    };
    let events_dir = match config.events_dir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!("cannot locate event spool: {}", e);
            return Ok(());
        }
    };
    let spool = EventSpool::new(events_dir, config.notifier.event_expiry());

    let env_marker = std::env::var(SESSION_MARKER_ENV).ok();
    match ingest(&input, args.event.as_deref(), env_marker.as_deref(), &spool) {
        Ok(path) => debug!("spooled hook event to {}", path.display()),
        Err(IngestError::MissingMarker) => {
            // Agent not started by gwt
            debug!("no session marker; ignoring hook event");
        }
        Err(e) => warn!("dropping hook event: {}", e),
    }
    Ok(())
}
