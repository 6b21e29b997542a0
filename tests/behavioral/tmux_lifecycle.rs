// ABOUTME: Behavioral tests for the tmux gateway against a real tmux server
//
// Every test creates its own uniquely named session and kills it at the end.
// All tests are conditional on tmux availability.

use super::fixtures::{cleanup_tmux_session, tmux_session_exists, unique_session_name};
use crate::require_tmux;
use anyhow::Result;
use gwt::launch::LaunchSpec;
use gwt::tmux::{
    check_tmux, Multiplexer, ProcessRunner, SessionOptions, SplitPlacement, TmuxGateway,
};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn gateway() -> Result<TmuxGateway> {
    let version = check_tmux(&ProcessRunner::tmux(TIMEOUT))?;
    Ok(TmuxGateway::with_timeout(TIMEOUT)
        .with_options(SessionOptions {
            history_limit: 2000,
            return_key: None,
        })
        .with_split_env(version.supports_split_env())
        .with_full_split(version.supports_full_split()))
}

fn beside_control(session: &gwt::tmux::SessionHandle) -> SplitPlacement {
    SplitPlacement::NewColumn {
        anchor: session.control_pane.clone(),
    }
}

#[test]
fn test_session_create_split_and_kill() -> Result<()> {
    require_tmux!();

    let name = unique_session_name("split");
    let dir = tempfile::tempdir()?;
    let tmux = gateway()?;

    let session = tmux.create_session(&name, dir.path())?;
    assert!(tmux_session_exists(&name));
    assert!(tmux.list_sessions()?.contains(&name));

    let mut spec = LaunchSpec::new("sleep", dir.path());
    spec.args.push("30".to_string());
    let spec = spec.with_env("GWT_SESSION_MARKER", "gwt-test.b1.sleep.0000abcd");
    let pane = tmux.split_pane(&session, &beside_control(&session), &spec)?;

    let panes = tmux.list_panes(&session)?;
    assert!(panes.iter().any(|p| p.pane_id == pane.pane_id));
    if let Some(control) = &session.control_pane {
        assert!(panes.iter().any(|p| p.pane_id == *control));
    }

    tmux.kill_pane(&pane.pane_id)?;
    let panes = tmux.list_panes(&session)?;
    assert!(!panes.iter().any(|p| p.pane_id == pane.pane_id));

    tmux.kill_session(&session)?;
    assert!(!tmux_session_exists(&name));

    cleanup_tmux_session(&name);
    Ok(())
}

#[test]
fn test_missing_session_is_not_found() -> Result<()> {
    require_tmux!();

    let name = unique_session_name("missing");
    let dir = tempfile::tempdir()?;
    let tmux = gateway()?;

    // Keep a server running so the error is about the session, not the server
    let keeper = unique_session_name("keeper");
    let keeper_session = tmux.create_session(&keeper, dir.path())?;

    let err = tmux
        .list_panes(&gwt::tmux::SessionHandle::new(name))
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    tmux.kill_session(&keeper_session)?;
    cleanup_tmux_session(&keeper);
    Ok(())
}

#[test]
fn test_capture_tail_reads_pane_output() -> Result<()> {
    require_tmux!();

    let name = unique_session_name("capture");
    let dir = tempfile::tempdir()?;
    let tmux = gateway()?;
    let session = tmux.create_session(&name, dir.path())?;

    let mut spec = LaunchSpec::new("sh", dir.path());
    spec.args = vec!["-c".to_string(), "echo gwt-capture-check; sleep 30".to_string()];
    let pane = tmux.split_pane(&session, &beside_control(&session), &spec)?;

    let mut seen = false;
    for _ in 0..20 {
        if tmux.capture_tail(&pane.pane_id, 20)?.contains("gwt-capture-check") {
            seen = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    tmux.kill_session(&session)?;
    cleanup_tmux_session(&name);
    assert!(seen, "pane output never showed up");
    Ok(())
}

#[test]
fn test_column_and_row_splits_place_panes() -> Result<()> {
    require_tmux!();

    let name = unique_session_name("grid");
    let dir = tempfile::tempdir()?;
    let tmux = gateway()?;
    let session = tmux.create_session(&name, dir.path())?;

    let mut spec = LaunchSpec::new("sleep", dir.path());
    spec.args.push("30".to_string());
    let top = tmux.split_pane(&session, &beside_control(&session), &spec)?;
    let under = tmux.split_pane(
        &session,
        &SplitPlacement::Below {
            anchor: top.pane_id.clone(),
        },
        &spec,
    )?;

    let panes = tmux.list_panes(&session)?;
    let geometry = |id: &gwt::tmux::PaneId| {
        panes
            .iter()
            .find(|p| &p.pane_id == id)
            .and_then(|p| p.geometry)
    };
    let control = session.control_pane.as_ref().and_then(geometry);
    let (top, under) = (geometry(&top.pane_id), geometry(&under.pane_id));

    tmux.kill_session(&session)?;
    cleanup_tmux_session(&name);

    if let (Some(control), Some(top), Some(under)) = (control, top, under) {
        assert!(top.left > control.left, "new column sits right of the control pane");
        assert_eq!(under.left, top.left, "row split stays in its column");
        assert!(under.top > top.top);
    }
    Ok(())
}

#[test]
fn test_adopt_session_from_pane() -> Result<()> {
    require_tmux!();

    let name = unique_session_name("adopt");
    let dir = tempfile::tempdir()?;
    let tmux = gateway()?;
    let created = tmux.create_session(&name, dir.path())?;

    if let Some(control) = &created.control_pane {
        let adopted = tmux.adopt_session(control)?;
        assert_eq!(adopted.name, name);
        assert_eq!(adopted.control_pane.as_ref(), Some(control));
    }

    tmux.kill_session(&created)?;
    cleanup_tmux_session(&name);
    Ok(())
}
