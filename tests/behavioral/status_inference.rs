// ABOUTME: Behavioral tests for status inference: heuristics, hook precedence, and spooled event handling

use crate::support::harness;
use chrono::Utc;
use gwt::cli::hook::ingest;
use gwt::notifier::{IngestError, StatusEvent};
use gwt::panes::reader::PaneActivity;
use gwt::panes::{PaneStatus, StatusSource};
use std::time::{Duration, Instant};

fn hook_event(marker: &str, event_name: &str, notification_type: Option<&str>) -> StatusEvent {
    StatusEvent {
        session_marker: marker.to_string(),
        event_name: event_name.to_string(),
        notification_type: notification_type.map(str::to_string),
        observed_at: Utc::now(),
    }
}

#[test]
fn test_quiet_pane_stops_after_idle_threshold() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    let t0 = Instant::now();

    h.orchestrator.poll_tick(t0 + Duration::from_secs(59));
    assert_eq!(h.orchestrator.registry().pane(&p1).unwrap().status, PaneStatus::Running);

    h.orchestrator.poll_tick(t0 + Duration::from_secs(61));
    let pane = h.orchestrator.registry().pane(&p1).unwrap();
    assert_eq!(pane.status, PaneStatus::Stopped);
    assert_eq!(pane.status_source, StatusSource::Heuristic);
}

#[test]
fn test_output_keeps_pane_running() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    let t0 = Instant::now();

    h.orchestrator.on_activity(PaneActivity {
        pane_id: p1.clone(),
        observed_at: t0 + Duration::from_secs(50),
        tail: "compiling...".to_string(),
    });
    h.orchestrator.poll_tick(t0 + Duration::from_secs(100));
    assert_eq!(h.orchestrator.registry().pane(&p1).unwrap().status, PaneStatus::Running);
}

#[test]
fn test_prompt_in_tail_means_waiting_input() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");

    h.orchestrator.on_activity(PaneActivity {
        pane_id: p1.clone(),
        observed_at: Instant::now(),
        tail: "Overwrite config.toml? [y/N]\n".to_string(),
    });
    h.orchestrator.poll_tick(Instant::now());
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::WaitingInput
    );
}

#[test]
fn test_hook_status_takes_precedence_over_heuristics() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    let marker = h.orchestrator.registry().pane(&p1).unwrap().marker;

    h.spool
        .enqueue(&hook_event(marker.as_str(), "Notification", Some("permission_prompt")))
        .unwrap();
    h.orchestrator.poll_tick(Instant::now());

    let pane = h.orchestrator.registry().pane(&p1).unwrap();
    assert_eq!(pane.status, PaneStatus::WaitingInput);
    assert_eq!(pane.status_source, StatusSource::Hook);

    // Long idle would make a heuristic pane Stopped; a hook-driven pane keeps its status
    h.orchestrator
        .poll_tick(Instant::now() + Duration::from_secs(300));
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::WaitingInput
    );

    h.spool
        .enqueue(&hook_event(marker.as_str(), "Stop", None))
        .unwrap();
    h.orchestrator.poll_tick(Instant::now());
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::Stopped
    );
}

#[test]
fn test_events_for_same_pane_coalesce_to_latest() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    let marker = h.orchestrator.registry().pane(&p1).unwrap().marker;

    h.spool
        .enqueue(&hook_event(marker.as_str(), "UserPromptSubmit", None))
        .unwrap();
    h.spool
        .enqueue(&hook_event(marker.as_str(), "Stop", None))
        .unwrap();
    h.orchestrator.poll_tick(Instant::now());

    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::Stopped
    );
}

#[test]
fn test_malformed_spooled_payload_is_discarded() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    h.orchestrator.poll_tick(Instant::now());
    let before = h.orchestrator.registry().pane(&p1).unwrap();
    assert_eq!(before.status, PaneStatus::Running);

    let err = ingest(r#"{"event_name": 123}"#, None, Some(before.marker.as_str()), &h.spool)
        .unwrap_err();
    assert!(matches!(err, IngestError::Malformed(_)));

    // A corrupt file that reached the spool some other way is dropped on pickup
    std::fs::create_dir_all(h.spool.dir()).unwrap();
    let path = h.spool.dir().join(format!("{}.json", before.marker));
    std::fs::write(&path, r#"{"event_name": 123}"#).unwrap();

    h.orchestrator.poll_tick(Instant::now());
    let after = h.orchestrator.registry().pane(&p1).unwrap();
    assert_eq!(after.status, PaneStatus::Running);
    assert_eq!(after.status_source, StatusSource::Heuristic);
    assert!(!path.exists());
}

#[test]
fn test_events_for_unknown_markers_are_left_alone() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");

    let foreign = "gwt-other.main.claude.deadbeef";
    h.spool.enqueue(&hook_event(foreign, "Stop", None)).unwrap();
    h.orchestrator.poll_tick(Instant::now());

    assert_eq!(h.orchestrator.registry().pane(&p1).unwrap().status, PaneStatus::Running);
    assert!(h.spool.dir().join(format!("{foreign}.json")).exists());
}
