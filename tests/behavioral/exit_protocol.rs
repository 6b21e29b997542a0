// ABOUTME: Behavioral tests for the double-cancel exit gesture and teardown

use crate::support::harness;
use gwt::app::termination::CancelOutcome;
use gwt::app::AppEvent;
use std::time::{Duration, Instant};

#[test]
fn test_second_cancel_within_window_shuts_down() {
    let mut h = harness(&["b1", "b2"]);
    h.launch("b1");
    h.launch("b2");
    let t0 = Instant::now();

    assert_eq!(h.orchestrator.handle_cancel(t0), CancelOutcome::Armed);
    assert!(!h.orchestrator.should_quit());
    assert!(h.orchestrator.notice().is_some());

    assert_eq!(
        h.orchestrator.handle_cancel(t0 + Duration::from_secs(1)),
        CancelOutcome::Shutdown
    );
    assert!(h.orchestrator.should_quit());
    assert!(h.orchestrator.registry().is_empty());
    assert!(h.orchestrator.registry().session().is_none());

    let state = h.fake.state();
    assert_eq!(state.killed_sessions, vec!["gwt-demo".to_string()]);
    assert!(state.sessions.is_empty());
}

#[test]
fn test_second_cancel_after_window_rearms() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    let t0 = Instant::now();

    assert_eq!(h.orchestrator.handle_cancel(t0), CancelOutcome::Armed);
    assert_eq!(
        h.orchestrator.handle_cancel(t0 + Duration::from_secs(3)),
        CancelOutcome::Armed
    );
    assert!(!h.orchestrator.should_quit());
    assert!(h.orchestrator.registry().pane(&p1).is_some());
}

#[test]
fn test_cancel_with_no_panes_exits_at_once() {
    let mut h = harness(&["b1"]);
    h.orchestrator.handle_event(AppEvent::Cancel, Instant::now());
    assert!(h.orchestrator.should_quit());
}

#[test]
fn test_shutdown_removes_session_record() {
    let mut h = harness(&["b1"]);
    h.launch("b1");
    let record = h.home.path().join("sessions").join("gwt-demo.json");
    assert!(record.exists());

    h.orchestrator.shutdown();
    assert!(!record.exists());
}

#[test]
fn test_stop_request_waits_for_confirmation_key() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    h.orchestrator.poll_tick(Instant::now());

    h.orchestrator.handle_event(AppEvent::RequestStop, Instant::now());
    assert_eq!(h.orchestrator.pending_stop(), Some(&p1));
    assert!(h.orchestrator.key_context().stop_pending);

    h.orchestrator.handle_event(AppEvent::AbortStop, Instant::now());
    assert_eq!(h.orchestrator.pending_stop(), None);
    assert!(h.orchestrator.registry().pane(&p1).is_some());

    h.orchestrator.handle_event(AppEvent::RequestStop, Instant::now());
    h.orchestrator.handle_event(AppEvent::ConfirmStop, Instant::now());
    assert!(h.orchestrator.registry().pane(&p1).is_none());
}

#[test]
fn test_teardown_leaves_adopted_session_running() {
    let mut h = harness(&["b1"]);
    h.fake.add_session("work");
    let control = h.fake.control_pane("work").unwrap();
    h.orchestrator.adopt_session(&control).unwrap();
    let p1 = h.launch("b1");

    h.orchestrator.shutdown();

    let state = h.fake.state();
    assert!(state.killed_sessions.is_empty());
    assert_eq!(state.killed_panes, vec![p1]);
    assert_eq!(state.sessions.get("work"), Some(&vec![control]));
}
