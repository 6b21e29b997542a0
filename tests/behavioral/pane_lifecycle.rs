// ABOUTME: Behavioral tests for pane creation, duplicate rejection, stop confirmation, and reconciliation

use crate::support::{harness, worktree};
use gwt::app::focus::{FocusCoordinator, FocusState};
use gwt::app::termination::StopError;
use gwt::launch::SESSION_MARKER_ENV;
use gwt::panes::registry::CreateError;
use gwt::panes::{PaneStatus, SessionRecord};
use std::time::Instant;

#[test]
fn test_first_launch_opens_session_and_records_it() {
    let mut h = harness(&["feature"]);
    let pane_id = h.launch("feature");

    let session = h.orchestrator.registry().session().unwrap();
    assert_eq!(session.session_name, "gwt-demo");
    assert!(h.fake.state().sessions["gwt-demo"].contains(&pane_id));

    let record = SessionRecord::find_for_repo(&h.home.path().join("sessions"), session.repo_root.as_path())
        .unwrap()
        .unwrap();
    assert_eq!(record.session_name, "gwt-demo");
}

#[test]
fn test_launch_exports_session_marker() {
    let mut h = harness(&["feature"]);
    let pane_id = h.launch("feature");

    let pane = h.orchestrator.registry().pane(&pane_id).unwrap();
    let state = h.fake.state();
    let spec = state.launches.last().unwrap();
    assert_eq!(spec.env.get(SESSION_MARKER_ENV).map(String::as_str), Some(pane.marker.as_str()));
    assert_eq!(spec.cwd, worktree("feature"));
}

#[test]
fn test_second_session_for_same_repo_gets_suffix() {
    let mut h = harness(&["b1"]);
    h.fake.add_session("gwt-demo");
    h.launch("b1");
    let session = h.orchestrator.registry().session().unwrap();
    assert_eq!(session.session_name, "gwt-demo-2");
}

#[test]
fn test_duplicate_launch_is_rejected_without_touching_tmux() {
    let mut h = harness(&["feature"]);
    let first = h.launch("feature");

    let err = h
        .orchestrator
        .launch("feature", &worktree("feature"))
        .unwrap_err();
    assert!(matches!(err, CreateError::Duplicate(ref id) if *id == first));
    assert_eq!(h.fake.state().launches.len(), 1);
    assert_eq!(h.orchestrator.registry().len(), 1);
}

#[test]
fn test_stopped_pane_no_longer_blocks_relaunch() {
    let mut h = harness(&["feature"]);
    let first = h.launch("feature");

    // Pane closes; one tick marks it stopped
    h.fake.vanish(&first);
    h.orchestrator.poll_tick(Instant::now());
    assert_eq!(
        h.orchestrator.registry().pane(&first).unwrap().status,
        PaneStatus::Stopped
    );

    let second = h.orchestrator.launch("feature", &worktree("feature")).unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_vanished_pane_is_stopped_then_removed() {
    let mut h = harness(&["b1", "b2"]);
    let p1 = h.launch("b1");
    let p2 = h.launch("b2");

    h.fake.vanish(&p1);
    let report = h.orchestrator.poll_tick(Instant::now());
    assert!(report.removed.is_empty());
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::Stopped
    );

    let report = h.orchestrator.poll_tick(Instant::now());
    assert_eq!(report.removed, vec![p1.clone()]);
    assert!(h.orchestrator.registry().pane(&p1).is_none());

    let p2_pane = h.orchestrator.registry().pane(&p2).unwrap();
    assert_eq!((p2_pane.column, p2_pane.row), (0, 0));
}

#[test]
fn test_failed_listing_changes_nothing() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    h.fake.vanish(&p1);
    h.fake.state().fail_listing = true;

    for _ in 0..3 {
        let report = h.orchestrator.poll_tick(Instant::now());
        assert!(report.changes.is_empty());
        assert!(report.removed.is_empty());
    }
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::Unknown
    );
}

#[test]
fn test_running_pane_requires_confirmation_to_stop() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");
    h.orchestrator.poll_tick(Instant::now());
    assert_eq!(
        h.orchestrator.registry().pane(&p1).unwrap().status,
        PaneStatus::Running
    );

    let err = h.orchestrator.request_stop(&p1, false).unwrap_err();
    assert_eq!(err, StopError::ConfirmationRequired(p1.clone()));
    assert!(h.orchestrator.registry().pane(&p1).is_some());

    let removed = h.orchestrator.request_stop(&p1, true).unwrap();
    assert_eq!(removed.pane_id, p1);
    assert!(h.fake.state().killed_panes.contains(&p1));
}

#[test]
fn test_removing_focused_pane_resets_focus() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");

    FocusCoordinator::new(h.orchestrator.registry())
        .focus_pane(&p1)
        .unwrap();
    assert_eq!(h.fake.state().focused, Some(p1.clone()));
    assert_eq!(h.orchestrator.registry().focus_state(), FocusState::Pane(p1.clone()));

    h.orchestrator.request_stop(&p1, true).unwrap();
    assert_eq!(h.orchestrator.registry().focus_state(), FocusState::BranchList);
}

#[test]
fn test_focus_cycles_through_panes_in_layout_order() {
    let mut h = harness(&["b1", "b2"]);
    let p1 = h.launch("b1");
    let p2 = h.launch("b2");
    let focus = FocusCoordinator::new(h.orchestrator.registry());

    focus.cycle_next().unwrap();
    assert_eq!(focus.current(), FocusState::Pane(p1));
    focus.cycle_next().unwrap();
    assert_eq!(focus.current(), FocusState::Pane(p2.clone()));
    focus.cycle_next().unwrap();
    assert_eq!(focus.current(), FocusState::BranchList);
    focus.cycle_previous().unwrap();
    assert_eq!(focus.current(), FocusState::Pane(p2));
}

#[test]
fn test_stop_interrupts_agent_before_killing_pane() {
    let mut h = harness(&["b1"]);
    let p1 = h.launch("b1");

    h.orchestrator.request_stop(&p1, true).unwrap();
    let state = h.fake.state();
    assert_eq!(state.keys, vec![(p1.clone(), "C-c".to_string())]);
    assert_eq!(state.killed_panes, vec![p1]);
}

#[test]
fn test_running_inside_tmux_adopts_current_session() {
    let mut h = harness(&["b1"]);
    h.fake.add_session("work");
    let control = h.fake.control_pane("work").unwrap();

    let session = h.orchestrator.adopt_session(&control).unwrap();
    assert_eq!(session.session_name, "work");

    let p1 = h.launch("b1");
    assert_eq!(h.orchestrator.registry().pane(&p1).unwrap().session_name, "work");
    // Nothing new was created; the agent split off beside gwt's pane
    assert_eq!(h.fake.state().sessions.len(), 1);
    assert_eq!(
        h.fake.state().placements[0].anchor(),
        Some(&control)
    );

    FocusCoordinator::new(h.orchestrator.registry()).focus_branch_list();
    assert_eq!(h.fake.state().focused, Some(control));
}

#[test]
fn test_leftover_agent_pane_is_adopted_on_first_tick() {
    let mut h = harness(&["b1", "b2"]);
    h.fake.add_session("work");
    let control = h.fake.control_pane("work").unwrap();
    let leftover = h.fake.add_foreign_pane("work", "claude", &worktree("b1"));
    let shell = h.fake.add_foreign_pane("work", "bash", &worktree("b2"));
    h.orchestrator.adopt_session(&control).unwrap();

    h.orchestrator.poll_tick(Instant::now());

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].pane_id, leftover);
    assert_eq!(snapshot[0].branch, "b1");
    assert!(h.orchestrator.registry().pane(&shell).is_none());

    let err = h
        .orchestrator
        .launch("b1", &worktree("b1"))
        .unwrap_err();
    assert_eq!(err, CreateError::Duplicate(leftover));
    assert!(h.fake.state().launches.is_empty());
}
