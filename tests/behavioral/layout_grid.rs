// ABOUTME: Behavioral tests for the column grid: fill order, column count, and reflow on removal

use crate::support::harness;
use gwt::panes::layout::{flatten, layout, layout_snapshot, position_of};
use gwt::panes::PaneId;
use gwt::tmux::SplitPlacement;
use pretty_assertions::assert_eq;

fn ids(names: &[&str]) -> Vec<PaneId> {
    names.iter().map(|n| PaneId::from(*n)).collect()
}

#[test]
fn test_column_count_is_ceiling_of_panes_over_three() {
    for n in 0usize..=10 {
        let panes: Vec<PaneId> = (0..n).map(|i| PaneId::new(format!("%{i}"))).collect();
        let grid = layout(&panes);
        assert_eq!(grid.len(), n.div_ceil(3), "{n} panes");
        assert!(grid.iter().all(|column| !column.is_empty() && column.len() <= 3));
        assert_eq!(flatten(&grid), panes, "{n} panes keep creation order");
    }
}

#[test]
fn test_layout_is_idempotent() {
    let panes = ids(&["%1", "%2", "%3", "%4", "%5"]);
    let first = layout(&panes);
    let second = layout(&flatten(&first));
    assert_eq!(first, second);
}

#[test]
fn test_four_launches_fill_first_column_then_open_second() {
    let mut h = harness(&["b1", "b2", "b3", "b4"]);
    let launched: Vec<PaneId> = ["b1", "b2", "b3", "b4"]
        .iter()
        .map(|b| h.launch(b))
        .collect();

    let grid = layout_snapshot(&h.orchestrator.snapshot());
    assert_eq!(
        grid,
        vec![launched[..3].to_vec(), launched[3..].to_vec()]
    );

    let snapshot = h.orchestrator.snapshot();
    let b4 = snapshot.iter().find(|p| p.branch == "b4").unwrap();
    assert_eq!((b4.column, b4.row), (1, 0));
}

#[test]
fn test_removal_reflows_later_panes() {
    let mut h = harness(&["b1", "b2", "b3", "b4"]);
    let launched: Vec<PaneId> = ["b1", "b2", "b3", "b4"]
        .iter()
        .map(|b| h.launch(b))
        .collect();

    // Freshly launched panes are unclassified, so no confirmation is needed
    h.orchestrator.request_stop(&launched[1], false).unwrap();

    let grid = layout_snapshot(&h.orchestrator.snapshot());
    assert_eq!(grid.len(), 1);
    assert_eq!(position_of(&grid, &launched[3]), Some((0, 2)));
    assert_eq!(position_of(&grid, &launched[1]), None);
}

#[test]
fn test_splits_build_columns_beside_the_branch_list() {
    let mut h = harness(&["b1", "b2", "b3", "b4", "b5"]);
    let launched: Vec<PaneId> = ["b1", "b2", "b3", "b4", "b5"]
        .iter()
        .map(|b| h.launch(b))
        .collect();
    let control = h
        .orchestrator
        .registry()
        .session()
        .and_then(|s| s.handle.control_pane)
        .unwrap();

    let placements = h.fake.state().placements.clone();
    assert_eq!(
        placements,
        vec![
            SplitPlacement::NewColumn {
                anchor: Some(control)
            },
            SplitPlacement::Below {
                anchor: launched[0].clone()
            },
            SplitPlacement::Below {
                anchor: launched[1].clone()
            },
            SplitPlacement::NewColumn {
                anchor: Some(launched[0].clone())
            },
            SplitPlacement::Below {
                anchor: launched[3].clone()
            },
        ]
    );
}
