// ABOUTME: Layout engine: deterministic column/row grid for the live pane list
//
// Panes fill columns top to bottom in creation order, at most
// MAX_ROWS_PER_COLUMN per column. The grid is recomputed from scratch on
// every change, so a given pane list always yields the same grid.

use crate::panes::model::{Pane, PaneId};

pub const MAX_ROWS_PER_COLUMN: usize = 3;

/// Pane ids stacked top to bottom
pub type Column = Vec<PaneId>;

/// Group panes (already in creation order) into columns of at most three
pub fn layout(panes: &[PaneId]) -> Vec<Column> {
    panes
        .chunks(MAX_ROWS_PER_COLUMN)
        .map(<[PaneId]>::to_vec)
        .collect()
}

/// Layout of a registry snapshot, ordered by creation time
pub fn layout_snapshot(snapshot: &[Pane]) -> Vec<Column> {
    let mut ordered: Vec<&Pane> = snapshot.iter().collect();
    ordered.sort_by_key(|pane| pane.created_at);
    let ids: Vec<PaneId> = ordered.iter().map(|pane| pane.pane_id.clone()).collect();
    layout(&ids)
}

/// `(column, row)` of `pane` within `grid`
pub fn position_of(grid: &[Column], pane: &PaneId) -> Option<(usize, usize)> {
    grid.iter().enumerate().find_map(|(col, column)| {
        column.iter().position(|id| id == pane).map(|row| (col, row))
    })
}

/// Panes in reading order: down each column, then the next column
pub fn flatten(grid: &[Column]) -> Vec<PaneId> {
    grid.iter().flatten().cloned().collect()
}

/// Screen rectangle in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Split `total` into `parts` near-equal sizes; the remainder goes to the leading parts
pub fn equal_splits(total: u16, parts: usize) -> Vec<u16> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u16 = u16::try_from(parts).unwrap_or(u16::MAX);
    let base = total / parts_u16;
    let remainder = usize::from(total % parts_u16);
    (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Map a grid onto `area`: equal column widths, equal row heights per column
pub fn geometry(grid: &[Column], area: PaneRect) -> Vec<(PaneId, PaneRect)> {
    let widths = equal_splits(area.width, grid.len());
    let mut rects = Vec::new();
    let mut x = area.x;

    for (column, width) in grid.iter().zip(widths) {
        let heights = equal_splits(area.height, column.len());
        let mut y = area.y;
        for (pane, height) in column.iter().zip(heights) {
            rects.push((
                pane.clone(),
                PaneRect {
                    x,
                    y,
                    width,
                    height,
                },
            ));
            y = y.saturating_add(height);
        }
        x = x.saturating_add(width);
    }

    rects
}
