// ABOUTME: Focus coordinator: which UI region owns keyboard input

use crate::panes::layout::{flatten, layout_snapshot};
use crate::panes::model::{Pane, PaneId};
use crate::panes::registry::PaneRegistry;
use crate::tmux::gateway::GatewayError;
use tracing::{debug, warn};

/// Exactly one region owns input at a time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    BranchList,
    Pane(PaneId),
}

impl FocusState {
    pub fn is_pane(&self, pane_id: &PaneId) -> bool {
        matches!(self, Self::Pane(id) if id == pane_id)
    }

    pub fn focused_pane(&self) -> Option<&PaneId> {
        match self {
            Self::Pane(id) => Some(id),
            Self::BranchList => None,
        }
    }

    /// Cycle forward: branch list, then panes in layout order, then back
    pub fn next(&self, snapshot: &[Pane]) -> Self {
        let order = flatten(&layout_snapshot(snapshot));
        let next = match self {
            Self::BranchList => order.first(),
            Self::Pane(id) => order
                .iter()
                .position(|p| p == id)
                .and_then(|i| order.get(i + 1)),
        };
        next.map_or(Self::BranchList, |id| Self::Pane(id.clone()))
    }

    /// Cycle backward through the same order as [`FocusState::next`]
    pub fn previous(&self, snapshot: &[Pane]) -> Self {
        let order = flatten(&layout_snapshot(snapshot));
        let previous = match self {
            Self::BranchList => order.last(),
            Self::Pane(id) => match order.iter().position(|p| p == id) {
                Some(0) | None => None,
                Some(i) => order.get(i - 1),
            },
        };
        previous.map_or(Self::BranchList, |id| Self::Pane(id.clone()))
    }
}

/// Applies focus changes to both the multiplexer and the registry
pub struct FocusCoordinator<'a> {
    registry: &'a PaneRegistry,
}

impl<'a> FocusCoordinator<'a> {
    pub fn new(registry: &'a PaneRegistry) -> Self {
        Self { registry }
    }

    pub fn current(&self) -> FocusState {
        self.registry.focus_state()
    }

    /// Focus a pane: select it in the multiplexer, then record it
    pub fn focus_pane(&self, pane_id: &PaneId) -> Result<(), GatewayError> {
        if self.registry.pane(pane_id).is_none() {
            return Err(GatewayError::NotFound {
                target: pane_id.to_string(),
            });
        }
        self.registry.gateway().focus_pane(pane_id)?;
        if !self.registry.set_focus(FocusState::Pane(pane_id.clone())) {
            // Removed between the check and the select
            return Err(GatewayError::NotFound {
                target: pane_id.to_string(),
            });
        }
        debug!("focus -> pane {}", pane_id);
        Ok(())
    }

    /// Return input to the branch list
    pub fn focus_branch_list(&self) {
        if let Some(control) = self.registry.session().and_then(|s| s.handle.control_pane) {
            if let Err(e) = self.registry.gateway().focus_pane(&control) {
                warn!("could not select control pane {}: {}", control, e);
            }
        }
        self.registry.set_focus(FocusState::BranchList);
        debug!("focus -> branch list");
    }

    /// Apply `target`, whichever region it names
    pub fn apply(&self, target: FocusState) -> Result<(), GatewayError> {
        match target {
            FocusState::BranchList => {
                self.focus_branch_list();
                Ok(())
            }
            FocusState::Pane(id) => self.focus_pane(&id),
        }
    }

    pub fn cycle_next(&self) -> Result<(), GatewayError> {
        let target = self.current().next(&self.registry.snapshot());
        self.apply(target)
    }

    pub fn cycle_previous(&self) -> Result<(), GatewayError> {
        let target = self.current().previous(&self.registry.snapshot());
        self.apply(target)
    }
}
