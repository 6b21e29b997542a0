// ABOUTME: Keyboard input mapping for the interactive loop

use crate::app::focus::FocusState;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Esc / Ctrl-C; two within the exit window quit
    Cancel,
    FocusNext,
    FocusPrevious,
    SelectNext,
    SelectPrevious,
    /// Launch the selected branch, or focus its pane if one is live
    Activate,
    /// Stop the focused (or selected) pane
    RequestStop,
    ConfirmStop,
    AbortStop,
}

/// What the key mapping needs to know about the current UI state
#[derive(Debug, Clone, Default)]
pub struct KeyContext {
    pub focus: FocusState,
    /// A stop is waiting for `y`
    pub stop_pending: bool,
}

pub struct EventHandler;

impl EventHandler {
    pub fn handle_key_event(key_event: KeyEvent, context: &KeyContext) -> Option<AppEvent> {
        if key_event.kind == KeyEventKind::Release {
            return None;
        }

        let ctrl_c = key_event.code == KeyCode::Char('c')
            && key_event.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key_event.code == KeyCode::Esc {
            return Some(if context.stop_pending {
                AppEvent::AbortStop
            } else {
                AppEvent::Cancel
            });
        }

        // A pending stop swallows the next key
        if context.stop_pending {
            return Some(match key_event.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => AppEvent::ConfirmStop,
                _ => AppEvent::AbortStop,
            });
        }

        let on_branch_list = context.focus == FocusState::BranchList;
        let event = match key_event.code {
            KeyCode::Tab => Some(AppEvent::FocusNext),
            KeyCode::BackTab => Some(AppEvent::FocusPrevious),
            KeyCode::Char('j') | KeyCode::Down if on_branch_list => Some(AppEvent::SelectNext),
            KeyCode::Char('k') | KeyCode::Up if on_branch_list => Some(AppEvent::SelectPrevious),
            KeyCode::Enter => Some(AppEvent::Activate),
            KeyCode::Char('x') => Some(AppEvent::RequestStop),
            _ => None,
        };
        if let Some(event) = &event {
            debug!("key {:?} -> {:?}", key_event.code, event);
        }
        event
    }
}
