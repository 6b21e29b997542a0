// ABOUTME: Interactive session: focus, safety protocol, key mapping, orchestration, and the event loop

pub mod events;
pub mod focus;
pub mod orchestrator;
pub mod runtime;
pub mod termination;

pub use events::{AppEvent, EventHandler, KeyContext};
pub use focus::{FocusCoordinator, FocusState};
pub use orchestrator::{BranchEntry, Orchestrator, OrchestratorOptions};
pub use termination::{check_stop, find_duplicate, CancelOutcome, ExitGuard, StopError, TerminationArmState};
