// ABOUTME: Pane registry, layout engine, status inference, activity readers, and agent shutdown

pub mod layout;
pub mod model;
pub mod reader;
pub mod registry;
pub mod status;
pub mod terminate;

pub use layout::{geometry, layout, layout_snapshot, Column, PaneRect, MAX_ROWS_PER_COLUMN};
pub use model::{Pane, PaneId, PaneMarker, PaneStatus, Session, SessionRecord, StatusSource};
pub use reader::{PaneActivity, ReaderPool, ReaderSettings};
pub use registry::{CreateError, LaunchContext, PaneRegistry, StatusChange};
pub use status::{status_for_hook_event, StatusEngine, TickReport};
pub use terminate::{terminate, StopPolicy, StopTarget};
