// ABOUTME: Notifier ingestion path: hook payload parsing and the durable event spool
//
// The `gwt hook` helper turns an agent's hook payload into a StatusEvent and
// drops it into the spool; the running instance drains the spool on each
// poll tick and folds the events into the status engine.

pub mod event;
pub mod spool;

pub use event::{IngestError, StatusEvent};
pub use spool::EventSpool;
