// ABOUTME: Per-pane activity readers that report "output arrived" to the event loop
//
// Each reader runs on its own OS thread, periodically captures the pane's
// tail through the gateway, and posts a PaneActivity whenever the tail
// changes. Readers never touch pane metadata; the event loop applies the
// activity through the status engine.

use crate::panes::model::PaneId;
use crate::tmux::gateway::Multiplexer;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// New output observed in a pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneActivity {
    pub pane_id: PaneId,
    pub observed_at: Instant,
    pub tail: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderSettings {
    pub interval: Duration,
    pub tail_lines: u16,
    /// How long `stop` waits for a reader thread before detaching it
    pub join_timeout: Duration,
}

struct ReaderHandle {
    stop_tx: mpsc::Sender<()>,
    /// Disconnects when the reader thread exits
    done_rx: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

pub struct ReaderPool {
    gateway: Arc<dyn Multiplexer>,
    settings: ReaderSettings,
    activity_tx: UnboundedSender<PaneActivity>,
    readers: HashMap<PaneId, ReaderHandle>,
}

fn digest(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

impl ReaderPool {
    pub fn new(
        gateway: Arc<dyn Multiplexer>,
        settings: ReaderSettings,
        activity_tx: UnboundedSender<PaneActivity>,
    ) -> Self {
        Self {
            gateway,
            settings,
            activity_tx,
            readers: HashMap::new(),
        }
    }

    pub fn is_running(&self, pane_id: &PaneId) -> bool {
        self.readers.contains_key(pane_id)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Start watching a pane; a second call for the same pane is a no-op
    pub fn spawn(&mut self, pane_id: PaneId) -> std::io::Result<()> {
        if self.readers.contains_key(&pane_id) {
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let gateway = Arc::clone(&self.gateway);
        let activity_tx = self.activity_tx.clone();
        let settings = self.settings;
        let id = pane_id.clone();

        let thread = thread::Builder::new()
            .name(format!("gwt-reader-{}", pane_id.as_str().trim_start_matches('%')))
            .spawn(move || {
                let _done = done_tx;
                read_loop(&id, gateway.as_ref(), &settings, &activity_tx, &stop_rx);
            })?;

        debug!("started reader for pane {}", pane_id);
        self.readers.insert(
            pane_id,
            ReaderHandle {
                stop_tx,
                done_rx,
                thread,
            },
        );
        Ok(())
    }

    /// Stop a pane's reader, waiting at most the join timeout
    ///
    /// Returns false when the thread had to be detached.
    pub fn stop(&mut self, pane_id: &PaneId) -> bool {
        let Some(handle) = self.readers.remove(pane_id) else {
            return true;
        };
        let _ = handle.stop_tx.send(());

        match handle.done_rx.recv_timeout(self.settings.join_timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if handle.thread.join().is_err() {
                    warn!("reader for pane {} panicked", pane_id);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "reader for pane {} did not stop within {:?}; detaching",
                    pane_id, self.settings.join_timeout
                );
                false
            }
        }
    }

    pub fn stop_all(&mut self) {
        let ids: Vec<PaneId> = self.readers.keys().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
    }
}

impl Drop for ReaderPool {
    fn drop(&mut self) {
        for handle in self.readers.values() {
            let _ = handle.stop_tx.send(());
        }
    }
}

fn read_loop(
    pane_id: &PaneId,
    gateway: &dyn Multiplexer,
    settings: &ReaderSettings,
    activity_tx: &UnboundedSender<PaneActivity>,
    stop_rx: &mpsc::Receiver<()>,
) {
    let mut last_digest = None;

    loop {
        match gateway.capture_tail(pane_id, settings.tail_lines) {
            Ok(tail) => {
                let current = digest(&tail);
                if last_digest != Some(current) {
                    last_digest = Some(current);
                    let activity = PaneActivity {
                        pane_id: pane_id.clone(),
                        observed_at: Instant::now(),
                        tail,
                    };
                    if activity_tx.send(activity).is_err() {
                        debug!("activity receiver closed; reader for {} exiting", pane_id);
                        return;
                    }
                }
            }
            Err(e) if e.is_not_found() => {
                debug!("pane {} is gone; reader exiting", pane_id);
                return;
            }
            Err(e) => debug!("capture of pane {} failed: {}", pane_id, e),
        }

        match stop_rx.recv_timeout(settings.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
