// ABOUTME: Durable file handoff between the hook helper and the running instance
//
// Layout: one `<marker>.json` file per pane marker holding the latest event.
// Writers stage into a hidden temp file and rename over the target, so a
// reader only ever sees complete events and a newer event for the same
// marker replaces the older one. The running instance claims a file by
// renaming it to a private hidden name; files nobody claims expire.

use crate::notifier::event::{IngestError, StatusEvent};
use crate::panes::model::PaneMarker;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const EVENT_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

#[derive(Debug, Clone)]
pub struct EventSpool {
    dir: PathBuf,
    expiry: Duration,
}

impl EventSpool {
    pub fn new(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            dir: dir.into(),
            expiry,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn event_path(&self, marker: &PaneMarker) -> PathBuf {
        self.dir.join(format!("{}.{EVENT_EXT}", marker.as_str()))
    }

    /// Publish `event`, replacing any unclaimed event for the same marker
    pub fn enqueue(&self, event: &StatusEvent) -> Result<PathBuf, IngestError> {
        let marker = PaneMarker::parse(&event.session_marker)
            .ok_or_else(|| IngestError::InvalidMarker(event.session_marker.clone()))?;
        fs::create_dir_all(&self.dir)?;

        let target = self.event_path(&marker);
        let staging = self
            .dir
            .join(format!(".{}.{}.{TMP_EXT}", marker.as_str(), Uuid::new_v4().simple()));

        let json = serde_json::to_vec(event)?;
        fs::write(&staging, json)?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        debug!("spooled {} for {}", event.event_name, marker);
        Ok(target)
    }

    /// Claim pending events for markers this instance owns
    ///
    /// Files for other markers are left for their owner unless expired.
    /// Malformed and expired files are deleted. The result is ordered by
    /// observation time.
    pub fn drain<F>(&self, now: DateTime<Utc>, owns: F) -> Vec<StatusEvent>
    where
        F: Fn(&PaneMarker) -> bool,
    {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("cannot read event spool {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.starts_with('.') {
                if name.ends_with(TMP_EXT) {
                    self.remove_if_stale(&path);
                }
                continue;
            }

            let Some(marker) = name
                .strip_suffix(&format!(".{EVENT_EXT}"))
                .and_then(PaneMarker::parse)
            else {
                continue;
            };

            if owns(&marker) {
                if let Some(event) = self.claim(&path, now) {
                    events.push(event);
                }
            } else {
                self.remove_if_stale(&path);
            }
        }

        events.sort_by_key(|event| event.observed_at);
        events
    }

    /// Move the event file to a private name, then read and delete it
    ///
    /// After the rename a newer event for the same marker lands on a fresh
    /// `<marker>.json` and is picked up by the next drain.
    fn claim(&self, path: &Path, now: DateTime<Utc>) -> Option<StatusEvent> {
        let claimed = self.claim_path(path);
        if let Err(e) = fs::rename(path, &claimed) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("cannot claim spooled event {}: {}", path.display(), e);
            }
            return None;
        }

        let content = fs::read_to_string(&claimed);
        if let Err(e) = fs::remove_file(&claimed) {
            warn!("cannot delete claimed event {}: {}", claimed.display(), e);
        }
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                warn!("cannot read spooled event {}: {}", path.display(), e);
                return None;
            }
        };

        let event: StatusEvent = match serde_json::from_str(&content) {
            Ok(event) => event,
            Err(e) => {
                warn!("discarding malformed spooled event {}: {}", path.display(), e);
                return None;
            }
        };

        if self.is_expired(event.observed_at, now) {
            debug!("discarding expired event {} for {}", event.event_name, event.session_marker);
            return None;
        }
        Some(event)
    }

    fn claim_path(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir
            .join(format!(".{stem}.claim-{}.{TMP_EXT}", Uuid::new_v4().simple()))
    }

    fn is_expired(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(observed_at);
        age.to_std().is_ok_and(|age| age > self.expiry)
    }

    fn remove_if_stale(&self, path: &Path) {
        let stale = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > self.expiry);
        if stale {
            debug!("removing stale spool file {}", path.display());
            let _ = fs::remove_file(path);
        }
    }
}
