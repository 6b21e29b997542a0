// ABOUTME: Status inference engine: folds hook events and heuristic signals into pane status
//
// Hook events are authoritative and permanently switch a pane to hook-driven.
// Heuristic inference (liveness, idleness, prompt markers) only ever runs for
// panes that have never produced a hook event.

use crate::config::PanesConfig;
use crate::notifier::event::StatusEvent;
use crate::panes::model::{PaneId, PaneMarker, PaneStatus, StatusSource};
use crate::panes::registry::{PaneRegistry, StatusChange};
use crate::tmux::gateway::{GatewayError, GatewayResult, RawPaneRecord};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How many trailing non-empty lines are searched for prompt markers
const PROMPT_SCAN_LINES: usize = 8;

/// Map a hook event to the status it implies
///
/// Event names are matched case-insensitively. Unknown events still prove the
/// agent is alive, so they count as `Running`.
pub fn status_for_hook_event(event_name: &str, notification_type: Option<&str>) -> PaneStatus {
    match event_name.to_ascii_lowercase().as_str() {
        "userpromptsubmit" | "pretooluse" | "posttooluse" | "sessionstart" => PaneStatus::Running,
        "stop" | "subagentstop" | "sessionend" => PaneStatus::Stopped,
        "notification" => match notification_type {
            Some(kind) if kind.eq_ignore_ascii_case("permission_prompt") => {
                PaneStatus::WaitingInput
            }
            _ => PaneStatus::Running,
        },
        _ => PaneStatus::Running,
    }
}

/// True while a process with this pid exists
pub fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists but owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Outcome of one poll tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub changes: Vec<StatusChange>,
    /// Panes dropped because the multiplexer stopped listing them
    pub removed: Vec<PaneId>,
}

pub struct StatusEngine {
    idle_threshold: Duration,
    prompt_markers: Vec<String>,
    liveness: fn(u32) -> bool,
}

impl StatusEngine {
    pub fn new(idle_threshold: Duration, prompt_markers: Vec<String>) -> Self {
        Self {
            idle_threshold,
            prompt_markers: prompt_markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            liveness: process_alive,
        }
    }

    pub fn from_config(config: &PanesConfig) -> Self {
        Self::new(config.idle_threshold(), config.prompt_markers.clone())
    }

    /// Replace the pid liveness probe
    #[must_use]
    pub fn with_liveness(mut self, liveness: fn(u32) -> bool) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// Fold one hook event into the pane it is addressed to
    ///
    /// Events for markers the registry does not know are ignored.
    pub fn apply_hook_event(
        &self,
        registry: &PaneRegistry,
        event: &StatusEvent,
        now: Instant,
    ) -> Option<StatusChange> {
        let Some(marker) = PaneMarker::parse(&event.session_marker) else {
            warn!("ignoring hook event with unusable marker {:?}", event.session_marker);
            return None;
        };
        let Some(pane_id) = registry.find_by_marker(&marker) else {
            debug!("no pane for hook marker {}", marker);
            return None;
        };

        let status = status_for_hook_event(&event.event_name, event.notification_type.as_deref());
        debug!("hook {} for pane {} -> {}", event.event_name, pane_id, status);
        registry.update_status(&pane_id, status, StatusSource::Hook, now)
    }

    /// Apply a batch of events in the order given
    pub fn apply_hook_events(
        &self,
        registry: &PaneRegistry,
        events: &[StatusEvent],
        now: Instant,
    ) -> Vec<StatusChange> {
        events
            .iter()
            .filter_map(|event| self.apply_hook_event(registry, event, now))
            .collect()
    }

    /// Output was observed in a pane; refresh its activity time and tail
    pub fn record_activity(
        &self,
        registry: &PaneRegistry,
        pane_id: &PaneId,
        observed_at: Instant,
        tail: String,
    ) -> bool {
        registry.record_output(pane_id, observed_at, tail)
    }

    /// Reconcile the registry against a pane listing and run the heuristics
    ///
    /// A `Transient` or `Unsupported` listing changes nothing. A pane absent
    /// from the listing (or from a session reported `NotFound`) is marked
    /// `Stopped` on the first tick and removed on the next.
    pub fn tick(
        &self,
        registry: &PaneRegistry,
        listing: GatewayResult<Vec<RawPaneRecord>>,
        now: Instant,
    ) -> TickReport {
        let listed: HashMap<PaneId, RawPaneRecord> = match listing {
            Ok(records) => records.into_iter().map(|r| (r.pane_id.clone(), r)).collect(),
            Err(GatewayError::NotFound { target }) => {
                debug!("session {} is gone; every pane counts as missing", target);
                HashMap::new()
            }
            Err(e) => {
                warn!("skipping status tick: {}", e);
                return TickReport::default();
            }
        };

        let mut report = TickReport::default();
        for pane in registry.snapshot() {
            let id = &pane.pane_id;

            let Some(record) = listed.get(id) else {
                if registry.mark_missing(id) >= 2 {
                    if registry.discard(id).is_some() {
                        report.removed.push(id.clone());
                    }
                } else if !pane.is_hook_driven() {
                    report.changes.extend(registry.update_status(
                        id,
                        PaneStatus::Stopped,
                        StatusSource::Heuristic,
                        now,
                    ));
                }
                continue;
            };

            registry.clear_missing(id);
            if let Some(pid) = record.pid {
                registry.fill_pid(id, pid);
            }
            if pane.is_hook_driven() {
                continue;
            }

            let alive = !record.dead && record.pid.or(pane.pid).map_or(true, self.liveness);
            let tail = registry.tail(id).unwrap_or_default();
            let status = self.heuristic_status(alive, pane.idle_for(now), &tail);
            report
                .changes
                .extend(registry.update_status(id, status, StatusSource::Heuristic, now));
        }

        report
    }

    /// Heuristic decision for a pane with no hook history
    pub fn heuristic_status(&self, alive: bool, idle_for: Duration, tail: &str) -> PaneStatus {
        if !alive || idle_for > self.idle_threshold {
            PaneStatus::Stopped
        } else if self.matches_prompt(tail) {
            PaneStatus::WaitingInput
        } else {
            PaneStatus::Running
        }
    }

    /// Does the end of `tail` look like an interactive prompt?
    pub fn matches_prompt(&self, tail: &str) -> bool {
        tail.lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(PROMPT_SCAN_LINES)
            .any(|line| {
                let line = line.to_lowercase();
                self.prompt_markers.iter().any(|m| line.contains(m.as_str()))
            })
    }
}
