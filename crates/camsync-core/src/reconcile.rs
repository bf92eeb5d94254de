// ── Status reconciliation ──
//
// Pure merge functions over `DeviceStateMap`. These are the only code
// paths that produce a new map: live snapshots (`reconcile`), channel loss
// (`downgrade`), and optimistic local echoes after a successful command
// (`echo`). None of them perform I/O, so replaying the same inputs always
// yields the same state and events.

use std::collections::HashSet;

use tracing::warn;

use crate::model::{
    DeviceKey, DeviceParameters, DeviceStateMap, DeviceStatus, RunState, StreamEvent, parent_path,
};

/// Reason recorded when the service does not say why capture stopped.
pub const UNKNOWN_STOP_REASON: &str = "unknown";

/// A validated status snapshot, already normalized from either wire shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Statuses by key, at most one per key.
    pub devices: Vec<(DeviceKey, DeviceStatus)>,
    pub stop_reason: Option<String>,
    pub new_artifact: Option<String>,
}

/// Result of one merge.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub state: DeviceStateMap,
    pub events: Vec<StreamEvent>,
    /// Expected-stop markers confirmed by a stopped preview, to be
    /// discarded.
    pub consumed_markers: Vec<DeviceKey>,
}

impl Reconciliation {
    fn unchanged(previous: &DeviceStateMap) -> Self {
        Self {
            state: previous.clone(),
            events: Vec::new(),
            consumed_markers: Vec::new(),
        }
    }
}

// ── reconcile ────────────────────────────────────────────────────────

/// Merge a snapshot into the previous state.
///
/// `expected_stops` holds keys with a live local stop marker: a
/// Running→Stopped preview transition for those keys is expected and does
/// not raise [`StreamEvent::UnexpectedStop`]. Any stopped preview for a
/// marked key lists the marker in `consumed_markers`.
///
/// Events come out in this order: per-key `UnexpectedStop` /
/// `WarningCleared` (key order), then `ArtifactCreated`, then
/// `SnapshotApplied` (always).
pub fn reconcile(
    previous: &DeviceStateMap,
    snapshot: Snapshot,
    expected_stops: &HashSet<DeviceKey>,
) -> Reconciliation {
    let mut state = previous.clone();
    let mut events = Vec::new();
    let mut consumed_markers = Vec::new();
    let mut changed_keys = Vec::with_capacity(snapshot.devices.len());
    let reason = snapshot
        .stop_reason
        .as_deref()
        .unwrap_or(UNKNOWN_STOP_REASON);

    for (key, incoming) in snapshot.devices {
        let before = previous.devices.get(&key);

        let reports_stopped = incoming.preview == RunState::Stopped;
        let preview_stopped = reports_stopped && before.is_some_and(|b| b.preview.is_running());
        let storage_started = before.is_none_or(|b| !b.storage.is_running())
            && incoming.storage.is_running();

        // A marker is spent by the first snapshot that reports the preview
        // stopped, even when a local echo already flipped it.
        let expected = reports_stopped && expected_stops.contains(&key);
        if expected {
            consumed_markers.push(key.clone());
        }
        let unexpected = preview_stopped && !expected;

        if unexpected {
            if storage_started {
                warn!(
                    key = %key,
                    reason,
                    "snapshot reports both an unexpected stop and a storage start; keeping the warning"
                );
            }
            state.warnings.insert(key.clone(), reason.to_owned());
            events.push(StreamEvent::UnexpectedStop {
                device_key: key.clone(),
                reason: reason.to_owned(),
            });
        } else if storage_started && state.warnings.remove(&key).is_some() {
            events.push(StreamEvent::WarningCleared {
                device_key: key.clone(),
            });
        }

        state.devices.insert(key.clone(), incoming);
        if !changed_keys.contains(&key) {
            changed_keys.push(key);
        }
    }

    if let Some(path) = snapshot.new_artifact {
        let folder = parent_path(&path).to_owned();
        events.push(StreamEvent::ArtifactCreated { path, folder });
    }

    events.push(StreamEvent::SnapshotApplied { changed_keys });

    Reconciliation {
        state,
        events,
        consumed_markers,
    }
}

// ── downgrade ────────────────────────────────────────────────────────

/// Force every known device to stopped after the channel closes.
///
/// This is a local override: the next real snapshot decides again.
/// Warnings are kept.
pub fn downgrade(previous: &DeviceStateMap) -> Reconciliation {
    let mut state = previous.clone();
    for status in state.devices.values_mut() {
        status.preview = RunState::Stopped;
        status.storage = RunState::Stopped;
    }
    let changed_keys = state.devices.keys().cloned().collect();

    Reconciliation {
        state,
        events: vec![StreamEvent::SnapshotApplied { changed_keys }],
        consumed_markers: Vec::new(),
    }
}

// ── echo ─────────────────────────────────────────────────────────────

/// What a successful command changed, applied locally before the service
/// confirms it.
#[derive(Debug, Clone, PartialEq)]
pub enum Echo {
    PreviewStarted,
    PreviewStopped,
    StorageStarted,
    StorageStopped,
    IntervalSet(f64),
    ParametersSet(DeviceParameters),
}

/// Apply an optimistic echo to one device. Unknown keys are left alone:
/// statuses are only created by real snapshots.
pub fn echo(previous: &DeviceStateMap, key: &DeviceKey, change: Echo) -> Reconciliation {
    let Some(current) = previous.devices.get(key) else {
        return Reconciliation::unchanged(previous);
    };

    let mut next = current.clone();
    match change {
        Echo::PreviewStarted => next.preview = RunState::Running,
        Echo::PreviewStopped => next.preview = RunState::Stopped,
        Echo::StorageStarted => next.storage = RunState::Running,
        Echo::StorageStopped => next.storage = RunState::Stopped,
        Echo::IntervalSet(secs) if secs.is_finite() && secs > 0.0 => {
            next.save_interval_secs = secs;
        }
        Echo::IntervalSet(_) => return Reconciliation::unchanged(previous),
        Echo::ParametersSet(params) => next.parameters = Some(params),
    }

    let mut state = previous.clone();
    let mut events = Vec::new();
    if !current.storage.is_running()
        && next.storage.is_running()
        && state.warnings.remove(key).is_some()
    {
        events.push(StreamEvent::WarningCleared {
            device_key: key.clone(),
        });
    }
    state.devices.insert(key.clone(), next);
    events.push(StreamEvent::SnapshotApplied {
        changed_keys: vec![key.clone()],
    });

    Reconciliation {
        state,
        events,
        consumed_markers: Vec::new(),
    }
}
