// ── Live device status ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::device::{DeviceKey, DeviceKind};

/// Save interval used when the service omits one or reports nonsense.
pub const DEFAULT_SAVE_INTERVAL_SECS: f64 = 1.0;

// ── RunState ────────────────────────────────────────────────────────

/// Whether a capture pipeline (preview or storage) is active.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunState {
    Running,
    #[default]
    Stopped,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

// ── Parameters ──────────────────────────────────────────────────────

/// Bounds and current value for one device control.
///
/// Bounds come from the device and are never filled in locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRange {
    pub auto: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub increment: Option<f64>,
    pub current: Option<f64>,
}

impl ControlRange {
    /// A control in auto mode cannot take a manual value.
    pub fn is_settable(&self) -> bool {
        !self.auto
    }

    /// `true` when `value` lies inside the device-supplied bounds. Missing
    /// bounds do not constrain.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite()
            && self.min.is_none_or(|min| value >= min)
            && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceParameters {
    pub exposure: ControlRange,
    pub gain: ControlRange,
}

// ── DeviceStatus ────────────────────────────────────────────────────

/// Last known status of one device, as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub preview: RunState,
    pub storage: RunState,
    /// Always positive.
    pub save_interval_secs: f64,
    pub current_folder: Option<String>,
    pub kind: Option<DeviceKind>,
    pub index: Option<u32>,
    /// Exposure/gain bounds when the status carried them. `None` means
    /// unknown, not unbounded: settings changes fetch the real bounds
    /// before validating.
    pub parameters: Option<DeviceParameters>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            preview: RunState::Stopped,
            storage: RunState::Stopped,
            save_interval_secs: DEFAULT_SAVE_INTERVAL_SECS,
            current_folder: None,
            kind: None,
            index: None,
            parameters: None,
        }
    }
}

// ── DeviceStateMap ──────────────────────────────────────────────────

/// Per-device status plus any outstanding unexpected-stop warnings.
///
/// Only the merge functions in [`crate::reconcile`] produce new maps.
/// Keys are never removed: a device the service stops reporting keeps its
/// last status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceStateMap {
    pub(crate) devices: BTreeMap<DeviceKey, DeviceStatus>,
    pub(crate) warnings: BTreeMap<DeviceKey, String>,
}

impl DeviceStateMap {
    pub fn get(&self, key: &str) -> Option<&DeviceStatus> {
        self.devices.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.devices.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceKey, &DeviceStatus)> {
        self.devices.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DeviceKey> {
        self.devices.keys()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The reason of the last unexpected stop, until storage restarts.
    pub fn warning(&self, key: &str) -> Option<&str> {
        self.warnings.get(key).map(String::as_str)
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&DeviceKey, &str)> {
        self.warnings.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn is_preview_running(&self, key: &str) -> bool {
        self.get(key).is_some_and(|s| s.preview.is_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_without_bounds_accepts_any_finite_value() {
        let range = ControlRange::default();
        assert!(range.contains(-5.0));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = ControlRange {
            min: Some(0.0),
            max: Some(24.0),
            ..ControlRange::default()
        };
        assert!(range.contains(0.0));
        assert!(range.contains(24.0));
        assert!(!range.contains(24.5));
    }

    #[test]
    fn auto_control_is_not_settable() {
        let range = ControlRange {
            auto: true,
            ..ControlRange::default()
        };
        assert!(!range.is_settable());
    }
}
