// ── Typed request structs for commands ──

use serde::{Deserialize, Serialize};

use camsync_api::models::{ControlUpdate, ParametersUpdate};

use crate::error::CoreError;
use crate::model::{ControlRange, DeviceParameters};

/// Requested change to one control. Omitted fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl ControlChange {
    pub fn is_empty(&self) -> bool {
        self.auto.is_none() && self.value.is_none()
    }

    fn validate(&self, name: &str, range: &ControlRange) -> Result<(), CoreError> {
        let Some(value) = self.value else {
            return Ok(());
        };
        // A manual value is only accepted when the control is (or is being
        // switched to) manual mode.
        let auto_after = self.auto.unwrap_or(range.auto);
        if auto_after {
            return Err(CoreError::ValidationFailed {
                message: format!("{name} is in auto mode; disable auto to set a value"),
            });
        }
        if !range.contains(value) {
            let bound = |b: Option<f64>| b.map_or_else(|| "-".to_owned(), |v| v.to_string());
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "{name} {value} is outside the device range [{}, {}]",
                    bound(range.min),
                    bound(range.max)
                ),
            });
        }
        Ok(())
    }

    fn apply(&self, range: &mut ControlRange) {
        if let Some(auto) = self.auto {
            range.auto = auto;
        }
        if let Some(value) = self.value {
            range.current = Some(value);
        }
    }
}

/// Exposure/gain update for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<ControlChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<ControlChange>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.exposure.is_none_or(|c| c.is_empty()) && self.gain.is_none_or(|c| c.is_empty())
    }

    /// Check the update against device-supplied bounds.
    pub fn validate(&self, bounds: &DeviceParameters) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "nothing to update".into(),
            });
        }
        if let Some(change) = &self.exposure {
            change.validate("exposure", &bounds.exposure)?;
        }
        if let Some(change) = &self.gain {
            change.validate("gain", &bounds.gain)?;
        }
        Ok(())
    }

    /// The parameters as they will be once the service accepts the update.
    pub fn applied_to(&self, bounds: &DeviceParameters) -> DeviceParameters {
        let mut next = bounds.clone();
        if let Some(change) = &self.exposure {
            change.apply(&mut next.exposure);
        }
        if let Some(change) = &self.gain {
            change.apply(&mut next.gain);
        }
        next
    }
}

impl From<ControlChange> for ControlUpdate {
    fn from(c: ControlChange) -> Self {
        Self {
            auto: c.auto,
            value: c.value,
        }
    }
}

impl From<SettingsUpdate> for ParametersUpdate {
    fn from(u: SettingsUpdate) -> Self {
        Self {
            exposure: u.exposure.map(Into::into),
            gain: u.gain.map(Into::into),
        }
    }
}
