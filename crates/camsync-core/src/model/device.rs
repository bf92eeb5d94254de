// ── Device identity and descriptors ──

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── DeviceKey ───────────────────────────────────────────────────────

/// Opaque, stable identifier the service assigns to a device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for DeviceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── DeviceKind ──────────────────────────────────────────────────────

/// Device family. Industrial cameras expose exposure/gain controls;
/// webcams normally do not.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeviceKind {
    #[strum(to_string = "industrial", serialize = "machine", serialize = "basler")]
    Industrial,
    #[strum(to_string = "webcam", serialize = "usb", serialize = "uvc")]
    Webcam,
}

impl DeviceKind {
    /// Capabilities a device of this kind has unless the service says otherwise.
    pub fn default_capabilities(self) -> Capabilities {
        Capabilities {
            parameters: matches!(self, Self::Industrial),
        }
    }
}

// ── Capabilities ────────────────────────────────────────────────────

/// What control surface a device exposes beyond start/stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Exposure and gain can be read and set.
    pub parameters: bool,
}

// ── DeviceDescriptor ────────────────────────────────────────────────

/// A discovered device. Immutable; the whole set is replaced on re-fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub key: DeviceKey,
    pub kind: DeviceKind,
    pub index: u32,
    pub display_name: String,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub label: Option<String>,
    pub capabilities: Capabilities,
}
