// Wire types for the control service.
//
// These mirror what the service sends, loosely. Field names arrive in
// both snake_case and camelCase depending on the endpoint, so most fields
// carry aliases. Strict validation happens in `camsync-core::convert`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Devices ──────────────────────────────────────────────────────────

/// One entry from the device discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDto {
    #[serde(alias = "id", alias = "deviceKey", alias = "device_key")]
    pub key: String,

    /// Device family, e.g. `"industrial"` / `"webcam"`.
    #[serde(default, rename = "type", alias = "kind", alias = "deviceType")]
    pub kind: Option<String>,

    #[serde(default)]
    pub index: Option<u32>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default, alias = "serialNumber", alias = "serial_number")]
    pub serial: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    /// Whether exposure/gain controls are exposed, when the service says so.
    #[serde(default)]
    pub controls: Option<bool>,
}

/// Discovery responses come either as a bare array or wrapped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DeviceListResponse {
    List(Vec<DeviceDto>),
    Wrapped { devices: Vec<DeviceDto> },
}

impl From<DeviceListResponse> for Vec<DeviceDto> {
    fn from(resp: DeviceListResponse) -> Self {
        match resp {
            DeviceListResponse::List(v) | DeviceListResponse::Wrapped { devices: v } => v,
        }
    }
}

// ── Parameters ───────────────────────────────────────────────────────

/// Device-supplied bounds and current value for one control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRangeDto {
    #[serde(default, alias = "is_auto", alias = "isAuto")]
    pub auto: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default, alias = "inc", alias = "step")]
    pub increment: Option<f64>,
    #[serde(default, alias = "value")]
    pub current: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParametersDto {
    #[serde(default)]
    pub exposure: ControlRangeDto,
    #[serde(default)]
    pub gain: ControlRangeDto,
}

/// Requested change to one control. Omitted fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParametersUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<ControlUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain: Option<ControlUpdate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IntervalBody {
    pub seconds: f64,
}

// ── Status snapshots ─────────────────────────────────────────────────

/// A status snapshot as sent on the channel and by `GET /api/status`.
///
/// Two shapes are in the wild: a keyed map under `devices`, or one
/// device's fields flattened at the top level. Both deserialize into this
/// type; `fields` keeps everything that is not a known envelope key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub devices: Option<Map<String, Value>>,

    /// Why a capture stopped, when the service knows.
    #[serde(default, alias = "stopReason")]
    pub stop_reason: Option<Value>,

    /// Path of an artifact written since the previous snapshot.
    #[serde(
        default,
        alias = "newArtifact",
        alias = "newArtifactPath",
        alias = "new_artifact_path"
    )]
    pub new_artifact: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawSnapshot {
    /// Parse a text channel message. Anything other than a JSON object is
    /// rejected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Files ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntryDto {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    /// `"file"`, `"folder"`, `"dir"`, `"directory"`.
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default, alias = "isDir")]
    pub is_dir: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FileListResponse {
    List(Vec<FileEntryDto>),
    Entries { entries: Vec<FileEntryDto> },
    Items { items: Vec<FileEntryDto> },
}

impl From<FileListResponse> for Vec<FileEntryDto> {
    fn from(resp: FileListResponse) -> Self {
        match resp {
            FileListResponse::List(v)
            | FileListResponse::Entries { entries: v }
            | FileListResponse::Items { items: v } => v,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_snapshot_parses() {
        let text = json!({
            "devices": {
                "cam1": { "previewState": "running", "storageState": "stopped" }
            },
            "stopReason": "overheat",
            "newArtifact": "2024-05-01/img_0001.jpg"
        })
        .to_string();

        let snap = RawSnapshot::parse(&text).unwrap();
        assert_eq!(snap.devices.as_ref().unwrap().len(), 1);
        assert_eq!(snap.stop_reason, Some(json!("overheat")));
        assert_eq!(snap.new_artifact.as_deref(), Some("2024-05-01/img_0001.jpg"));
        assert!(snap.fields.is_empty());
    }

    #[test]
    fn flat_snapshot_keeps_fields() {
        let text = json!({
            "preview_running": true,
            "storage_running": false,
            "save_interval": 2.5
        })
        .to_string();

        let snap = RawSnapshot::parse(&text).unwrap();
        assert!(snap.devices.is_none());
        assert_eq!(snap.fields["save_interval"], json!(2.5));
    }

    #[test]
    fn non_object_snapshot_is_rejected() {
        assert!(RawSnapshot::parse("[1,2,3]").is_err());
        assert!(RawSnapshot::parse("not json").is_err());
    }

    #[test]
    fn device_list_accepts_both_shapes() {
        let bare: DeviceListResponse =
            serde_json::from_value(json!([{ "key": "a" }, { "id": "b", "type": "webcam" }]))
                .unwrap();
        let wrapped: DeviceListResponse =
            serde_json::from_value(json!({ "devices": [{ "deviceKey": "c" }] })).unwrap();

        let bare: Vec<DeviceDto> = bare.into();
        let wrapped: Vec<DeviceDto> = wrapped.into();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[1].kind.as_deref(), Some("webcam"));
        assert_eq!(wrapped[0].key, "c");
    }

    #[test]
    fn parameters_update_omits_unset_fields() {
        let update = ParametersUpdate {
            exposure: Some(ControlUpdate {
                auto: None,
                value: Some(1200.0),
            }),
            gain: None,
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "exposure": { "value": 1200.0 } })
        );
    }
}
