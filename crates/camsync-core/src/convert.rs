// ── Wire-to-domain conversions ──
//
// Bridges loose `camsync_api` payloads into the strict `crate::model`
// shapes. Status payloads are dynamic: field names vary between snake_case
// and camelCase, run states arrive as strings, booleans, or 0/1. Anything
// that cannot be coerced is dropped here with a warning and never reaches
// the reconciler.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use camsync_api::models::{ControlRangeDto, DeviceDto, FileEntryDto, ParametersDto, RawSnapshot};

use crate::error::CoreError;
use crate::model::{
    ControlRange, DEFAULT_SAVE_INTERVAL_SECS, DeviceDescriptor, DeviceKey, DeviceKind,
    DeviceParameters, DeviceStatus, DirectoryEntry, EntryKind, RunState, join_path,
};
use crate::reconcile::Snapshot;

// ── Field name tables ──────────────────────────────────────────────

const PREVIEW_FIELDS: &[&str] = &[
    "preview",
    "preview_state",
    "previewState",
    "preview_running",
    "previewRunning",
    "streaming",
    "is_streaming",
    "isStreaming",
];

const STORAGE_FIELDS: &[&str] = &[
    "storage",
    "storage_state",
    "storageState",
    "storage_running",
    "storageRunning",
    "saving",
    "is_saving",
    "isSaving",
    "recording",
];

const INTERVAL_FIELDS: &[&str] = &[
    "save_interval",
    "saveInterval",
    "save_interval_secs",
    "saveIntervalSeconds",
    "interval",
];

const FOLDER_FIELDS: &[&str] = &["current_folder", "currentFolder", "folder", "save_folder"];

const KIND_FIELDS: &[&str] = &["type", "kind", "device_type", "deviceType"];

const KEY_FIELDS: &[&str] = &["key", "device_key", "deviceKey"];

// ── Helpers ────────────────────────────────────────────────────────

/// First present, non-null field among `names`.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name).filter(|v| !v.is_null()))
}

/// Coerce a loosely-typed run state. `None` means "not a run state".
fn coerce_run_state(value: &Value) -> Option<RunState> {
    match value {
        Value::Bool(true) => Some(RunState::Running),
        Value::Bool(false) => Some(RunState::Stopped),
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(RunState::Running),
            Some(0) => Some(RunState::Stopped),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "running" | "started" | "start" | "on" | "true" | "active" | "1" => {
                Some(RunState::Running)
            }
            "stopped" | "stop" | "idle" | "off" | "false" | "inactive" | "0" => {
                Some(RunState::Stopped)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Positive finite number, from a JSON number or numeric string.
fn coerce_positive(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (v.is_finite() && v > 0.0).then_some(v)
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_index(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stop reasons arrive as strings, or occasionally as structured values.
fn coerce_reason(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_kind(raw: Option<&str>) -> Option<DeviceKind> {
    raw.and_then(|s| s.trim().parse().ok())
}

// ── Devices ────────────────────────────────────────────────────────

/// Convert one discovery entry. `position` is the entry's place in the
/// response, used when the service omits `index`.
pub fn descriptor_from_dto(dto: DeviceDto, position: usize) -> DeviceDescriptor {
    let kind = parse_kind(dto.kind.as_deref()).unwrap_or_else(|| {
        if dto.kind.is_some() {
            warn!(key = %dto.key, kind = ?dto.kind, "unknown device kind, treating as webcam");
        }
        DeviceKind::Webcam
    });

    let mut capabilities = kind.default_capabilities();
    if let Some(controls) = dto.controls {
        capabilities.parameters = controls;
    }

    let display_name = [&dto.display_name, &dto.name, &dto.label]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| dto.key.clone());

    DeviceDescriptor {
        index: dto
            .index
            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX)),
        key: DeviceKey::from(dto.key),
        kind,
        display_name,
        model: dto.model,
        serial: dto.serial,
        label: dto.label,
        capabilities,
    }
}

/// Convert a discovery response, dropping duplicate keys (first wins) and
/// entries without a key.
pub fn descriptors_from_dtos(dtos: Vec<DeviceDto>) -> Vec<DeviceDescriptor> {
    let mut seen = std::collections::HashSet::new();
    dtos.into_iter()
        .enumerate()
        .filter(|(_, dto)| !dto.key.trim().is_empty())
        .filter(|(_, dto)| seen.insert(dto.key.clone()))
        .map(|(i, dto)| descriptor_from_dto(dto, i))
        .collect()
}

// ── Parameters ─────────────────────────────────────────────────────

impl From<ControlRangeDto> for ControlRange {
    fn from(dto: ControlRangeDto) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            auto: dto.auto,
            min: finite(dto.min),
            max: finite(dto.max),
            increment: finite(dto.increment).filter(|x| *x > 0.0),
            current: finite(dto.current),
        }
    }
}

impl From<ParametersDto> for DeviceParameters {
    fn from(dto: ParametersDto) -> Self {
        Self {
            exposure: dto.exposure.into(),
            gain: dto.gain.into(),
        }
    }
}

fn parameters_from_status(obj: &Map<String, Value>) -> Option<DeviceParameters> {
    let nested = obj
        .get("parameters")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<ParametersDto>(v.clone()).ok());
    if nested.is_some() {
        return nested.map(Into::into);
    }

    // Some services put the two controls at the status top level.
    if obj.contains_key("exposure") || obj.contains_key("gain") {
        let range = |name: &str| {
            obj.get(name)
                .and_then(|v| serde_json::from_value::<ControlRangeDto>(v.clone()).ok())
                .unwrap_or_default()
        };
        return Some(
            ParametersDto {
                exposure: range("exposure"),
                gain: range("gain"),
            }
            .into(),
        );
    }
    None
}

// ── Status snapshots ───────────────────────────────────────────────

/// Coerce one device status object. `None` when preview or storage state
/// is missing or not a run state.
pub fn status_from_value(key: &str, value: &Value) -> Option<DeviceStatus> {
    let Some(obj) = value.as_object() else {
        warn!(key, "device status is not an object, dropping");
        return None;
    };

    let preview = field(obj, PREVIEW_FIELDS).and_then(coerce_run_state);
    let storage = field(obj, STORAGE_FIELDS).and_then(coerce_run_state);
    let (Some(preview), Some(storage)) = (preview, storage) else {
        warn!(
            key,
            preview = ?field(obj, PREVIEW_FIELDS),
            storage = ?field(obj, STORAGE_FIELDS),
            "device status has no usable run state, dropping"
        );
        return None;
    };

    Some(DeviceStatus {
        preview,
        storage,
        save_interval_secs: field(obj, INTERVAL_FIELDS)
            .and_then(coerce_positive)
            .unwrap_or(DEFAULT_SAVE_INTERVAL_SECS),
        current_folder: field(obj, FOLDER_FIELDS).and_then(coerce_string),
        kind: parse_kind(field(obj, KIND_FIELDS).and_then(Value::as_str)),
        index: field(obj, &["index"]).and_then(coerce_index),
        parameters: parameters_from_status(obj),
    })
}

/// Normalize either snapshot shape into one [`Snapshot`].
///
/// The keyed shape carries `devices: {key: status}`. The flat shape has
/// one device's status fields at the top level; its key comes from a
/// `key`/`device_key` field or, failing that, `implicit_key`.
pub fn snapshot_from_raw(raw: RawSnapshot, implicit_key: Option<&DeviceKey>) -> Snapshot {
    let mut devices = BTreeMap::new();

    if let Some(keyed) = raw.devices {
        for (key, value) in keyed {
            if let Some(status) = status_from_value(&key, &value) {
                devices.insert(DeviceKey::from(key), status);
            }
        }
    } else if is_flat_status(&raw.fields) {
        let key = field(&raw.fields, KEY_FIELDS)
            .and_then(coerce_string)
            .map(DeviceKey::from)
            .or_else(|| implicit_key.cloned());
        match key {
            Some(key) => {
                if let Some(status) = status_from_value(key.as_str(), &Value::Object(raw.fields)) {
                    devices.insert(key, status);
                }
            }
            None => warn!("single-device snapshot without a device key, dropping status"),
        }
    }

    Snapshot {
        devices: devices.into_iter().collect(),
        stop_reason: raw.stop_reason.as_ref().and_then(coerce_reason),
        new_artifact: raw
            .new_artifact
            .map(|p| p.trim().trim_start_matches('/').to_owned())
            .filter(|p| !p.is_empty()),
    }
}

/// Parse a text channel message into a [`Snapshot`].
pub fn parse_snapshot(text: &str, implicit_key: Option<&DeviceKey>) -> Result<Snapshot, CoreError> {
    let raw = RawSnapshot::parse(text).map_err(|e| CoreError::SnapshotParse {
        reason: e.to_string(),
    })?;
    Ok(snapshot_from_raw(raw, implicit_key))
}

/// A flat snapshot counts as carrying a device only if some status field
/// is present; artifact-only notifications have none.
fn is_flat_status(fields: &Map<String, Value>) -> bool {
    PREVIEW_FIELDS
        .iter()
        .chain(STORAGE_FIELDS)
        .any(|name| fields.contains_key(*name))
}

// ── Directory entries ──────────────────────────────────────────────

/// Convert a listing entry, filling `path` from the listed folder when
/// the service omits it.
pub fn entry_from_dto(dto: FileEntryDto, folder: &str) -> DirectoryEntry {
    let is_folder = dto.is_dir.unwrap_or_else(|| {
        matches!(
            dto.kind.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("folder" | "dir" | "directory")
        )
    });
    let path = dto
        .path
        .map(|p| p.trim_matches('/').to_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| join_path(folder, &dto.name));

    DirectoryEntry {
        name: dto.name,
        path,
        kind: if is_folder {
            EntryKind::Folder
        } else {
            EntryKind::File
        },
    }
}
