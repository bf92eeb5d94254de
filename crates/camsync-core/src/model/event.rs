// ── Derived stream events ──
//
// Produced by the dispatch task and the reconciler, never sent by the
// service directly. Subscribers see them in arrival order.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::Serialize;

use super::device::DeviceKey;

// ── Frame ───────────────────────────────────────────────────────────

/// One preview image. The payload is shared with the channel message it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Image MIME type sniffed from magic bytes.
    pub fn mime_type(&self) -> &'static str {
        sniff_mime(&self.payload)
    }

    /// Render as a `data:` URI suitable for direct display.
    pub fn data_uri(&self) -> String {
        let mime = self.mime_type();
        let mut out = String::with_capacity(self.payload.len().div_ceil(3) * 4 + mime.len() + 13);
        out.push_str("data:");
        out.push_str(mime);
        out.push_str(";base64,");
        STANDARD.encode_string(&self.payload, &mut out);
        out
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.starts_with(b"BM") {
        "image/bmp"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

// ── StreamEvent ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A preview frame arrived for a device.
    FrameReceived { device_key: DeviceKey, frame: Frame },

    /// A snapshot (or local downgrade/echo) replaced these keys.
    SnapshotApplied { changed_keys: Vec<DeviceKey> },

    /// Preview went from running to stopped without a local stop command.
    UnexpectedStop { device_key: DeviceKey, reason: String },

    /// The service wrote a new file. `folder` is its parent, `""` for root.
    ArtifactCreated { path: String, folder: String },

    /// Storage restarted, so the outstanding warning no longer applies.
    WarningCleared { device_key: DeviceKey },
}

impl StreamEvent {
    /// Short machine-readable name, for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FrameReceived { .. } => "frame",
            Self::SnapshotApplied { .. } => "snapshot",
            Self::UnexpectedStop { .. } => "unexpected_stop",
            Self::ArtifactCreated { .. } => "artifact",
            Self::WarningCleared { .. } => "warning_cleared",
        }
    }
}

/// Serializable view of an event with the frame payload reduced to its
/// size. Used by the CLI's JSON output.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventSummary<'a> {
    Frame { device_key: &'a DeviceKey, bytes: usize, mime: &'static str },
    Snapshot { changed_keys: &'a [DeviceKey] },
    UnexpectedStop { device_key: &'a DeviceKey, reason: &'a str },
    Artifact { path: &'a str, folder: &'a str },
    WarningCleared { device_key: &'a DeviceKey },
}

impl<'a> From<&'a StreamEvent> for EventSummary<'a> {
    fn from(event: &'a StreamEvent) -> Self {
        match event {
            StreamEvent::FrameReceived { device_key, frame } => Self::Frame {
                device_key,
                bytes: frame.len(),
                mime: frame.mime_type(),
            },
            StreamEvent::SnapshotApplied { changed_keys } => Self::Snapshot { changed_keys },
            StreamEvent::UnexpectedStop { device_key, reason } => {
                Self::UnexpectedStop { device_key, reason }
            }
            StreamEvent::ArtifactCreated { path, folder } => Self::Artifact { path, folder },
            StreamEvent::WarningCleared { device_key } => Self::WarningCleared { device_key },
        }
    }
}
