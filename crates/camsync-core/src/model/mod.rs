// ── Domain model ──
//
// Strict shapes the rest of the crate works with. Wire payloads are
// coerced into these in `crate::convert` and nowhere else.

pub mod device;
pub mod directory;
pub mod event;
pub mod status;

pub use device::{Capabilities, DeviceDescriptor, DeviceKey, DeviceKind};
pub use directory::{DirectoryEntry, EntryKind, join_path, parent_path};
pub use event::{EventSummary, Frame, StreamEvent};
pub use status::{
    ControlRange, DEFAULT_SAVE_INTERVAL_SECS, DeviceParameters, DeviceStateMap, DeviceStatus,
    RunState,
};
