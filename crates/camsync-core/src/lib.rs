// camsync-core: Device-state synchronization between camsync-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod explorer;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{
    CommandClient, ControlChange, DiscoveryPolicy, ExpectedStops, SelectOutcome, Selection,
    SettingsUpdate,
};
pub use config::{SessionConfig, TlsVerification};
pub use error::CoreError;
pub use explorer::{Confirm, DeleteOutcome, DirectoryExplorer};
pub use reconcile::{Echo, Reconciliation, Snapshot};
pub use session::Session;
pub use stream::StateStream;

pub use camsync_api::websocket::{ChannelState, ReconnectConfig};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Capabilities, ControlRange, DeviceDescriptor, DeviceKey, DeviceKind, DeviceParameters,
    DeviceStateMap, DeviceStatus, DirectoryEntry, EntryKind, EventSummary, Frame, RunState,
    StreamEvent,
};
