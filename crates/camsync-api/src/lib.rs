// camsync-api: Async Rust client for camera control services (HTTP + live channel)

pub mod client;
pub mod error;
pub mod frame;
pub mod models;
pub mod transport;
pub mod websocket;

mod devices;
mod files;

pub use client::ControlClient;
pub use error::Error;
pub use frame::{DecodedFrame, FrameError, decode_frame};
pub use transport::{TlsMode, TransportConfig};
