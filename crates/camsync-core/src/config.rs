// ── Runtime session configuration ──
//
// Describes how to reach one control service. Carries the optional
// service token and tuning knobs, but never touches disk: the CLI builds
// a `SessionConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use camsync_api::transport::{TlsMode, TransportConfig};
use camsync_api::websocket::ReconnectConfig;

use crate::command::{DEFAULT_EXPECTED_STOP_TTL, DiscoveryPolicy};
use crate::model::DeviceKey;

/// Path of the live channel below the service root.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab setups).
    DangerAcceptInvalid,
}

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Service root, e.g. `http://10.0.0.5:8000`.
    pub url: Url,
    /// Live channel path below `url`.
    pub ws_path: String,
    /// Device key for single-device snapshots that do not name one.
    pub implicit_device: Option<DeviceKey>,
    /// Bearer token for privileged endpoints.
    pub service_token: Option<SecretString>,
    pub tls: TlsVerification,
    /// HTTP timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    pub discovery: DiscoveryPolicy,
    pub expected_stop_ttl: Duration,
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            ws_path: DEFAULT_WS_PATH.into(),
            implicit_device: None,
            service_token: None,
            tls: TlsVerification::default(),
            timeout: None,
            discovery: DiscoveryPolicy::default(),
            expected_stop_ttl: DEFAULT_EXPECTED_STOP_TTL,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
