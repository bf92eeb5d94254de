// ── Core error types ──
//
// User-facing errors from camsync-core. Consumers never see raw HTTP or
// JSON failures for commands: the `From<camsync_api::Error>` impl and
// `CoreError::rejected` translate transport-layer errors into domain
// variants. Parse and decode failures on the live channel are logged in
// the dispatch task and never returned.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Channel data ─────────────────────────────────────────────────
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Unparseable status snapshot: {reason}")]
    SnapshotParse { reason: String },

    // ── Commands ─────────────────────────────────────────────────────
    /// The service answered a command with a non-success status.
    /// `detail` is the service's own message, verbatim.
    #[error("{operation} rejected: {detail}")]
    CommandRejected {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("Device discovery failed after {attempts} attempts: {last_error}")]
    DiscoveryExhausted { attempts: u32, last_error: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Device not found: {key}")]
    DeviceNotFound { key: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Live channel is not connected")]
    ChannelDisconnected,

    #[error("Cannot reach control service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a mapper that tags service rejections with the operation name.
    ///
    /// Non-success responses become [`CoreError::CommandRejected`]; anything
    /// else (connection refused, bad JSON) goes through the `From` impl.
    pub(crate) fn rejected(operation: &'static str) -> impl FnOnce(camsync_api::Error) -> Self {
        move |err| match err {
            camsync_api::Error::Api { status, detail } => Self::CommandRejected {
                operation,
                status: Some(status),
                detail,
            },
            camsync_api::Error::Unauthorized { detail } => Self::CommandRejected {
                operation,
                status: Some(401),
                detail,
            },
            other => Self::from(other),
        }
    }

    /// `true` when the service reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::CommandRejected {
                    status: Some(404),
                    ..
                }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<camsync_api::Error> for CoreError {
    fn from(err: camsync_api::Error) -> Self {
        match err {
            camsync_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::CommandRejected {
                        operation: "request",
                        status: e.status().map(|s| s.as_u16()),
                        detail: e.to_string(),
                    }
                }
            }
            camsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            camsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            camsync_api::Error::Api { status, detail } => CoreError::CommandRejected {
                operation: "request",
                status: Some(status),
                detail,
            },
            camsync_api::Error::Unauthorized { detail } => CoreError::CommandRejected {
                operation: "request",
                status: Some(401),
                detail,
            },
            camsync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            camsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            camsync_api::Error::Frame(e) => CoreError::MalformedFrame {
                reason: e.to_string(),
            },
        }
    }
}
