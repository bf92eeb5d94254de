use thiserror::Error;

use crate::frame::FrameError;

/// Top-level error type for the `camsync-api` crate.
///
/// Covers every failure mode across the wire surfaces: HTTP transport,
/// control-service rejections, the live channel, and frame decoding.
/// `camsync-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Control service ─────────────────────────────────────────────
    /// The service answered with a non-success status. `detail` is the
    /// service-provided message, kept verbatim.
    #[error("Control service error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// Privileged endpoint rejected (or never received) the bearer token.
    #[error("Unauthorized: {detail}")]
    Unauthorized { detail: String },

    // ── Live channel ────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Binary channel message without a usable header block.
    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the service reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The service-provided detail string, if this is a rejection.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } | Self::Unauthorized { detail } => Some(detail),
            _ => None,
        }
    }
}
