//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and a stable exit code per category.

use miette::Diagnostic;
use thiserror::Error;

use camsync_config::ConfigError;
use camsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const REJECTED: i32 = 9;
    pub const DISCOVERY: i32 = 10;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the control service at {url}")]
    #[diagnostic(
        code(camsync::connection_failed),
        help(
            "Check that the service is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("No devices found after {attempts} discovery attempts")]
    #[diagnostic(
        code(camsync::discovery_exhausted),
        help(
            "The service did not enumerate any device in time. Last error: {last_error}\n\
             Raise discovery_attempts in your profile if cameras are slow to start."
        )
    )]
    DiscoveryExhausted { attempts: u32, last_error: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The service refused the token for '{operation}'")]
    #[diagnostic(
        code(camsync::auth_failed),
        help("Service said: {detail}\nStore a new token with: camsync config set-token")
    )]
    AuthFailed { operation: String, detail: String },

    #[error("No service token configured")]
    #[diagnostic(
        code(camsync::no_token),
        help(
            "Pass --token, set CAMSYNC_TOKEN, or store one with: camsync config set-token"
        )
    )]
    NoToken,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camsync::not_found),
        help("Run: camsync {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Service ──────────────────────────────────────────────────────
    #[error("{operation} was rejected by the service")]
    #[diagnostic(code(camsync::rejected), help("{detail}"))]
    Rejected { operation: String, detail: String },

    #[error("{message}")]
    #[diagnostic(code(camsync::service))]
    Service { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(camsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: camsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No service configured")]
    #[diagnostic(
        code(camsync::no_config),
        help(
            "Create a profile with: camsync config init\n\
             Or pass --url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(camsync::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Timed out after {seconds}s waiting for {what}")]
    #[diagnostic(code(camsync::timeout))]
    Timeout { what: String, seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => exit_code::CONNECTION,
            Self::DiscoveryExhausted { .. } => exit_code::DISCOVERY,
            Self::AuthFailed { .. } | Self::NoToken => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            Self::Service { .. } | Self::Config(_) | Self::Io(_) | Self::Render(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::ChannelDisconnected => Self::ConnectionFailed {
                url: "(live channel)".into(),
                reason: "the live channel is not connected".into(),
            },

            CoreError::DiscoveryExhausted {
                attempts,
                last_error,
            } => Self::DiscoveryExhausted {
                attempts,
                last_error,
            },

            CoreError::CommandRejected {
                operation,
                status: Some(401 | 403),
                detail,
            } => Self::AuthFailed {
                operation: operation.into(),
                detail,
            },

            CoreError::CommandRejected {
                operation,
                status: Some(404),
                detail,
            } => Self::NotFound {
                resource_type: "target".into(),
                identifier: format!("{operation}: {detail}"),
                list_command: "devices".into(),
            },

            CoreError::CommandRejected {
                operation, detail, ..
            } => Self::Rejected {
                operation: operation.into(),
                detail,
            },

            CoreError::DeviceNotFound { key } => Self::NotFound {
                resource_type: "device".into(),
                identifier: key,
                list_command: "devices".into(),
            },

            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } if message.contains("token") => Self::NoToken,

            CoreError::Config { message }
            | CoreError::MalformedFrame { reason: message }
            | CoreError::SnapshotParse { reason: message }
            | CoreError::Internal(message) => Self::Service { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_exit_codes_by_status() {
        let rejected = |status| {
            CliError::from(CoreError::CommandRejected {
                operation: "start storage",
                status,
                detail: "Disk full".into(),
            })
        };
        assert_eq!(rejected(Some(409)).exit_code(), exit_code::REJECTED);
        assert_eq!(rejected(Some(401)).exit_code(), exit_code::AUTH);
        assert_eq!(rejected(Some(404)).exit_code(), exit_code::NOT_FOUND);
        assert_eq!(rejected(None).exit_code(), exit_code::REJECTED);
    }

    #[test]
    fn discovery_and_connection_codes() {
        let discovery = CliError::from(CoreError::DiscoveryExhausted {
            attempts: 5,
            last_error: "503".into(),
        });
        assert_eq!(discovery.exit_code(), exit_code::DISCOVERY);

        let conn = CliError::from(CoreError::ConnectionFailed {
            url: "http://x".into(),
            reason: "refused".into(),
        });
        assert_eq!(conn.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn missing_token_is_auth() {
        let err = CliError::from(CoreError::Config {
            message: "restarting the service requires a service token".into(),
        });
        assert!(matches!(err, CliError::NoToken));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn rejection_detail_is_kept_verbatim() {
        let err = CliError::from(CoreError::CommandRejected {
            operation: "capture image",
            status: Some(500),
            detail: "sensor timeout (code 7)".into(),
        });
        match err {
            CliError::Rejected { detail, .. } => assert_eq!(detail, "sensor timeout (code 7)"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
