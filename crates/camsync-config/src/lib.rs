//! Configuration for the camsync CLI.
//!
//! TOML profiles, service-token resolution (env + keyring + plaintext),
//! and translation to `camsync_core::SessionConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camsync_core::{DeviceKey, DiscoveryPolicy, SessionConfig, TlsVerification};

/// Keyring service name under which tokens are stored.
pub const KEYRING_SERVICE: &str = "camsync";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "CAMSYNC_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the explicit name, else `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP timeout in seconds. `0` means none.
    #[serde(default)]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: 0,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named control-service profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Service base URL (e.g., "http://10.0.0.5:8000").
    pub url: String,

    /// Live channel path below the base URL.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Device key for single-device services whose snapshots omit it.
    pub implicit_device: Option<String>,

    /// Service token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the service token.
    pub token_env: Option<String>,

    pub discovery_attempts: Option<u32>,
    pub discovery_delay_ms: Option<u64>,
    pub expected_stop_ttl_secs: Option<u64>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds, `0` = none).
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ws_path: default_ws_path(),
            implicit_device: None,
            token: None,
            token_env: None,
            discovery_attempts: None,
            discovery_delay_ms: None,
            expected_stop_ttl_secs: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_ws_path() -> String {
    camsync_core::config::DEFAULT_WS_PATH.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `CAMSYNC_CONFIG`, else platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("dev", "camsync", "camsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then apply `CAMSYNC_` variables. Nested keys use a
/// double underscore, e.g. `CAMSYNC_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/service-token"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the service token: `token_env` variable, then the system
/// keyring, then plaintext. `None` when no source has one; only
/// privileged commands need it.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    token_chain(
        profile,
        |name| std::env::var(name).ok(),
        || keyring_entry(profile_name).ok()?.get_password().ok(),
    )
}

fn token_chain(
    profile: &Profile,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Option<String>,
) -> Option<SecretString> {
    profile
        .token_env
        .as_deref()
        .and_then(env)
        .or_else(keyring)
        .or_else(|| profile.token.clone())
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?
        .set_password(token)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and check a service URL.
pub fn parse_service_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected http or https, got '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build a `SessionConfig` from a profile, no CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let url = parse_service_url(&profile.url)?;
    let mut config = SessionConfig::new(url);

    config.ws_path.clone_from(&profile.ws_path);
    config.implicit_device = profile
        .implicit_device
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(DeviceKey::from);
    config.service_token = resolve_token(profile, profile_name);

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    config.timeout = (timeout > 0).then_some(Duration::from_secs(timeout));

    let mut discovery = DiscoveryPolicy::default();
    if let Some(attempts) = profile.discovery_attempts {
        if attempts == 0 {
            return Err(ConfigError::Validation {
                field: "discovery_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        discovery.attempts = attempts;
    }
    if let Some(ms) = profile.discovery_delay_ms {
        discovery.delay = Duration::from_millis(ms);
    }
    config.discovery = discovery;

    if let Some(secs) = profile.expected_stop_ttl_secs {
        config.expected_stop_ttl = Duration::from_secs(secs);
    }

    Ok(config)
}
