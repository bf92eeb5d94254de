//! Translation of profiles plus global flags into a `SessionConfig`.
//!
//! This is the single boundary where CLI input crosses into core types.
//! Precedence: flag > env > profile > defaults.

use std::time::Duration;

use secrecy::SecretString;

use camsync_config::{Config, Defaults, Profile};
use camsync_core::{SessionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build the session configuration for a service-bound command.
pub fn build_session_config(global: &GlobalOpts, cfg: &Config) -> Result<SessionConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut session = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(url) = &global.url {
                profile.url.clone_from(url);
            }
            camsync_config::profile_to_session_config(&profile, &profile_name, &cfg.defaults)?
        }
        None => {
            // An explicitly named profile must exist; otherwise --url suffices.
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available_profiles(cfg),
                });
            }
            let url = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: camsync_config::config_path().display().to_string(),
            })?;
            camsync_config::profile_to_session_config(
                &Profile::new(url),
                &profile_name,
                &cfg.defaults,
            )?
        }
    };

    apply_flags(&mut session, global, &cfg.defaults);
    Ok(session)
}

fn apply_flags(session: &mut SessionConfig, global: &GlobalOpts, defaults: &Defaults) {
    if let Some(token) = global.token.as_deref().filter(|t| !t.is_empty()) {
        session.service_token = Some(SecretString::from(token.to_owned()));
    }
    if global.insecure || defaults.insecure {
        session.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        session.timeout = (secs > 0).then_some(Duration::from_secs(secs));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["camsync"];
        argv.extend_from_slice(args);
        argv.push("devices");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with(name: &str, url: &str) -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(name.into(), Profile::new(url));
        cfg
    }

    #[test]
    fn url_flag_without_profile() {
        let cfg = Config::default();
        let session = build_session_config(&global(&["--url", "http://cam:8000"]), &cfg).unwrap();
        assert_eq!(session.url.as_str(), "http://cam:8000/");
        assert!(session.service_token.is_none());
    }

    #[test]
    fn nothing_configured_is_no_config() {
        let err = build_session_config(&global(&[]), &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn named_profile_must_exist() {
        let cfg = config_with("lab", "http://lab");
        let err = build_session_config(&global(&["-p", "prod"]), &cfg).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { .. }));
    }

    #[test]
    fn flags_override_profile() {
        let mut cfg = config_with("default", "http://profile-host");
        cfg.profiles.get_mut("default").unwrap().timeout = Some(30);

        let session = build_session_config(
            &global(&["--url", "http://flag-host", "--timeout", "0", "-k", "--token", "t0k"]),
            &cfg,
        )
        .unwrap();
        assert_eq!(session.url.host_str(), Some("flag-host"));
        assert_eq!(session.timeout, None);
        assert_eq!(session.tls, TlsVerification::DangerAcceptInvalid);
        assert!(session.service_token.is_some());
    }
}
