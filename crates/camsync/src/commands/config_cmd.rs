//! Config subcommand handlers.

use dialoguer::{Input, Select};

use camsync_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

/// Format config for display. Expects an already redacted config.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        let _ = writeln!(out, "ws_path = \"{}\"", p.ws_path);
        if let Some(ref device) = p.implicit_device {
            let _ = writeln!(out, "implicit_device = \"{device}\"");
        }
        if let Some(ref token) = p.token {
            let _ = writeln!(out, "token = \"{token}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(attempts) = p.discovery_attempts {
            let _ = writeln!(out, "discovery_attempts = {attempts}");
        }
        if let Some(delay) = p.discovery_delay_ms {
            let _ = writeln!(out, "discovery_delay_ms = {delay}");
        }
        if let Some(ttl) = p.expected_stop_ttl_secs {
            let _ = writeln!(out, "expected_stop_ttl_secs = {ttl}");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_token() -> Result<String, CliError> {
    let token = rpassword::prompt_password("Service token: ").map_err(prompt_err)?;
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

/// Store the token in the keyring, or hand it back for the config file.
fn keyring_or_plaintext(profile_name: &str, token: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the token?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        camsync_config::store_token(profile_name, &token)?;
        eprintln!("   ✓ token stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(token))
    }
}

fn ensure_profile(cfg: &Config, name: &str) -> Result<(), CliError> {
    if cfg.profiles.contains_key(name) {
        Ok(())
    } else {
        Err(CliError::ProfileNotFound {
            name: name.into(),
            available: config::available_profiles(cfg),
        })
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = redacted(&camsync_config::load_config()?);
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &camsync_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = camsync_config::load_config()?;
            let active = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: camsync config init");
            } else {
                let listing = cfg
                    .profiles
                    .keys()
                    .map(|name| {
                        let marker = if *name == active { " *" } else { "" };
                        format!("{name}{marker}")
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                output::print_output(&listing, global.quiet);
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = camsync_config::load_config()?;
            ensure_profile(&cfg, &name)?;
            cfg.default_profile = Some(name.clone());
            camsync_config::save_config(&cfg)?;
            output::print_done(&format!("default profile set to '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken => {
            let cfg = camsync_config::load_config()?;
            let name = config::active_profile_name(global, &cfg);
            ensure_profile(&cfg, &name)?;
            let token = prompt_token()?;
            camsync_config::store_token(&name, &token)?;
            output::print_done(&format!("token for '{name}' stored in system keyring"), global.quiet);
            Ok(())
        }
    }
}

/// Interactive wizard. Adds or replaces one profile and makes it the default.
fn init() -> Result<(), CliError> {
    let config_path = camsync_config::config_path();
    eprintln!("camsync configuration");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let url: String = Input::new()
        .with_prompt("Service URL")
        .default("http://localhost:8000".into())
        .validate_with(|input: &String| {
            camsync_config::parse_service_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let implicit: String = Input::new()
        .with_prompt("Device key for single-device services (blank for none)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let wants_token = dialoguer::Confirm::new()
        .with_prompt("Configure a service token (needed to restart the service)?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    let token = if wants_token {
        keyring_or_plaintext(&profile_name, prompt_token()?)?
    } else {
        None
    };

    let mut profile = Profile::new(url);
    profile.implicit_device = Some(implicit.trim().to_owned()).filter(|s| !s.is_empty());
    profile.token = token;

    let mut cfg = camsync_config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    let written = camsync_config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", written.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: camsync devices");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut profile = Profile::new("http://cam-host:8000");
        profile.token = Some("s3cret".into());
        profile.implicit_device = Some("cam0".into());
        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), profile);
        cfg.default_profile = Some("lab".into());
        cfg
    }

    #[test]
    fn show_never_prints_tokens() {
        let text = format_config(&redacted(&sample()));
        assert!(!text.contains("s3cret"));
        assert!(text.contains("token = \"****\""));
        assert!(text.contains("implicit_device = \"cam0\""));
    }

    #[test]
    fn unknown_profile_lists_available() {
        match ensure_profile(&sample(), "prod") {
            Err(CliError::ProfileNotFound { available, .. }) => assert_eq!(available, "lab"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
