//! Shared helpers for command handlers.

use chrono::Local;

use camsync_core::DeviceKey;

use crate::error::CliError;

/// Parse a device key argument. Keys are opaque; only blank ones are refused.
pub fn device_key(raw: &str) -> Result<DeviceKey, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "key".into(),
            reason: "device key cannot be empty".into(),
        });
    }
    Ok(DeviceKey::new(trimmed))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Wall-clock prefix for streamed lines.
pub fn timestamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Format an optional number, `-` when absent.
pub fn opt_num(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(device_key("  ").is_err());
    }

    #[test]
    fn key_is_trimmed_but_otherwise_opaque() {
        assert_eq!(device_key(" usb/video0 ").unwrap(), DeviceKey::new("usb/video0"));
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(confirm("Delete?", true).unwrap());
    }

    #[test]
    fn missing_numbers_render_as_dash() {
        assert_eq!(opt_num(None), "-");
        assert_eq!(opt_num(Some(2.5)), "2.5");
    }
}
