//! Device listing.

use tabled::Tabled;

use camsync_core::{DeviceDescriptor, Session};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Index")]
    index: u32,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Controls")]
    controls: &'static str,
}

impl From<&DeviceDescriptor> for DeviceRow {
    fn from(d: &DeviceDescriptor) -> Self {
        Self {
            key: d.key.to_string(),
            name: d.display_name.clone(),
            kind: d.kind.to_string(),
            index: d.index,
            model: d.model.clone().unwrap_or_default(),
            serial: d.serial.clone().unwrap_or_default(),
            controls: if d.capabilities.parameters {
                "exposure, gain"
            } else {
                "-"
            },
        }
    }
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = session.refresh_devices().await?;
    let out = output::render_list(
        global.output,
        devices.as_slice(),
        |d| DeviceRow::from(d),
        |d| d.key.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
