//! Exposure and gain.

use tabled::Tabled;

use camsync_core::{ControlChange, ControlRange, DeviceKey, DeviceParameters, Session, SettingsUpdate};

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand, SettingsSetArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ControlRow {
    #[tabled(rename = "Control")]
    name: &'static str,
    #[tabled(rename = "Mode")]
    mode: &'static str,
    #[tabled(rename = "Value")]
    current: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Step")]
    increment: String,
}

fn row(name: &'static str, range: &ControlRange) -> ControlRow {
    ControlRow {
        name,
        mode: if range.auto { "auto" } else { "manual" },
        current: util::opt_num(range.current),
        min: util::opt_num(range.min),
        max: util::opt_num(range.max),
        increment: util::opt_num(range.increment),
    }
}

fn detail(params: &DeviceParameters) -> String {
    tabled::Table::new([row("exposure", &params.exposure), row("gain", &params.gain)])
        .with(tabled::settings::Style::rounded())
        .to_string()
}

fn plain(params: &DeviceParameters) -> String {
    format!(
        "exposure\t{}\ngain\t{}",
        util::opt_num(params.exposure.current),
        util::opt_num(params.gain.current)
    )
}

/// Turn the flag set into an update; controls without flags stay untouched.
fn update_from(args: &SettingsSetArgs) -> SettingsUpdate {
    let change = |auto: Option<bool>, value: Option<f64>| {
        let change = ControlChange { auto, value };
        (!change.is_empty()).then_some(change)
    };
    SettingsUpdate {
        exposure: change(args.exposure_auto, args.exposure),
        gain: change(args.gain_auto, args.gain),
    }
}

async fn current(session: &Session, key: &DeviceKey) -> Result<DeviceParameters, CliError> {
    session.refresh_status().await?;
    let cached = session
        .snapshot()
        .get(key.as_str())
        .and_then(|s| s.parameters.clone());
    match cached {
        Some(params) => Ok(params),
        None => Ok(session.commands().get_parameters(key).await?),
    }
}

pub async fn handle(session: &Session, args: SettingsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let params = match args.command {
        SettingsCommand::Get(arg) => {
            let key = util::device_key(&arg.key)?;
            current(session, &key).await?
        }
        SettingsCommand::Set(set) => {
            let key = util::device_key(&set.key)?;
            let update = update_from(&set);
            if let Err(e) = session.refresh_status().await {
                tracing::debug!(error = %e, "using fetched bounds");
            }
            let applied = session.update_settings(&key, &update).await?;
            output::print_done(&format!("settings updated on {key}"), global.quiet);
            applied
        }
    };
    let out = output::render_single(global.output, &params, detail, plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
