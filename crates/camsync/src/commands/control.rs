//! Device control commands: selection, preview/storage, capture, interval.

use camsync_core::{SelectOutcome, Session};

use crate::cli::{GlobalOpts, IntervalArgs, KeyArg, RunArgs, RunCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn select(session: &Session, args: KeyArg, global: &GlobalOpts) -> Result<(), CliError> {
    let key = util::device_key(&args.key)?;
    match session.select_device(&key).await? {
        SelectOutcome::Superseded => {
            output::print_done(&format!("selection of {key} was superseded"), global.quiet);
        }
        SelectOutcome::Selected(selection) => {
            let color = output::should_color(global.color);
            for err in &selection.errors {
                eprintln!("{}", output::warning(&format!("warning: {err}"), color));
            }
            if let Some(params) = &selection.parameters {
                tracing::info!(
                    exposure = ?params.exposure.current,
                    gain = ?params.gain.current,
                    "device parameters loaded"
                );
            }
            output::print_done(&format!("selected {key}"), global.quiet);
        }
    }
    Ok(())
}

pub async fn preview(session: &Session, args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RunCommand::Start(arg) => {
            let key = util::device_key(&arg.key)?;
            session.start_preview(&key).await?;
            output::print_done(&format!("preview started on {key}"), global.quiet);
        }
        RunCommand::Stop(arg) => {
            let key = util::device_key(&arg.key)?;
            session.stop_preview(&key).await?;
            output::print_done(&format!("preview stopped on {key}"), global.quiet);
        }
    }
    Ok(())
}

pub async fn storage(session: &Session, args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RunCommand::Start(arg) => {
            let key = util::device_key(&arg.key)?;
            session.start_storage(&key).await?;
            output::print_done(&format!("storage started on {key}"), global.quiet);
        }
        RunCommand::Stop(arg) => {
            let key = util::device_key(&arg.key)?;
            session.stop_storage(&key).await?;
            output::print_done(&format!("storage stopped on {key}"), global.quiet);
        }
    }
    Ok(())
}

pub async fn capture(session: &Session, args: KeyArg, global: &GlobalOpts) -> Result<(), CliError> {
    let key = util::device_key(&args.key)?;
    match session.capture_image(&key).await? {
        Some(path) => output::print_output(&path, global.quiet),
        None => output::print_done(&format!("image captured on {key}"), global.quiet),
    }
    Ok(())
}

pub async fn interval(
    session: &Session,
    args: IntervalArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let key = util::device_key(&args.key)?;
    session.set_interval(&key, args.seconds).await?;
    output::print_done(
        &format!("{key} saves every {}s", args.seconds),
        global.quiet,
    );
    Ok(())
}

pub async fn restart(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm("Restart the control service?", global.yes)? {
        return Ok(());
    }
    session.restart_service().await?;
    output::print_done("restart requested", global.quiet);
    Ok(())
}
