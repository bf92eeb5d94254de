//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod files;
pub mod frame;
pub mod settings;
pub mod status;
pub mod util;

use camsync_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(session, global).await,
        Command::Status(args) => status::handle(session, args, global).await,
        Command::Select(args) => control::select(session, args, global).await,
        Command::Preview(args) => control::preview(session, args, global).await,
        Command::Storage(args) => control::storage(session, args, global).await,
        Command::Capture(args) => control::capture(session, args, global).await,
        Command::Interval(args) => control::interval(session, args, global).await,
        Command::Restart => control::restart(session, global).await,
        Command::Settings(args) => settings::handle(session, args, global).await,
        Command::Frame(args) => frame::handle(session, args, global).await,
        Command::Files(args) => files::handle(session, args, global).await,
        // Handled before a session exists
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
