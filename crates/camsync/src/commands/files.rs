//! Stored-capture browsing: list, delete, download, follow.

use std::path::PathBuf;
use std::time::Duration;

use indicatif::ProgressBar;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use camsync_core::{DeleteOutcome, DirectoryEntry, DirectoryExplorer, Session, StreamEvent};

use crate::cli::{FilesArgs, FilesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&DirectoryEntry> for EntryRow {
    fn from(e: &DirectoryEntry) -> Self {
        let name = if e.is_folder() {
            format!("{}/", e.name)
        } else {
            e.name.clone()
        };
        Self {
            name,
            kind: e.kind.to_string(),
            path: e.path.clone(),
        }
    }
}

fn render(explorer: &DirectoryExplorer, global: &GlobalOpts) -> Result<String, CliError> {
    output::render_list(
        global.output,
        explorer.entries(),
        |e| EntryRow::from(e),
        |e| e.path.clone(),
    )
}

/// Archive name for a folder: its last segment, or `captures` at the root.
fn default_archive(path: &str) -> PathBuf {
    let name = path
        .trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("captures");
    PathBuf::from(format!("{name}.zip"))
}

pub async fn handle(session: &Session, args: FilesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut explorer = session.explorer();
    let yes = global.yes;
    let ask = |prompt: &str| util::confirm(prompt, yes).unwrap_or(false);

    match args.command {
        FilesCommand::Ls { path } => {
            explorer.list(&path).await?;
            let out = render(&explorer, global)?;
            output::print_output(&out, global.quiet);
        }

        FilesCommand::Rm { path } => {
            if explorer.delete_file(&path, &ask).await? == DeleteOutcome::Deleted {
                output::print_done(&format!("deleted {path}"), global.quiet);
            }
        }

        FilesCommand::Rmdir { path } => {
            if explorer.delete_folder(&path, &ask).await? == DeleteOutcome::Deleted {
                output::print_done(&format!("deleted folder {path}"), global.quiet);
            }
        }

        FilesCommand::Download { path, out } => {
            let target = out.unwrap_or_else(|| default_archive(&path));
            let spinner = ProgressBar::new_spinner();
            spinner.set_message(format!("downloading {path}"));
            spinner.enable_steady_tick(Duration::from_millis(100));
            let result = explorer.download_folder(&path).await;
            spinner.finish_and_clear();

            let archive = result?;
            tokio::fs::write(&target, &archive).await?;
            output::print_done(
                &format!("{} bytes written to {}", archive.len(), target.display()),
                global.quiet,
            );
        }

        FilesCommand::Watch { path } => {
            let mut events = session.subscribe_events();
            explorer.list(&path).await?;
            output::print_output(&render(&explorer, global)?, global.quiet);
            session.connect().await?;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    received = events.recv() => match received {
                        Ok(event) => {
                            if follow(&mut explorer, Some(&event)).await {
                                eprintln!("{} {} changed", util::timestamp(), display_path(explorer.path()));
                                output::print_output(&render(&explorer, global)?, global.quiet);
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "missed events, re-listing");
                            if follow(&mut explorer, None).await {
                                output::print_output(&render(&explorer, global)?, global.quiet);
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }
    }
    Ok(())
}

/// Re-list for `event`, or unconditionally when `None`. Returns whether the
/// listing was replaced; a failed re-list is logged and the last listing
/// stays current so watching continues.
async fn follow(explorer: &mut DirectoryExplorer, event: Option<&StreamEvent>) -> bool {
    let result = match event {
        Some(event) => explorer.on_event(event).await,
        None => explorer.refresh().await.map(|_| true),
    };
    match result {
        Ok(refreshed) => refreshed,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = display_path(explorer.path()),
                "re-list failed, keeping the last listing"
            );
            false
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}
