//! Grab a single preview frame from the live channel.

use std::path::Path;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use camsync_core::{DeviceKey, Frame, Session, StreamEvent};

use crate::cli::{FrameArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(session: &Session, args: FrameArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let key = util::device_key(&args.key)?;
    let mut events = session.subscribe_events();
    session.connect().await?;

    if !session.snapshot().is_preview_running(key.as_str()) {
        tracing::warn!(%key, "preview is not running; start it with `camsync preview start {key}`");
    }

    let wait = Duration::from_secs(args.wait);
    let frame = tokio::time::timeout(wait, next_frame(&mut events, &key))
        .await
        .map_err(|_| CliError::Timeout {
            what: format!("a frame from {key}"),
            seconds: args.wait,
        })??;

    if let Some(path) = &args.out {
        write_frame(path, &frame).await?;
        output::print_done(
            &format!("{} ({} bytes) written to {}", frame.mime_type(), frame.len(), path.display()),
            global.quiet,
        );
    } else if args.data_uri {
        output::print_output(&frame.data_uri(), global.quiet);
    } else {
        output::print_done(
            &format!("received {} ({} bytes) from {key}", frame.mime_type(), frame.len()),
            global.quiet,
        );
    }
    Ok(())
}

async fn next_frame(
    events: &mut tokio::sync::broadcast::Receiver<std::sync::Arc<StreamEvent>>,
    key: &DeviceKey,
) -> Result<Frame, CliError> {
    loop {
        match events.recv().await {
            Ok(event) => match event.as_ref() {
                StreamEvent::FrameReceived { device_key, frame } if device_key == key => {
                    return Ok(frame.clone());
                }
                _ => {}
            },
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => {
                return Err(CliError::ConnectionFailed {
                    url: "(live channel)".into(),
                    reason: "channel closed before a frame arrived".into(),
                });
            }
        }
    }
}

async fn write_frame(path: &Path, frame: &Frame) -> Result<(), CliError> {
    tokio::fs::write(path, &frame.payload).await?;
    Ok(())
}
