//! Per-device status, one-shot or followed over the live channel.

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use camsync_core::{DeviceKey, DeviceStateMap, DeviceStatus, EventSummary, Session, StreamEvent};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Rows ────────────────────────────────────────────────────────────

/// One device's status plus its outstanding warning, for structured output.
#[derive(Serialize)]
struct StatusView<'a> {
    key: &'a DeviceKey,
    #[serde(flatten)]
    status: &'a DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Preview")]
    preview: String,
    #[tabled(rename = "Storage")]
    storage: String,
    #[tabled(rename = "Interval (s)")]
    interval: String,
    #[tabled(rename = "Folder")]
    folder: String,
    #[tabled(rename = "Warning")]
    warning: String,
}

fn views(map: &DeviceStateMap) -> Vec<StatusView<'_>> {
    map.iter()
        .map(|(key, status)| StatusView {
            key,
            status,
            warning: map.warning(key.as_str()),
        })
        .collect()
}

fn render(map: &DeviceStateMap, global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    output::render_list(
        global.output,
        &views(map),
        |v| StatusRow {
            key: v.key.to_string(),
            preview: output::run_state(v.status.preview, color),
            storage: output::run_state(v.status.storage, color),
            interval: v.status.save_interval_secs.to_string(),
            folder: v.status.current_folder.clone().unwrap_or_default(),
            warning: v.warning.map(|w| output::warning(w, color)).unwrap_or_default(),
        },
        |v| format!("{}\t{}\t{}", v.key, v.status.preview, v.status.storage),
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.watch {
        return watch(session, global).await;
    }

    session.refresh_status().await?;
    let out = render(&session.snapshot(), global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Print the current table, then one line per event until interrupted.
async fn watch(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let mut events = session.subscribe_events();
    session.connect().await?;

    let out = render(&session.snapshot(), global)?;
    output::print_output(&out, global.quiet);

    let color = output::should_color(global.color);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(event) => {
                    let line = event_line(&event, &session.snapshot(), global.output, color)?;
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn event_line(
    event: &StreamEvent,
    map: &DeviceStateMap,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            output::render_json(&EventSummary::from(event), true)
        }
        OutputFormat::Table | OutputFormat::Plain => {
            Ok(format!("{} {}", util::timestamp(), describe(event, map, color)))
        }
    }
}

fn describe(event: &StreamEvent, map: &DeviceStateMap, color: bool) -> String {
    match event {
        StreamEvent::SnapshotApplied { changed_keys } => changed_keys
            .iter()
            .map(|key| match map.get(key.as_str()) {
                Some(s) => format!(
                    "{key}: preview {} storage {}",
                    output::run_state(s.preview, color),
                    output::run_state(s.storage, color)
                ),
                None => format!("{key}: updated"),
            })
            .collect::<Vec<_>>()
            .join("; "),
        StreamEvent::UnexpectedStop { device_key, reason } => output::warning(
            &format!("{device_key}: preview stopped unexpectedly ({reason})"),
            color,
        ),
        StreamEvent::WarningCleared { device_key } => format!("{device_key}: warning cleared"),
        StreamEvent::ArtifactCreated { path, .. } => format!("new capture {path}"),
        StreamEvent::FrameReceived { device_key, frame } => {
            format!("{device_key}: frame {} bytes {}", frame.len(), frame.mime_type())
        }
    }
}

#[cfg(test)]
mod tests {
    use camsync_core::Frame;

    use super::*;

    #[test]
    fn unexpected_stop_names_device_and_reason() {
        let line = describe(
            &StreamEvent::UnexpectedStop {
                device_key: DeviceKey::new("cam0"),
                reason: "cable unplugged".into(),
            },
            &DeviceStateMap::default(),
            false,
        );
        assert_eq!(line, "cam0: preview stopped unexpectedly (cable unplugged)");
    }

    #[test]
    fn frame_line_reports_size_and_type() {
        let line = describe(
            &StreamEvent::FrameReceived {
                device_key: DeviceKey::new("usb0"),
                frame: Frame::new(bytes::Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0])),
            },
            &DeviceStateMap::default(),
            false,
        );
        assert_eq!(line, "usb0: frame 4 bytes image/jpeg");
    }

    #[test]
    fn json_events_are_one_line() {
        let event = StreamEvent::ArtifactCreated {
            path: "run1/img_0001.png".into(),
            folder: "run1".into(),
        };
        let line = event_line(&event, &DeviceStateMap::default(), OutputFormat::Json, false)
            .unwrap_or_default();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""event":"artifact""#));
    }
}
