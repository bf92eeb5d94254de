//! Live channel with unconditional auto-reconnect.
//!
//! One WebSocket carries both preview frames (binary) and status snapshots
//! (text) for every device. This module owns the connection lifecycle only:
//! messages are forwarded in arrival order through a bounded
//! [`tokio::sync::mpsc`] channel and the consumer decides what they mean.
//!
//! # Example
//!
//! ```rust,ignore
//! use camsync_api::TlsMode;
//! use camsync_api::websocket::{ChannelHandle, ChannelMessage, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = url::Url::parse("ws://10.0.0.5:8000/ws")?;
//! let (handle, mut rx) =
//!     ChannelHandle::connect(url, &TlsMode::System, ReconnectConfig::default(), cancel)?;
//!
//! while let Some(msg) = rx.recv().await {
//!     match msg {
//!         ChannelMessage::Binary(bytes) => { /* decode frame */ }
//!         ChannelMessage::Text(text) => { /* reconcile snapshot */ }
//!         _ => {}
//!     }
//! }
//! handle.shutdown();
//! ```

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{Connector, tungstenite};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::TlsMode;

// ── Channel capacity ─────────────────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection lifecycle as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

// ── ChannelMessage ───────────────────────────────────────────────────

/// What the connection loop forwards to its consumer.
///
/// `Opened` and `Closed` are interleaved with data in the order they
/// happened, so a consumer reading the queue sequentially sees a
/// consistent picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Opened,
    Binary(Bytes),
    Text(String),
    Closed { reason: String },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
///
/// There is no retry ceiling: the channel reconnects until shut down.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

// ── ChannelHandle ────────────────────────────────────────────────────

/// Handle to a running channel task.
pub struct ChannelHandle {
    state_rx: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// `wss://` URLs are verified according to `tls`; an unusable CA file
    /// fails here rather than on every attempt. The first connection
    /// attempt happens asynchronously. The returned receiver yields every
    /// message in arrival order; dropping it stops the loop.
    pub fn connect(
        url: Url,
        tls: &TlsMode,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<ChannelMessage>), Error> {
        let connector = tls.ws_connector()?;
        let (msg_tx, msg_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            channel_loop(url, connector, msg_tx, state_tx, reconnect, task_cancel).await;
        });

        Ok((Self { state_rx, cancel }, msg_rx))
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Why a single connection ended.
enum Ended {
    /// Cancelled, or the consumer went away. Stop for good.
    Shutdown,
    /// Server closed the connection or the stream ended.
    Dropped(String),
}

/// Main loop: connect → read → on drop, publish Closed, backoff → reconnect.
async fn channel_loop(
    url: Url,
    connector: Option<Connector>,
    msg_tx: mpsc::Sender<ChannelMessage>,
    state_tx: watch::Sender<ChannelState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        state_tx.send_replace(ChannelState::Connecting);

        let reason = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, connector.clone(), &msg_tx, &state_tx, &cancel) => match result {
                Ok(Ended::Shutdown) => break,
                Ok(Ended::Dropped(reason)) => {
                    tracing::info!(%reason, "channel closed, reconnecting");
                    attempt = 0;
                    reason
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "channel error");
                    e.to_string()
                }
            },
        };

        state_tx.send_replace(ChannelState::Closed);
        if msg_tx.send(ChannelMessage::Closed { reason }).await.is_err() {
            break;
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    state_tx.send_replace(ChannelState::Closed);
    tracing::debug!("channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and forward messages until it drops.
async fn connect_and_read(
    url: &Url,
    connector: Option<Connector>,
    msg_tx: &mpsc::Sender<ChannelMessage>,
    state_tx: &watch::Sender<ChannelState>,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    tracing::info!(url = %url, "connecting channel");

    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("channel open");
    state_tx.send_replace(ChannelState::Open);
    if msg_tx.send(ChannelMessage::Opened).await.is_err() {
        return Ok(Ended::Shutdown);
    }

    let (_write, mut read) = ws_stream.split();

    loop {
        let forwarded = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Ended::Shutdown),
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Binary(data))) => ChannelMessage::Binary(data),
                Some(Ok(tungstenite::Message::Text(text))) => {
                    ChannelMessage::Text(text.as_str().to_owned())
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "close frame".to_owned(),
                        |cf| format!("close frame {}: {}", cf.code, cf.reason),
                    );
                    return Ok(Ended::Dropped(reason));
                }
                Some(Ok(_)) => {
                    // Ping/Pong/raw frames: tungstenite answers pings itself.
                    continue;
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => return Ok(Ended::Dropped("stream ended".to_owned())),
            },
        };

        if msg_tx.send(forwarded).await.is_err() {
            return Ok(Ended::Shutdown);
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(16)).unwrap_or(16);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn first_delay_is_the_initial_delay() {
        let d0 = calculate_backoff(0, &ReconnectConfig::default());
        assert_eq!(d0, Duration::from_secs(1));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        for attempt in [10, 50, u32::MAX] {
            let d = calculate_backoff(attempt, &config);
            // Jitter tops out at 1.25x the cap.
            assert!(d <= Duration::from_secs_f64(37.5), "attempt {attempt}: {d:?}");
        }
    }

    #[tokio::test]
    async fn unreachable_server_reports_closed_and_keeps_retrying() {
        // Port 9 on localhost: nothing listens, connect fails fast.
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let cancel = CancellationToken::new();
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        };
        let (handle, mut rx) =
            ChannelHandle::connect(url, &TlsMode::System, config, cancel.clone()).unwrap();

        for _ in 0..2 {
            let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(msg, ChannelMessage::Closed { .. }), "{msg:?}");
        }

        handle.shutdown();
        let mut state = handle.subscribe_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == ChannelState::Closed),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn unusable_ca_file_fails_before_spawning() {
        let url = Url::parse("wss://127.0.0.1:9/ws").unwrap();
        let tls = TlsMode::CustomCa("/nonexistent/ca.pem".into());
        let result = ChannelHandle::connect(
            url,
            &tls,
            ReconnectConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::Tls(_))));
    }
}
