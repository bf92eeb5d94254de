// ── Session ──
//
// One live view of a control service. Owns the device state map, routes
// channel messages through the frame decoder and the reconciler, and
// wraps the command client so successful commands are echoed into state
// before the service confirms them.

use std::sync::{Arc, PoisonError};

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use camsync_api::ControlClient;
use camsync_api::decode_frame;
use camsync_api::websocket::{ChannelHandle, ChannelMessage, ChannelState};

use crate::command::{
    CommandClient, ExpectedStops, SelectOutcome, SettingsUpdate,
};
use crate::config::SessionConfig;
use crate::convert::parse_snapshot;
use crate::error::CoreError;
use crate::explorer::DirectoryExplorer;
use crate::model::{
    DeviceDescriptor, DeviceKey, DeviceParameters, DeviceStateMap, Frame, StreamEvent,
};
use crate::reconcile::{self, Echo, Reconciliation, Snapshot};
use crate::stream::StateStream;

const EVENT_CHANNEL_SIZE: usize = 256;
const REFRESH_CHANNEL_SIZE: usize = 4;

/// A connection to one control service.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Commands work as soon as the
/// session is built; [`connect`](Self::connect) adds discovery, the
/// initial status and the live channel.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    api: Arc<ControlClient>,
    commands: CommandClient,
    state: watch::Sender<Arc<DeviceStateMap>>,
    channel_state: watch::Sender<ChannelState>,
    event_tx: broadcast::Sender<Arc<StreamEvent>>,
    descriptors: ArcSwap<Vec<DeviceDescriptor>>,
    cancel: CancellationToken,
    channel: Mutex<Option<ChannelHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Status fetched after a reconnect, applied by the dispatch task.
    refreshed_tx: mpsc::Sender<Snapshot>,
    refreshed_rx: Mutex<Option<mpsc::Receiver<Snapshot>>>,
    status_fetch: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Build the HTTP client and command layer. Does not touch the network.
    pub fn new(config: SessionConfig) -> Result<Self, CoreError> {
        let mut api = ControlClient::new(config.url.clone(), &config.transport())?;
        if let Some(token) = &config.service_token {
            api = api.with_service_token(token.clone());
        }
        Ok(Self::with_api(config, Arc::new(api)))
    }

    /// Build a session around an existing client.
    pub fn with_api(config: SessionConfig, api: Arc<ControlClient>) -> Self {
        let (state, state_rx) = watch::channel(Arc::new(DeviceStateMap::default()));
        let (channel_state, _) = watch::channel(ChannelState::Closed);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (refreshed_tx, refreshed_rx) = mpsc::channel(REFRESH_CHANNEL_SIZE);

        let commands = CommandClient::builder(Arc::clone(&api), config.discovery)
            .implicit_key(config.implicit_device.clone())
            .expected_stops(Arc::new(ExpectedStops::new(config.expected_stop_ttl)))
            .state(state_rx)
            .build();

        Self {
            inner: Arc::new(SessionInner {
                config,
                api,
                commands,
                state,
                channel_state,
                event_tx,
                descriptors: ArcSwap::from_pointee(Vec::new()),
                cancel: CancellationToken::new(),
                channel: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                refreshed_tx,
                refreshed_rx: Mutex::new(Some(refreshed_rx)),
                status_fetch: std::sync::Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn commands(&self) -> &CommandClient {
        &self.inner.commands
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Discover devices, load the current status and open the live channel.
    ///
    /// Calling this on a connected session is a no-op. A session cannot be
    /// reconnected after [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut channel = self.inner.channel.lock().await;
        if channel.is_some() {
            return Ok(());
        }
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ChannelDisconnected);
        }

        let count = self.refresh_devices().await?.len();
        if let Err(e) = self.refresh_status().await {
            warn!(error = %e, "initial status fetch failed, waiting for the channel");
        }

        let url = self.inner.api.channel_url(&self.inner.config.ws_path)?;
        info!(%url, devices = count, "opening live channel");
        let (handle, messages) = ChannelHandle::connect(
            url,
            &self.inner.config.transport().tls,
            self.inner.config.reconnect.clone(),
            self.inner.cancel.child_token(),
        )?;
        let Some(refreshed) = self.inner.refreshed_rx.lock().await.take() else {
            handle.shutdown();
            return Err(CoreError::ChannelDisconnected);
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(mirror_channel_state(
            handle.subscribe_state(),
            self.inner.channel_state.clone(),
            self.inner.cancel.clone(),
        )));
        handles.push(tokio::spawn(dispatch_task(
            self.clone(),
            messages,
            refreshed,
            self.inner.cancel.clone(),
        )));

        *channel = Some(handle);
        Ok(())
    }

    /// Stop the channel and join background tasks.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();
        let fetch = self
            .inner
            .status_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(fetch) = fetch {
            fetch.abort();
        }
        if let Some(handle) = self.inner.channel.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        self.inner.channel_state.send_replace(ChannelState::Closed);
        debug!("session disconnected");
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Current device state map.
    pub fn snapshot(&self) -> Arc<DeviceStateMap> {
        self.inner.state.borrow().clone()
    }

    pub fn state(&self) -> StateStream {
        StateStream::new(self.inner.state.subscribe())
    }

    /// Events in the order they were produced.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<StreamEvent>> {
        self.inner.event_tx.subscribe()
    }

    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel_state.subscribe()
    }

    pub fn devices(&self) -> Arc<Vec<DeviceDescriptor>> {
        self.inner.descriptors.load_full()
    }

    pub fn device(&self, key: &DeviceKey) -> Option<DeviceDescriptor> {
        self.inner
            .descriptors
            .load()
            .iter()
            .find(|d| d.key == *key)
            .cloned()
    }

    /// A storage explorer sharing this session's client.
    pub fn explorer(&self) -> DirectoryExplorer {
        DirectoryExplorer::new(Arc::clone(&self.inner.api))
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Re-run discovery and replace the descriptor set.
    pub async fn refresh_devices(&self) -> Result<Arc<Vec<DeviceDescriptor>>, CoreError> {
        let descriptors = Arc::new(self.inner.commands.list_devices().await?);
        self.inner.descriptors.store(Arc::clone(&descriptors));
        Ok(descriptors)
    }

    /// Fetch `/api/status` and reconcile it like a live snapshot.
    pub async fn refresh_status(&self) -> Result<(), CoreError> {
        let snapshot = self.inner.commands.fetch_status().await?;
        self.apply_snapshot(snapshot);
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Select `key` (see [`CommandClient::select_device`]). Descriptors are
    /// fetched first when none are known yet.
    pub async fn select_device(&self, key: &DeviceKey) -> Result<SelectOutcome, CoreError> {
        let descriptor = self.descriptor_for(key).await?;
        let outcome = self.inner.commands.select_device(&descriptor).await?;
        if let SelectOutcome::Selected(selection) = &outcome {
            if let Some(params) = &selection.parameters {
                self.apply_echo(key, Echo::ParametersSet(params.clone()));
            }
        }
        Ok(outcome)
    }

    pub async fn start_preview(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.commands.start_preview(key).await?;
        self.apply_echo(key, Echo::PreviewStarted);
        Ok(())
    }

    pub async fn stop_preview(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.commands.stop_preview(key).await?;
        self.apply_echo(key, Echo::PreviewStopped);
        Ok(())
    }

    pub async fn start_storage(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.commands.start_storage(key).await?;
        self.apply_echo(key, Echo::StorageStarted);
        Ok(())
    }

    pub async fn stop_storage(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.commands.stop_storage(key).await?;
        self.apply_echo(key, Echo::StorageStopped);
        Ok(())
    }

    pub async fn capture_image(&self, key: &DeviceKey) -> Result<Option<String>, CoreError> {
        self.inner.commands.capture_image(key).await
    }

    pub async fn set_interval(&self, key: &DeviceKey, seconds: f64) -> Result<(), CoreError> {
        self.inner.commands.set_interval(key, seconds).await?;
        self.apply_echo(key, Echo::IntervalSet(seconds));
        Ok(())
    }

    /// Change exposure and/or gain.
    ///
    /// The device must expose parameters. Bounds come from the last known
    /// status, or are fetched when none is cached.
    pub async fn update_settings(
        &self,
        key: &DeviceKey,
        update: &SettingsUpdate,
    ) -> Result<DeviceParameters, CoreError> {
        if update.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "nothing to change".into(),
            });
        }
        let descriptor = self.descriptor_for(key).await?;
        if !descriptor.capabilities.parameters {
            return Err(CoreError::ValidationFailed {
                message: format!("{} does not expose exposure or gain", descriptor.display_name),
            });
        }

        let cached = self
            .snapshot()
            .get(key.as_str())
            .and_then(|s| s.parameters.clone());
        let bounds = match cached {
            Some(bounds) => bounds,
            None => self.inner.commands.get_parameters(key).await?,
        };

        let applied = self
            .inner
            .commands
            .update_settings(key, update, &bounds)
            .await?;
        self.apply_echo(key, Echo::ParametersSet(applied.clone()));
        Ok(applied)
    }

    pub async fn restart_service(&self) -> Result<(), CoreError> {
        self.inner.commands.restart_service().await
    }

    async fn descriptor_for(&self, key: &DeviceKey) -> Result<DeviceDescriptor, CoreError> {
        if let Some(descriptor) = self.device(key) {
            return Ok(descriptor);
        }
        if self.inner.descriptors.load().is_empty() {
            self.refresh_devices().await?;
            if let Some(descriptor) = self.device(key) {
                return Ok(descriptor);
            }
        }
        Err(CoreError::DeviceNotFound {
            key: key.to_string(),
        })
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Handle one channel message. Decode and parse failures are logged
    /// and dropped.
    pub(crate) fn handle_message(&self, message: ChannelMessage) {
        match message {
            ChannelMessage::Opened => {
                info!("live channel open");
                self.spawn_status_fetch();
            }
            ChannelMessage::Binary(bytes) => match decode_frame(bytes) {
                Ok(decoded) => self.publish(vec![StreamEvent::FrameReceived {
                    device_key: DeviceKey::new(decoded.device_key),
                    frame: Frame::new(decoded.payload),
                }]),
                Err(e) => {
                    let err = CoreError::MalformedFrame {
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "discarding binary message");
                }
            },
            ChannelMessage::Text(text) => {
                match parse_snapshot(&text, self.inner.config.implicit_device.as_ref()) {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(e) => warn!(error = %e, "discarding text message"),
                }
            }
            ChannelMessage::Closed { reason } => {
                info!(%reason, "live channel closed, marking devices stopped");
                self.apply(reconcile::downgrade);
            }
        }
    }

    /// Fetch the status in the background and hand it to the dispatch
    /// task. A fetch still running from an earlier reconnect is aborted.
    fn spawn_status_fetch(&self) {
        let commands = self.inner.commands.clone();
        let refreshed = self.inner.refreshed_tx.clone();
        let cancel = self.inner.cancel.clone();
        let task = tokio::spawn(async move {
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                fetched = commands.fetch_status() => fetched,
            };
            match fetched {
                Ok(snapshot) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        _ = refreshed.send(snapshot) => {}
                    }
                }
                Err(e) => warn!(error = %e, "status refresh after reconnect failed"),
            }
        });

        let previous = self
            .inner
            .status_fetch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn apply_snapshot(&self, snapshot: Snapshot) {
        let expected = self.inner.commands.expected_stops().active();
        self.apply(move |previous| reconcile::reconcile(previous, snapshot, &expected));
    }

    fn apply_echo(&self, key: &DeviceKey, change: Echo) {
        self.apply(|previous| reconcile::echo(previous, key, change));
    }

    /// Swap in the merge result, then publish its events. The map is only
    /// replaced when the merge produced events.
    fn apply(&self, merge: impl FnOnce(&DeviceStateMap) -> Reconciliation) {
        let mut events = Vec::new();
        let mut consumed = Vec::new();
        self.inner.state.send_if_modified(|current| {
            let result = merge(current.as_ref());
            if result.events.is_empty() {
                return false;
            }
            *current = Arc::new(result.state);
            events = result.events;
            consumed = result.consumed_markers;
            true
        });

        if !consumed.is_empty() {
            self.inner.commands.expected_stops().consume(&consumed);
        }
        self.publish(events);
    }

    fn publish(&self, events: Vec<StreamEvent>) {
        for event in events {
            if let StreamEvent::UnexpectedStop { device_key, reason } = &event {
                warn!(key = %device_key, %reason, "capture stopped unexpectedly");
            }
            // No subscribers is fine.
            let _ = self.inner.event_tx.send(Arc::new(event));
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Sole consumer of channel messages and reconnect refreshes, so every
/// snapshot is merged on one task in the order it reached the session.
async fn dispatch_task(
    session: Session,
    mut messages: mpsc::Receiver<ChannelMessage>,
    mut refreshed: mpsc::Receiver<Snapshot>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(snapshot) = refreshed.recv() => session.apply_snapshot(snapshot),
            message = messages.recv() => match message {
                Some(message) => session.handle_message(message),
                None => break,
            },
        }
    }
    debug!("dispatch task exiting");
}

async fn mirror_channel_state(
    mut source: watch::Receiver<ChannelState>,
    target: watch::Sender<ChannelState>,
    cancel: CancellationToken,
) {
    target.send_replace(*source.borrow_and_update());
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = source.changed() => {
                if changed.is_err() {
                    break;
                }
                target.send_replace(*source.borrow_and_update());
            }
        }
    }
}
