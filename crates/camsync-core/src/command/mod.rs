// ── Command API ──
//
// Control operations against the service. Every mutating call is one
// request and is never retried: repeating a camera command could repeat a
// physical action. Discovery is the exception and retries on a fixed
// schedule, since enumeration can race hardware start-up.

pub mod markers;
pub mod requests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use camsync_api::ControlClient;

use crate::convert::{descriptors_from_dtos, snapshot_from_raw};
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, DeviceKey, DeviceParameters, DeviceStateMap};
use crate::reconcile::Snapshot;

pub use markers::{DEFAULT_EXPECTED_STOP_TTL, ExpectedStops};
pub use requests::{ControlChange, SettingsUpdate};

// ── Discovery policy ─────────────────────────────────────────────────

/// Fixed-delay retry schedule for device discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    /// Total attempts, including the first. At least one is always made.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

// ── Select outcome ───────────────────────────────────────────────────

/// Result of a committed selection.
#[derive(Debug)]
pub struct Selection {
    pub key: DeviceKey,
    /// Fetched when the device exposes parameters and the fetch succeeded.
    pub parameters: Option<DeviceParameters>,
    /// Failures of the chained steps. The selection stands regardless.
    pub errors: Vec<CoreError>,
}

#[derive(Debug)]
pub enum SelectOutcome {
    Selected(Selection),
    /// A newer `select_device` call took over; this one stopped early.
    Superseded,
}

// ── CommandClient ────────────────────────────────────────────────────

/// Issues control operations and owns the discovery retry policy.
///
/// Cheaply cloneable; clones share the expected-stop markers and the
/// single-flight selection state.
#[derive(Clone)]
pub struct CommandClient {
    inner: Arc<CommandInner>,
}

struct CommandInner {
    api: Arc<ControlClient>,
    discovery: DiscoveryPolicy,
    implicit_key: Option<DeviceKey>,
    markers: Arc<ExpectedStops>,
    select_generation: AtomicU64,
    selected: ArcSwapOption<DeviceKey>,
    state: Option<watch::Receiver<Arc<DeviceStateMap>>>,
}

impl CommandClient {
    pub fn new(api: Arc<ControlClient>, discovery: DiscoveryPolicy) -> Self {
        Self::builder(api, discovery).build()
    }

    pub fn builder(api: Arc<ControlClient>, discovery: DiscoveryPolicy) -> CommandClientBuilder {
        CommandClientBuilder {
            api,
            discovery,
            implicit_key: None,
            markers: None,
            state: None,
        }
    }

    pub fn api(&self) -> &Arc<ControlClient> {
        &self.inner.api
    }

    pub fn expected_stops(&self) -> &Arc<ExpectedStops> {
        &self.inner.markers
    }

    /// The device the last committed selection chose.
    pub fn selected(&self) -> Option<DeviceKey> {
        self.inner.selected.load_full().map(|k| (*k).clone())
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Enumerate devices, retrying on failure.
    ///
    /// Duplicate keys are dropped (first wins). When every attempt fails
    /// the result is [`CoreError::DiscoveryExhausted`].
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, CoreError> {
        let policy = self.inner.discovery;
        let attempts = policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.inner.api.list_devices().await {
                Ok(dtos) => {
                    let descriptors = descriptors_from_dtos(dtos);
                    debug!(attempt, count = descriptors.len(), "discovery complete");
                    return Ok(descriptors);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "device discovery failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        Err(CoreError::DiscoveryExhausted {
            attempts,
            last_error,
        })
    }

    /// Current status of every device, normalized.
    pub async fn fetch_status(&self) -> Result<Snapshot, CoreError> {
        let raw = self.inner.api.get_status().await?;
        Ok(snapshot_from_raw(raw, self.inner.implicit_key.as_ref()))
    }

    pub async fn get_parameters(&self, key: &DeviceKey) -> Result<DeviceParameters, CoreError> {
        let dto = self
            .inner
            .api
            .get_parameters(key.as_str())
            .await
            .map_err(CoreError::rejected("get parameters"))?;
        Ok(dto.into())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Start preview. Any stop marker left for `key` is dropped first: a
    /// stop seen after a restart is not the one it was set for.
    pub async fn start_preview(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.markers.remove(key);
        self.inner
            .api
            .start_preview(key.as_str())
            .await
            .map_err(CoreError::rejected("start preview"))
    }

    /// Stop preview. An expected-stop marker is set before the request
    /// so the resulting transition is not reported as unexpected.
    pub async fn stop_preview(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner.markers.insert(key.clone());
        let result = self.inner.api.stop_preview(key.as_str()).await;
        if result.is_err() {
            self.inner.markers.remove(key);
        }
        result.map_err(CoreError::rejected("stop preview"))
    }

    pub async fn start_storage(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner
            .api
            .start_storage(key.as_str())
            .await
            .map_err(CoreError::rejected("start storage"))
    }

    pub async fn stop_storage(&self, key: &DeviceKey) -> Result<(), CoreError> {
        self.inner
            .api
            .stop_storage(key.as_str())
            .await
            .map_err(CoreError::rejected("stop storage"))
    }

    /// Trigger one capture; returns the stored path when reported.
    pub async fn capture_image(&self, key: &DeviceKey) -> Result<Option<String>, CoreError> {
        self.inner
            .api
            .capture_image(key.as_str())
            .await
            .map_err(CoreError::rejected("capture image"))
    }

    pub async fn set_interval(&self, key: &DeviceKey, seconds: f64) -> Result<(), CoreError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(CoreError::ValidationFailed {
                message: format!("save interval must be a positive number of seconds, got {seconds}"),
            });
        }
        self.inner
            .api
            .set_interval(key.as_str(), seconds)
            .await
            .map_err(CoreError::rejected("set interval"))
    }

    /// Validate against `bounds`, then send. Returns the parameters as
    /// they stand after the update.
    pub async fn update_settings(
        &self,
        key: &DeviceKey,
        update: &SettingsUpdate,
        bounds: &DeviceParameters,
    ) -> Result<DeviceParameters, CoreError> {
        update.validate(bounds)?;
        self.inner
            .api
            .set_parameters(key.as_str(), &(*update).into())
            .await
            .map_err(CoreError::rejected("update settings"))?;
        Ok(update.applied_to(bounds))
    }

    /// Restart the backing service. Needs the bearer service token.
    pub async fn restart_service(&self) -> Result<(), CoreError> {
        if !self.inner.api.has_service_token() {
            return Err(CoreError::Config {
                message: "restarting the service requires a service token".into(),
            });
        }
        info!("requesting service restart");
        self.inner
            .api
            .restart_service()
            .await
            .map_err(CoreError::rejected("restart service"))
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Select a device, single-flight.
    ///
    /// Sequence: stop preview on the previous selection (when different
    /// and running), select, start preview, fetch parameters. Each call
    /// takes a new generation; once a newer call starts, this one returns
    /// [`SelectOutcome::Superseded`] at its next step and issues nothing
    /// further. The selection is committed as soon as the select request
    /// succeeds; later failures are reported in [`Selection::errors`].
    pub async fn select_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<SelectOutcome, CoreError> {
        let generation = self.inner.select_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let key = &device.key;
        let mut errors = Vec::new();

        if let Some(previous) = self.selected() {
            if previous != *key && self.is_preview_running(&previous) {
                debug!(previous = %previous, "stopping preview on previous selection");
                if let Err(e) = self.stop_preview(&previous).await {
                    warn!(previous = %previous, error = %e, "failed to stop previous preview");
                    errors.push(e);
                }
                if !self.is_current(generation) {
                    return Ok(SelectOutcome::Superseded);
                }
            }
        }

        self.inner
            .api
            .select_device(key.as_str())
            .await
            .map_err(CoreError::rejected("select device"))?;
        if !self.is_current(generation) {
            return Ok(SelectOutcome::Superseded);
        }
        self.inner.selected.store(Some(Arc::new(key.clone())));
        info!(key = %key, "device selected");

        if let Err(e) = self.start_preview(key).await {
            warn!(key = %key, error = %e, "preview did not start after select");
            errors.push(e);
        }
        if !self.is_current(generation) {
            return Ok(SelectOutcome::Superseded);
        }

        let mut parameters = None;
        if device.capabilities.parameters {
            match self.get_parameters(key).await {
                Ok(p) => parameters = Some(p),
                Err(e) => {
                    warn!(key = %key, error = %e, "parameter fetch failed after select");
                    errors.push(e);
                }
            }
            if !self.is_current(generation) {
                return Ok(SelectOutcome::Superseded);
            }
        }

        Ok(SelectOutcome::Selected(Selection {
            key: key.clone(),
            parameters,
            errors,
        }))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.select_generation.load(Ordering::SeqCst) == generation
    }

    /// Without a state view, assume running: stopping is idempotent.
    fn is_preview_running(&self, key: &DeviceKey) -> bool {
        self.inner
            .state
            .as_ref()
            .is_none_or(|rx| rx.borrow().is_preview_running(key.as_str()))
    }
}

// ── Builder ──────────────────────────────────────────────────────────

pub struct CommandClientBuilder {
    api: Arc<ControlClient>,
    discovery: DiscoveryPolicy,
    implicit_key: Option<DeviceKey>,
    markers: Option<Arc<ExpectedStops>>,
    state: Option<watch::Receiver<Arc<DeviceStateMap>>>,
}

impl CommandClientBuilder {
    /// Key for single-device snapshots that do not name their device.
    pub fn implicit_key(mut self, key: Option<DeviceKey>) -> Self {
        self.implicit_key = key;
        self
    }

    pub fn expected_stops(mut self, markers: Arc<ExpectedStops>) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Live state used to decide whether the previous selection is running.
    pub fn state(mut self, state: watch::Receiver<Arc<DeviceStateMap>>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> CommandClient {
        CommandClient {
            inner: Arc::new(CommandInner {
                api: self.api,
                discovery: self.discovery,
                implicit_key: self.implicit_key,
                markers: self.markers.unwrap_or_default(),
                select_generation: AtomicU64::new(0),
                selected: ArcSwapOption::empty(),
                state: self.state,
            }),
        }
    }
}
