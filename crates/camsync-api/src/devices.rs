// Device endpoints: discovery, status, and the per-device control verbs.

use tracing::debug;

use crate::client::ControlClient;
use crate::error::Error;
use crate::models::{
    DeviceDto, DeviceListResponse, IntervalBody, ParametersDto, ParametersUpdate, RawSnapshot,
};

impl ControlClient {
    /// Enumerate devices known to the service.
    ///
    /// `GET /api/devices`
    pub async fn list_devices(&self) -> Result<Vec<DeviceDto>, Error> {
        let url = self.api_url(&["devices"])?;
        let resp: DeviceListResponse = self.get(url).await?;
        Ok(resp.into())
    }

    /// Current status of every device, in either snapshot shape.
    ///
    /// `GET /api/status`
    pub async fn get_status(&self) -> Result<RawSnapshot, Error> {
        let url = self.api_url(&["status"])?;
        self.get(url).await
    }

    /// `POST /api/devices/{key}/select`
    pub async fn select_device(&self, key: &str) -> Result<(), Error> {
        debug!(key, "selecting device");
        self.device_post(key, &["select"]).await
    }

    /// `POST /api/devices/{key}/preview/start`
    pub async fn start_preview(&self, key: &str) -> Result<(), Error> {
        self.device_post(key, &["preview", "start"]).await
    }

    /// `POST /api/devices/{key}/preview/stop`
    pub async fn stop_preview(&self, key: &str) -> Result<(), Error> {
        self.device_post(key, &["preview", "stop"]).await
    }

    /// `POST /api/devices/{key}/storage/start`
    pub async fn start_storage(&self, key: &str) -> Result<(), Error> {
        self.device_post(key, &["storage", "start"]).await
    }

    /// `POST /api/devices/{key}/storage/stop`
    pub async fn stop_storage(&self, key: &str) -> Result<(), Error> {
        self.device_post(key, &["storage", "stop"]).await
    }

    /// Trigger a single capture.
    ///
    /// `POST /api/devices/{key}/capture`
    ///
    /// Returns the stored image path when the service reports one.
    pub async fn capture_image(&self, key: &str) -> Result<Option<String>, Error> {
        let url = self.api_url(&["devices", key, "capture"])?;
        let body = self.post_empty(url).await?;
        Ok(body
            .get("path")
            .or_else(|| body.get("file"))
            .and_then(serde_json::Value::as_str)
            .map(String::from))
    }

    /// `PUT /api/devices/{key}/interval` with `{"seconds": n}`
    pub async fn set_interval(&self, key: &str, seconds: f64) -> Result<(), Error> {
        let url = self.api_url(&["devices", key, "interval"])?;
        debug!(key, seconds, "setting save interval");
        self.put(url, &IntervalBody { seconds }).await?;
        Ok(())
    }

    /// `GET /api/devices/{key}/parameters`
    pub async fn get_parameters(&self, key: &str) -> Result<ParametersDto, Error> {
        let url = self.api_url(&["devices", key, "parameters"])?;
        self.get(url).await
    }

    /// `PUT /api/devices/{key}/parameters`
    pub async fn set_parameters(&self, key: &str, update: &ParametersUpdate) -> Result<(), Error> {
        let url = self.api_url(&["devices", key, "parameters"])?;
        debug!(key, ?update, "updating parameters");
        self.put(url, update).await?;
        Ok(())
    }

    /// Restart the backing service. Privileged: sends the bearer token.
    ///
    /// `POST /api/service/restart`
    pub async fn restart_service(&self) -> Result<(), Error> {
        let url = self.api_url(&["service", "restart"])?;
        debug!("requesting service restart");
        self.post_authorized(url).await
    }

    async fn device_post(&self, key: &str, action: &[&str]) -> Result<(), Error> {
        let mut segments = vec!["devices", key];
        segments.extend_from_slice(action);
        let url = self.api_url(&segments)?;
        self.post_empty(url).await?;
        Ok(())
    }
}
