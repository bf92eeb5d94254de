// Control service HTTP client
//
// Wraps `reqwest::Client` with URL construction, error-body extraction,
// and bearer-token injection for privileged calls. Endpoint groups
// (devices, files) are implemented as inherent methods in separate files
// to keep this module focused on transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Error body shape the control service uses for rejections.
///
/// `detail` is usually a string, but validation failures carry a
/// structured value; both are surfaced verbatim.
#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Raw HTTP client for the control service.
///
/// All methods return decoded payloads or an [`Error::Api`] carrying the
/// service's own detail string. Nothing here retries; retry policy lives
/// in `camsync-core`.
pub struct ControlClient {
    http: reqwest::Client,
    base_url: Url,
    service_token: Option<SecretString>,
}

impl ControlClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the service root (e.g. `http://10.0.0.5:8000`); API
    /// paths are appended below it, so a reverse-proxy prefix is kept.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            service_token: None,
        }
    }

    /// Attach the bearer credential used by privileged endpoints.
    pub fn with_service_token(mut self, token: SecretString) -> Self {
        self.service_token = Some(token);
        self
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_service_token(&self) -> bool {
        self.service_token.is_some()
    }

    /// Derive the live-channel URL from the base URL and a channel path.
    ///
    /// `http` maps to `ws`, `https` to `wss`; any base path prefix is kept.
    pub fn channel_url(&self, ws_path: &str) -> Result<Url, Error> {
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        let base = self.base_url.as_str().trim_end_matches('/');
        let rest = base
            .split_once("://")
            .map_or(base, |(_, rest)| rest);
        let path = ws_path.trim_start_matches('/');
        Ok(Url::parse(&format!("{scheme}://{rest}/{path}"))?)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{segments...}`, percent-encoding each segment.
    ///
    /// Device keys are opaque and may contain `/` or `:`, so they are
    /// always pushed as single segments rather than formatted into a path.
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().push("api");
            path.extend(segments);
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    pub(crate) async fn get_with_params<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, &str)],
    ) -> Result<T, Error> {
        debug!("GET {url} params={params:?}");
        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    pub(crate) async fn get_bytes(
        &self,
        url: Url,
        params: &[(&str, &str)],
    ) -> Result<bytes::Bytes, Error> {
        debug!("GET {url} params={params:?} (binary)");
        let resp = self.http.get(url).query(params).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp.bytes().await?)
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    /// POST with no body; the response body (if any) is returned as JSON,
    /// `Null` when empty.
    pub(crate) async fn post_empty(&self, url: Url) -> Result<serde_json::Value, Error> {
        debug!("POST {url}");
        let resp = self.http.post(url).send().await?;
        self.handle_value(resp).await
    }

    pub(crate) async fn post_authorized(&self, url: Url) -> Result<(), Error> {
        debug!("POST {url} (authorized)");
        let Some(token) = self.service_token.as_ref() else {
            return Err(Error::Unauthorized {
                detail: "no service token configured".into(),
            });
        };
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    pub(crate) async fn put<B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<serde_json::Value, Error> {
        debug!("PUT {url}");
        let resp = self.http.put(url).json(body).send().await?;
        self.handle_value(resp).await
    }

    pub(crate) async fn delete_with_params(
        &self,
        url: Url,
        params: &[(&str, &str)],
    ) -> Result<(), Error> {
        debug!("DELETE {url} params={params:?}");
        let resp = self.http.delete(url).query(params).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    /// Like `handle_response`, but tolerates empty and non-JSON success bodies.
    async fn handle_value(&self, resp: reqwest::Response) -> Result<serde_json::Value, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(self.parse_error(status, resp).await);
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let detail = extract_detail(&raw).unwrap_or_else(|| {
            if raw.trim().is_empty() {
                status.to_string()
            } else {
                raw
            }
        });

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Error::Unauthorized { detail };
        }

        Error::Api {
            status: status.as_u16(),
            detail,
        }
    }
}

/// Pull the human-readable detail out of an error body, if it has one.
fn extract_detail(raw: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(raw).ok()?;
    match body.detail {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Null) | None => body.message,
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ControlClient {
        ControlClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_encodes_opaque_keys() {
        let c = client("http://10.0.0.5:8000");
        let url = c.api_url(&["devices", "usb/cam:0", "select"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.0.5:8000/api/devices/usb%2Fcam:0/select"
        );
    }

    #[test]
    fn api_url_keeps_base_prefix() {
        let c = client("https://lab.example/cameras/");
        let url = c.api_url(&["status"]).unwrap();
        assert_eq!(url.as_str(), "https://lab.example/cameras/api/status");
    }

    #[test]
    fn channel_url_switches_scheme() {
        assert_eq!(
            client("http://10.0.0.5:8000").channel_url("/ws").unwrap().as_str(),
            "ws://10.0.0.5:8000/ws"
        );
        assert_eq!(
            client("https://lab.example/cameras").channel_url("ws").unwrap().as_str(),
            "wss://lab.example/cameras/ws"
        );
    }

    #[test]
    fn detail_string_is_verbatim() {
        assert_eq!(
            extract_detail(r#"{"detail":"Camera busy: capture in progress"}"#).as_deref(),
            Some("Camera busy: capture in progress")
        );
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let detail = extract_detail(r#"{"detail":[{"loc":["body","seconds"]}]}"#).unwrap();
        assert!(detail.contains("seconds"));
    }

    #[test]
    fn message_field_is_a_fallback() {
        assert_eq!(
            extract_detail(r#"{"message":"nope"}"#).as_deref(),
            Some("nope")
        );
        assert!(extract_detail("plain text").is_none());
    }
}
