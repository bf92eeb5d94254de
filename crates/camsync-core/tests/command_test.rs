// Integration tests for `CommandClient` and `Session` commands using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camsync_api::ControlClient;
use camsync_core::{
    CommandClient, ControlChange, CoreError, DeviceKey, DiscoveryPolicy, RunState, SelectOutcome,
    Session, SessionConfig, SettingsUpdate,
};

// ── Helpers ─────────────────────────────────────────────────────────

const FAST: DiscoveryPolicy = DiscoveryPolicy {
    attempts: 5,
    delay: Duration::from_millis(10),
};

async fn setup() -> (MockServer, CommandClient) {
    let server = MockServer::start().await;
    let api = ControlClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, CommandClient::new(Arc::new(api), FAST))
}

fn session_for(server: &MockServer) -> Session {
    let mut config = SessionConfig::new(Url::parse(&server.uri()).unwrap());
    config.discovery = FAST;
    Session::new(config).unwrap()
}

fn devices_body() -> serde_json::Value {
    json!([
        { "key": "cam0", "type": "industrial", "index": 0 },
        { "key": "usb0", "type": "webcam", "index": 1 }
    ])
}

async fn mount_ok(server: &MockServer, verb: &str, route: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discovery_recovers_after_three_failures() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("camera bus busy"))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices[0].capabilities.parameters);
    assert!(!devices[1].capabilities.parameters);
}

#[tokio::test]
async fn test_discovery_exhausted() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(5)
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    match err {
        CoreError::DiscoveryExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 5);
            assert!(last_error.contains("down"), "{last_error}");
        }
        other => panic!("expected DiscoveryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_discovery_drops_duplicate_keys() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "key": "cam0", "type": "industrial", "displayName": "first" },
            { "key": "cam0", "type": "webcam", "displayName": "second" }
        ])))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].display_name, "first");
}

// ── Rejections ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejection_carries_detail_verbatim() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/storage/start"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "detail": "Disk full: 0 bytes free" })),
        )
        .mount(&server)
        .await;

    let err = client.start_storage(&DeviceKey::new("cam0")).await.unwrap_err();
    match err {
        CoreError::CommandRejected {
            operation,
            status,
            detail,
        } => {
            assert_eq!(operation, "start storage");
            assert_eq!(status, Some(409));
            assert_eq!(detail, "Disk full: 0 bytes free");
        }
        other => panic!("expected CommandRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mutations_are_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/capture"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.capture_image(&DeviceKey::new("cam0")).await.is_err());
}

#[tokio::test]
async fn test_invalid_interval_sends_nothing() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let key = DeviceKey::new("cam0");
    for bad in [0.0, -1.0, f64::NAN] {
        let err = client.set_interval(&key, bad).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
    }
}

#[tokio::test]
async fn test_restart_without_token_is_config_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.restart_service().await.unwrap_err();
    assert!(matches!(err, CoreError::Config { .. }), "{err:?}");
}

// ── Expected-stop markers ───────────────────────────────────────────

#[tokio::test]
async fn test_stop_preview_sets_marker() {
    let (server, client) = setup().await;
    mount_ok(&server, "POST", "/api/devices/cam0/preview/stop").await;

    let key = DeviceKey::new("cam0");
    client.stop_preview(&key).await.unwrap();
    assert!(client.expected_stops().contains(&key));
}

#[tokio::test]
async fn test_failed_stop_preview_removes_marker() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/preview/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "stuck" })))
        .mount(&server)
        .await;

    let key = DeviceKey::new("cam0");
    assert!(client.stop_preview(&key).await.is_err());
    assert!(!client.expected_stops().contains(&key));
}

#[tokio::test]
async fn test_start_preview_clears_stale_marker() {
    let (server, client) = setup().await;
    mount_ok(&server, "POST", "/api/devices/cam0/preview/stop").await;
    mount_ok(&server, "POST", "/api/devices/cam0/preview/start").await;

    let key = DeviceKey::new("cam0");
    client.stop_preview(&key).await.unwrap();
    client.start_preview(&key).await.unwrap();
    assert!(!client.expected_stops().contains(&key));
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_chain_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    mount_ok(&server, "POST", "/api/devices/cam0/select").await;
    mount_ok(&server, "POST", "/api/devices/cam0/preview/start").await;
    mount_ok(&server, "POST", "/api/devices/usb0/preview/stop").await;
    mount_ok(&server, "POST", "/api/devices/usb0/select").await;
    mount_ok(&server, "POST", "/api/devices/usb0/preview/start").await;
    Mock::given(method("GET"))
        .and(path("/api/devices/cam0/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exposure": { "auto": false, "min": 10.0, "max": 1000.0, "current": 100.0 },
            "gain": { "auto": true, "min": 0.0, "max": 24.0 }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": {
                "cam0": { "preview": "running", "storage": "stopped" },
                "usb0": { "preview": "stopped", "storage": "stopped" }
            }
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.refresh_devices().await.unwrap();
    session.refresh_status().await.unwrap();

    let outcome = session.select_device(&DeviceKey::new("cam0")).await.unwrap();
    let SelectOutcome::Selected(selection) = outcome else {
        panic!("first select was superseded");
    };
    assert!(selection.errors.is_empty());
    assert_eq!(
        selection.parameters.unwrap().exposure.current,
        Some(100.0)
    );

    // Webcams expose no parameters, so no fetch follows.
    let outcome = session.select_device(&DeviceKey::new("usb0")).await.unwrap();
    let SelectOutcome::Selected(selection) = outcome else {
        panic!("second select was superseded");
    };
    assert!(selection.parameters.is_none());
    assert_eq!(session.commands().selected(), Some(DeviceKey::new("usb0")));

    assert_eq!(
        request_paths(&server).await,
        [
            "GET /api/devices",
            "GET /api/status",
            "POST /api/devices/cam0/select",
            "POST /api/devices/cam0/preview/start",
            "GET /api/devices/cam0/parameters",
            "POST /api/devices/cam0/preview/stop",
            "POST /api/devices/usb0/select",
            "POST /api/devices/usb0/preview/start",
        ]
    );
}

#[tokio::test]
async fn test_select_failure_in_chain_keeps_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    mount_ok(&server, "POST", "/api/devices/usb0/select").await;
    Mock::given(method("POST"))
        .and(path("/api/devices/usb0/preview/start"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "no signal" })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let outcome = session.select_device(&DeviceKey::new("usb0")).await.unwrap();
    let SelectOutcome::Selected(selection) = outcome else {
        panic!("select was superseded");
    };
    assert_eq!(selection.errors.len(), 1);
    assert!(selection.errors[0].to_string().contains("no signal"));
    assert_eq!(session.commands().selected(), Some(DeviceKey::new("usb0")));
}

#[tokio::test]
async fn test_superseded_select_stops_early() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/select"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/preview/start"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_ok(&server, "POST", "/api/devices/usb0/select").await;
    mount_ok(&server, "POST", "/api/devices/usb0/preview/start").await;

    let session = session_for(&server);
    session.refresh_devices().await.unwrap();

    let cam0 = DeviceKey::new("cam0");
    let slow = session.select_device(&cam0);
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.select_device(&DeviceKey::new("usb0")).await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert!(matches!(slow.unwrap(), SelectOutcome::Superseded));
    assert!(matches!(fast.unwrap(), SelectOutcome::Selected(_)));
    assert_eq!(session.commands().selected(), Some(DeviceKey::new("usb0")));
}

#[tokio::test]
async fn test_select_unknown_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let err = session.select_device(&DeviceKey::new("nope")).await.unwrap_err();
    assert!(matches!(err, CoreError::DeviceNotFound { .. }), "{err:?}");
}

// ── Session echo ────────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_command_is_echoed_into_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": { "cam0": { "preview": "stopped", "storage": "stopped", "interval": 2.0 } }
        })))
        .mount(&server)
        .await;
    mount_ok(&server, "POST", "/api/devices/cam0/storage/start").await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/cam0/interval"))
        .and(body_json(json!({ "seconds": 5.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.refresh_status().await.unwrap();
    let key = DeviceKey::new("cam0");

    session.start_storage(&key).await.unwrap();
    session.set_interval(&key, 5.0).await.unwrap();

    let state = session.snapshot();
    let status = state.get("cam0").unwrap();
    assert_eq!(status.storage, RunState::Running);
    assert_eq!(status.preview, RunState::Stopped);
    assert!((status.save_interval_secs - 5.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_update_settings_validates_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/cam0/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exposure": { "auto": false, "min": 10.0, "max": 1000.0, "current": 100.0 },
            "gain": { "auto": true, "min": 0.0, "max": 24.0 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/cam0/parameters"))
        .and(body_json(json!({ "exposure": { "value": 500.0 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let key = DeviceKey::new("cam0");

    let too_high = SettingsUpdate {
        exposure: Some(ControlChange {
            auto: None,
            value: Some(5000.0),
        }),
        gain: None,
    };
    let err = session.update_settings(&key, &too_high).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");

    let auto_gain = SettingsUpdate {
        exposure: None,
        gain: Some(ControlChange {
            auto: None,
            value: Some(6.0),
        }),
    };
    let err = session.update_settings(&key, &auto_gain).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");

    let ok = SettingsUpdate {
        exposure: Some(ControlChange {
            auto: None,
            value: Some(500.0),
        }),
        gain: None,
    };
    let applied = session.update_settings(&key, &ok).await.unwrap();
    assert_eq!(applied.exposure.current, Some(500.0));
}

#[tokio::test]
async fn test_status_without_parameters_validates_against_fetched_bounds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": { "cam0": { "preview": "running", "storage": "stopped" } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/cam0/parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exposure": { "auto": false, "min": 10.0, "max": 1000.0 },
            "gain": { "auto": false, "min": 0.0, "max": 24.0 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.refresh_status().await.unwrap();
    let key = DeviceKey::new("cam0");
    assert_eq!(session.snapshot().get("cam0").unwrap().parameters, None);

    let update = SettingsUpdate {
        exposure: Some(ControlChange {
            auto: None,
            value: Some(5000.0),
        }),
        gain: None,
    };
    let err = session.update_settings(&key, &update).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn test_update_settings_on_webcam_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for(&server);
    let update = SettingsUpdate {
        exposure: Some(ControlChange {
            auto: Some(true),
            value: None,
        }),
        gain: None,
    };
    let err = session
        .update_settings(&DeviceKey::new("usb0"), &update)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
}
