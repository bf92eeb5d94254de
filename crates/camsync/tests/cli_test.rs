//! Integration tests for the `camsync` CLI binary.
//!
//! Argument parsing, config handling and error exit codes run without a
//! service. Commands that talk to one run against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `camsync` binary with env isolation.
///
/// Clears all `CAMSYNC_*` variables and points the config file at
/// `config`, so tests never touch the user's real configuration.
fn camsync_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("camsync");
    cmd.env("CAMSYNC_CONFIG", config)
        .env("HOME", "/tmp/camsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/camsync-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("CAMSYNC_PROFILE")
        .env_remove("CAMSYNC_URL")
        .env_remove("CAMSYNC_TOKEN")
        .env_remove("CAMSYNC_OUTPUT")
        .env_remove("CAMSYNC_INSECURE")
        .env_remove("CAMSYNC_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a prepared command off the async runtime.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let file = dir.join("config.toml");
    std::fs::write(&file, body).unwrap();
    file
}

async fn mock_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "key": "cam0", "type": "industrial", "index": 0, "model": "acA1920" },
            { "key": "usb0", "type": "webcam", "index": 1 }
        ])))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = camsync_cmd(&dir.path().join("config.toml")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("camera")
                .and(predicate::str::contains("devices"))
                .and(predicate::str::contains("storage"))
                .and(predicate::str::contains("files")),
        );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("camsync"));
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .arg("foobar")
        .assert()
        .failure()
        .code(2);
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_devices_without_config_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .arg("devices")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No service configured"));
}

#[test]
fn test_unknown_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[profiles.lab]\nurl = \"http://127.0.0.1:9\"\n",
    );
    camsync_cmd(&config)
        .args(["-p", "prod", "devices"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("prod").and(predicate::str::contains("lab")));
}

#[test]
fn test_config_path_honours_env() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    camsync_cmd(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_show_redacts_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "default_profile = \"lab\"\n\n[profiles.lab]\nurl = \"http://cam-host:8000\"\ntoken = \"s3cret\"\n",
    );
    camsync_cmd(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("cam-host")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("s3cret").not()),
        );
}

#[test]
fn test_config_use_sets_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[profiles.lab]\nurl = \"http://lab:8000\"\n\n[profiles.line2]\nurl = \"http://line2:8000\"\n",
    );
    camsync_cmd(&config).args(["config", "use", "line2"]).assert().success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("default_profile = \"line2\""), "{written}");

    camsync_cmd(&config)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("line2 *"));
}

#[test]
fn test_config_use_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "[profiles.lab]\nurl = \"http://lab:8000\"\n");
    camsync_cmd(&config)
        .args(["config", "use", "nope"])
        .assert()
        .code(4);
}

// ── Local validation ────────────────────────────────────────────────

#[test]
fn test_invalid_interval_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .args(["--url", "http://127.0.0.1:9", "interval", "cam0", "0"])
        .assert()
        .code(2);
}

#[test]
fn test_restart_without_token() {
    let dir = tempfile::tempdir().unwrap();
    camsync_cmd(&dir.path().join("config.toml"))
        .args(["--url", "http://127.0.0.1:9", "--yes", "restart"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("token"));
}

// ── Against a service ───────────────────────────────────────────────

#[tokio::test]
async fn test_devices_plain_output() {
    let server = MockServer::start().await;
    mock_devices(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = camsync_cmd(&dir.path().join("config.toml"));
    cmd.args(["--url", &server.uri(), "-o", "plain", "devices"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "cam0\nusb0");
}

#[tokio::test]
async fn test_devices_json_output() {
    let server = MockServer::start().await;
    mock_devices(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = camsync_cmd(&dir.path().join("config.toml"));
    cmd.args(["--url", &server.uri(), "-o", "json", "devices"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["key"], "cam0");
    assert_eq!(parsed[1]["kind"], "webcam");
}

#[tokio::test]
async fn test_rejected_storage_start_keeps_service_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/devices/cam0/storage/start"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "detail": "Disk full: 0 bytes free" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = camsync_cmd(&dir.path().join("config.toml"));
    cmd.args(["--url", &server.uri(), "storage", "start", "cam0"]);

    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Disk full: 0 bytes free"));
}

#[tokio::test]
async fn test_files_ls_sorts_naturally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "img_10.png", "type": "file" },
            { "name": "img_2.png", "type": "file" },
            { "name": "run1", "type": "folder" }
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = camsync_cmd(&dir.path().join("config.toml"));
    cmd.args(["--url", &server.uri(), "-o", "plain", "files", "ls"]);

    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "run1\nimg_2.png\nimg_10.png"
    );
}
