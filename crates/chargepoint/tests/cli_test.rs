//! Integration tests for the `chargepoint` binary.
//!
//! Argument parsing, config errors and a full `--once` cycle against a
//! mocked station API.
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `chargepoint` binary with env isolation.
fn chargepoint_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("chargepoint");
    cmd.env("HOME", "/tmp/chargepoint-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/chargepoint-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("CHARGEPOINT_CONFIG")
        .env_remove("CHARGEPOINT_INTERVAL")
        .env_remove("CHARGEPOINT_STATIONS")
        .env_remove("CHARGEPOINT_BASE_URL")
        .env_remove("CHARGEPOINT_TIMEOUT")
        .env_remove("CHARGEPOINT_DEBUG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    chargepoint_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ChargePoint")
            .and(predicate::str::contains("--config"))
            .and(predicate::str::contains("--once")),
    );
}

#[test]
fn test_version_flag() {
    chargepoint_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chargepoint"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    chargepoint_cmd().arg("--bogus").assert().code(2);
}

// ── Config errors ───────────────────────────────────────────────────

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    chargepoint_cmd()
        .args(["--once", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn test_duplicate_station_ids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[[stations]]\nid = \"A\"\n\n[[stations]]\nid = \"A\"\n",
    );
    chargepoint_cmd()
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate station id"));
}

#[test]
fn test_no_stations_prints_disconnected_tree() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "interval = 5\n");

    let output = chargepoint_cmd()
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success());
    let tree: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tree, json!({ "info": { "connection": false } }));
}

// ── Full cycle ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_once_prints_station_tree() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/station/info"))
        .and(query_param("deviceId", "ABC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "AVAILABLE",
            "stationName": "Garage Level 1",
            "ports": [{ "name": "A", "status": "AVAILABLE" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "base_url = \"{}\"\n\n[[stations]]\nid = \"ABC123\"\nname = \"Garage\"\n",
            server.uri()
        ),
    );

    let output = chargepoint_cmd()
        .arg("--once")
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let tree: Value = serde_json::from_slice(&output.stdout).unwrap();
    let station = &tree["stations"]["ABC123"];
    assert_eq!(station["info"]["status"], "AVAILABLE");
    assert_eq!(station["info"]["name"], "Garage Level 1");
    assert_eq!(station["info"]["portCount"], json!(1));
    assert_eq!(station["ports"]["1"]["name"], "A");
    assert_eq!(tree["info"]["connection"], true);
}

// ── Shutdown ────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_interrupt_during_first_cycle_shuts_down_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/station/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "AVAILABLE" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "base_url = \"{}\"\ntimeout = 30\n\n[[stations]]\nid = \"ABC123\"\n",
            server.uri()
        ),
    );

    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_chargepoint"))
        .arg("--config")
        .arg(&config)
        .env("HOME", "/tmp/chargepoint-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/chargepoint-cli-test-nonexistent")
        .env_remove("RUST_LOG")
        .env_remove("CHARGEPOINT_CONFIG")
        .env_remove("CHARGEPOINT_INTERVAL")
        .env_remove("CHARGEPOINT_STATIONS")
        .env_remove("CHARGEPOINT_BASE_URL")
        .env_remove("CHARGEPOINT_TIMEOUT")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    // Wait until the first cycle is in flight.
    let deadline = Instant::now() + Duration::from_secs(10);
    while server.received_requests().await.unwrap_or_default().is_empty() {
        assert!(Instant::now() < deadline, "first cycle never started");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let killed = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("chargepoint did not exit after SIGINT");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(status.success(), "{status:?}");
}
