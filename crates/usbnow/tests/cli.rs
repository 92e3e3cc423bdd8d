#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

const MISSING_PORT: &str = "/dev/usbnow-does-not-exist";

fn usbnow(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_usbnow"))
        .args(args)
        .env_remove("USBNOW_PORT")
        .env_remove("USBNOW_BAUD")
        .output()
        .expect("usbnow binary should run")
}

fn unique_temp_file(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "usbnow-cli-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("temp file should be writable");
    path
}

#[test]
fn version_prints_package_version() {
    let out = usbnow(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("usbnow {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_port_is_transport_error() {
    let out = usbnow(&["info", MISSING_PORT]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

#[test]
fn zero_timeout_is_usage_error() {
    let out = usbnow(&["--timeout", "0s", "info", MISSING_PORT]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn bad_destination_rejected_before_opening_port() {
    let out = usbnow(&["send", MISSING_PORT, "--to", "not-an-address", "--data", "hi"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn send_without_payload_is_usage_error() {
    let out = usbnow(&["send", MISSING_PORT, "--to", "FF:FF:FF:FF:FF:FF"]);
    assert_eq!(out.status.code(), Some(64));
}

#[test]
fn invalid_peer_file_is_data_invalid() {
    let path = unique_temp_file(
        "bad-peers",
        r#"[{"address": "24:6F:28:AA:BB:CC", "channel": 99}]"#,
    );
    let out = usbnow(&["peers", MISSING_PORT, "load", path.to_str().expect("utf-8 path")]);
    let _ = std::fs::remove_file(&path);

    assert_eq!(out.status.code(), Some(60));
}

#[test]
fn missing_peer_file_is_usage_error() {
    let out = usbnow(&["peers", MISSING_PORT, "load", "/nonexistent/usbnow-peers.json"]);
    assert_eq!(out.status.code(), Some(64));
}
