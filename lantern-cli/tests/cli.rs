//! Drives the `lantern` binary end to end

use lantern_core::config::Config;
use std::process::{Command, Output};
use tempfile::TempDir;

fn lantern(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lantern"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run lantern binary")
}

fn write_config(dir: &TempDir, tweak: impl FnOnce(&mut Config)) -> String {
    let mut config = Config::default();
    config.account.username = "bob@example.com".to_string();
    config.account.password = "hunter2".to_string();
    config.account.country_code = "DE".to_string();
    tweak(&mut config);

    let path = dir.path().join("lantern.toml");
    config.save_to_file(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_classify_uses_configured_markers() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, |c| c.discovery.cloud_markers = vec!["example-cloud".to_string()]);

    let output = lantern(&[
        "--config",
        &config,
        "classify",
        "relay@proxy.example-cloud.net",
        "--self",
        "bob@example.com/-lan-2",
    ]);
    assert!(output.status.success());

    let verdict = stdout_json(&output);
    assert_eq!(verdict["kind"], "server_managed");
    assert_eq!(verdict["port"], 443);
}

#[test]
fn test_config_masks_password() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, |_| {});

    let output = lantern(&["--config", &config, "config"]);
    assert!(output.status.success());

    let shown = stdout_json(&output);
    assert_eq!(shown["account"]["username"], "bob@example.com");
    assert_eq!(shown["account"]["password"], "********");
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, |c| c.discovery.hub_identifier = "not-an-account".to_string());

    let output = lantern(&["--config", &config, "config"]);
    assert!(!output.status.success());
}

#[test]
fn test_report_carries_country() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, |_| {});

    let output = lantern(&["--config", &config, "report"]);
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["countryCode"], "DE");
    assert_eq!(report["bytesProxied"], 0);
    assert!(report["whitelistAdditions"].as_array().unwrap().is_empty());
}

#[test]
fn test_probe_closed_port_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, |_| {});

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let address = format!("127.0.0.1:{}", port);

    let output = lantern(&["--config", &config, "probe", &address, "--timeout", "2"]);
    assert!(!output.status.success());
    assert_eq!(stdout_json(&output)["reachable"], false);
}
