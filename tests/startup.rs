//! Process-level startup behaviour of the `rider-bff` binary.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};

mod common;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn run(args: &[&str], dir: &Path, env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rider-bff"));
    command
        .args(args)
        .current_dir(dir)
        .env_remove("APP_ENV")
        .env_remove("NODE_ENV")
        .env_remove("BFF_CONFIG")
        .env_remove("PROXY_URL")
        .env("RUST_LOG", "info");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().unwrap()
}

#[test]
fn corrupt_bundle_fails_before_binding() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("build/server/bundle.json");
    std::fs::create_dir_all(bundle.parent().unwrap()).unwrap();
    std::fs::write(&bundle, "{ this is not a bundle").unwrap();

    let port = free_port();
    let port_var = port.to_string();
    let output = run(
        &["--mode", "production", "serve"],
        dir.path(),
        &[("PORT", port_var.as_str())],
    );

    assert_eq!(output.status.code(), Some(1));
    let logs = String::from_utf8_lossy(&output.stdout);
    assert!(logs.contains("Startup failed"), "{logs}");
    assert!(!logs.contains("HTTP server starting"), "{logs}");
    // Nothing was left bound.
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[test]
fn invalid_configuration_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[], dir.path(), &[("PROXY_URL", "ftp://api.internal")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"), "{stderr}");
}

#[test]
fn build_writes_bundle() {
    let dir = tempfile::tempdir().unwrap();
    common::write_app(&dir.path().join("app"));

    let output = run(&["build"], dir.path(), &[]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));

    let bundle = std::fs::read_to_string(dir.path().join("build/server/bundle.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&bundle).unwrap();
    assert_eq!(value["format_version"], 1);
    assert_eq!(value["routes"].as_array().unwrap().len(), 2);
}

#[test]
fn build_reports_compile_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("app");
    common::write_app(&app);
    std::fs::write(app.join("routes/about.html"), "{{ params.id }}").unwrap();

    let output = run(&["build"], dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("build/server/bundle.json").exists());
}
