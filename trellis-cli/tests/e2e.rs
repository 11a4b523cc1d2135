//! End-to-end tests for the trellis binary
//!
//! Gated behind the `integration` feature flag. Run with:
//!
//! ```sh
//! cargo test -p trellis-cli --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

/// Run `trellis` with a throwaway home and the given arguments.
fn trellis(dir: &Path, args: &[&str]) -> Output {
    let config = dir.join("config.toml");
    std::fs::write(
        &config,
        format!("home = {:?}\n", dir.join("home").display().to_string()),
    )
    .unwrap();

    Command::new(env!("CARGO_BIN_EXE_trellis"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env("XDG_CONFIG_HOME", dir)
        .env("TRELLIS_PROJECT_CONFIG_DIR", dir.join("project"))
        .output()
        .expect("Failed to run trellis")
}

#[test]
fn help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .arg("--help")
        .output()
        .expect("Failed to run trellis --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("motd"));
    assert!(stdout.contains("plugins"));
    assert!(stdout.contains("extensions"));
}

#[test]
fn motd_prints_json_message() {
    let dir = tempfile::tempdir().unwrap();
    let output = trellis(dir.path(), &["motd", "--json"]);

    assert!(output.status.success());
    let message: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(message["author"].is_string());
    assert!(message["text"].is_string());
}

#[test]
fn plugins_lists_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let output = trellis(dir.path(), &["plugins"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("acme.motd"));
    assert!(stdout.contains("acme.motd.software_quotes"));
}

#[test]
fn extensions_lists_contributed_messages() {
    let dir = tempfile::tempdir().unwrap();
    let output = trellis(dir.path(), &["extensions", "acme.motd.messages"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("  0  "));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(["--config", "/nonexistent/trellis.toml", "plugins"])
        .env("XDG_CONFIG_HOME", dir.path())
        .output()
        .expect("Failed to run trellis");

    assert!(!output.status.success());
}
