//! Integration tests for the `fbfuse` binary.
//!
//! These cover argument parsing, help output and configuration checking;
//! none of them start the control server.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fbfuse` binary with env isolation.
///
/// Starts from an empty environment and points config directories at a
/// nonexistent path so tests never read the user's real configuration.
fn fbfuse_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fbfuse");
    cmd.env_clear()
        .env("HOME", "/tmp/fbfuse-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fbfuse-cli-test-nonexistent");
    cmd
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fbfuse_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    fbfuse_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("beamformer")
            .and(predicate::str::contains("serve"))
            .and(predicate::str::contains("check-config")),
    );
}

#[test]
fn test_version_flag() {
    fbfuse_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fbfuse"));
}

#[test]
fn test_unknown_subcommand_fails() {
    fbfuse_cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ── check-config ────────────────────────────────────────────────────

#[test]
fn test_check_config_prints_defaults() {
    fbfuse_cmd().arg("check-config").assert().success().stdout(
        predicate::str::contains("[controller.beam_defaults]")
            .and(predicate::str::contains("port = 5000"))
            .and(predicate::str::contains("spead://239.11.1.0+255:7147")),
    );
}

#[test]
fn test_check_config_reads_file_and_environment() {
    let file = config_file(
        r#"
        [server]
        port = 7147

        [controller]
        groups_per_worker = 2
        "#,
    );
    fbfuse_cmd()
        .args(["check-config", "--json", "--config"])
        .arg(file.path())
        .env("FBFUSE_CONTROLLER__DUMMY", "true")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"port\": 7147")
                .and(predicate::str::contains("\"groups_per_worker\": 2"))
                .and(predicate::str::contains("\"dummy\": true")),
        );
}

#[test]
fn test_check_config_rejects_invalid_values() {
    let file = config_file(
        r#"
        [controller]
        multicast_range = "spead://10.0.0.1+3:7147"
        "#,
    );
    fbfuse_cmd()
        .arg("check-config")
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("controller.multicast_range"));
}

#[test]
fn test_missing_config_file() {
    fbfuse_cmd()
        .args(["check-config", "--config", "/nonexistent/fbfuse.toml"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Configuration file not found"));
}
