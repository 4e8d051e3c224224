//! Basic CLI E2E tests.
//!
//! Each test runs the built binary with HOME pointed at a scratch
//! directory, so config and database files never touch the real profile.
//! None of these commands reach the network.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_codepet"))
        .args(args)
        .env("HOME", home)
        .env_remove("CODEPET_ENV")
        .env_remove("GITHUB_TOKEN")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_config_list_is_json_with_defaults() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "list"]);
    assert_eq!(code, 0);

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["cache"]["ttl_secs"], 3600);
    assert_eq!(parsed["upstream"]["timeout_secs"], 10);
    assert_eq!(parsed["retry"]["max_retries"], 3);
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "upstream.timeout_secs", "4"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "upstream.timeout_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "4");
    assert!(home.path().join(".config/codepet/config.toml").exists());
}

#[test]
fn test_config_get_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_link_stores_secondary_account() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) =
        run_cli(home.path(), &["leetcode", "link", "octocat", "octo_lc"]);
    assert_eq!(code, 0, "{stderr}");

    let ack: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ack["external_id"], "octocat");
    assert_eq!(ack["linked_secondary_id"], "octo_lc");
    assert_eq!(ack["replaced"], false);
    assert!(home.path().join(".config/codepet/codepet.db").exists());
}

#[test]
fn test_link_rejects_bad_username() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) =
        run_cli(home.path(), &["leetcode", "link", "octocat", "not valid!"]);
    assert_ne!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.contains("[400]"), "{stderr}");
}

#[test]
fn test_pet_rejects_bad_username_before_network() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["--no-retry", "pet", "../etc"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("[400]"), "{stderr}");
}
