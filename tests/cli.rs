//! Integration tests for the lakeshore binary.
//!
//! Each test runs the CLI with a scratch home directory so no user
//! configuration leaks in.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};

/// A lakeshore command isolated from the caller's configuration.
fn lakeshore(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lakeshore").unwrap();
    cmd.env_remove("LAKESHORE_CONFIG")
        .env_remove("RUST_LOG")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("xdg"));
    cmd
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn mint_prints_identifier() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args(["mint", "--prefix", "SI", "SI-101010"])
        .assert()
        .success()
        .stdout("233b76a6-193d-8deb-7346-593a3857f05e\n");
}

#[test]
fn mint_without_prefix_fails() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args(["mint", "SI-101010"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("without a prefix"));
}

#[test]
fn mint_uses_configured_default_prefix() {
    let home = TempDir::new().unwrap();
    let config = config_file("default_prefix = \"SI\"\n");
    lakeshore(&home)
        .arg("--config")
        .arg(config.path())
        .args(["mint", "SI-1"])
        .assert()
        .success()
        .stdout("81b41633-a935-37eb-0127-208c30b59758\n");
}

#[test]
fn xdg_config_is_discovered() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("xdg/lakeshore");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "default_prefix = \"SI\"\n").unwrap();

    lakeshore(&home)
        .args(["mint", "seed"])
        .assert()
        .success()
        .stdout("fe4c0f30-aa35-9c41-d9f9-a5f69c8c4192\n");
}

#[test]
fn verify_accepts_matching_identifier() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args([
            "verify",
            "--prefix",
            "SI",
            "SI-101010",
            "233b76a6-193d-8deb-7346-593a3857f05e",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("matches seed 'SI-101010'"));
}

#[test]
fn verify_rejects_mismatch() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args([
            "verify",
            "--prefix",
            "SI",
            "SI-101010",
            "81b41633-a935-37eb-0127-208c30b59758",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("identifier must match checksum"));
}

#[test]
fn verify_rejects_malformed_identifier() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args(["verify", "--prefix", "SI", "SI-101010", "not-an-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid identifier"));
}

#[test]
fn relations_lists_registry() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .arg("relations")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("RELATION")
                .and(predicate::str::contains("preferred_representation"))
                .and(predicate::str::contains("Has Files")),
        );
}

#[test]
fn relations_json_is_parseable() {
    let home = TempDir::new().unwrap();
    let output = lakeshore(&home)
        .args(["relations", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let defs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let defs = defs.as_array().unwrap();
    let members = defs
        .iter()
        .find(|d| d["name"] == "members")
        .expect("members relation listed");
    assert_eq!(members["exclusive"], true);
}

#[test]
fn config_shows_defaults_without_file() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("no config file found")
                .and(predicate::str::contains("duplicate_policy = \"warn\""))
                .and(predicate::str::contains("store_ms = 5000")),
        );
}

#[test]
fn config_shows_loaded_file() {
    let home = TempDir::new().unwrap();
    let config = config_file(
        "base_uri = \"https://repo.example/rest\"\nduplicate_policy = \"block\"\n",
    );
    lakeshore(&home)
        .arg("--config")
        .arg(config.path())
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("loaded from")
                .and(predicate::str::contains("duplicate_policy = \"block\""))
                .and(predicate::str::contains("https://repo.example/rest")),
        );
}

#[test]
fn invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config = config_file("unknown_key = 1\n");
    lakeshore(&home)
        .arg("--config")
        .arg(config.path())
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn version_flag_works() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lakeshore"));
}

#[test]
fn debug_flag_logs_to_stderr_only() {
    let home = TempDir::new().unwrap();
    lakeshore(&home)
        .args(["--debug", "mint", "--prefix", "SI", "SI-101010"])
        .assert()
        .success()
        .stdout("233b76a6-193d-8deb-7346-593a3857f05e\n")
        .stderr(predicate::str::contains("configuration loaded"));
}
