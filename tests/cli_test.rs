// ABOUTME: Binary-level tests for argument handling and exit status
// ABOUTME: Runs the compiled CLI with a cleared environment

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cassandra-shift-cli"));
    cmd.env_clear();
    cmd
}

#[test]
fn test_cli_help_lists_options() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--contact-points"))
        .stdout(predicate::str::contains("--local-data-center"))
        .stdout(predicate::str::contains("--ensure-keyspace"))
        .stdout(predicate::str::contains("--number-of-clients"));
}

#[test]
fn test_cli_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cassandra-shift-cli"));
}

#[test]
fn test_invalid_command_exits_non_zero() {
    cli()
        .args(["bogus", "-p", "127.0.0.1", "-d", "dc1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid command"))
        .stderr(predicate::str::contains("Invalid command 'bogus'"));
}

#[test]
fn test_missing_config_file_exits_non_zero() {
    cli()
        .args(["migrate", "-c", "/nonexistent/shift.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to load configuration"));
}

#[test]
fn test_missing_contact_points_exits_non_zero() {
    cli()
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("contact point"));
}

#[test]
fn test_missing_engine_exits_non_zero() {
    cli()
        .args([
            "migrate",
            "-p",
            "127.0.0.1",
            "-d",
            "dc1",
            "--engine",
            "definitely-not-a-shift-engine",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_environment_supplies_connection_settings() {
    cli()
        .arg("bogus")
        .env("CONTACT_POINTS", "127.0.0.1,127.0.0.2")
        .env("LOCAL_DATA_CENTER", "dc1")
        .env("NUMBER_OF_CLIENTS", "2")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid command"));
}
