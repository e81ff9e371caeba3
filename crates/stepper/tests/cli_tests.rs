use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use tracing::info;

const PIPELINE: &str = r#"
name = "shout"

[[elements]]
id = "split"
type = "splitter"

[[elements]]
id = "upper"
type = "uppercase"

[[elements]]
id = "out"
type = "writer"
"#;

/// A stepper command isolated from the user's config and environment.
fn stepper(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stepper").unwrap();
    cmd.env_remove("STEPPER_STORE")
        .env_remove("STEPPER_CONFIG")
        .arg("--config")
        .arg(dir.join("missing.toml"));
    cmd
}

/// A store holding stream 1 with parts `hello\nworld` and `again`.
fn imported_store() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pipeline.toml"), PIPELINE).unwrap();
    fs::write(dir.path().join("part1.txt"), "hello\nworld").unwrap();
    fs::write(dir.path().join("part2.txt"), "again").unwrap();

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "import", "--id", "1", "--feed", "FEED"])
        .args(["part1.txt", "part2.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imported stream 1 (2 parts)"));
    dir
}

#[test]
fn test_help_command() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("stepper").unwrap();
    cmd.arg("--help").assert().success().stdout(predicate::str::contains("Pipeline Stepper"));
}

#[test]
fn test_version_command() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("stepper").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("stepper"));
}

#[test]
fn test_step_subcommand_help() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("stepper").unwrap();
    cmd.arg("step")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Take a single step"));
}

#[test]
fn test_missing_subcommand() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut cmd = Command::cargo_bin("stepper").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_invalid_step_type() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    stepper(dir.path())
        .args(["--store", "store", "step", "sideways", "--pipeline", "p.toml"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown step type"));
}

#[test]
fn test_missing_store_fails() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = tempfile::tempdir().unwrap();
    stepper(dir.path())
        .arg("streams")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No store directory given"));
}

#[test]
fn test_import_and_list_streams() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = imported_store();

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "streams"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1\tFEED\tRaw Events"));

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "streams", "--feed", "OTHER"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no streams"));
}

#[test]
fn test_step_first_and_forward() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = imported_store();

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "step", "first", "--pipeline", "pipeline.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("record 1:1:1").and(predicate::str::contains("out: HELLO")));

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "step", "next", "--at", "1:1:2", "--pipeline", "pipeline.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("record 1:2:1").and(predicate::str::contains("out: AGAIN")));
}

#[test]
fn test_step_with_filter_as_json() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = imported_store();

    stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "step", "first", "--pipeline", "pipeline.toml"])
        .args(["--equals", "out=WORLD", "--json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""foundRecord":true"#)
                .and(predicate::str::contains(r#""recordIndex":2"#)),
        );
}

#[test]
fn test_walk_backward() {
    stepper_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = imported_store();

    let output = stepper(dir.path())
        .current_dir(dir.path())
        .args(["--store", "store", "walk", "--backward", "--element", "out"])
        .args(["--pipeline", "pipeline.toml"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<&str> = stdout.lines().filter(|line| line.starts_with("record")).collect();
    assert_eq!(records, ["record 1:2:1", "record 1:1:2", "record 1:1:1"]);
    assert!(stdout.contains("  AGAIN"));
}
