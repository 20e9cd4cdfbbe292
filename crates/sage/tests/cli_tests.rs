//! End-to-end tests of the sage binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sage(repo: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sage").unwrap();
    cmd.current_dir(repo.path())
        .env("SAGE_REPO_ROOT", repo.path())
        .env_remove("SAGE_TOOLS_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_shows_targets() {
    let repo = TempDir::new().unwrap();
    sage(&repo)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("git-verify-no-diff"))
        .stdout(predicate::str::contains("prepare:convco"));
}

#[test]
fn test_unknown_target_exits_with_config_code() {
    let repo = TempDir::new().unwrap();
    sage(&repo)
        .args(["run", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown target 'nope'"));
}

#[test]
fn test_json_envelope_for_tools_list() {
    let repo = TempDir::new().unwrap();
    sage(&repo)
        .args(["--json", "tools", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"{"status":"ok","data":["#))
        .stdout(predicate::str::contains(r#""name":"convco""#));
}

#[test]
fn test_json_error_envelope() {
    let repo = TempDir::new().unwrap();
    sage(&repo)
        .args(["tools", "prepare", "nope", "--json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains(r#""status":"error""#))
        .stdout(predicate::str::contains(r#""code":"config""#));
}
