//! CLI Integration Tests
//!
//! Tests the `forge` binary directly using assert_cmd to exercise main.rs
//! code paths.
//!
//! # Coverage Exclusion
//! These tests are skipped during coverage runs. Run without coverage for
//! full testing.

#![cfg(not(coverage))]
#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn forge() -> Command {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    for var in [
        "FORGE_SOFT_MODULE_GATING",
        "FORGE_RELAXED_MEMBER_ACCESS",
        "FORGE_NO_LINT",
        "FORGE_STOP_ON_WARNINGS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

fn script(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    forge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("forge"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    forge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("forge"));
}

#[test]
fn test_cli_run_requires_file() {
    forge().arg("run").assert().failure();
}

// ═══════════════════════════════════════════════════════════════════════════
// CHECK COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_check_clean_file() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "ok.forge", "let dog = 'Fuffy';\nconsole.text.var(l.dog);\n");
    forge()
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 error(s)"));
}

#[test]
fn test_cli_check_reports_errors() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "bad.forge", "console.text.var(cat);\n");
    forge()
        .arg("check")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("UNDEFINED_VARIABLE"))
        .stdout(predicate::str::contains("bad.forge:1:18"));
}

#[test]
fn test_cli_check_json() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "gated.forge", "disable 'AllInOne';\nlet n = Sys.pid();\n");
    let output = forge()
        .args(["check", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let diagnostics: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let gated = diagnostics
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["code"] == "MODULE_NOT_ENABLED")
        .unwrap();
    assert_eq!(gated["severity"], "error");
    assert_eq!(gated["source"], "forge");
    assert_eq!(gated["range"]["start"]["line"], 1);
    assert_eq!(gated["range"]["start"]["character"], 8);
}

#[test]
fn test_cli_soft_gating_flag() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "gated.forge", "disable 'AllInOne';\nlet n = Sys.pid();\n");
    forge()
        .args(["check", "--soft-module-gating"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning[MODULE_NOT_ENABLED]"));
}

#[test]
fn test_cli_check_missing_file() {
    forge()
        .args(["check", "/definitely/not/here.forge"])
        .assert()
        .failure();
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_run_prints_output() {
    let dir = TempDir::new().unwrap();
    let file = script(
        &dir,
        "fuffy.forge",
        "disable 'AllInOne';\nable 'Math', 'Time', 'Sys';\nlet dog = 'Fuffy';\nconsole.text.var(l.dog);\n",
    );
    forge()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fuffy"));
}

#[test]
fn test_cli_run_blocked_by_errors() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "bad.forge", "console.text.var('never');\nmissing;\n");
    forge()
        .arg("run")
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("never").not())
        .stderr(predicate::str::contains("UNDEFINED_VARIABLE"));
}

#[test]
fn test_cli_run_step_limit() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "loop.forge", "let n = 0;\nwhile (true) { l.n += 1; }\n");
    forge()
        .args(["run", "--max-steps", "100"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("EXECUTION_LIMIT_EXCEEDED"));
}

#[test]
fn test_cli_run_stop_on_warnings() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "warn.forge", "if (true) { }\nconsole.text.var('ran');\n");
    forge()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("ran"));
    forge()
        .args(["run", "--stop-on-warnings"])
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ran").not());
}

// ═══════════════════════════════════════════════════════════════════════════
// EDITOR COMMAND TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_complete_json() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "pets.forge", "let dog = 'Fuffy';\nSys.cpu.\n");
    let output = forge()
        .args(["complete", "--line", "1", "--column", "8", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["label"].as_str())
        .collect();
    assert_eq!(labels, vec!["cores", "usage", "model"]);
}

#[test]
fn test_cli_hover() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "pets.forge", "let dog = 'Fuffy';\nconsole.text.var(l.dog);\n");
    forge()
        .args(["hover", "-l", "1", "-c", "20"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("let dog: string"));
}

#[test]
fn test_cli_hover_on_nothing_fails() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "pets.forge", "let dog = 'Fuffy';\n\n");
    forge()
        .args(["hover", "-l", "1", "-c", "0"])
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn test_cli_symbols() {
    let dir = TempDir::new().unwrap();
    let file = script(&dir, "pets.forge", "let dog = 'Fuffy';\nconst LIMIT = 3;\n");
    forge()
        .arg("symbols")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("let dog: string"))
        .stdout(predicate::str::contains("LIMIT"));
}
