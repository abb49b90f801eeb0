//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `svrf` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to conformance fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `svrf` binary, rooted at workspace.
fn svrf() -> Command {
    let mut cmd = cargo_bin_cmd!("svrf");
    cmd.current_dir(workspace_root());
    cmd
}

fn deck(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    svrf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SVRF rule-deck toolchain"));
}

#[test]
fn version_exits_0() {
    svrf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("svrf"));
}

// ──────────────────────────────────────────────
// 2. parse
// ──────────────────────────────────────────────

#[test]
fn parse_valid_deck_prints_tree() {
    svrf()
        .args(["parse", "conformance/positive/layers.svrf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"node\": \"LayerDef\""))
        .stdout(predicate::str::contains("\"node\": \"LayerAssignment\""));
}

#[test]
fn parse_with_errors_still_prints_tree_and_exits_1() {
    svrf()
        .args(["parse", "conformance/negative/missing_operand.svrf"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("\"node\": \"Error\""))
        .stderr(predicate::str::contains("missing_operand.svrf:2:"));
}

#[test]
fn parse_json_diagnostics_on_stderr() {
    let output = svrf()
        .args([
            "--output",
            "json",
            "parse",
            "conformance/negative/stray_closer.svrf",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let diags: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(diags[0]["kind"], "UnexpectedToken");
    assert_eq!(diags[0]["category"], "SyntaxError");
    assert_eq!(diags[0]["line"], 1);
}

#[test]
fn parse_nonexistent_file_exits_1() {
    svrf()
        .args(["parse", "nonexistent_file_xyz.svrf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn parse_comment_only_file_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "empty.svrf", "// nothing here\n");
    svrf()
        .args(["parse", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no tokens"));
}

#[test]
fn parse_binary_file_exits_1_json_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("layout.gds");
    fs::write(&path, b"\x00\x06\x00\x02\x02\x58").unwrap();
    svrf()
        .args(["--output", "json", "parse", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("{\"error\":"));
}

#[test]
fn quiet_suppresses_error_text() {
    svrf()
        .args(["--quiet", "parse", "nonexistent_file_xyz.svrf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 3. tokens
// ──────────────────────────────────────────────

#[test]
fn tokens_text_listing() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "t.svrf", "LAYER M1 10\n");
    svrf()
        .args(["tokens", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1:1 Ident LAYER"))
        .stdout(predicate::str::contains("1:10 Integer 10"));
}

#[test]
fn tokens_json_and_lex_error_exit() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "t.svrf", "TITLE \"open\n");
    let output = svrf()
        .args(["--output", "json", "tokens", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let tokens: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tokens[0]["kind"], "Ident");
    assert_eq!(tokens[0]["text"], "TITLE");
    assert!(String::from_utf8_lossy(&output.stderr).contains("UnterminatedString"));
}

// ──────────────────────────────────────────────
// 4. fmt
// ──────────────────────────────────────────────

#[test]
fn fmt_prints_canonical_text() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "f.svrf", "LAYER   M1   1\nX=M1   SIZE BY 0.5\n");
    svrf()
        .args(["fmt", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("LAYER M1 1\nX = SIZE M1 BY 0.5\n");
}

#[test]
fn fmt_refuses_deck_with_errors() {
    svrf()
        .args(["fmt", "conformance/negative/unclosed_paren.svrf"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 5. check
// ──────────────────────────────────────────────

#[test]
fn check_follows_includes() {
    let tmp = TempDir::new().unwrap();
    deck(&tmp, "top.svrf", "#INCLUDE layers.svrf\nX = M1 AND M2\n");
    deck(&tmp, "layers.svrf", "LAYER M1 1\nLAYER M2 2\n");
    let top = tmp.path().join("top.svrf");
    svrf()
        .args(["check", top.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 2 file(s), 0 error(s), 0 warning(s)"));
}

#[test]
fn check_reports_errors_in_included_file() {
    let tmp = TempDir::new().unwrap();
    deck(&tmp, "top.svrf", "#INCLUDE bad.svrf\nLAYER M1 1\n");
    deck(&tmp, "bad.svrf", "X = M1 OR\n");
    let top = tmp.path().join("top.svrf");
    svrf()
        .args(["check", top.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("bad.svrf:1:"))
        .stdout(predicate::str::contains("failed: 2 file(s), 1 error(s)"));
}

#[test]
fn check_include_cycle_exits_1() {
    let tmp = TempDir::new().unwrap();
    deck(&tmp, "a.svrf", "#INCLUDE b.svrf\n");
    deck(&tmp, "b.svrf", "#INCLUDE a.svrf\n");
    let a = tmp.path().join("a.svrf");
    svrf()
        .args(["check", a.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("include cycle detected"));
}

#[test]
fn check_warnings_pass_unless_denied() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "w.svrf", "DRC FROBNICATE YES\n");
    svrf()
        .args(["check", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 warning(s)"));
    svrf()
        .args(["check", "--deny-warnings", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn check_deny_warnings_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "w.svrf", "DRC FROBNICATE YES\n");
    let cfg = deck(&tmp, "svrf.toml", "[check]\ndeny_warnings = true\n");
    svrf()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "check",
            path.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn check_json_report() {
    let output = svrf()
        .args([
            "--output",
            "json",
            "check",
            "conformance/positive/drc_rules.svrf",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], true);
    assert_eq!(report["errors"], 0);
    assert_eq!(report["files"].as_array().unwrap().len(), 1);
}

#[test]
fn malformed_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    let cfg = deck(&tmp, "svrf.toml", "[check\n");
    svrf()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "check",
            "conformance/positive/layers.svrf",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 6. symbols
// ──────────────────────────────────────────────

#[test]
fn symbols_json_lists_roles() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "s.svrf", "LAYER M1 1\nVARIABLE W 0.1\nR1 {\n  X = M1 SIZE BY W\n}\n");
    let output = svrf()
        .args(["--output", "json", "symbols", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let table: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(table["M1"], "LAYER");
    assert_eq!(table["W"], "VARIABLE");
    assert_eq!(table["R1"], "RULE");
    assert_eq!(table["X"], "LAYER");
}

// ──────────────────────────────────────────────
// 7. resolve
// ──────────────────────────────────────────────

#[test]
fn resolve_selects_branch_by_define() {
    let tmp = TempDir::new().unwrap();
    let path = deck(
        &tmp,
        "r.svrf",
        "#IFDEF PROCESS n7\nLAYER M1 1\n#ELSE\nLAYER M1 2\n#ENDIF\n",
    );
    svrf()
        .args(["resolve", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("LAYER M1 2\n");
    svrf()
        .args(["resolve", "--define", "PROCESS=n7", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout("LAYER M1 1\n");
}

#[test]
fn resolve_uses_config_defines() {
    let tmp = TempDir::new().unwrap();
    let path = deck(&tmp, "r.svrf", "#IFDEF FAST\nLAYER M1 1\n#ENDIF\nLAYER M2 2\n");
    let cfg = deck(&tmp, "svrf.toml", "[defines]\nFAST = \"\"\n");
    svrf()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "resolve",
            path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout("LAYER M1 1\nLAYER M2 2\n");
}

// ──────────────────────────────────────────────
// 8. test
// ──────────────────────────────────────────────

#[test]
fn conformance_suite_passes() {
    svrf()
        .args(["test", "conformance"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("TAP version 14"))
        .stdout(predicate::str::contains("# fail  0"));
}

#[test]
fn test_missing_suite_dir_exits_1() {
    svrf()
        .args(["test", "no_such_suite_dir"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_missing_suite_dir_honors_quiet_and_json() {
    svrf()
        .args(["--quiet", "test", "no_such_suite_dir"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
    svrf()
        .args(["--output", "json", "test", "no_such_suite_dir"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("{\"error\":"));
}

#[test]
fn test_failing_suite_exits_1() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("positive")).unwrap();
    fs::write(tmp.path().join("positive/bad.svrf"), "X = (A\n").unwrap();
    svrf()
        .args(["test", tmp.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("not ok 1 - positive/bad"));
}
