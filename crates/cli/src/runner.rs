//! Conformance suite runner.
//!
//! Convention:
//!   positive/   -- *.svrf, must parse without error diagnostics and
//!                  survive a print/reparse round trip unchanged
//!   negative/   -- *.svrf + *.expected-error.json naming fields of the
//!                  first error diagnostic (`kind`, `line`, ...)

use crate::tap::Tap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use svrf_core::{parse_bytes, print, ParseOutput};

pub struct RunResult {
    pub failed: usize,
    pub report: String,
}

pub fn run_suite(suite_dir: &Path) -> RunResult {
    let mut tap = Tap::new();

    run_positive_tests(suite_dir, &mut tap);
    run_negative_tests(suite_dir, &mut tap);

    RunResult {
        failed: tap.failure_count(),
        report: tap.render(),
    }
}

fn run_positive_tests(suite_dir: &Path, tap: &mut Tap) {
    let dir = suite_dir.join("positive");
    for deck in glob_svrf_files(&dir) {
        let test_name = format!("positive/{}", stem(&deck));
        let first = match parse_file(&deck) {
            Ok(out) => out,
            Err(e) => {
                tap.not_ok(&test_name, e);
                continue;
            }
        };
        if first.has_errors() {
            tap.not_ok(&test_name, format!("unexpected errors:\n{}", listing(&first)));
            continue;
        }

        let printed = print(&first.program);
        match svrf_core::parse(&printed, &deck.display().to_string()) {
            Ok(second) if second.has_errors() => tap.not_ok(
                &test_name,
                format!("printed deck does not parse:\n{}\n{}", printed, listing(&second)),
            ),
            Ok(second) if !first.program.structurally_eq(&second.program) => {
                let diff = json_diff(&first.program.shape(), &second.program.shape());
                tap.not_ok(&test_name, format!("round trip changed the tree:\n{}", diff));
            }
            Ok(_) => tap.ok(&test_name),
            Err(e) => tap.not_ok(&test_name, format!("printed deck rejected: {}", e)),
        }
    }
}

fn run_negative_tests(suite_dir: &Path, tap: &mut Tap) {
    let dir = suite_dir.join("negative");
    for deck in glob_svrf_files(&dir) {
        let name = stem(&deck);
        let test_name = format!("negative/{}", name);
        let expected_path = dir.join(format!("{}.expected-error.json", name));
        if !expected_path.exists() {
            tap.not_ok(
                &test_name,
                format!("missing expected-error file: {}", expected_path.display()),
            );
            continue;
        }
        let expected = match read_json(&expected_path) {
            Ok(v) => v,
            Err(e) => {
                tap.not_ok(&test_name, format!("failed to read expected-error file: {}", e));
                continue;
            }
        };

        let output = match parse_file(&deck) {
            Ok(out) => out,
            Err(e) => {
                tap.not_ok(&test_name, e);
                continue;
            }
        };
        match output.errors().next() {
            Some(first) => {
                let got = first.to_json_value();
                if json_subset(&expected, &got) {
                    tap.ok(&test_name);
                } else {
                    tap.not_ok(
                        &test_name,
                        format!("error mismatch:\n{}", json_diff(&expected, &got)),
                    );
                }
            }
            None => tap.not_ok(&test_name, "expected an error but the deck parsed cleanly"),
        };
    }
}

// -- Helpers --

fn parse_file(path: &Path) -> Result<ParseOutput, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_bytes(&bytes, &path.display().to_string()).map_err(|e| e.to_string())
}

fn listing(output: &ParseOutput) -> String {
    output
        .diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `*.svrf` files in `dir`, sorted; empty when the directory is absent.
fn glob_svrf_files(dir: &Path) -> Vec<PathBuf> {
    let mut results = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("svrf") {
                results.push(path);
            }
        }
    }
    results.sort();
    results
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn read_json(path: &Path) -> Result<Value, String> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&src).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}

/// Every field of `expected` is present in `got` with an equal value.
/// Numbers compare by value.
fn json_subset(expected: &Value, got: &Value) -> bool {
    match (expected, got) {
        (Value::Object(em), Value::Object(gm)) => em
            .iter()
            .all(|(k, v)| gm.get(k).is_some_and(|gv| json_subset(v, gv))),
        (Value::Number(en), Value::Number(gn)) => en.as_f64() == gn.as_f64(),
        _ => expected == got,
    }
}

fn json_diff(expected: &Value, got: &Value) -> String {
    let exp_str = serde_json::to_string_pretty(expected).unwrap_or_default();
    let got_str = serde_json::to_string_pretty(got).unwrap_or_default();
    format!("--- expected\n{}\n+++ got\n{}", exp_str, got_str)
}
