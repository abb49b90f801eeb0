//! Validates the JSON form of every conformance deck's parse output against
//! the published schema at schema/parse-output-schema.json.

use std::path::{Path, PathBuf};

fn validate_deck(
    validator: &jsonschema::Validator,
    path: &Path,
    failures: &mut Vec<String>,
    tested: &mut usize,
) {
    let src = std::fs::read_to_string(path).unwrap();
    let output = svrf_core::parse(&src, &path.display().to_string()).unwrap();
    let instance = serde_json::to_value(&output).unwrap();
    if let Err(error) = validator.validate(&instance) {
        failures.push(format!("{}: {}", path.display(), error));
    }
    *tested += 1;
}

fn collect_decks(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "svrf"))
        .collect();
    paths.sort();
    paths
}

#[test]
fn validate_all_conformance_outputs_against_schema() {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/parse-output-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    let validator = jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e));

    let conformance_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../conformance");

    let mut tested = 0usize;
    let mut failures = Vec::new();

    // Negative decks still produce a complete program plus diagnostics
    for dir_name in &["positive", "negative"] {
        for path in collect_decks(&conformance_root.join(dir_name)) {
            validate_deck(&validator, &path, &mut failures, &mut tested);
        }
    }

    assert!(tested > 0, "No conformance decks found -- check paths");
    assert!(
        failures.is_empty(),
        "Schema validation failed for {} of {} decks:\n{}",
        failures.len(),
        tested,
        failures.join("\n")
    );

    eprintln!("Schema validation passed for {} decks", tested);
}

#[test]
fn schema_rejects_unknown_statement_node() {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/parse-output-schema.json");
    let schema_value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(schema_path).unwrap()).unwrap();
    let validator = jsonschema::validator_for(&schema_value).unwrap();

    let bad = serde_json::json!({
        "program": {
            "file": "x.svrf",
            "statements": [{ "node": "Frobnicate", "pos": { "line": 1, "col": 1 } }]
        },
        "diagnostics": []
    });
    assert!(validator.validate(&bad).is_err());
}
