//! Pass/fail validation of a single deck.

use crate::error::{Diagnostic, ParseFailure};
use crate::parse;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Failure(#[from] ParseFailure),

    #[error("{} error(s), first at {}", .0.len(), first_location(.0))]
    Diagnostics(Vec<Diagnostic>),
}

fn first_location(diags: &[Diagnostic]) -> String {
    diags
        .first()
        .map(|d| format!("{}:{}:{}", d.file, d.line, d.col))
        .unwrap_or_default()
}

/// Parse `source` and succeed only when no error diagnostic was raised.
/// Warnings do not fail the check.
pub fn check(source: &str, filename: &str) -> Result<(), CheckError> {
    let output = parse(source, filename)?;
    let errors: Vec<Diagnostic> = output.errors().cloned().collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CheckError::Diagnostics(errors))
    }
}

pub fn is_valid(source: &str) -> bool {
    check(source, "<input>").is_ok()
}
