use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Every diagnostic kind, grouped by the stage that reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    // Lexer
    UnterminatedString,
    UnterminatedComment,
    InvalidNumberLiteral,
    // Parser
    UnexpectedToken,
    UnclosedBlock,
    MissingOperand,
    // Semantic warnings
    PermissiveKeyword,
    UnreachableBranch,
}

impl DiagnosticKind {
    /// Taxonomy group: `LexError`, `SyntaxError` or `SemanticWarning`.
    pub fn category(self) -> &'static str {
        match self {
            DiagnosticKind::UnterminatedString
            | DiagnosticKind::UnterminatedComment
            | DiagnosticKind::InvalidNumberLiteral => "LexError",
            DiagnosticKind::UnexpectedToken
            | DiagnosticKind::UnclosedBlock
            | DiagnosticKind::MissingOperand => "SyntaxError",
            DiagnosticKind::PermissiveKeyword | DiagnosticKind::UnreachableBranch => {
                "SemanticWarning"
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::PermissiveKeyword | DiagnosticKind::UnreachableBranch => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

/// A positioned diagnostic. Serializes to the shape used by
/// `*.expected-error.json` conformance fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        file: &str,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: kind.severity(),
            kind,
            message: message.into(),
            file: file.to_owned(),
            line,
            col,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "severity": self.severity,
            "kind":     self.kind,
            "category": self.kind.category(),
            "message":  self.message,
            "file":     self.file,
            "line":     self.line,
            "col":      self.col,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.col, self.severity, self.message
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedComment,
    InvalidNumberLiteral,
}

/// A recoverable lexer error. Tokenization continues after it is recorded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl LexError {
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        let kind = match self.kind {
            LexErrorKind::UnterminatedString => DiagnosticKind::UnterminatedString,
            LexErrorKind::UnterminatedComment => DiagnosticKind::UnterminatedComment,
            LexErrorKind::InvalidNumberLiteral => DiagnosticKind::InvalidNumberLiteral,
        };
        Diagnostic::new(kind, file, self.line, self.col, self.message.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnexpectedToken,
    UnclosedBlock,
    MissingOperand,
}

/// A localized parse failure raised inside an expression or statement.
/// The statement parser turns it into an `Error` node plus a diagnostic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{line}:{col}: {message}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl SyntaxError {
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        let kind = match self.kind {
            SyntaxErrorKind::UnexpectedToken => DiagnosticKind::UnexpectedToken,
            SyntaxErrorKind::UnclosedBlock => DiagnosticKind::UnclosedBlock,
            SyntaxErrorKind::MissingOperand => DiagnosticKind::MissingOperand,
        };
        Diagnostic::new(kind, file, self.line, self.col, self.message.clone())
    }
}

/// Inputs the parser cannot produce any tree for.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("{file}: input is not text ({reason})")]
    NotText { file: String, reason: String },

    #[error("{file}: no tokens produced")]
    NoTokens { file: String },
}
