//! svrf-core: SVRF rule-deck lexer and parser.
//!
//! Turns rule-deck text into a syntax tree in two passes over one token
//! stream: a prescan builds the [`SymbolTable`] that decides whether a word
//! is a keyword or a user name, then a recursive-descent statement parser
//! with a Pratt expression parser builds the [`Program`].
//!
//! # Public API
//!
//! - [`parse()`] / [`parse_bytes()`] -- text or raw bytes to a [`ParseOutput`]
//! - [`tokenize()`] / [`lex()`] -- the token stream alone
//! - [`print()`] -- canonical text of a tree
//! - [`validate::check`] -- parse reduced to pass/fail
//! - [`conditional::resolve_conditionals`] -- `#DEFINE`-driven branch selection
//! - [`deck::load_deck`] -- a deck and everything it `#INCLUDE`s

pub mod ast;
pub mod conditional;
pub mod deck;
pub mod error;
pub mod keywords;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod source;
pub mod symbols;
pub mod token;
pub mod validate;

// ── Convenience re-exports ───────────────────────────────────────────

pub use ast::{Arg, Constraint, Expr, Modifier, Pos, Program, PropertyBlock, Stmt};
pub use error::{Diagnostic, DiagnosticKind, ParseFailure, Severity};
pub use lexer::{lex, tokenize, Lexed};
pub use printer::print;
pub use symbols::{SymbolRole, SymbolTable};
pub use token::{Token, TokenKind};

/// A parsed program and every diagnostic raised while producing it,
/// ordered by position.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Parse SVRF source text.
///
/// Always returns a complete program for text that yields at least one
/// token; statement-level errors become `Error` nodes plus diagnostics.
/// Fails only when the input holds no tokens at all (empty, blank or
/// comment-only text).
pub fn parse(source: &str, filename: &str) -> Result<ParseOutput, ParseFailure> {
    let Lexed { tokens, errors } = lex(source);
    if tokens
        .iter()
        .all(|t| matches!(t.kind, TokenKind::Newline | TokenKind::Eof))
    {
        return Err(ParseFailure::NoTokens {
            file: filename.to_owned(),
        });
    }

    let symbols = SymbolTable::build(&tokens);
    let (program, parse_diags) = parser::parse_tokens(&tokens, &symbols, filename);

    let mut diagnostics: Vec<Diagnostic> = errors.iter().map(|e| e.to_diagnostic(filename)).collect();
    diagnostics.extend(parse_diags);
    diagnostics.sort_by_key(|d| (d.line, d.col));
    Ok(ParseOutput {
        program,
        diagnostics,
    })
}

/// Parse raw bytes: invalid UTF-8 is decoded lossily, a byte-order mark is
/// dropped, and NUL bytes reject the input as non-text.
pub fn parse_bytes(bytes: &[u8], filename: &str) -> Result<ParseOutput, ParseFailure> {
    let text = source::decode_source(bytes, filename)?;
    parse(&text, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_comment_only_inputs_fail() {
        for src in ["", "\n\n", "// only a comment\n/* and a block */\n"] {
            let err = parse(src, "empty.svrf").unwrap_err();
            assert_eq!(
                err,
                ParseFailure::NoTokens {
                    file: "empty.svrf".into()
                }
            );
        }
    }

    #[test]
    fn lex_and_parse_diagnostics_are_merged_in_order() {
        let out = parse("X = A AND\nTITLE \"open\nLAYER M1 1\n", "d.svrf").expect("parse");
        let kinds: Vec<_> = out.diagnostics.iter().map(|d| (d.kind, d.line)).collect();
        assert_eq!(
            kinds,
            vec![
                (DiagnosticKind::MissingOperand, 1),
                (DiagnosticKind::UnterminatedString, 2),
            ]
        );
        assert!(out.has_errors());
        assert!(out.diagnostics.iter().all(|d| d.file == "d.svrf"));
        assert!(matches!(out.program.statements.last(), Some(Stmt::LayerDef { .. })));
    }

    #[test]
    fn out_of_range_literal_never_reaches_the_tree() {
        let out = parse("X = 1e400\n", "n.svrf").expect("parse");
        let first = out.errors().next().expect("an error");
        assert_eq!(first.kind, DiagnosticKind::InvalidNumberLiteral);
        assert_eq!((first.line, first.col), (1, 5));
        assert!(!print(&out.program).contains("inf"));
    }

    #[test]
    fn forward_reference_resolves_through_prescan() {
        let out = parse("X = INSIDE NOT Y\nLAYER INSIDE 5\nLAYER Y 6\n", "f.svrf").expect("parse");
        assert!(!out.has_errors(), "{:?}", out.diagnostics);
        match &out.program.statements[0] {
            Stmt::LayerAssignment {
                expression: Expr::BinaryOp { op, left, .. },
                ..
            } => {
                assert_eq!(op, "NOT");
                assert!(matches!(left.as_ref(), Expr::LayerRef { name, .. } if name == "INSIDE"));
            }
            other => panic!("expected NOT assignment, got {:?}", other),
        }
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let out = parse("DRC FOOBAR YES\n", "w.svrf").expect("parse");
        assert!(!out.has_errors());
        assert_eq!(out.warnings().count(), 1);
    }

    #[test]
    fn bytes_with_nul_are_not_text() {
        let err = parse_bytes(b"LAYER M1 1\0", "bin.gds").unwrap_err();
        assert!(matches!(err, ParseFailure::NotText { .. }));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let out = parse_bytes(b"TITLE \"caf\xe9\"\n", "t.svrf").expect("parse");
        assert!(!out.has_errors());
    }
}
