//! Statement and expression parser.
//!
//! One [`Parser`] value carries all parse state (cursor, symbol table,
//! nesting depths and accumulated diagnostics). Its methods are split
//! across the submodules by grammar area:
//!
//! - `statements`   -- statement dispatch and the statement forms
//! - `preprocessor` -- `#DEFINE`, `#IFDEF`/`#IFNDEF`, `#INCLUDE`, `#ENCRYPT`
//! - `property`     -- `[ PROPERTY ... ]` blocks, `IF` chains, arithmetic
//! - `expressions`  -- Pratt parser for layer expressions
//! - `drc`          -- DRC operations, constraints and modifiers
//!
//! Expression and statement parsers raise [`SyntaxError`]; the body loop
//! turns each one into an `Error` statement plus a diagnostic and resumes
//! at the next statement boundary.

mod drc;
mod expressions;
mod preprocessor;
mod property;
mod statements;

use crate::ast::{Arg, Pos, Program, Stmt};
use crate::error::{Diagnostic, DiagnosticKind, SyntaxError, SyntaxErrorKind};
use crate::symbols::SymbolTable;
use crate::token::{Token, TokenKind};
use std::collections::HashSet;

pub(crate) type PResult<T> = Result<T, SyntaxError>;

static EOF_TOKEN: Token = Token {
    kind: TokenKind::Eof,
    text: String::new(),
    line: 0,
    col: 0,
    width: 0,
};

/// Which statement grammar a body is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    Deck,
    Property,
}

/// What closes a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Eof,
    Brace,
    Bracket,
    Conditional,
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    symbols: &'a SymbolTable,
    filename: String,
    block_depth: usize,
    paren_depth: usize,
    cond_depth: usize,
    /// Names `#DEFINE`d outside any conditional so far.
    defined: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], symbols: &'a SymbolTable, filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            symbols,
            filename: filename.to_owned(),
            block_depth: 0,
            paren_depth: 0,
            cond_depth: 0,
            defined: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    // -- Cursor --------------------------------------------------

    fn cur(&self) -> &'a Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        match tokens.get(self.pos + n) {
            Some(t) => t,
            None => tokens.last().unwrap_or(&EOF_TOKEN),
        }
    }

    fn kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_word(&self, word: &str) -> bool {
        self.cur().is_word(word)
    }

    fn advance(&mut self) -> &'a Token {
        let t = self.cur();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_eol(&self) -> bool {
        matches!(self.kind(), TokenKind::Newline | TokenKind::Eof)
    }

    /// End of line or a closing delimiter: nothing more belongs to the
    /// current operand list.
    fn at_stop(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    /// First token at or after the cursor that is not a newline.
    fn next_significant(&self) -> &'a Token {
        let mut n = 0;
        while self.peek(n).kind == TokenKind::Newline {
            n += 1;
        }
        self.peek(n)
    }

    fn here(&self) -> Pos {
        pos_of(self.cur())
    }

    // -- Errors and diagnostics ----------------------------------

    fn error_at(&self, tok: &Token, kind: SyntaxErrorKind, msg: impl Into<String>) -> SyntaxError {
        SyntaxError {
            kind,
            message: msg.into(),
            line: tok.line,
            col: tok.col,
        }
    }

    /// "expected X" at the cursor: MissingOperand at end of line,
    /// UnexpectedToken otherwise.
    fn expected(&self, what: &str) -> SyntaxError {
        let tok = self.cur();
        let kind = if self.at_eol() {
            SyntaxErrorKind::MissingOperand
        } else {
            SyntaxErrorKind::UnexpectedToken
        };
        self.error_at(tok, kind, format!("expected {}, found {}", what, describe(tok)))
    }

    fn report(&mut self, err: &SyntaxError) {
        let d = err.to_diagnostic(&self.filename);
        self.diagnostics.push(d);
    }

    fn diagnostic(&mut self, kind: DiagnosticKind, pos: Pos, msg: impl Into<String>) {
        let d = Diagnostic::new(kind, &self.filename, pos.line, pos.col, msg);
        self.diagnostics.push(d);
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<&'a Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(what))
        }
    }

    fn take_ident(&mut self, what: &str) -> PResult<(String, Pos)> {
        if self.at(TokenKind::Ident) {
            let t = self.advance();
            Ok((t.text.clone(), pos_of(t)))
        } else {
            Err(self.expected(what))
        }
    }

    fn take_int(&mut self, what: &str) -> PResult<i64> {
        if self.at(TokenKind::Integer) {
            let t = self.cur();
            let n = t.text.parse::<i64>().map_err(|_| {
                self.error_at(
                    t,
                    SyntaxErrorKind::UnexpectedToken,
                    format!("integer out of range: {}", t.text),
                )
            })?;
            self.advance();
            Ok(n)
        } else {
            Err(self.expected(what))
        }
    }

    fn number_value(&self, tok: &Token) -> PResult<f64> {
        let value = tok.text.parse::<f64>().ok().filter(|v| v.is_finite());
        value.ok_or_else(|| {
            self.error_at(
                tok,
                SyntaxErrorKind::UnexpectedToken,
                format!("invalid number '{}'", tok.text),
            )
        })
    }

    /// A statement ends at a newline, end of input, or the close of the
    /// enclosing block.
    fn expect_statement_end(&self) -> PResult<()> {
        match self.kind() {
            TokenKind::Newline | TokenKind::Eof | TokenKind::Semicolon => Ok(()),
            TokenKind::RBrace if self.block_depth > 0 => Ok(()),
            _ => Err(self.error_at(
                self.cur(),
                SyntaxErrorKind::UnexpectedToken,
                format!("unexpected {} after statement", describe(self.cur())),
            )),
        }
    }

    /// Directive-style argument: identifier, string, number (sign folded)
    /// or any other single token.
    fn parse_arg(&mut self) -> PResult<Arg> {
        let tok = self.cur();
        let arg = match tok.kind {
            TokenKind::Ident => Arg::Ident(tok.text.clone()),
            TokenKind::Str => Arg::Str(tok.text.clone()),
            TokenKind::Integer | TokenKind::Float => Arg::Number(self.number_value(tok)?),
            TokenKind::Minus if self.peek(1).kind.is_number() && tok.touches(self.peek(1)) => {
                self.advance();
                let num = self.cur();
                Arg::Number(-self.number_value(num)?)
            }
            TokenKind::Description => Arg::Punct(format!("@ {}", tok.text)),
            _ => Arg::Punct(tok.text.clone()),
        };
        self.advance();
        Ok(arg)
    }

    // -- Bodies and recovery -------------------------------------

    fn at_body_end(&self, stop: Stop) -> bool {
        match stop {
            Stop::Eof => false,
            Stop::Brace => self.at(TokenKind::RBrace),
            Stop::Bracket => self.at(TokenKind::RBracket),
            Stop::Conditional => matches!(self.kind(), TokenKind::PpElse | TokenKind::PpEndif),
        }
    }

    /// Parse statements until `stop` (or end of input), recovering from
    /// statement-level errors.
    fn parse_body(&mut self, ctx: Ctx, stop: Stop) -> Vec<Stmt> {
        let mut out = Vec::new();
        loop {
            while matches!(self.kind(), TokenKind::Newline | TokenKind::Semicolon) {
                self.advance();
            }
            if self.at(TokenKind::Eof) || self.at_body_end(stop) {
                break;
            }
            let start = self.pos;
            let result = match ctx {
                Ctx::Deck => self.parse_statement(),
                Ctx::Property => self.parse_property_statement(),
            };
            let failed = result.is_err();
            match result {
                Ok(Some(stmt)) => out.push(stmt),
                Ok(None) => {}
                Err(e) => out.push(self.recover(start, e)),
            }
            if self.pos == start {
                let t = self.advance();
                if !failed {
                    let pos = pos_of(t);
                    self.diagnostic(
                        DiagnosticKind::UnexpectedToken,
                        pos,
                        format!("unexpected {}", describe(t)),
                    );
                }
            }
        }
        out
    }

    /// Record `err`, skip to the next statement boundary (a newline at
    /// nesting depth zero, or an unmatched `}`/`]` which is left for the
    /// enclosing body) and return the placeholder statement.
    fn recover(&mut self, start: usize, err: SyntaxError) -> Stmt {
        self.report(&err);
        self.paren_depth = 0;
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => break,
                TokenKind::Newline if depth == 0 => break,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RBracket if depth == 0 => break,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
        let start_tok = self.tokens.get(start).unwrap_or(&EOF_TOKEN);
        let end = self.pos.max(start).min(self.tokens.len());
        let skipped = render_tokens(&self.tokens[start.min(end)..end]);
        Stmt::Error {
            message: err.message,
            skipped,
            pos: pos_of(start_tok),
        }
    }

    fn parse_program(&mut self) -> Program {
        let statements = self.parse_body(Ctx::Deck, Stop::Eof);
        Program {
            file: self.filename.clone(),
            statements,
        }
    }
}

pub(crate) fn pos_of(tok: &Token) -> Pos {
    Pos::new(tok.line, tok.col)
}

/// Human-readable token description for error messages.
fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Eof => "end of input".to_owned(),
        TokenKind::Newline => "end of line".to_owned(),
        TokenKind::Str => format!("string \"{}\"", tok.text),
        _ => format!("'{}'", tok.text),
    }
}

/// Re-render a token run as source text (newlines kept, strings quoted).
fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for t in tokens {
        if t.kind == TokenKind::Newline {
            out.push('\n');
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        match t.kind {
            TokenKind::Str => {
                out.push('"');
                out.push_str(&t.text.replace('\\', "\\\\").replace('"', "\\\""));
                out.push('"');
            }
            TokenKind::Description => {
                out.push_str("@ ");
                out.push_str(&t.text);
            }
            _ => out.push_str(&t.text),
        }
    }
    out.trim_end().to_owned()
}

/// Like [`render_tokens`], on one line.
fn render_inline(tokens: &[Token]) -> String {
    render_tokens(tokens)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a token stream (terminated by `Eof`) into a program, returning the
/// syntax diagnostics and semantic warnings gathered on the way.
pub fn parse_tokens(
    tokens: &[Token],
    symbols: &SymbolTable,
    filename: &str,
) -> (Program, Vec<Diagnostic>) {
    let mut p = Parser::new(tokens, symbols, filename);
    let program = p.parse_program();
    (program, p.diagnostics)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
