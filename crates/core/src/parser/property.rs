//! Property blocks (`[ PROPERTY a, b ... ]`), `IF` chains and the
//! arithmetic expression grammar used inside them and by `VARIABLE`.

use super::{describe, pos_of, Ctx, PResult, Parser, Stop};
use crate::ast::{Arg, ElseIf, Expr, PropertyBlock, Stmt};
use crate::error::{DiagnosticKind, SyntaxErrorKind};
use crate::token::TokenKind;

/// Statement keywords of the property language. Matched case-insensitively.
const PROPERTY_KEYWORDS: &[&str] = &[
    "resolve", "action", "output", "anchor", "select", "stamp", "text", "label", "print",
    "effective", "tolerance",
];

const BP_UNARY: u8 = 30;

/// Infix binding power and operator text of an arithmetic operator.
fn arith_infix(kind: TokenKind) -> Option<(u8, &'static str)> {
    Some(match kind {
        TokenKind::Question => (1, "?"),
        TokenKind::OrOr => (2, "||"),
        TokenKind::AndAnd => (3, "&&"),
        TokenKind::Lt => (5, "<"),
        TokenKind::Le => (5, "<="),
        TokenKind::Gt => (5, ">"),
        TokenKind::Ge => (5, ">="),
        TokenKind::EqEq => (5, "=="),
        TokenKind::NotEq => (5, "!="),
        TokenKind::Plus => (10, "+"),
        TokenKind::Minus => (10, "-"),
        TokenKind::Star => (20, "*"),
        TokenKind::Slash => (20, "/"),
        TokenKind::Percent => (20, "%"),
        TokenKind::Caret => (25, "^"),
        TokenKind::ColonColon => (35, "::"),
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    // -- Blocks --------------------------------------------------

    pub(super) fn parse_property_block(&mut self) -> PResult<PropertyBlock> {
        let open = self.expect(TokenKind::LBracket, "'['")?;
        self.skip_newlines();

        let mut properties = Vec::new();
        if self.at_word("PROPERTY") {
            self.advance();
            while !self.at_eol() && !self.at(TokenKind::RBracket) {
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                properties.push(self.take_ident("property name")?.0);
            }
        }

        let body = self.parse_body(Ctx::Property, Stop::Bracket);
        if !self.eat(TokenKind::RBracket) {
            self.diagnostic(
                DiagnosticKind::UnclosedBlock,
                pos_of(open),
                "unclosed '[': property block has no matching ']'",
            );
            return Ok(PropertyBlock {
                properties,
                body,
                trailing: Vec::new(),
                pos: pos_of(open),
            });
        }

        let mut trailing: Vec<Arg> = Vec::new();
        while !self.at_eol() {
            trailing.push(self.parse_arg()?);
        }
        Ok(PropertyBlock {
            properties,
            body,
            trailing,
            pos: pos_of(open),
        })
    }

    pub(super) fn parse_property_statement(&mut self) -> PResult<Option<Stmt>> {
        let tok = self.cur();
        match tok.kind {
            TokenKind::PpDefine => return self.parse_define().map(Some),
            TokenKind::PpIfdef | TokenKind::PpIfndef => {
                return self.parse_ifdef(Ctx::Property).map(Some)
            }
            TokenKind::PpElse | TokenKind::PpEndif | TokenKind::RBrace | TokenKind::RParen => {
                self.advance();
                return Err(self.error_at(
                    tok,
                    SyntaxErrorKind::UnexpectedToken,
                    format!("unexpected {} in property block", describe(tok)),
                ));
            }
            _ => {}
        }

        let next = self.peek(1).kind;
        let after = self.peek(2).kind;
        let stmt = match (tok.kind, next, after) {
            (TokenKind::Ident, _, _) if tok.is_word("IF") => self.parse_if_chain()?,
            (TokenKind::Ident | TokenKind::Str, TokenKind::Equals, _) => {
                self.advance();
                self.property_assignment(tok.text.clone(), "=", pos_of(tok))?
            }
            (TokenKind::Ident, TokenKind::Plus | TokenKind::Minus, TokenKind::Equals) => {
                let op = if next == TokenKind::Plus { "+=" } else { "-=" };
                self.advance();
                self.property_assignment(tok.text.clone(), op, pos_of(tok))?
            }
            (TokenKind::Plus | TokenKind::Minus, TokenKind::Equals, _) => {
                let op = if tok.kind == TokenKind::Plus { "+=" } else { "-=" };
                self.property_assignment(String::new(), op, pos_of(tok))?
            }
            (TokenKind::Ident, _, _) if is_property_keyword(&tok.text) => {
                self.property_keyword_statement()?
            }
            _ => {
                let expr = self.parse_arith(0)?;
                self.expect_property_end()?;
                Stmt::Expression { expr }
            }
        };
        Ok(Some(stmt))
    }

    /// Cursor on the operator (`=`, or `+`/`-` before `=`).
    fn property_assignment(&mut self, name: String, op: &str, pos: crate::ast::Pos) -> PResult<Stmt> {
        if op != "=" {
            self.advance();
        }
        self.expect(TokenKind::Equals, "'='")?;
        let expression = self.parse_arith(0)?;
        self.expect_property_end()?;
        Ok(Stmt::LayerAssignment {
            name,
            op: op.to_owned(),
            expression,
            pos,
        })
    }

    fn property_keyword_statement(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        let mut keywords = Vec::new();
        let mut arguments = Vec::new();
        while !self.at_eol() && !matches!(self.kind(), TokenKind::RBracket | TokenKind::Semicolon) {
            if self.at(TokenKind::Ident) {
                keywords.push(self.advance().text.clone());
            } else {
                arguments.push(self.parse_arg()?);
            }
        }
        Ok(Stmt::Directive {
            keywords,
            arguments,
            property_block: None,
            pos,
        })
    }

    fn expect_property_end(&self) -> PResult<()> {
        match self.kind() {
            TokenKind::Newline
            | TokenKind::Eof
            | TokenKind::Semicolon
            | TokenKind::RBracket
            | TokenKind::RBrace => Ok(()),
            _ => Err(self.error_at(
                self.cur(),
                SyntaxErrorKind::UnexpectedToken,
                format!("unexpected {} after property statement", describe(self.cur())),
            )),
        }
    }

    // -- IF chains -----------------------------------------------

    /// `IF cond { ... } [ELSE IF cond { ... }]... [ELSE { ... }]`. `ELSE`
    /// may start the line after the closing brace.
    pub(super) fn parse_if_chain(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let condition = self.parse_arith(0)?;
        let then_body = self.parse_brace_body(Ctx::Property)?;

        let mut else_ifs = Vec::new();
        let mut else_body = None;
        while self.next_significant().is_word("ELSE") {
            self.skip_newlines();
            self.advance();
            if self.eat_word("IF") {
                let condition = self.parse_arith(0)?;
                let body = self.parse_brace_body(Ctx::Property)?;
                else_ifs.push(ElseIf { condition, body });
            } else {
                else_body = Some(self.parse_brace_body(Ctx::Property)?);
                break;
            }
        }
        Ok(Stmt::IfExpr {
            condition,
            then_body,
            else_ifs,
            else_body,
            pos,
        })
    }

    // -- Arithmetic ----------------------------------------------

    /// Arithmetic expression: C-like precedence with `?:`, `||`, `&&`,
    /// comparisons, `+ -`, `* / %`, `^` and `::`. An operator at the end of a
    /// line continues the expression on the next.
    pub(super) fn parse_arith(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut left = self.arith_operand()?;
        while let Some((bp, op)) = arith_infix(self.kind()) {
            if bp <= min_bp {
                break;
            }
            self.advance();
            self.skip_newlines();
            if op == "?" {
                let then = self.parse_arith(0)?;
                self.skip_newlines();
                self.expect(TokenKind::Colon, "':' of conditional expression")?;
                self.skip_newlines();
                let otherwise = self.parse_arith(0)?;
                let branches = Expr::binary(":", then, otherwise);
                left = Expr::binary("?", left, branches);
                continue;
            }
            let right = self.parse_arith(bp)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn arith_operand(&mut self) -> PResult<Expr> {
        let tok = self.cur();
        let pos = pos_of(tok);
        match tok.kind {
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_arith(0)?;
                self.skip_newlines_before_closer();
                self.close_paren(tok)?;
                Ok(inner)
            }
            TokenKind::Minus => {
                self.advance();
                if self.kind().is_number() {
                    let num = self.advance();
                    return Ok(Expr::number(-self.number_value(num)?, pos));
                }
                let operand = self.parse_arith(BP_UNARY)?;
                Ok(Expr::unary("-", operand, pos))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_arith(BP_UNARY)?;
                Ok(Expr::unary("!", operand, pos))
            }
            TokenKind::Integer | TokenKind::Float => {
                self.advance();
                Ok(Expr::number(self.number_value(tok)?, pos))
            }
            TokenKind::Str => {
                self.advance();
                Ok(Expr::StringLiteral {
                    value: tok.text.clone(),
                    pos,
                })
            }
            TokenKind::Ident if self.peek(1).kind == TokenKind::LParen => self.parse_call(true),
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::layer(tok.text.clone(), pos))
            }
            _ => Err(self.expected("value")),
        }
    }

    /// `name(arg, ...)`; arguments use the arithmetic grammar when `arith`
    /// is set and the layer grammar otherwise.
    pub(super) fn parse_call(&mut self, arith: bool) -> PResult<Expr> {
        let name = self.advance();
        let open = self.expect(TokenKind::LParen, "'('")?;
        self.paren_depth += 1;
        let mut args = Vec::new();
        self.skip_newlines();
        if !self.at(TokenKind::RParen) {
            loop {
                let arg = if arith {
                    self.parse_arith(0)?
                } else {
                    self.parse_expr(0)?
                };
                args.push(arg);
                self.skip_newlines_before_closer();
                if !self.eat(TokenKind::Comma) {
                    break;
                }
                self.skip_newlines();
            }
        }
        self.paren_depth -= 1;
        self.close_paren(open)?;
        Ok(Expr::FuncCall {
            name: name.text.clone(),
            args,
            pos: pos_of(name),
        })
    }

    /// Newlines inside a group are skipped when the next significant token
    /// continues the group.
    pub(super) fn skip_newlines_before_closer(&mut self) {
        if self.at(TokenKind::Newline)
            && matches!(
                self.next_significant().kind,
                TokenKind::Comma | TokenKind::RParen | TokenKind::RBracket
            )
        {
            self.skip_newlines();
        }
    }

    /// Consume the `)` matching `open`. Running out of line is an unclosed
    /// group; any other token is unexpected.
    pub(super) fn close_paren(&mut self, open: &crate::token::Token) -> PResult<()> {
        if self.eat(TokenKind::RParen) {
            return Ok(());
        }
        if self.at_eol() {
            return Err(self.error_at(
                open,
                SyntaxErrorKind::UnclosedBlock,
                "unclosed '(': expected ')' before end of line",
            ));
        }
        Err(self.error_at(
            self.cur(),
            SyntaxErrorKind::UnexpectedToken,
            format!("expected ')', found {}", describe(self.cur())),
        ))
    }
}

fn is_property_keyword(word: &str) -> bool {
    PROPERTY_KEYWORDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(word))
}
