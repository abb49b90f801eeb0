//! DRC-shaped operations (`INT`, `EXT`, `ENC`, `DENSITY`, `SIZE`,
//! `RECTANGLE`, `NET AREA`, `DFM ...`, ...) and the modifier tails that
//! follow them.

use super::expressions::Tail;
use super::{pos_of, render_inline, PResult, Parser};
use crate::ast::{Constraint, Expr, Modifier, Pos};
use crate::error::SyntaxErrorKind;
use crate::keywords::{self, BP_BY, BP_PREFIX};
use crate::token::TokenKind;

/// Modifier words whose following operand is their value.
const PARAM_WORDS: &[&str] = &["BY", "OF", "LAYER", "STEP", "TRUNCATE", "WINDOW", "CELL"];

/// Words that continue a DRC operation's modifier list on the next line of
/// a block.
const CONTINUATION_WORDS: &[&str] = &["RDB", "PRINT", "POLYGON", "ACCUMULATE", "ALSO", "ONLY"];

const SIZE_WORDS: &[&str] = &[
    "BY", "INSIDE", "OUTSIDE", "OF", "LAYER", "STEP", "TRUNCATE", "UNDEROVER", "OVERUNDER",
];

const GROW_WORDS: &[&str] = &["BY"];

/// Second word that fuses with the operation keyword, per keyword.
fn followers(first: &str) -> &'static [&'static str] {
    match first {
        "ENC" | "ENCLOSE" | "NOT ENCLOSE" => &["RECTANGLE"],
        "RECTANGLE" => &["ENCLOSURE"],
        "INSIDE" | "OUTSIDE" => &["CELL"],
        "CONVEX" | "EXPAND" => &["EDGE", "TEXT"],
        "OFFGRID" => &["DIRECTIONAL"],
        "NET" => &["AREA", "INTERACT"],
        _ => &[],
    }
}

/// Operations whose operand list also takes numbers.
fn takes_numbers(op: &str) -> bool {
    op.ends_with(" RECTANGLE")
        || op.starts_with("WITH ")
        || op.starts_with("OFFGRID")
        || matches!(
            op,
            "RECTANGLE ENCLOSURE"
                | "RECTANGLES"
                | "EXTENTS"
                | "NET"
                | "EXPAND TEXT"
                | "INSIDE CELL"
                | "OUTSIDE CELL"
        )
}

impl<'a> Parser<'a> {
    pub(super) fn drc_op(&mut self, pos: Pos) -> PResult<Expr> {
        self.drc_shaped(None, pos)
    }

    /// Postfix spelling (`A SIZE BY 1`, `A NET AREA > 5`, ...): the left
    /// operand becomes the first operand of the same DrcOp the prefix form
    /// builds.
    pub(super) fn drc_postfix(&mut self, left: Expr) -> PResult<Expr> {
        let pos = left.pos();
        self.drc_shaped(Some(left), pos)
    }

    fn drc_shaped(&mut self, left: Option<Expr>, pos: Pos) -> PResult<Expr> {
        let op = self.drc_op_name();
        let mut constraints = Vec::new();
        let mut modifiers = Vec::new();
        if op == "EXTENT" {
            let (c, m) = self.modifier_tail(Tail::Known(&[]))?;
            constraints.extend(c);
            modifiers.extend(m);
        }

        let mut operands: Vec<Expr> = left.into_iter().collect();
        operands.extend(self.drc_operands(takes_numbers(&op))?);

        let (c, m) = match op.as_str() {
            "RECTANGLE" => self.rectangle_tail()?,
            "SIZE" | "SHIFT" => self.modifier_tail(Tail::Known(SIZE_WORDS))?,
            "GROW" | "SHRINK" => self.modifier_tail(Tail::Known(GROW_WORDS))?,
            "EXTENT" => self.modifier_tail(Tail::Known(&[]))?,
            _ => self.greedy_tail()?,
        };
        constraints.extend(c);
        modifiers.extend(m);
        Ok(Expr::DrcOp {
            op,
            operands,
            constraints,
            modifiers,
            pos,
        })
    }

    fn drc_op_name(&mut self) -> String {
        let mut op = self.advance().text.to_ascii_uppercase();
        if op == "NOT" && self.eat_kw("ENCLOSE") {
            op.push_str(" ENCLOSE");
        }
        let next = followers(&op).iter().find(|w| self.kw_at(0, w));
        if let Some(word) = next {
            self.advance();
            op.push(' ');
            op.push_str(word);
        }
        if op == "NET AREA" && self.eat_kw("RATIO") {
            op.push_str(" RATIO");
        }
        op
    }

    /// Operands of a DRC operation: parenthesised expressions, layer names,
    /// strings, bracketed expressions (kept as raw text) and, for some
    /// operations, numbers.
    fn drc_operands(&mut self, numeric: bool) -> PResult<Vec<Expr>> {
        let mut out = Vec::new();
        loop {
            let tok = self.cur();
            let operand = match tok.kind {
                TokenKind::LParen => self.parse_expr(BP_PREFIX)?,
                TokenKind::LBracket => self.raw_bracket()?,
                TokenKind::Str => {
                    self.advance();
                    Expr::StringLiteral {
                        value: tok.text.clone(),
                        pos: pos_of(tok),
                    }
                }
                TokenKind::Integer | TokenKind::Float if numeric => self.parse_expr(BP_BY)?,
                TokenKind::Minus if numeric && self.peek(1).kind.is_number() => {
                    self.parse_expr(BP_BY)?
                }
                TokenKind::Ident
                    if self.symbols.contains(&tok.text)
                        || !keywords::is_svrf_keyword(&tok.text) =>
                {
                    self.parse_expr(BP_PREFIX)?
                }
                _ => break,
            };
            out.push(operand);
        }
        Ok(out)
    }

    /// `[ ... ]` operand of a DRC or DFM operation, captured as text.
    fn raw_bracket(&mut self) -> PResult<Expr> {
        let open = self.advance();
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.kind() {
                TokenKind::Eof => {
                    return Err(self.error_at(
                        open,
                        SyntaxErrorKind::UnclosedBlock,
                        "unclosed '[' in operation operand",
                    ))
                }
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        let value = render_inline(&self.tokens[start..self.pos]);
        self.advance();
        Ok(Expr::StringLiteral {
            value,
            pos: pos_of(open),
        })
    }

    /// A balanced `(...)` or `[...]` group on one logical line, as text.
    fn raw_group(&mut self) -> PResult<String> {
        let open = self.advance();
        let close = if open.kind == TokenKind::LParen {
            TokenKind::RParen
        } else {
            TokenKind::RBracket
        };
        let start = self.pos - 1;
        let mut depth = 1usize;
        loop {
            let kind = self.kind();
            if kind == TokenKind::Eof || (kind == TokenKind::Newline && close == TokenKind::RParen) {
                return Err(self.error_at(
                    open,
                    SyntaxErrorKind::UnclosedBlock,
                    format!("unclosed '{}' in modifier list", open.text),
                ));
            }
            if kind == open.kind {
                depth += 1;
            } else if kind == close {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            self.advance();
        }
        self.advance();
        Ok(render_inline(&self.tokens[start..self.pos]))
    }

    // -- Modifier tails ------------------------------------------

    /// Modifiers and constraints following an operation. Comparisons met
    /// anywhere in the tail join the constraint list.
    pub(super) fn modifier_tail(&mut self, tail: Tail) -> PResult<(Vec<Constraint>, Vec<Modifier>)> {
        let greedy = tail == Tail::Greedy;
        let mut constraints = Vec::new();
        let mut modifiers = Vec::new();
        loop {
            if self.at_stop() || (self.at(TokenKind::Comma) && (self.paren_depth > 0 || !greedy)) {
                break;
            }
            let tok = self.cur();
            if tok.kind.is_comparison() {
                constraints.extend(self.parse_constraints()?);
                continue;
            }
            let modifier = match tok.kind {
                TokenKind::Ident => {
                    let upper = tok.text.to_ascii_uppercase();
                    let symbol = self.symbols.contains(&tok.text);
                    if upper == "ABUT" && !symbol {
                        modifiers.push(Modifier::Flag(self.abut_clause()));
                        continue;
                    }
                    if let Tail::Known(extra) = tail {
                        let plain = keywords::is_modifier(&upper) && self.infix_power_at(0) == 0;
                        if symbol || !(plain || extra.contains(&upper.as_str())) {
                            break;
                        }
                    }
                    if !symbol && self.names_measurement(&upper, greedy) {
                        self.advance();
                        let constraints = self.parse_constraints()?;
                        Modifier::measurement(tok.text.clone(), constraints, pos_of(tok))
                    } else {
                        self.modifier_word()?
                    }
                }
                _ if !greedy => break,
                TokenKind::Integer | TokenKind::Float => Modifier::Flag(self.advance().text.clone()),
                TokenKind::Minus if self.peek(1).kind.is_number() => {
                    self.advance();
                    Modifier::Flag(format!("-{}", self.advance().text))
                }
                TokenKind::Str => {
                    self.advance();
                    Modifier::Flag(format!("\"{}\"", tok.text.replace('\\', "\\\\").replace('"', "\\\"")))
                }
                TokenKind::LParen | TokenKind::LBracket => Modifier::Flag(self.raw_group()?),
                TokenKind::Comma
                | TokenKind::Bang
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Caret
                | TokenKind::Percent
                | TokenKind::Colon
                | TokenKind::Question
                | TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::Other => Modifier::Flag(self.advance().text.clone()),
                _ => break,
            };
            modifiers.push(modifier);
        }
        Ok((constraints, modifiers))
    }

    /// A measured quantity followed by its comparison chain. Plain `ANGLE`
    /// and `LENGTH` count only in greedy tails; elsewhere they are postfix
    /// measurement operators.
    fn names_measurement(&self, upper: &str, greedy: bool) -> bool {
        let named = keywords::is_named_measurement(upper)
            || (greedy && matches!(upper, "ANGLE" | "LENGTH"));
        named && self.peek(1).kind.is_comparison()
    }

    /// Greedy tail plus continuation lines inside blocks.
    fn greedy_tail(&mut self) -> PResult<(Vec<Constraint>, Vec<Modifier>)> {
        let (mut constraints, mut modifiers) = self.modifier_tail(Tail::Greedy)?;
        while self.block_depth > 0
            && self.at(TokenKind::Newline)
            && CONTINUATION_WORDS.iter().any(|w| self.kw_at(1, w))
        {
            self.advance();
            let (c, m) = self.modifier_tail(Tail::Greedy)?;
            constraints.extend(c);
            modifiers.extend(m);
        }
        Ok((constraints, modifiers))
    }

    /// One modifier word: a Param when followed by its value, else a Flag.
    fn modifier_word(&mut self) -> PResult<Modifier> {
        let tok = self.advance();
        let upper = tok.text.to_ascii_uppercase();
        let name = tok.text.clone();

        if PARAM_WORDS.contains(&upper.as_str()) && self.at_param_operand() {
            let value = self.parse_expr(BP_BY)?;
            return Ok(Modifier::Param { name, value });
        }
        if keywords::is_known(&upper) && self.at_literal() {
            let saved = (self.pos, self.diagnostics.len(), self.paren_depth);
            match self.parse_expr(BP_BY) {
                Ok(value) => return Ok(Modifier::Param { name, value }),
                Err(_) => {
                    self.pos = saved.0;
                    self.diagnostics.truncate(saved.1);
                    self.paren_depth = saved.2;
                }
            }
        }
        Ok(Modifier::Flag(name))
    }

    fn at_param_operand(&self) -> bool {
        let t = self.cur();
        match t.kind {
            TokenKind::Integer | TokenKind::Float | TokenKind::Str | TokenKind::LParen => true,
            TokenKind::Minus => self.peek(1).kind.is_number(),
            TokenKind::Ident => {
                self.symbols.contains(&t.text) || !keywords::is_svrf_keyword(&t.text)
            }
            _ => false,
        }
    }

    fn at_literal(&self) -> bool {
        match self.kind() {
            TokenKind::Integer | TokenKind::Float | TokenKind::Str | TokenKind::LParen => true,
            TokenKind::Minus => self.peek(1).kind.is_number(),
            _ => false,
        }
    }

    /// `ABUT`, optionally followed by bounds such as `<90`, `>10<80` or
    /// `<90>`, folded into one flag.
    fn abut_clause(&mut self) -> String {
        let mut text = self.advance().text.clone();
        let mut last_lt = false;
        for bounds in 0..2 {
            let k = self.kind();
            let bound = matches!(
                k,
                TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge | TokenKind::EqEq
            );
            let signed = self.peek(1).kind == TokenKind::Minus && self.peek(2).kind.is_number();
            if !bound || !(self.peek(1).kind.is_number() || signed) {
                break;
            }
            // A second bound must be written against the first (`>10<80`).
            if bounds > 0 && !self.peek_back().touches(self.cur()) {
                break;
            }
            last_lt = matches!(k, TokenKind::Lt | TokenKind::Le);
            text.push_str(&self.advance().text);
            if signed {
                text.push_str(&self.advance().text);
            }
            text.push_str(&self.advance().text);
        }
        if last_lt && self.at(TokenKind::Gt) && !self.peek(1).kind.is_number() {
            self.advance();
            text.push('>');
        }
        text
    }

    /// `RECTANGLE` constraints: `== w [BY == l]`, with the `BY` kept as a
    /// valueless marker.
    fn rectangle_tail(&mut self) -> PResult<(Vec<Constraint>, Vec<Modifier>)> {
        let mut constraints = self.parse_constraints()?;
        if self.kw_at(0, "BY") {
            let by = self.advance();
            constraints.push(Constraint {
                op: "BY".to_owned(),
                value: None,
                pos: pos_of(by),
            });
            constraints.extend(self.parse_constraints()?);
        }
        let (more, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
        constraints.extend(more);
        Ok((constraints, modifiers))
    }

    // -- Special forms -------------------------------------------

    /// `DFM <sub> ...` / `RET <sub> ...`. Operand lines may continue inside
    /// blocks when they hold nothing but layer names.
    pub(super) fn dfm_op(&mut self, pos: Pos) -> PResult<Expr> {
        let mut op = self.advance().text.to_ascii_uppercase();
        if self.at(TokenKind::Ident) && !self.symbols.contains(&self.cur().text) {
            let sub = self.advance().text.to_ascii_uppercase();
            op.push(' ');
            op.push_str(&sub);
            if sub == "PROPERTY" && self.eat_kw("NET") {
                op.push_str(" NET");
            }
        }
        let mut operands = self.drc_operands(false)?;
        while self.block_depth > 0 && self.at(TokenKind::Newline) && self.names_only_line(1) {
            self.advance();
            operands.extend(self.drc_operands(false)?);
        }
        let (constraints, modifiers) = self.greedy_tail()?;
        Ok(Expr::DrcOp {
            op,
            operands,
            constraints,
            modifiers,
            pos,
        })
    }

    /// The line starting at offset `n` holds only layer names and is not a
    /// statement of its own.
    fn names_only_line(&self, n: usize) -> bool {
        if !self.line_starts_operand(n) {
            return false;
        }
        let mut i = n;
        loop {
            let t = self.peek(i);
            match t.kind {
                TokenKind::Newline | TokenKind::Eof => return i > n,
                TokenKind::Ident
                    if self.symbols.contains(&t.text) || !keywords::is_svrf_keyword(&t.text) => {}
                _ => return false,
            }
            i += 1;
        }
    }

    /// `DEVICE LAYER` followed by device names; `NAME(model)` stays one flag.
    pub(super) fn device_layer(&mut self, pos: Pos) -> PResult<Expr> {
        self.advance();
        self.advance();
        let mut modifiers = Vec::new();
        while !self.at_stop() {
            let tok = self.advance();
            let mut text = match tok.kind {
                TokenKind::Str => format!("\"{}\"", tok.text),
                _ => tok.text.clone(),
            };
            if self.at(TokenKind::LParen) && tok.touches(self.cur()) {
                text.push_str(&self.raw_group()?.replace(' ', ""));
            }
            modifiers.push(Modifier::Flag(text));
        }
        Ok(Expr::DrcOp {
            op: "DEVICE LAYER".to_owned(),
            operands: Vec::new(),
            constraints: Vec::new(),
            modifiers,
            pos,
        })
    }

    /// `PATHCHK` with its net-type conditions (`!POWER && GROUND ...`).
    pub(super) fn pathchk(&mut self, pos: Pos) -> PResult<Expr> {
        self.advance();
        let mut modifiers = Vec::new();
        while !self.at_stop() {
            let tok = self.advance();
            let text = match tok.kind {
                TokenKind::Bang if self.at(TokenKind::Ident) && tok.touches(self.cur()) => {
                    format!("!{}", self.advance().text)
                }
                TokenKind::Str => format!("\"{}\"", tok.text),
                _ => tok.text.clone(),
            };
            modifiers.push(Modifier::Flag(text));
        }
        Ok(Expr::DrcOp {
            op: "PATHCHK".to_owned(),
            operands: Vec::new(),
            constraints: Vec::new(),
            modifiers,
            pos,
        })
    }

    /// `WITH` forms. After a left operand, `WITH WIDTH|EDGE|LENGTH|AREA`
    /// gives a BinaryOp (or a UnaryOp without a right operand); every other
    /// qualifier, and any prefix `WITH`, builds a DrcOp.
    pub(super) fn with_op(&mut self, left: Option<Expr>, pos: Pos) -> PResult<Expr> {
        self.advance();
        let qualifier = self.cur();
        let is_qualifier =
            qualifier.kind == TokenKind::Ident && !self.symbols.contains(&qualifier.text);
        let Some(left) = left else {
            if !is_qualifier {
                return Err(self.expected("WITH qualifier"));
            }
            return self.with_drc(Vec::new(), pos);
        };
        if !is_qualifier {
            let right = self.parse_expr(BP_BY)?;
            return Ok(Expr::binary("WITH", left, right));
        }

        let sub = qualifier.text.to_ascii_uppercase();
        if !matches!(sub.as_str(), "WIDTH" | "EDGE" | "LENGTH" | "AREA") {
            return self.with_drc(vec![left], pos);
        }
        self.advance();
        let op = format!("WITH {}", sub);
        let has_right = !self.at_stop()
            && !self.at(TokenKind::Comma)
            && !self.kind().is_comparison()
            && self.starts_operand();
        let expr = if has_right {
            let right = self.parse_expr(BP_BY)?;
            Expr::binary(op, left, right)
        } else {
            Expr::unary(op, left, pos)
        };
        let (constraints, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
        Ok(expr.constrained(constraints, modifiers))
    }

    fn with_drc(&mut self, mut operands: Vec<Expr>, pos: Pos) -> PResult<Expr> {
        let op = format!("WITH {}", self.advance().text.to_ascii_uppercase());
        operands.extend(self.drc_operands(true)?);
        let (constraints, modifiers) = self.greedy_tail()?;
        Ok(Expr::DrcOp {
            op,
            operands,
            constraints,
            modifiers,
            pos,
        })
    }
}
