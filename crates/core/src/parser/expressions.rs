//! Pratt parser for layer expressions.
//!
//! Binding powers come from [`crate::keywords`]. Keyword operators that
//! only act as operators with a particular follower (`COIN EDGE`, postfix
//! `AREA >`, `NET AREA`, ...) are decided here by look-ahead. A name found
//! in the symbol table is always a layer reference and never fuses into a
//! compound operator.

use super::{pos_of, PResult, Parser};
use crate::ast::{Constraint, Expr, Modifier};
use crate::error::SyntaxErrorKind;
use crate::keywords::{self, Roles, BP_ADD, BP_AND, BP_BY, BP_COMPARE, BP_MUL, BP_POW};
use crate::keywords::{BP_PREFIX, BP_SPATIAL, BP_SUB};
use crate::token::{Token, TokenKind};

/// Words that fuse with a preceding `NOT` into one spatial operator.
const NOT_FUSIBLE: &[&str] = &[
    "INSIDE", "INTERACT", "ENCLOSE", "CUT", "IN", "OUT", "OUTSIDE", "TOUCH",
];

const MEASUREMENTS: &[&str] = &["AREA", "PERIMETER", "LENGTH", "ANGLE", "VERTEX"];

const RECTANGLE_FOLLOWERS: &[&str] = &["ORTHOGONAL", "ONLY", "ASPECT", "BY", "SINGULAR", "ALSO", "CENTERS"];

/// How far a modifier tail reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Tail {
    /// Everything to the end of the operation (DRC and DFM operations).
    Greedy,
    /// Known modifier words without an infix meaning, plus the listed extras.
    Known(&'static [&'static str]),
}

impl<'a> Parser<'a> {
    pub(super) fn parse_expr(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut left = self.nud()?;
        loop {
            if self.paren_depth > 0
                && self.at(TokenKind::Newline)
                && self.infix_power_at(1) > min_bp
            {
                self.advance();
            }
            let bp = self.infix_power_at(0);
            if bp == 0 || bp <= min_bp {
                break;
            }
            left = self.led(left, bp)?;
        }
        Ok(left)
    }

    // -- Operand starts ------------------------------------------

    /// Can the token at offset `n` begin a layer operand?
    pub(super) fn starts_operand_at(&self, n: usize) -> bool {
        let t = self.peek(n);
        match t.kind {
            TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::Minus
            | TokenKind::Bang => true,
            TokenKind::Ident => {
                self.symbols.contains(&t.text)
                    || keywords::has_role(&t.text, Roles::EXPR_STARTER)
                    || !keywords::is_svrf_keyword(&t.text)
            }
            _ => false,
        }
    }

    pub(super) fn starts_operand(&self) -> bool {
        self.starts_operand_at(0)
    }

    /// Does the line after the newline at offset `n - 1` open with an
    /// operand rather than a new statement?
    pub(super) fn line_starts_operand(&self, n: usize) -> bool {
        let t = self.peek(n);
        if t.kind == TokenKind::Ident {
            match self.peek(n + 1).kind {
                TokenKind::Equals | TokenKind::LBrace => return false,
                TokenKind::Newline if self.peek(n + 2).kind == TokenKind::LBrace => return false,
                _ => {}
            }
        }
        self.starts_operand_at(n)
    }

    /// After a binary operator: an operator ending its line continues on
    /// the next one when that line opens with an operand.
    fn continue_after_operator(&mut self) {
        if self.at(TokenKind::Newline) && self.line_starts_operand(1) {
            self.advance();
        }
    }

    // -- Infix powers --------------------------------------------

    pub(super) fn infix_power_at(&self, n: usize) -> u8 {
        let t = self.peek(n);
        match t.kind {
            k if k.is_comparison() => BP_COMPARE,
            TokenKind::Caret => BP_POW,
            TokenKind::Star | TokenKind::Slash => BP_MUL,
            TokenKind::Minus => BP_SUB,
            TokenKind::Plus => BP_ADD,
            TokenKind::Ident => self.word_infix_power(n, t),
            _ => 0,
        }
    }

    fn word_infix_power(&self, n: usize, t: &Token) -> u8 {
        if self.symbols.contains(&t.text) {
            return 0;
        }
        let next = self.peek(n + 1);
        let next_is = |w: &str| next.is_word(w) && !self.symbols.contains(&next.text);
        let upper = t.text.to_ascii_uppercase();
        match upper.as_str() {
            "NOT" => {
                let fused = NOT_FUSIBLE.iter().any(|w| next_is(w));
                if fused {
                    BP_SPATIAL
                } else {
                    BP_AND
                }
            }
            "COIN" | "COINCIDENT" => {
                if next_is("EDGE") || self.edge_pair_at(n + 1) {
                    BP_SPATIAL
                } else {
                    0
                }
            }
            "SIZE" | "CONNECTED" => BP_COMPARE,
            "NET" if next_is("AREA") || next_is("INTERACT") => BP_COMPARE,
            "CONVEX" | "EXPAND" if next_is("EDGE") => BP_COMPARE,
            w if MEASUREMENTS.contains(&w) && next.kind.is_comparison() => BP_COMPARE,
            "RECTANGLE"
                if next.kind.is_comparison()
                    || RECTANGLE_FOLLOWERS.iter().any(|w| next_is(w)) =>
            {
                BP_COMPARE
            }
            "HOLES" | "DONUT" => BP_PREFIX,
            other => keywords::infix_bp(other).unwrap_or(0),
        }
    }

    /// `INSIDE EDGE` / `OUTSIDE EDGE` at offset `n`.
    fn edge_pair_at(&self, n: usize) -> bool {
        (self.kw_at(n, "INSIDE") || self.kw_at(n, "OUTSIDE")) && self.kw_at(n + 1, "EDGE")
    }

    // -- Prefix position -----------------------------------------

    fn nud(&mut self) -> PResult<Expr> {
        let tok = self.cur();
        let pos = pos_of(tok);
        match tok.kind {
            TokenKind::LParen => self.grouped(TokenKind::RParen),
            TokenKind::LBracket => self.grouped(TokenKind::RBracket),
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
            TokenKind::Minus => {
                self.advance();
                if self.kind().is_number() {
                    let num = self.advance();
                    return Ok(Expr::number(-self.number_value(num)?, pos));
                }
                let operand = self.parse_expr(BP_PREFIX)?;
                Ok(Expr::unary("-", operand, pos))
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expr(BP_PREFIX)?;
                Ok(Expr::unary("NOT", operand, pos))
            }
            TokenKind::Ident => self.word_nud(tok),
            _ => Err(self.expected("layer expression")),
        }
    }

    fn word_nud(&mut self, tok: &'a Token) -> PResult<Expr> {
        let pos = pos_of(tok);
        if self.symbols.contains(&tok.text) {
            self.advance();
            return Ok(Expr::layer(tok.text.clone(), pos));
        }
        let upper = tok.text.to_ascii_uppercase();
        if let Some(expr) = self.keyword_nud(&upper, pos)? {
            return Ok(expr);
        }
        if self.peek(1).kind == TokenKind::LParen && tok.touches(self.peek(1)) {
            return self.parse_call(false);
        }
        if keywords::has_role(&upper, Roles::BINARY_OP | Roles::RESERVED) {
            return Err(self.error_at(
                tok,
                SyntaxErrorKind::UnexpectedToken,
                format!("'{}' cannot start an expression", tok.text),
            ));
        }
        self.advance();
        Ok(Expr::layer(tok.text.clone(), pos))
    }

    /// Keyword-led forms. `None` when the word does not lead an expression
    /// here and should be read as a name.
    fn keyword_nud(&mut self, upper: &str, pos: crate::ast::Pos) -> PResult<Option<Expr>> {
        let expr = match upper {
            "NOT" if self.kw_at(1, "ENCLOSE") && self.kw_at(2, "RECTANGLE") => self.drc_op(pos)?,
            "NOT" | "COPY" | "HOLES" | "DONUT" | "MERGE" | "PUSH" => self.unary_family(upper, pos)?,
            w if MEASUREMENTS.contains(&w) => self.measurement(pos)?,
            "PATH" if self.kw_at(1, "LENGTH") => self.measurement(pos)?,
            "INT" | "EXT" | "ENC" | "ENCLOSE" | "DENSITY" | "SIZE" | "SHIFT" | "GROW"
            | "SHRINK" | "RECTANGLE" | "RECTANGLES" | "EXTENT" | "EXTENTS" | "OFFGRID"
            | "ROTATE" | "GOOD" | "DRAWN" | "NET" => self.drc_op(pos)?,
            "STAMP" => self.stamp_prefix(pos)?,
            "DEVICE" if self.kw_at(1, "LAYER") => self.device_layer(pos)?,
            "PATHCHK" => self.pathchk(pos)?,
            "DFM" | "RET" => self.dfm_op(pos)?,
            "CONVEX" | "EXPAND" if self.kw_at(1, "EDGE") => self.drc_op(pos)?,
            "EXPAND" if self.kw_at(1, "TEXT") => self.drc_op(pos)?,
            "WITH" => self.with_op(None, pos)?,
            "COIN" | "COINCIDENT" | "IN"
                if self.kw_at(1, "EDGE") || self.edge_pair_at(1) =>
            {
                self.edge_prefix(pos)?
            }
            "TOUCH" | "INSIDE" | "OUTSIDE" if self.kw_at(1, "EDGE") || self.edge_pair_at(1) => {
                self.edge_prefix(pos)?
            }
            "INSIDE" | "OUTSIDE" if self.kw_at(1, "CELL") => self.drc_op(pos)?,
            "INSIDE" | "OUTSIDE" | "INTERACT" | "CUT" => self.unary_family(upper, pos)?,
            "OR" | "XOR" | "AND" => self.operand_list(pos)?,
            _ => return Ok(None),
        };
        Ok(Some(expr))
    }

    /// `( expr )` or `[ expr ]`.
    fn grouped(&mut self, close: TokenKind) -> PResult<Expr> {
        let open = self.advance();
        self.paren_depth += 1;
        self.skip_newlines();
        let inner = self.parse_expr(0)?;
        self.skip_newlines_before_closer();
        self.paren_depth -= 1;
        if close == TokenKind::RParen {
            self.close_paren(open)?;
        } else if !self.eat(TokenKind::RBracket) {
            let kind = if self.at_eol() {
                SyntaxErrorKind::UnclosedBlock
            } else {
                SyntaxErrorKind::UnexpectedToken
            };
            return Err(self.error_at(open, kind, "expected ']' to close '['"));
        }
        Ok(inner)
    }

    /// `NOT`, `COPY`, `HOLES`, ... : one operand, then any known trailing
    /// modifier flags.
    fn unary_family(&mut self, upper: &str, pos: crate::ast::Pos) -> PResult<Expr> {
        self.advance();
        let operand = self.parse_expr(BP_PREFIX)?;
        let expr = Expr::unary(upper, operand, pos);
        let (constraints, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
        Ok(expr.constrained(constraints, modifiers))
    }

    /// `AREA layer > 5` and friends. `LENGTH` may also put the constraint
    /// chain before its operand.
    fn measurement(&mut self, pos: crate::ast::Pos) -> PResult<Expr> {
        let mut op = self.advance().text.to_ascii_uppercase();
        if op == "PATH" {
            self.advance();
            op = "PATH LENGTH".to_owned();
        }
        let mut constraints = Vec::new();
        if op.ends_with("LENGTH") {
            constraints = self.parse_constraints()?;
        }
        let operand = self.parse_expr(BP_PREFIX)?;
        let (more, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
        constraints.extend(more);
        Ok(Expr::unary(op, operand, pos).constrained(constraints, modifiers))
    }

    /// `STAMP a BY b`, the prefix spelling of `a STAMP b`.
    fn stamp_prefix(&mut self, pos: crate::ast::Pos) -> PResult<Expr> {
        self.advance();
        let target = self.parse_expr(BP_BY)?;
        if !self.eat_word("BY") {
            return Err(self.expected("BY"));
        }
        let source = self.parse_expr(BP_BY)?;
        Ok(Expr::binary_at("STAMP", target, source, pos))
    }

    /// `COIN EDGE a`, `TOUCH INSIDE EDGE a b`, ... One operand gives a
    /// UnaryOp, two a BinaryOp.
    fn edge_prefix(&mut self, pos: crate::ast::Pos) -> PResult<Expr> {
        let op = self.edge_operator_name();
        let first = self.parse_expr(BP_PREFIX)?;
        if self.at_stop() || !self.starts_operand() || self.at(TokenKind::Comma) {
            return Ok(Expr::unary(op, first, pos));
        }
        let second = self.parse_expr(BP_PREFIX)?;
        let expr = Expr::binary(op, first, second);
        let (constraints, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
        Ok(expr.constrained(constraints, modifiers))
    }

    /// Consume `WORD [INSIDE|OUTSIDE EDGE | EDGE]` and return it as one name.
    fn edge_operator_name(&mut self) -> String {
        let mut op = self.advance().text.to_ascii_uppercase();
        if self.edge_pair_at(0) {
            op.push(' ');
            op.push_str(&self.advance().text.to_ascii_uppercase());
        }
        if self.kw_at(0, "EDGE") {
            self.advance();
            op.push_str(" EDGE");
        }
        op
    }

    /// Prefix `OR a b c` / `AND a b`: operands to the end of the list,
    /// continuing onto following lines inside blocks and parentheses.
    fn operand_list(&mut self, pos: crate::ast::Pos) -> PResult<Expr> {
        let mut op = self.advance().text.to_ascii_uppercase();
        if op == "OR" && self.kw_at(0, "EDGE") {
            self.advance();
            op.push_str(" EDGE");
        }
        let mut operands = Vec::new();
        loop {
            while !self.at_stop() && !self.at(TokenKind::Comma) && self.starts_operand() {
                operands.push(self.parse_expr(BP_PREFIX)?);
            }
            let multiline = self.block_depth > 0 || self.paren_depth > 0;
            if multiline && self.at(TokenKind::Newline) && self.line_starts_operand(1) {
                self.advance();
                continue;
            }
            break;
        }
        let mut rest = operands.into_iter();
        let Some(first) = rest.next() else {
            return Err(self.expected(&format!("operand of {}", op)));
        };
        Ok(rest.fold(first, |acc, next| {
            Expr::binary_at(op.clone(), acc, next, pos)
        }))
    }

    // -- Infix position ------------------------------------------

    fn led(&mut self, left: Expr, bp: u8) -> PResult<Expr> {
        let tok = self.cur();
        if tok.kind.is_comparison() {
            let constraints = self.parse_constraints()?;
            let (more, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
            let mut all = constraints;
            all.extend(more);
            return Ok(left.constrained(all, modifiers));
        }
        if tok.kind != TokenKind::Ident {
            let op = self.advance().text.clone();
            self.continue_after_operator();
            let right = self.parse_expr(bp)?;
            return Ok(Expr::binary(op, left, right));
        }

        let upper = tok.text.to_ascii_uppercase();
        match upper.as_str() {
            "ENCLOSE" if self.kw_at(1, "RECTANGLE") => self.drc_postfix(left),
            "NOT" if self.kw_at(1, "ENCLOSE") && self.kw_at(2, "RECTANGLE") => {
                self.drc_postfix(left)
            }
            "WITH" => {
                let pos = left.pos();
                self.with_op(Some(left), pos)
            }
            "SIZE" | "CONVEX" | "EXPAND" | "NET" | "RECTANGLE" => self.drc_postfix(left),
            w if MEASUREMENTS.contains(&w) => {
                let op = self.advance().text.to_ascii_uppercase();
                let pos = left.pos();
                let constraints = self.parse_constraints()?;
                let (more, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
                let mut all = constraints;
                all.extend(more);
                Ok(Expr::unary(op, left, pos).constrained(all, modifiers))
            }
            "HOLES" | "DONUT" => {
                self.advance();
                let pos = left.pos();
                let expr = Expr::unary(upper, left, pos);
                let (constraints, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
                Ok(expr.constrained(constraints, modifiers))
            }
            "CONNECTED" => {
                let flag = self.advance().text.clone();
                Ok(left.constrained(Vec::new(), vec![Modifier::Flag(flag)]))
            }
            _ => self.binary_keyword(left, bp),
        }
    }

    /// Keyword binary operators, including the fused spellings `NOT INSIDE`,
    /// `INSIDE OF`, `OR EDGE`, `TOUCH OUTSIDE EDGE`, `COIN EDGE`, ...
    fn binary_keyword(&mut self, left: Expr, bp: u8) -> PResult<Expr> {
        let word = self.cur().text.to_ascii_uppercase();
        let op = match word.as_str() {
            "NOT" if bp == BP_SPATIAL => {
                self.advance();
                let mut op = format!("NOT {}", self.advance().text.to_ascii_uppercase());
                if self.kw_at(0, "EDGE") {
                    self.advance();
                    op.push_str(" EDGE");
                }
                op
            }
            "INSIDE" if self.kw_at(1, "OF") => {
                self.advance();
                self.advance();
                self.eat_kw("LAYER");
                "INSIDE OF".to_owned()
            }
            "INSIDE" | "OUTSIDE" | "OUT" | "TOUCH" | "IN" | "COIN" | "COINCIDENT" | "OR" => {
                self.edge_operator_name()
            }
            _ => {
                self.advance();
                word.clone()
            }
        };

        self.continue_after_operator();
        let right = self.parse_expr(bp)?;
        let mut expr = Expr::binary(op.clone(), left, right);

        if op == "OR" || op == "AND" {
            while !self.at_stop()
                && !self.at(TokenKind::Comma)
                && self.starts_operand()
                && self.infix_power_at(0) == 0
            {
                let extra = self.parse_expr(bp)?;
                expr = Expr::binary(op.clone(), expr, extra);
            }
        }
        if bp == BP_SPATIAL || op.ends_with(" EDGE") {
            let (constraints, modifiers) = self.modifier_tail(Tail::Known(&[]))?;
            expr = expr.constrained(constraints, modifiers);
        }
        Ok(expr)
    }

    /// Consume keyword `word` if present and not a declared name.
    pub(super) fn eat_kw(&mut self, word: &str) -> bool {
        if self.kw_at(0, word) {
            self.advance();
            true
        } else {
            false
        }
    }

    // -- Constraints ---------------------------------------------

    /// A chain of `op value` comparisons, kept in source order.
    pub(super) fn parse_constraints(&mut self) -> PResult<Vec<Constraint>> {
        let mut out = Vec::new();
        while self.kind().is_comparison() {
            let tok = self.advance();
            let value = self.parse_expr(BP_BY)?;
            out.push(Constraint {
                op: tok.text.clone(),
                value: Some(value),
                pos: pos_of(tok),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assigned, flags, parse_src};
    use crate::ast::{Expr, Pos, Stmt};
    use crate::error::DiagnosticKind;

    const LAYERS: &str = "LAYER A 1\nLAYER B 2\nLAYER C 3\nLAYER D 4\n";

    fn expr(src: &str) -> Expr {
        assigned(&format!("{}X = {}\n", LAYERS, src))
    }

    fn op(e: &Expr) -> String {
        match e {
            Expr::BinaryOp { op, .. } | Expr::UnaryOp { op, .. } | Expr::DrcOp { op, .. } => {
                op.clone()
            }
            Expr::ConstrainedExpr { expr, .. } => format!("[{}]", op(expr)),
            Expr::LayerRef { name, .. } => name.clone(),
            other => panic!("unexpected node {:?}", other),
        }
    }

    fn sides(e: &Expr) -> (&Expr, &Expr) {
        match e {
            Expr::BinaryOp { left, right, .. } => (left, right),
            other => panic!("expected BinaryOp, got {:?}", other),
        }
    }

    #[test]
    fn precedence_of_boolean_operators() {
        let e = expr("A OR B AND C NOT D");
        assert_eq!(op(&e), "OR");
        let (_, right) = sides(&e);
        assert_eq!(op(right), "NOT");
        let (and, _) = sides(right);
        assert_eq!(op(and), "AND");
    }

    #[test]
    fn spatial_binds_tighter_than_and() {
        let e = expr("A AND B INTERACT C");
        assert_eq!(op(&e), "AND");
        assert_eq!(op(sides(&e).1), "INTERACT");
    }

    #[test]
    fn fused_negations() {
        assert_eq!(op(&expr("A NOT INTERACT B")), "NOT INTERACT");
        assert_eq!(op(&expr("A NOT INSIDE EDGE B")), "NOT INSIDE EDGE");
        assert_eq!(op(&expr("A NOT B")), "NOT");
    }

    #[test]
    fn symbol_named_like_keyword_blocks_fusion() {
        let e = assigned("LAYER A 1\nLAYER INSIDE 2\nX = A NOT INSIDE\n");
        assert_eq!(op(&e), "NOT");
        assert!(matches!(sides(&e).1, Expr::LayerRef { name, .. } if name == "INSIDE"));
    }

    #[test]
    fn edge_compounds() {
        assert_eq!(op(&expr("A COIN EDGE B")), "COIN EDGE");
        assert_eq!(op(&expr("A TOUCH OUTSIDE EDGE B")), "TOUCH OUTSIDE EDGE");
        assert_eq!(op(&expr("A INSIDE OF LAYER B")), "INSIDE OF");
        assert_eq!(op(&expr("A OR EDGE B")), "OR EDGE");
        assert_eq!(op(&expr("COIN EDGE A")), "COIN EDGE");
        assert!(matches!(expr("TOUCH EDGE A B"), Expr::BinaryOp { .. }));
        assert!(matches!(expr("INSIDE EDGE A"), Expr::UnaryOp { .. }));
    }

    #[test]
    fn or_chains_and_prefix_lists() {
        let e = expr("A OR B C D");
        assert_eq!(op(&e), "OR");
        assert_eq!(op(sides(&e).0), "OR");
        let e = expr("OR A B C");
        assert_eq!(op(&e), "OR");
        assert!(matches!(expr("OR A"), Expr::LayerRef { .. }));
    }

    #[test]
    fn prefix_list_continues_across_lines_in_blocks() {
        let (program, diags) = parse_src(&format!("{}R {{\n  OR A B\n     C D\n}}\n", LAYERS));
        assert!(diags.is_empty(), "{:?}", diags);
        match program.statements.last() {
            Some(Stmt::RuleCheckBlock { body, .. }) => assert_eq!(body.len(), 1),
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn trailing_operator_continues_on_next_line() {
        let e = expr("A AND\n  B");
        assert_eq!(op(&e), "AND");
    }

    #[test]
    fn leading_operator_inside_parens() {
        let e = expr("(A\n  AND B)");
        assert_eq!(op(&e), "AND");
    }

    #[test]
    fn arithmetic_in_layer_context() {
        let e = expr("A + B * 2");
        assert_eq!(op(&e), "+");
        assert_eq!(op(sides(&e).1), "*");
    }

    #[test]
    fn unary_family_with_flags() {
        let e = expr("HOLES A INNER");
        match &e {
            Expr::ConstrainedExpr { expr, modifiers, .. } => {
                assert_eq!(op(expr), "HOLES");
                assert_eq!(flags(modifiers), vec!["INNER"]);
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
        assert_eq!(op(&expr("NOT A")), "NOT");
        assert_eq!(op(&expr("!A")), "NOT");
        assert_eq!(op(&expr("COPY A")), "COPY");
    }

    #[test]
    fn holes_and_donut_share_one_shape() {
        for name in ["HOLES", "DONUT"] {
            match expr(&format!("{} A", name)) {
                Expr::UnaryOp { op, operand, .. } => {
                    assert_eq!(op, name);
                    assert!(matches!(*operand, Expr::LayerRef { ref name, .. } if name == "A"));
                }
                other => panic!("expected UnaryOp for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn perimeter_wraps_only_when_constrained() {
        let bare = expr("PERIMETER A");
        assert!(matches!(&bare, Expr::UnaryOp { op, .. } if op == "PERIMETER"));
        match expr("PERIMETER A > 5.0") {
            Expr::ConstrainedExpr {
                expr,
                constraints,
                modifiers,
                ..
            } => {
                assert_eq!(*expr, bare);
                assert_eq!(constraints.len(), 1);
                assert_eq!(constraints[0].op, ">");
                assert!(matches!(constraints[0].value, Some(Expr::NumberLiteral { value, .. }) if value == 5.0));
                assert!(modifiers.is_empty());
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
    }

    #[test]
    fn undeclared_measurement_word_is_the_operator() {
        match assigned("X = AREA AND M1\n") {
            Expr::UnaryOp { op, operand, .. } => {
                assert_eq!(op, "AREA");
                assert!(matches!(*operand, Expr::LayerRef { ref name, .. } if name == "M1"));
            }
            other => panic!("expected AREA UnaryOp, got {:?}", other),
        }
    }

    #[test]
    fn measurements_prefix_and_postfix_share_shape() {
        let prefix = expr("AREA A > 0.5");
        let postfix = expr("A AREA > 0.5");
        for e in [&prefix, &postfix] {
            match e {
                Expr::ConstrainedExpr { expr, constraints, .. } => {
                    assert_eq!(op(expr), "AREA");
                    assert_eq!(constraints.len(), 1);
                    assert_eq!(constraints[0].op, ">");
                }
                other => panic!("expected ConstrainedExpr, got {:?}", other),
            }
        }
    }

    #[test]
    fn length_constraint_may_precede_operand() {
        match expr("LENGTH > 0.1 < 2 A") {
            Expr::ConstrainedExpr { expr, constraints, .. } => {
                assert_eq!(op(&expr), "LENGTH");
                assert_eq!(constraints.len(), 2);
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
    }

    #[test]
    fn constraint_chain_on_layer() {
        match expr("A INTERACT B >= 2 <= 4") {
            Expr::ConstrainedExpr { expr, constraints, .. } => {
                assert_eq!(op(&expr), "INTERACT");
                let ops: Vec<_> = constraints.iter().map(|c| c.op.as_str()).collect();
                assert_eq!(ops, vec![">=", "<="]);
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
    }

    #[test]
    fn with_forms() {
        assert_eq!(op(&expr("A WITH WIDTH B")), "WITH WIDTH");
        match expr("A WITH EDGE > 1") {
            Expr::ConstrainedExpr { expr, .. } => {
                assert!(matches!(*expr, Expr::UnaryOp { ref op, .. } if op == "WITH EDGE"));
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
        match expr("A WITH TEXT \"VDD\" B") {
            Expr::DrcOp { op, operands, .. } => {
                assert_eq!(op, "WITH TEXT");
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected DrcOp, got {:?}", other),
        }
    }

    #[test]
    fn stamp_prefix_matches_infix() {
        assert_eq!(op(&expr("STAMP A BY B")), "STAMP");
        assert_eq!(op(&expr("A STAMP B")), "STAMP");
    }

    #[test]
    fn prefix_spellings_sit_at_their_keyword() {
        let at_keyword = Pos::new(5, 5);
        assert_eq!(expr("STAMP A BY B").pos(), at_keyword);
        let list = expr("OR A B C");
        assert_eq!(list.pos(), at_keyword);
        assert_eq!(sides(&list).0.pos(), at_keyword);
        assert_eq!(expr("A STAMP B").pos(), at_keyword);
    }

    #[test]
    fn connected_postfix() {
        match expr("A INTERACT B CONNECTED") {
            Expr::ConstrainedExpr { modifiers, .. } => {
                assert_eq!(flags(&modifiers), vec!["CONNECTED"]);
            }
            other => panic!("expected ConstrainedExpr, got {:?}", other),
        }
    }

    #[test]
    fn function_call_needs_adjacent_paren() {
        assert!(matches!(expr("f(A, B)"), Expr::FuncCall { ref args, .. } if args.len() == 2));
    }

    #[test]
    fn negative_literal_folds() {
        assert!(matches!(expr("-0.5"), Expr::NumberLiteral { value, .. } if value == -0.5));
    }

    #[test]
    fn binary_keyword_cannot_start_expression() {
        let (_, diags) = parse_src("X = INSIDE OF A\n");
        assert_eq!(diags[0].kind, DiagnosticKind::UnexpectedToken);
    }

    #[test]
    fn missing_right_operand() {
        let (_, diags) = parse_src(&format!("{}X = A AND\n", LAYERS));
        assert_eq!(diags[0].kind, DiagnosticKind::MissingOperand);
    }
}
