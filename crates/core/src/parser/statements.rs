//! Statement dispatch and the deck-level statement forms.

use super::{describe, pos_of, Ctx, PResult, Parser, Stop};
use crate::ast::{Arg, DevicePin, Stmt};
use crate::error::{DiagnosticKind, SyntaxErrorKind};
use crate::keywords::{self, Roles};
use crate::token::{Token, TokenKind};

/// Heads that always start a directive, whatever else the word might be.
const FORCED_DIRECTIVES: &[&str] = &["CMACRO", "POLYGON", "RDB", "DISCONNECT", "DVPARAMS"];

impl<'a> Parser<'a> {
    pub(super) fn parse_statement(&mut self) -> PResult<Option<Stmt>> {
        let tok = self.cur();
        match tok.kind {
            TokenKind::PpDefine => self.parse_define().map(Some),
            TokenKind::PpIfdef | TokenKind::PpIfndef => self.parse_ifdef(Ctx::Deck).map(Some),
            TokenKind::PpInclude => self.parse_include().map(Some),
            TokenKind::PpEncrypt | TokenKind::Encrypted => self.parse_encrypted().map(Some),
            TokenKind::PpElse
            | TokenKind::PpEndif
            | TokenKind::PpEndcrypt
            | TokenKind::RBrace
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::Comma => {
                self.advance();
                Err(self.error_at(
                    tok,
                    SyntaxErrorKind::UnexpectedToken,
                    format!("unexpected {} at start of statement", describe(tok)),
                ))
            }
            TokenKind::Description => {
                self.advance();
                Ok(Some(Stmt::Directive {
                    keywords: vec!["@".to_owned()],
                    arguments: vec![Arg::Ident(tok.text.clone())],
                    property_block: None,
                    pos: pos_of(tok),
                }))
            }
            TokenKind::LBracket => {
                let block = self.parse_property_block()?;
                self.expect_statement_end()?;
                Ok(Some(Stmt::PropertyBlock(block)))
            }
            TokenKind::Ident => self.parse_ident_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_ident_statement(&mut self) -> PResult<Option<Stmt>> {
        let tok = self.cur();
        let next = self.peek(1);
        let upper = tok.text.to_ascii_uppercase();

        if next.kind == TokenKind::Equals {
            return self.parse_assignment().map(Some);
        }
        if upper != "IF" && upper != "ELSE" && self.block_header_follows() {
            return self.parse_rule_block().map(Some);
        }

        let stmt = match upper.as_str() {
            "LAYER" => self.parse_layer()?,
            "VARIABLE" => self.parse_variable()?,
            "CONNECT" | "SCONNECT" => self.parse_connect()?,
            "DEVICE" if !next.is_word("LAYER") => self.parse_device()?,
            "DMACRO" => self.parse_dmacro()?,
            "ATTACH" => self.parse_attach()?,
            "GROUP" => self.parse_group()?,
            "TRACE" if next.is_word("PROPERTY") => self.parse_trace_property()?,
            "IF" => self.parse_if_chain()?,
            w if FORCED_DIRECTIVES.contains(&w) || w.starts_with('#') => self.parse_directive()?,
            w if keywords::has_role(w, Roles::DIRECTIVE_HEAD)
                && !self.symbols.contains(&tok.text) =>
            {
                if self.block_depth > 0 && self.head_is_expression(w) {
                    return self.parse_expression_statement();
                }
                self.parse_directive()?
            }
            _ => return self.parse_expression_statement(),
        };
        Ok(Some(stmt))
    }

    /// Inside a block, directive heads that double as operators start an
    /// expression.
    fn head_is_expression(&self, upper: &str) -> bool {
        if upper == "NET" {
            return self.kw_at(1, "AREA") || self.kw_at(1, "INTERACT");
        }
        keywords::has_role(upper, Roles::EXPR_STARTER)
    }

    /// `name {` or `name` newline `{`.
    fn block_header_follows(&self) -> bool {
        match self.peek(1).kind {
            TokenKind::LBrace => true,
            TokenKind::Newline => self.peek(2).kind == TokenKind::LBrace,
            _ => false,
        }
    }

    pub(super) fn parse_expression_statement(&mut self) -> PResult<Option<Stmt>> {
        let expr = self.parse_expr(0)?;
        self.expect_statement_end()?;
        Ok(Some(Stmt::Expression { expr }))
    }

    fn parse_assignment(&mut self) -> PResult<Stmt> {
        let (name, pos) = self.take_ident("layer name")?;
        self.expect(TokenKind::Equals, "'='")?;
        if self.at(TokenKind::Newline) && !self.next_significant_closes() {
            self.skip_newlines();
        }
        let expression = self.parse_expr(0)?;
        self.expect_statement_end()?;
        Ok(Stmt::LayerAssignment {
            name,
            op: "=".to_owned(),
            expression,
            pos,
        })
    }

    fn next_significant_closes(&self) -> bool {
        matches!(
            self.next_significant().kind,
            TokenKind::Eof | TokenKind::RBrace
        )
    }

    // -- Blocks --------------------------------------------------

    /// `{ body }` with the cursor at or before the `{`. A missing `}` keeps
    /// the parsed body and records UnclosedBlock at the opening brace.
    pub(super) fn parse_brace_body(&mut self, ctx: Ctx) -> PResult<Vec<Stmt>> {
        self.skip_newlines();
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        self.block_depth += 1;
        let body = self.parse_body(ctx, Stop::Brace);
        self.block_depth -= 1;
        if !self.eat(TokenKind::RBrace) {
            self.diagnostic(
                DiagnosticKind::UnclosedBlock,
                pos_of(open),
                "unclosed '{': expected '}' before end of input",
            );
        }
        Ok(body)
    }

    fn parse_rule_block(&mut self) -> PResult<Stmt> {
        let (name, pos) = self.take_ident("rule name")?;
        self.skip_newlines();
        let open = self.expect(TokenKind::LBrace, "'{'")?;

        let mut description = Vec::new();
        loop {
            self.skip_newlines();
            if !self.at(TokenKind::Description) {
                break;
            }
            description.push(self.advance().text.clone());
        }

        self.block_depth += 1;
        let body = self.parse_body(Ctx::Deck, Stop::Brace);
        self.block_depth -= 1;
        if !self.eat(TokenKind::RBrace) {
            self.diagnostic(
                DiagnosticKind::UnclosedBlock,
                pos_of(open),
                format!("unclosed rule check block '{}'", name),
            );
        }
        Ok(Stmt::RuleCheckBlock {
            name,
            description,
            body,
            pos,
        })
    }

    fn parse_dmacro(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (name, _) = self.take_ident("macro name")?;
        let mut params = Vec::new();
        while self.at(TokenKind::Ident) {
            params.push(self.advance().text.clone());
        }
        let body = self.parse_brace_body(Ctx::Deck)?;
        Ok(Stmt::DMacro {
            name,
            params,
            body,
            pos,
        })
    }

    // -- Layers and variables ------------------------------------

    fn parse_layer(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        if self.eat_word("MAP") {
            return self.parse_layer_map(pos);
        }
        let (name, _) = self.take_ident("layer name")?;
        let mut numbers = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Integer | TokenKind::Float => {
                    let t = self.advance();
                    numbers.push(Arg::Number(self.number_value(t)?));
                }
                TokenKind::Ident => numbers.push(Arg::Ident(self.advance().text.clone())),
                _ => break,
            }
        }
        if numbers.is_empty() {
            return Err(self.expected("layer number"));
        }
        self.expect_statement_end()?;
        Ok(Stmt::LayerDef { name, numbers, pos })
    }

    /// `LAYER MAP gds [DATATYPE|TEXTTYPE] ... type internal`: the internal
    /// number is the last integer on the line and the type the first one
    /// before it.
    fn parse_layer_map(&mut self, pos: crate::ast::Pos) -> PResult<Stmt> {
        let gds_num = self.take_int("GDS layer number")?;
        let mut map_type = "DATATYPE".to_owned();
        if self.at_word("DATATYPE") || self.at_word("TEXTTYPE") {
            map_type = self.advance().text.to_ascii_uppercase();
        }

        let mut ints: Vec<&'a Token> = Vec::new();
        while !self.at_eol() {
            let t = self.advance();
            if t.kind == TokenKind::Integer {
                ints.push(t);
            }
        }
        let Some((last, before)) = ints.split_last() else {
            return Err(self.expected("internal layer number"));
        };
        let parse = |t: &Token| {
            t.text.parse::<i64>().map_err(|_| {
                self.error_at(
                    t,
                    SyntaxErrorKind::UnexpectedToken,
                    format!("integer out of range: {}", t.text),
                )
            })
        };
        let internal_num = parse(last)?;
        let type_num = match before.first() {
            Some(t) => parse(t)?,
            None => 0,
        };
        Ok(Stmt::LayerMap {
            gds_num,
            map_type,
            type_num,
            internal_num,
            pos,
        })
    }

    fn parse_variable(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (name, _) = self.take_ident("variable name")?;
        let mut values = Vec::new();
        while !self.at_eol() {
            values.push(self.parse_arith(0)?);
        }
        if values.is_empty() {
            return Err(self.expected("variable value"));
        }
        Ok(Stmt::VariableDef { name, values, pos })
    }

    // -- Connectivity --------------------------------------------

    fn parse_connect(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        let soft = self.advance().is_word("SCONNECT");
        let mut layers = Vec::new();
        let mut via = None;
        loop {
            match self.kind() {
                TokenKind::Ident if self.at_word("BY") => {
                    self.advance();
                    via = Some(self.take_ident("via layer")?.0);
                    break;
                }
                TokenKind::Ident | TokenKind::Integer => {
                    layers.push(self.advance().text.clone());
                }
                _ => break,
            }
        }
        if layers.is_empty() {
            return Err(self.expected("layer name"));
        }
        self.expect_statement_end()?;
        Ok(Stmt::Connect {
            soft,
            layers,
            via,
            pos,
        })
    }

    fn parse_attach(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (layer, _) = self.take_ident("layer name")?;
        let net = self.take_word("net name")?;
        self.expect_statement_end()?;
        Ok(Stmt::Attach { layer, net, pos })
    }

    fn parse_group(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (name, _) = self.take_ident("group name")?;
        let mut patterns = Vec::new();
        while !self.at_eol() {
            patterns.push(self.take_joined("name pattern")?);
        }
        if patterns.is_empty() {
            return Err(self.expected("name pattern"));
        }
        Ok(Stmt::Group {
            name,
            patterns,
            pos,
        })
    }

    fn parse_trace_property(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        self.advance();
        let (mut device, _) = self.take_ident("device name")?;
        if self.at(TokenKind::LParen) {
            self.advance();
            let model = self.take_word("device model")?;
            self.expect(TokenKind::RParen, "')'")?;
            device = format!("{}({})", device, model);
        }
        let mut args = Vec::new();
        while !self.at_eol() {
            args.push(self.parse_arg()?);
        }
        Ok(Stmt::TraceProperty { device, args, pos })
    }

    /// `DEVICE elem[(model)] seed pin[(role)]... <aux>... [CMACRO name args...]
    /// [[ property block ]]`
    fn parse_device(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (element, _) = self.take_ident("device element")?;
        let model = if self.eat(TokenKind::LParen) {
            let m = self.take_word("device model")?;
            self.expect(TokenKind::RParen, "')'")?;
            Some(m)
        } else {
            None
        };
        let (seed, _) = self.take_ident("seed layer")?;

        let mut pins = Vec::new();
        let mut aux_layers = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Ident if self.at_word("CMACRO") => break,
                TokenKind::Ident => {
                    let layer = self.advance().text.clone();
                    let role = if self.eat(TokenKind::LParen) {
                        let r = self.take_word("pin name")?;
                        self.expect(TokenKind::RParen, "')'")?;
                        Some(r)
                    } else {
                        None
                    };
                    pins.push(DevicePin { layer, role });
                }
                TokenKind::Lt => {
                    self.advance();
                    aux_layers.push(self.take_ident("auxiliary layer")?.0);
                    self.expect(TokenKind::Gt, "'>'")?;
                }
                _ => break,
            }
        }

        let mut cmacro = None;
        let mut cmacro_args = Vec::new();
        if self.eat_word("CMACRO") {
            cmacro = Some(self.take_ident("macro name")?.0);
            while !self.at_eol() && !self.at(TokenKind::LBracket) {
                cmacro_args.push(self.parse_arg()?);
            }
        }
        let property_block = if self.at(TokenKind::LBracket) {
            Some(self.parse_property_block()?)
        } else {
            None
        };
        self.expect_statement_end()?;
        Ok(Stmt::Device {
            element,
            model,
            seed,
            pins,
            aux_layers,
            cmacro,
            cmacro_args,
            property_block,
            pos,
        })
    }

    // -- Directives ----------------------------------------------

    /// Keyword run, arguments, optional trailing property block. The run
    /// takes identifiers that are known keywords or all-uppercase and stops
    /// before an identifier followed by `=`.
    pub(super) fn parse_directive(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        let mut keywords = Vec::new();
        while self.at(TokenKind::Ident) && self.peek(1).kind != TokenKind::Equals {
            let t = self.cur();
            if !keywords.is_empty() {
                if self.symbols.contains(&t.text) {
                    break;
                }
                let known = keywords::is_known(&t.text);
                if !known && !is_all_upper(&t.text) {
                    break;
                }
                if !known {
                    self.diagnostic(
                        DiagnosticKind::PermissiveKeyword,
                        pos_of(t),
                        format!(
                            "'{}' is not a known keyword; accepted in '{}' directive",
                            t.text, keywords[0]
                        ),
                    );
                }
            }
            keywords.push(self.advance().text.clone());
        }

        let mut arguments = Vec::new();
        let mut property_block = None;
        while !self.at_eol() {
            if self.at(TokenKind::LBracket) {
                property_block = Some(self.parse_property_block()?);
                break;
            }
            arguments.push(self.parse_arg()?);
        }
        self.expect_statement_end()?;
        Ok(Stmt::Directive {
            keywords,
            arguments,
            property_block,
            pos,
        })
    }

    // -- Small token helpers -------------------------------------

    /// Keyword `word` at offset `n`, unless that identifier is a declared
    /// name.
    pub(super) fn kw_at(&self, n: usize, word: &str) -> bool {
        let t = self.peek(n);
        t.is_word(word) && !self.symbols.contains(&t.text)
    }

    /// One identifier, number or string, as text.
    pub(super) fn take_word(&mut self, what: &str) -> PResult<String> {
        match self.kind() {
            TokenKind::Ident | TokenKind::Integer | TokenKind::Float | TokenKind::Str => {
                Ok(self.advance().text.clone())
            }
            _ => Err(self.expected(what)),
        }
    }

    /// A string, or a run of directly adjacent tokens glued back together
    /// (`M?.*`, `lib/deck.svrf`).
    pub(super) fn take_joined(&mut self, what: &str) -> PResult<String> {
        if self.at(TokenKind::Str) {
            return Ok(self.advance().text.clone());
        }
        if self.at_eol() {
            return Err(self.expected(what));
        }
        let mut text = self.advance().text.clone();
        loop {
            let prev = self.peek_back();
            let t = self.cur();
            if self.at_eol() || t.kind == TokenKind::Str || !prev.touches(t) {
                break;
            }
            text.push_str(&t.text);
            self.advance();
        }
        Ok(text)
    }

    pub(super) fn peek_back(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        match self.pos.checked_sub(1).and_then(|i| tokens.get(i)) {
            Some(t) => t,
            None => self.cur(),
        }
    }
}

/// Has at least one letter and no lowercase letters.
fn is_all_upper(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_alphabetic()) && !word.chars().any(|c| c.is_lowercase())
}
