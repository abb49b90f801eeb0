//! Preprocessor statements: `#DEFINE`, `#IFDEF`/`#IFNDEF`, `#INCLUDE` and
//! `#ENCRYPT` blocks. Conditionals keep both branches; choosing one is left
//! to [`crate::conditional`].

use super::{pos_of, render_tokens, Ctx, PResult, Parser, Stop};
use crate::ast::Stmt;
use crate::error::{DiagnosticKind, SyntaxErrorKind};
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    pub(super) fn parse_define(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let (name, _) = self.take_ident("macro name")?;
        let value = self.rest_of_line();
        if self.cond_depth == 0 {
            self.defined.insert(name.clone());
        }
        Ok(Stmt::Define { name, value, pos })
    }

    /// Remaining tokens of the line, re-rendered; `None` when there are none.
    fn rest_of_line(&mut self) -> Option<String> {
        let start = self.pos;
        while !self.at_eol() {
            self.advance();
        }
        let text = render_tokens(&self.tokens[start..self.pos]);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub(super) fn parse_ifdef(&mut self, ctx: Ctx) -> PResult<Stmt> {
        let open = self.advance();
        let negated = open.kind == TokenKind::PpIfndef;
        let (name, _) = self.take_ident("macro name")?;
        let value = self.rest_of_line();

        self.cond_depth += 1;
        let then_body = self.parse_body(ctx, Stop::Conditional);
        let mut else_body = Vec::new();
        if self.eat(TokenKind::PpElse) {
            else_body = self.parse_body(ctx, Stop::Conditional);
            while self.at(TokenKind::PpElse) {
                let extra = self.advance();
                self.diagnostic(
                    DiagnosticKind::UnexpectedToken,
                    pos_of(extra),
                    format!("duplicate {} in conditional '{}'", extra.text, name),
                );
                else_body.extend(self.parse_body(ctx, Stop::Conditional));
            }
        }
        self.cond_depth -= 1;

        if !self.eat(TokenKind::PpEndif) {
            self.diagnostic(
                DiagnosticKind::UnclosedBlock,
                pos_of(open),
                format!("{} {} has no matching #ENDIF", open.text, name),
            );
        }

        if value.is_none() && self.defined.contains(&name) {
            let dead = if negated { &then_body } else { &else_body };
            if !dead.is_empty() {
                self.diagnostic(
                    DiagnosticKind::UnreachableBranch,
                    dead[0].pos(),
                    format!("branch is never taken: '{}' is always defined here", name),
                );
            }
        }

        Ok(Stmt::IfDef {
            name,
            value,
            negated,
            then_body,
            else_body,
            pos: pos_of(open),
        })
    }

    pub(super) fn parse_include(&mut self) -> PResult<Stmt> {
        let pos = self.here();
        self.advance();
        let path = self.take_joined("include path")?;
        self.expect_statement_end()?;
        Ok(Stmt::Include { path, pos })
    }

    /// `#ENCRYPT` payload `#ENDCRYPT`. The payload is opaque.
    pub(super) fn parse_encrypted(&mut self) -> PResult<Stmt> {
        let first = self.cur();
        let pos = pos_of(first);
        let opened = self.eat(TokenKind::PpEncrypt);
        let content = if self.at(TokenKind::Encrypted) {
            self.advance().text.clone()
        } else {
            String::new()
        };
        if !opened {
            return Err(self.error_at(
                first,
                SyntaxErrorKind::UnexpectedToken,
                "encrypted text outside #ENCRYPT",
            ));
        }
        if !self.eat(TokenKind::PpEndcrypt) {
            self.diagnostic(
                DiagnosticKind::UnclosedBlock,
                pos,
                "#ENCRYPT block has no matching #ENDCRYPT",
            );
        }
        Ok(Stmt::EncryptedBlock { content, pos })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_ok, parse_src};
    use super::*;

    #[test]
    fn define_with_and_without_value() {
        let stmts = parse_ok("#DEFINE FAST\n#DEFINE GRID 0.005\n#DEFINE NAME \"top cell\"\n");
        assert!(matches!(&stmts[0], Stmt::Define { name, value: None, .. } if name == "FAST"));
        assert!(matches!(&stmts[1], Stmt::Define { value: Some(v), .. } if v == "0.005"));
        assert!(matches!(&stmts[2], Stmt::Define { value: Some(v), .. } if v == "\"top cell\""));
    }

    #[test]
    fn ifdef_keeps_both_branches() {
        let stmts = parse_ok("#IFDEF FAST\nLAYER M1 1\n#ELSE\nLAYER M1 2\nLAYER M2 3\n#ENDIF\n");
        match &stmts[0] {
            Stmt::IfDef {
                name,
                negated,
                then_body,
                else_body,
                ..
            } => {
                assert_eq!(name, "FAST");
                assert!(!negated);
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.len(), 2);
            }
            other => panic!("expected IfDef, got {:?}", other),
        }
    }

    #[test]
    fn ifndef_with_value_and_nesting() {
        let stmts = parse_ok("#IFNDEF MODE fast\n#IFDEF X\nLAYER A 1\n#ENDIF\n#ENDIF\n");
        match &stmts[0] {
            Stmt::IfDef {
                negated,
                value,
                then_body,
                ..
            } => {
                assert!(negated);
                assert_eq!(value.as_deref(), Some("fast"));
                assert!(matches!(&then_body[0], Stmt::IfDef { .. }));
            }
            other => panic!("expected IfDef, got {:?}", other),
        }
    }

    #[test]
    fn missing_endif_is_unclosed() {
        let (program, diags) = parse_src("#IFDEF X\nLAYER M1 1\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnclosedBlock);
        assert_eq!((diags[0].line, diags[0].col), (1, 1));
        assert!(matches!(&program.statements[0], Stmt::IfDef { then_body, .. } if then_body.len() == 1));
    }

    #[test]
    fn stray_else_and_endif_are_errors() {
        let (_, diags) = parse_src("#ELSE\n#ENDIF\n");
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.kind == DiagnosticKind::UnexpectedToken));
    }

    #[test]
    fn dead_branch_after_unconditional_define_warns() {
        let (_, diags) = parse_src("#DEFINE FAST\n#IFDEF FAST\nLAYER A 1\n#ELSE\nLAYER A 2\n#ENDIF\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnreachableBranch);
        assert_eq!(diags[0].line, 5);
        assert!(!diags[0].is_error());
    }

    #[test]
    fn define_inside_conditional_does_not_make_branches_dead() {
        let (_, diags) = parse_src("#IFDEF X\n#DEFINE FAST\n#ENDIF\n#IFNDEF FAST\nLAYER A 1\n#ENDIF\n");
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn include_quoted_and_bare() {
        let stmts = parse_ok("#INCLUDE \"rules/metal.svrf\"\n#INCLUDE rules/via.svrf\n");
        assert!(matches!(&stmts[0], Stmt::Include { path, .. } if path == "rules/metal.svrf"));
        assert!(matches!(&stmts[1], Stmt::Include { path, .. } if path == "rules/via.svrf"));
    }

    #[test]
    fn include_without_path() {
        let (_, diags) = parse_src("#INCLUDE\n");
        assert_eq!(diags[0].kind, DiagnosticKind::MissingOperand);
    }

    #[test]
    fn encrypted_block() {
        let stmts = parse_ok("#ENCRYPT\nxq1 \"zz\n#ENDCRYPT\nLAYER M1 1\n");
        assert!(matches!(&stmts[0], Stmt::EncryptedBlock { content, .. } if content == "xq1 \"zz"));
        assert!(matches!(&stmts[1], Stmt::LayerDef { .. }));
    }

    #[test]
    fn unterminated_encrypted_block() {
        let (program, diags) = parse_src("#ENCRYPT\nabc\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::UnclosedBlock);
        assert!(matches!(&program.statements[0], Stmt::EncryptedBlock { content, .. } if content == "abc"));
    }
}
