//! Prescan: build the symbol table over the whole token stream before the
//! structural parse.
//!
//! Names are recorded from their defining forms (`LAYER`, assignments,
//! `VARIABLE`, rule-check block headers, `GROUP`, `DMACRO`, `DEVICE`
//! seed/pin layers). Lookup is case-sensitive. The first definition of a
//! name wins.

use crate::token::{Token, TokenKind};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolRole {
    Layer,
    Variable,
    Rule,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SymbolTable {
    entries: BTreeMap<String, SymbolRole>,
}

impl SymbolTable {
    pub fn build(tokens: &[Token]) -> SymbolTable {
        let mut table = SymbolTable::default();
        let mut bracket_depth = 0usize;
        let mut stmt_start = true;

        for i in 0..tokens.len() {
            let t = &tokens[i];
            match t.kind {
                TokenKind::Newline | TokenKind::LBrace | TokenKind::RBrace => {
                    stmt_start = true;
                    continue;
                }
                TokenKind::LBracket => bracket_depth += 1,
                TokenKind::RBracket => bracket_depth = bracket_depth.saturating_sub(1),
                _ => {}
            }
            if stmt_start && bracket_depth == 0 && t.kind == TokenKind::Ident {
                table.scan_statement(tokens, i);
            }
            stmt_start = false;
        }
        table
    }

    /// Record any name defined by the statement starting at `tokens[i]`.
    fn scan_statement(&mut self, tokens: &[Token], i: usize) {
        let t = &tokens[i];
        let next = tokens.get(i + 1);
        let after = tokens.get(i + 2);
        let next_ident = next.filter(|n| n.kind == TokenKind::Ident);

        match t.upper().as_deref() {
            Some("LAYER") => {
                if let (Some(name), Some(value)) = (next_ident, after) {
                    let defines = matches!(
                        value.kind,
                        TokenKind::Integer | TokenKind::Float | TokenKind::Ident
                    );
                    if defines && !name.is_word("MAP") {
                        self.define(&name.text, SymbolRole::Layer);
                    }
                }
                return;
            }
            Some("VARIABLE") => {
                if let Some(name) = next_ident {
                    self.define(&name.text, SymbolRole::Variable);
                }
                return;
            }
            Some("GROUP") => {
                if let Some(name) = next_ident {
                    self.define(&name.text, SymbolRole::Rule);
                }
                return;
            }
            Some("DMACRO") => {
                if let Some(name) = next_ident {
                    self.define(&name.text, SymbolRole::Unknown);
                }
                return;
            }
            Some("DEVICE") => {
                self.scan_device(tokens, i + 1);
                return;
            }
            Some("IF") | Some("ELSE") => return,
            _ => {}
        }

        match next.map(|n| n.kind) {
            Some(TokenKind::Equals) => self.define(&t.text, SymbolRole::Layer),
            Some(TokenKind::LBrace) => self.define(&t.text, SymbolRole::Rule),
            Some(TokenKind::Newline)
                if after.is_some_and(|a| a.kind == TokenKind::LBrace) =>
            {
                self.define(&t.text, SymbolRole::Rule)
            }
            _ => {}
        }
    }

    /// `DEVICE elem[(model)] seed pin[(role)]... <aux>... CMACRO ...`
    fn scan_device(&mut self, tokens: &[Token], start: usize) {
        let mut i = start;
        let kind_at = |i: usize| tokens.get(i).map(|t| t.kind);

        // element name and optional model
        if kind_at(i) == Some(TokenKind::Ident) {
            i += 1;
            if kind_at(i) == Some(TokenKind::LParen) {
                i = skip_past(tokens, i, TokenKind::RParen);
            }
        }

        while let Some(t) = tokens.get(i) {
            match t.kind {
                TokenKind::Newline | TokenKind::Eof | TokenKind::LBracket => break,
                TokenKind::Ident if t.is_word("CMACRO") => break,
                TokenKind::Ident => {
                    self.define(&t.text, SymbolRole::Layer);
                    i += 1;
                    if kind_at(i) == Some(TokenKind::LParen) {
                        i = skip_past(tokens, i, TokenKind::RParen);
                    }
                }
                TokenKind::Lt => i = skip_past(tokens, i, TokenKind::Gt),
                _ => i += 1,
            }
        }
    }

    fn define(&mut self, name: &str, role: SymbolRole) {
        self.entries.entry(name.to_owned()).or_insert(role);
    }

    pub fn role(&self, name: &str) -> Option<SymbolRole> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SymbolRole)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Index just past the first `close` token at or after `i`, stopping at
/// end of line.
fn skip_past(tokens: &[Token], mut i: usize, close: TokenKind) -> usize {
    while let Some(t) = tokens.get(i) {
        if t.kind == close {
            return i + 1;
        }
        if matches!(t.kind, TokenKind::Newline | TokenKind::Eof) {
            return i;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn table(src: &str) -> SymbolTable {
        SymbolTable::build(&tokenize(src))
    }

    #[test]
    fn layer_variable_and_assignment() {
        let t = table("LAYER M1 10\nVARIABLE W 0.1\nM1_WIDE = M1 AND M2\n");
        assert_eq!(t.role("M1"), Some(SymbolRole::Layer));
        assert_eq!(t.role("W"), Some(SymbolRole::Variable));
        assert_eq!(t.role("M1_WIDE"), Some(SymbolRole::Layer));
        assert_eq!(t.role("M2"), None);
    }

    #[test]
    fn layer_map_is_not_a_definition() {
        let t = table("LAYER MAP 1 DATATYPE 0 1000\n");
        assert!(t.is_empty());
    }

    #[test]
    fn rule_blocks_with_brace_on_same_or_next_line() {
        let t = table("M1.W.1 {\n INT M1 < 0.1\n}\nM1.S.1\n{\n EXT M1 < 0.1\n}\n");
        assert_eq!(t.role("M1.W.1"), Some(SymbolRole::Rule));
        assert_eq!(t.role("M1.S.1"), Some(SymbolRole::Rule));
    }

    #[test]
    fn assignment_inside_rule_block_is_recorded() {
        let t = table("R1 { TMP = M1 NOT M2\n COPY TMP }\n");
        assert_eq!(t.role("TMP"), Some(SymbolRole::Layer));
    }

    #[test]
    fn property_block_assignments_are_ignored() {
        let t = table("DFM PROPERTY M1 [\n area = AREA(M1)\n]\n");
        assert!(!t.contains("area"));
    }

    #[test]
    fn group_dmacro_and_device() {
        let t = table(
            "GROUP metal_rules M?.*\nDMACRO chk a b {\n}\nDEVICE MN(nmos) ngate poly(G) nsd(S) nsd(D) <pwell> CMACRO m\n",
        );
        assert_eq!(t.role("metal_rules"), Some(SymbolRole::Rule));
        assert_eq!(t.role("chk"), Some(SymbolRole::Unknown));
        assert_eq!(t.role("ngate"), Some(SymbolRole::Layer));
        assert_eq!(t.role("poly"), Some(SymbolRole::Layer));
        assert_eq!(t.role("nsd"), Some(SymbolRole::Layer));
        assert!(!t.contains("MN"));
        assert!(!t.contains("pwell"));
        assert!(!t.contains("m"));
    }

    #[test]
    fn lookup_is_case_sensitive_and_first_definition_wins() {
        let t = table("VARIABLE AREA 5\nLAYER AREA 7\n");
        assert_eq!(t.role("AREA"), Some(SymbolRole::Variable));
        assert!(!t.contains("area"));
    }

    #[test]
    fn digit_prefixed_names() {
        let t = table("15V_GATE = GATE AND THICK_OX\n");
        assert!(t.contains("15V_GATE"));
    }
}
