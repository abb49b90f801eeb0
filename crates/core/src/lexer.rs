use crate::error::{LexError, LexErrorKind};
use crate::token::{Token, TokenKind};

/// Output of a lexer run: the token stream (always terminated by `Eof`)
/// and any recoverable errors met along the way.
#[derive(Debug, Clone)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Tokenize SVRF text, discarding lex errors.
pub fn tokenize(src: &str) -> Vec<Token> {
    lex(src).tokens
}

pub fn lex(src: &str) -> Lexed {
    let mut lexer = Lexer::new(src);
    lexer.run();
    Lexed {
        tokens: lexer.tokens,
        errors: lexer.errors,
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn peek_is(&self, offset: usize, f: impl Fn(char) -> bool) -> bool {
        self.peek(offset).is_some_and(f)
    }

    /// Consume one character, keeping line/column current. `\r\n` and a
    /// lone `\r` both count as one line break.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            '\r' if self.peek(0) != Some('\n') => {
                self.line += 1;
                self.col = 1;
            }
            '\r' => {}
            _ => self.col += 1,
        }
        Some(c)
    }

    /// Called once the token's characters are consumed, so a token ending on
    /// its start line spans exactly the columns read since `col`.
    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: u32, col: u32) {
        let mut token = Token::new(kind, text, line, col);
        if self.line == line {
            token.width = self.col - col;
        }
        self.tokens.push(token);
    }

    fn error(&mut self, kind: LexErrorKind, line: u32, col: u32, message: impl Into<String>) {
        self.errors.push(LexError {
            kind,
            message: message.into(),
            line,
            col,
        });
    }

    fn run(&mut self) {
        while let Some(c) = self.peek(0) {
            let (line, col) = (self.line, self.col);
            match c {
                '\n' | '\r' => {
                    self.bump();
                    // Blank lines collapse; no newline before the first token.
                    if self
                        .tokens
                        .last()
                        .is_some_and(|t| t.kind != TokenKind::Newline)
                    {
                        self.push(TokenKind::Newline, "\n", line, col);
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek(1) == Some('/') => {
                    while !matches!(self.peek(0), None | Some('\n') | Some('\r')) {
                        self.bump();
                    }
                }
                '/' if self.peek(1) == Some('*') => self.block_comment(line, col),
                '"' | '\'' => self.string(c, line, col),
                '#' => self.preprocessor(line, col),
                '@' => {
                    self.bump();
                    let mut text = String::new();
                    while let Some(c) = self.peek(0) {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        text.push(c);
                        self.bump();
                    }
                    self.push(TokenKind::Description, text.trim(), line, col);
                }
                c if c.is_ascii_digit() => self.number(line, col),
                '.' if self.peek_is(1, |d| d.is_ascii_digit()) => self.number(line, col),
                c if is_ident_start(c) => {
                    let text = self.ident_tail(String::new());
                    self.push(TokenKind::Ident, text, line, col);
                }
                _ => self.operator(c, line, col),
            }
        }
        let (line, col) = (self.line, self.col);
        self.push(TokenKind::Eof, "", line, col);
    }

    fn block_comment(&mut self, line: u32, col: u32) {
        self.bump();
        self.bump();
        loop {
            match self.peek(0) {
                None => {
                    self.error(
                        LexErrorKind::UnterminatedComment,
                        line,
                        col,
                        "unterminated block comment",
                    );
                    return;
                }
                Some('*') if self.peek(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn string(&mut self, quote: char, line: u32, col: u32) {
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek(0) {
                None | Some('\n') | Some('\r') => {
                    self.error(
                        LexErrorKind::UnterminatedString,
                        line,
                        col,
                        "unterminated string literal",
                    );
                    break;
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek(0) {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(e) if e == '\\' || e == '"' || e == '\'' => value.push(e),
                        Some(e) if e != '\n' && e != '\r' => {
                            value.push('\\');
                            value.push(e);
                        }
                        _ => {
                            value.push('\\');
                            continue;
                        }
                    }
                    self.bump();
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        self.push(TokenKind::Str, value, line, col);
    }

    fn number(&mut self, line: u32, col: u32) {
        let mut text = String::new();
        let mut dots = 0;
        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && self.peek_is(1, |d| d.is_ascii_digit()) {
                dots += 1;
                text.push(c);
            } else {
                break;
            }
            self.bump();
        }

        // Exponent only when a digit follows (optionally signed), so that
        // names such as `2e_gate` stay identifiers.
        let mut exponent = false;
        if matches!(self.peek(0), Some('e') | Some('E')) {
            let digit_after = self.peek_is(1, |d| d.is_ascii_digit());
            let signed_digit = matches!(self.peek(1), Some('+') | Some('-'))
                && self.peek_is(2, |d| d.is_ascii_digit());
            if digit_after || signed_digit {
                exponent = true;
                for _ in 0..if signed_digit { 2 } else { 1 } {
                    if let Some(c) = self.bump() {
                        text.push(c);
                    }
                }
                while let Some(c) = self.peek(0) {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    text.push(c);
                    self.bump();
                }
            }
        }

        if dots == 0 && !exponent && self.peek_is(0, |c| c.is_alphabetic() || c == '_') {
            let text = self.ident_tail(text);
            self.push(TokenKind::Ident, text, line, col);
            return;
        }

        if dots > 1 {
            self.error(
                LexErrorKind::InvalidNumberLiteral,
                line,
                col,
                format!("invalid number literal '{}'", text),
            );
            return;
        }

        if !text.parse::<f64>().is_ok_and(f64::is_finite) {
            self.error(
                LexErrorKind::InvalidNumberLiteral,
                line,
                col,
                format!("number literal '{}' is out of range", text),
            );
            return;
        }

        let kind = if dots == 0 && !exponent {
            TokenKind::Integer
        } else {
            TokenKind::Float
        };
        self.push(kind, text, line, col);
    }

    /// Continue an identifier. `:` and `.` join when followed by an
    /// alphanumeric; a single trailing `?` ends the name.
    fn ident_tail(&mut self, mut text: String) -> String {
        while let Some(c) = self.peek(0) {
            if is_ident_char(c) || (text.is_empty() && is_ident_start(c)) {
                text.push(c);
                self.bump();
            } else if (c == ':' || c == '.') && self.peek_is(1, |d| d.is_alphanumeric()) {
                text.push(c);
                self.bump();
            } else if c == '?' {
                text.push(c);
                self.bump();
                break;
            } else {
                break;
            }
        }
        text
    }

    fn preprocessor(&mut self, line: u32, col: u32) {
        self.bump();
        let mut name = String::new();
        while self.peek_is(0, |c| c.is_ascii_alphabetic()) {
            if let Some(c) = self.bump() {
                name.push(c);
            }
        }
        if name.is_empty() {
            self.push(TokenKind::Other, "#", line, col);
            return;
        }
        let spelled = format!("#{}", name);
        let kind = match name.to_ascii_uppercase().as_str() {
            "DEFINE" => TokenKind::PpDefine,
            "IFDEF" => TokenKind::PpIfdef,
            "IFNDEF" => TokenKind::PpIfndef,
            "ELSE" => TokenKind::PpElse,
            "ENDIF" => TokenKind::PpEndif,
            "INCLUDE" => TokenKind::PpInclude,
            "ENDCRYPT" => TokenKind::PpEndcrypt,
            "ENCRYPT" | "DECRYPT" => {
                self.push(TokenKind::PpEncrypt, spelled, line, col);
                self.encrypted_payload();
                return;
            }
            _ => {
                let text = self.ident_tail(spelled);
                self.push(TokenKind::Ident, text, line, col);
                return;
            }
        };
        self.push(kind, spelled, line, col);
    }

    /// Capture everything from the line after `#ENCRYPT` up to a line
    /// beginning with `#END`, untokenized.
    fn encrypted_payload(&mut self) {
        while !matches!(self.peek(0), None | Some('\n') | Some('\r')) {
            self.bump();
        }
        if self.peek(0) == Some('\r') {
            self.bump();
        }
        if self.peek(0) == Some('\n') {
            self.bump();
        }

        let (line, col) = (self.line, self.col);
        let start = self.pos;
        loop {
            if self.at_end_marker() || self.peek(0).is_none() {
                break;
            }
            while !matches!(self.peek(0), None | Some('\n') | Some('\r')) {
                self.bump();
            }
            if self.peek(0) == Some('\r') {
                self.bump();
            }
            if self.peek(0) == Some('\n') {
                self.bump();
            }
        }

        let mut content: String = self.chars[start..self.pos].iter().collect();
        if content.ends_with('\n') {
            content.pop();
        }
        if content.ends_with('\r') {
            content.pop();
        }
        self.push(TokenKind::Encrypted, content, line, col);
    }

    fn at_end_marker(&self) -> bool {
        let mut i = 0;
        while self.peek_is(i, |c| c == ' ' || c == '\t') {
            i += 1;
        }
        "#END"
            .chars()
            .enumerate()
            .all(|(k, m)| self.peek_is(i + k, |c| c.to_ascii_uppercase() == m))
    }

    fn operator(&mut self, c: char, line: u32, col: u32) {
        let two = match (c, self.peek(1)) {
            ('=', Some('=')) => Some(TokenKind::EqEq),
            ('!', Some('=')) => Some(TokenKind::NotEq),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            ('&', Some('&')) => Some(TokenKind::AndAnd),
            ('|', Some('|')) => Some(TokenKind::OrOr),
            (':', Some(':')) => Some(TokenKind::ColonColon),
            _ => None,
        };
        if let Some(kind) = two {
            let mut text = String::new();
            for _ in 0..2 {
                if let Some(ch) = self.bump() {
                    text.push(ch);
                }
            }
            self.push(kind, text, line, col);
            return;
        }

        let kind = match c {
            '=' => TokenKind::Equals,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '!' => TokenKind::Bang,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '^' => TokenKind::Caret,
            '%' => TokenKind::Percent,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => TokenKind::Other,
        };
        self.bump();
        self.push(kind, c.to_string(), line, col);
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn layer_definition_tokens() {
        let toks = tokenize("LAYER M1 10\n");
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["LAYER", "M1", "10", "\n", ""]);
        assert_eq!(toks[2].kind, TokenKind::Integer);
        assert_eq!((toks[1].line, toks[1].col), (1, 7));
    }

    #[test]
    fn blank_lines_collapse_and_no_leading_newline() {
        assert_eq!(
            kinds("\n\n  A\r\n\r\n\nB\rC"),
            vec![
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
        let toks = tokenize("A\r\nB");
        assert_eq!(toks[2].line, 2, "CRLF counts as one line break");
    }

    #[test]
    fn comments_are_skipped() {
        let toks = tokenize("A // trailing\n/* block\nspanning */ B");
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "\n", "B", ""]);
        assert_eq!(toks[2].line, 3);
    }

    #[test]
    fn unterminated_comment_reports_opening_position() {
        let lexed = lex("A\n  /* never closed\nB");
        assert_eq!(lexed.errors.len(), 1);
        let e = &lexed.errors[0];
        assert_eq!(e.kind, LexErrorKind::UnterminatedComment);
        assert_eq!((e.line, e.col), (2, 3));
    }

    #[test]
    fn unterminated_string_keeps_going() {
        let lexed = lex("TITLE \"open\nLAYER M1 1");
        assert_eq!(lexed.errors.len(), 1);
        assert_eq!(lexed.errors[0].kind, LexErrorKind::UnterminatedString);
        assert_eq!((lexed.errors[0].line, lexed.errors[0].col), (1, 7));
        let texts: Vec<&str> = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["TITLE", "open", "\n", "LAYER", "M1", "1", ""]);
    }

    #[test]
    fn string_quotes_and_escapes() {
        let toks = tokenize(r#"'single' "a \"b\" c" "C:\path""#);
        assert_eq!(toks[0].text, "single");
        assert_eq!(toks[1].text, "a \"b\" c");
        assert_eq!(toks[2].text, "C:\\path");
        assert!(toks[..3].iter().all(|t| t.kind == TokenKind::Str));
    }

    #[test]
    fn numbers_and_exponents() {
        let toks = tokenize("10 0.5 .25 1e-3 2E5");
        let got: Vec<(TokenKind, &str)> = toks[..5]
            .iter()
            .map(|t| (t.kind, t.text.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (TokenKind::Integer, "10"),
                (TokenKind::Float, "0.5"),
                (TokenKind::Float, ".25"),
                (TokenKind::Float, "1e-3"),
                (TokenKind::Float, "2E5"),
            ]
        );
    }

    #[test]
    fn overflowing_literal_is_an_error() {
        let lexed = lex("X = 1e400\nY = 2");
        assert_eq!(lexed.errors.len(), 1);
        assert_eq!(lexed.errors[0].kind, LexErrorKind::InvalidNumberLiteral);
        assert_eq!((lexed.errors[0].line, lexed.errors[0].col), (1, 5));
        let texts: Vec<&str> = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["X", "=", "\n", "Y", "=", "2", ""]);
    }

    #[test]
    fn adjacency_uses_source_width() {
        let toks = tokenize(r#""ab"(x) "a\"b"Z "q" ("#);
        assert!(toks[0].touches(&toks[1]));
        assert_eq!(toks[4].width, 6);
        assert!(toks[4].touches(&toks[5]));
        assert!(!toks[6].touches(&toks[7]));
    }

    #[test]
    fn digit_prefixed_names_are_identifiers() {
        let toks = tokenize("15V_GATE = 2xmn_DN AND 2e_gate");
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "15V_GATE");
        assert_eq!(toks[2].text, "2xmn_DN");
        assert_eq!(toks[4].text, "2e_gate");
        assert_eq!(toks[4].kind, TokenKind::Ident);
    }

    #[test]
    fn malformed_number_is_dropped_with_error() {
        let lexed = lex("X = 1.2.3 + 4");
        assert_eq!(lexed.errors.len(), 1);
        assert_eq!(lexed.errors[0].kind, LexErrorKind::InvalidNumberLiteral);
        assert_eq!(lexed.errors[0].col, 5);
        let texts: Vec<&str> = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["X", "=", "+", "4", ""]);
    }

    #[test]
    fn identifier_punctuation_rules() {
        let toks = tokenize("lib:cell a.b x? M1: y::z");
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["lib:cell", "a.b", "x?", "M1", ":", "y", "::", "z", ""]
        );
    }

    #[test]
    fn operators_prefer_two_characters() {
        assert_eq!(
            kinds("== != <= >= && || < > = !"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Equals,
                TokenKind::Bang,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn preprocessor_directives_case_insensitive() {
        assert_eq!(
            kinds("#define X\n#IfDef X\n#else\n#ENDIF\n#include \"a.svrf\""),
            vec![
                TokenKind::PpDefine,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::PpIfdef,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::PpElse,
                TokenKind::Newline,
                TokenKind::PpEndif,
                TokenKind::Newline,
                TokenKind::PpInclude,
                TokenKind::Str,
                TokenKind::Eof
            ]
        );
        let toks = tokenize("#UNDEFINE X");
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "#UNDEFINE");
    }

    #[test]
    fn encrypted_block_is_captured_verbatim() {
        let src = "#ENCRYPT\nabc \"def\n  ghi /* x\n#ENDCRYPT\nLAYER M1 1\n";
        let toks = tokenize(src);
        assert_eq!(toks[0].kind, TokenKind::PpEncrypt);
        assert_eq!(toks[1].kind, TokenKind::Encrypted);
        assert_eq!(toks[1].text, "abc \"def\n  ghi /* x");
        assert_eq!(toks[1].line, 2);
        assert_eq!(toks[2].kind, TokenKind::PpEndcrypt);
        assert_eq!(toks[2].line, 4);
        assert_eq!(toks[4].text, "LAYER");
        assert!(lex(src).errors.is_empty());
    }

    #[test]
    fn description_captures_rest_of_line() {
        let toks = tokenize("R {\n  @ Min width is 0.1 um // not a comment\n}");
        let desc = &toks[3];
        assert_eq!(desc.kind, TokenKind::Description);
        assert_eq!(desc.text, "Min width is 0.1 um // not a comment");
        assert_eq!((desc.line, desc.col), (2, 3));
    }

    #[test]
    fn abut_clause_tokens() {
        assert_eq!(
            kinds("ABUT<90>"),
            vec![
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Integer,
                TokenKind::Gt,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unknown_characters_become_other_tokens() {
        let toks = tokenize("A ~ B");
        assert_eq!(toks[1].kind, TokenKind::Other);
        assert_eq!(toks[1].text, "~");
    }
}
