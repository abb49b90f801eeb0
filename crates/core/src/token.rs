use serde::Serialize;

/// Token categories produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Ident,
    Integer,
    Float,
    Str,
    // Preprocessor markers
    PpDefine,
    PpIfdef,
    PpIfndef,
    PpElse,
    PpEndif,
    PpInclude,
    PpEncrypt,
    PpEndcrypt,
    /// Verbatim payload between `#ENCRYPT` and `#ENDCRYPT`
    Encrypted,
    /// Free text following `@` up to end of line
    Description,
    // Comparison and assignment
    Equals,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical and arithmetic
    Bang,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    ColonColon,
    Colon,
    Question,
    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    /// Any character the lexer has no rule for
    Other,
    Newline,
    Eof,
}

impl TokenKind {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            TokenKind::Lt
                | TokenKind::Le
                | TokenKind::Gt
                | TokenKind::Ge
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Equals
        )
    }

    pub fn is_number(self) -> bool {
        matches!(self, TokenKind::Integer | TokenKind::Float)
    }

    pub fn is_preprocessor(self) -> bool {
        matches!(
            self,
            TokenKind::PpDefine
                | TokenKind::PpIfdef
                | TokenKind::PpIfndef
                | TokenKind::PpElse
                | TokenKind::PpEndif
                | TokenKind::PpInclude
                | TokenKind::PpEncrypt
                | TokenKind::PpEndcrypt
        )
    }
}

/// A token with its literal text and 1-based source position.
///
/// For strings `text` holds the unquoted content with escapes resolved;
/// for every other kind it is the source spelling. `width` is the number of
/// source columns the token spans on its line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
    #[serde(skip)]
    pub width: u32,
}

impl Token {
    /// Token whose width is its text length (plus the quotes of a string).
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, col: u32) -> Self {
        let text = text.into();
        let mut width = text.chars().count() as u32;
        if kind == TokenKind::Str {
            width += 2;
        }
        Token {
            kind,
            text,
            line,
            col,
            width,
        }
    }

    /// Case-insensitive keyword match for identifiers.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(word)
    }

    /// Uppercased identifier text, `None` for any other kind.
    pub fn upper(&self) -> Option<String> {
        (self.kind == TokenKind::Ident).then(|| self.text.to_ascii_uppercase())
    }

    /// True when `next` starts on the same line directly after this token.
    pub fn touches(&self, next: &Token) -> bool {
        next.line == self.line && next.col == self.col + self.width
    }
}
