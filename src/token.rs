use serde::{Deserialize, Serialize};

/// A single lexical unit handed to the compiler by the lexer.
///
/// Tokens are immutable once produced; the byte stream the VM executes never
/// refers back to them.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum TokenKind {
    // Brackets and delimiters
    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Dot,       // . (member access)
    Semicolon, // ;

    // Operators
    Assign,       // =
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    EqualEqual,   // ==
    BangEqual,    // !=
    Greater,      // >
    GreaterEqual, // >=
    Less,         // <
    LessEqual,    // <=

    // Keywords
    State, // state machine block
    On,    // event handler block
    Fire,  // event dispatch
    Var,   // variable declaration
    Vec2,  // vector constructor

    // Identifiers and literals
    Identifier,
    Number,
    Str,
    True,
    False,

    Eof, // End of file marker
}

/// Resolve an identifier to its keyword kind, if it is one.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    match ident {
        "state" => Some(TokenKind::State),
        "on" => Some(TokenKind::On),
        "fire" => Some(TokenKind::Fire),
        "var" => Some(TokenKind::Var),
        "vec2" => Some(TokenKind::Vec2),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve() {
        assert_eq!(keyword_kind("state"), Some(TokenKind::State));
        assert_eq!(keyword_kind("on"), Some(TokenKind::On));
        assert_eq!(keyword_kind("fire"), Some(TokenKind::Fire));
        assert_eq!(keyword_kind("vec2"), Some(TokenKind::Vec2));
        assert_eq!(keyword_kind("health"), None);
    }

    #[test]
    fn token_carries_source_line() {
        let token = Token::new(TokenKind::Identifier, "health", 12);
        assert_eq!(token.text, "health");
        assert_eq!(token.line, 12);
    }
}
