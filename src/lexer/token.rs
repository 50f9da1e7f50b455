use serde::{Deserialize, Serialize};
use std::fmt;

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Original text of the token
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }
}

/// All possible token types in Psil
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    /// Integer literal (decimal or `0x` hex)
    Integer(i64),
    /// Floating-point literal
    Float(f64),
    /// String literal with escapes already processed
    String(String),
    /// `#t`
    True,
    /// `#f`
    False,
    /// Any other atom
    Symbol(String),

    // Structure
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `.` separating the tail of an improper list
    Dot,

    // Reader shorthands
    /// `'`
    Quote,
    /// `` ` ``
    Backtick,
    /// `,`
    Comma,
    /// `,@`
    CommaAt,

    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(x) => write!(f, "{:?}", x),
            TokenKind::String(s) => write!(f, "{:?}", s),
            TokenKind::True => write!(f, "#t"),
            TokenKind::False => write!(f, "#f"),
            TokenKind::Symbol(s) => write!(f, "{}", s),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Backtick => write!(f, "`"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::CommaAt => write!(f, ",@"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
