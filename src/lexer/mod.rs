//! Lexical analysis for Psil
//!
//! Converts source text into a stream of positioned tokens.

mod sexpr_scanner;
mod token;

pub use sexpr_scanner::SExprScanner;
pub use token::{Token, TokenKind};
