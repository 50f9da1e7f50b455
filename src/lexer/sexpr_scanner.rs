use lazy_static::lazy_static;
use regex::Regex;

use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

lazy_static! {
    /// Decimal integers, decimals with optional exponent, and `0x` hex integers
    static ref NUMBER_RE: Regex =
        Regex::new(r"(?i)^(?:[-+]?\d+(\.\d+)?(e[-+]?\d+)?|0x([0-9a-f]+))$").unwrap();
}

/// Scanner for Psil S-expression syntax
pub struct SExprScanner {
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Line where the current token started
    start_line: usize,
    /// Column where the current token started
    start_column: usize,
}

impl SExprScanner {
    /// Creates a new S-expression scanner from source code
    pub fn new(source: &str) -> Self {
        SExprScanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            self.tokens.push(token);
            if done {
                break;
            }
        }

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Scans the next token, returning `Eof` once the source is exhausted
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        if self.is_at_end() {
            return Ok(self.make_token(TokenKind::Eof));
        }

        let kind = match self.advance() {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,

            '\'' => TokenKind::Quote,
            '`' => TokenKind::Backtick,
            ',' => {
                if self.match_char('@') {
                    TokenKind::CommaAt
                } else {
                    TokenKind::Comma
                }
            }

            '"' => self.scan_string()?,

            _ => self.scan_atom()?,
        };

        Ok(self.make_token(kind))
    }

    fn skip_trivia(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                ';' => self.skip_line_comment(),
                c if c.is_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn scan_string(&mut self) -> Result<TokenKind> {
        let mut value = String::new();

        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\\' {
                let (line, col) = (self.line, self.column);
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    _ => {
                        return Err(Error::syntax(
                            line,
                            col,
                            format!("invalid escape sequence \\{}", escaped),
                        ));
                    }
                }
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return Err(Error::incomplete(
                self.start_line,
                self.start_column,
                "unterminated string",
            ));
        }

        self.advance(); // Closing "

        Ok(TokenKind::String(value))
    }

    /// Scans a run of non-delimiter characters and classifies it
    fn scan_atom(&mut self) -> Result<TokenKind> {
        while !self.is_at_end() && !is_delimiter(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        self.classify_atom(&text)
    }

    fn classify_atom(&self, text: &str) -> Result<TokenKind> {
        if let Some(caps) = NUMBER_RE.captures(text) {
            if let Some(hex) = caps.get(3) {
                return i64::from_str_radix(hex.as_str(), 16)
                    .map(TokenKind::Integer)
                    .map_err(|_| self.error(format!("integer literal out of range: {}", text)));
            }
            if caps.get(1).is_some() || caps.get(2).is_some() {
                return text
                    .parse::<f64>()
                    .map(TokenKind::Float)
                    .map_err(|_| self.error(format!("invalid float: {}", text)));
            }
            return text
                .parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| self.error(format!("integer literal out of range: {}", text)));
        }

        match text {
            "#t" => Ok(TokenKind::True),
            "#f" => Ok(TokenKind::False),
            "." => Ok(TokenKind::Dot),
            _ if text.starts_with('#') => Err(self.error(format!("unknown token: {}", text))),
            _ => Ok(TokenKind::Symbol(text.to_string())),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::syntax(self.start_line, self.start_column, message)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        Token::new(kind, lexeme, self.start_line, self.start_column)
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}
