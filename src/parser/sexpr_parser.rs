use crate::error::{Error, Result};
use crate::lexer::{SExprScanner, Token, TokenKind};
use crate::runtime::Value;

/// Maximum nesting of lists and quote shorthands in a single form
pub const MAX_PARSE_DEPTH: usize = 512;

/// S-expression reader producing one top-level form per step
///
/// Tokens are pulled from the scanner on demand, so forms that precede a
/// malformed one are returned before the error surfaces. After the first
/// error the reader is exhausted.
pub struct SExprParser {
    scanner: SExprScanner,
    peeked: Option<Token>,
    finished: bool,
}

impl SExprParser {
    /// Creates a reader over source text
    pub fn new(source: &str) -> Self {
        SExprParser {
            scanner: SExprScanner::new(source),
            peeked: None,
            finished: false,
        }
    }

    /// Reads every remaining form
    pub fn parse(&mut self) -> Result<Vec<Value>> {
        let mut forms = Vec::new();
        while let Some(form) = self.next_form()? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Reads the next top-level form, or `None` at end of input
    pub fn next_form(&mut self) -> Result<Option<Value>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_top_level();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_top_level(&mut self) -> Result<Option<Value>> {
        if self.peek()?.kind == TokenKind::Eof {
            return Ok(None);
        }
        self.parse_expression(0).map(Some)
    }

    fn parse_expression(&mut self, depth: usize) -> Result<Value> {
        let token = self.advance()?;
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::syntax(
                token.line,
                token.column,
                format!("nesting deeper than {} levels", MAX_PARSE_DEPTH),
            ));
        }

        match token.kind {
            TokenKind::LeftParen => self.parse_list(&token, depth),
            TokenKind::Quote => self.parse_quoted("quote", depth),
            TokenKind::Backtick => self.parse_quoted("quasiquote", depth),
            TokenKind::Comma => self.parse_quoted("unquote", depth),
            TokenKind::CommaAt => self.parse_quoted("unquote-splicing", depth),

            TokenKind::Integer(n) => Ok(Value::Int(n)),
            TokenKind::Float(x) => Ok(Value::Float(x)),
            TokenKind::String(ref s) => Ok(Value::string(s)),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            TokenKind::Symbol(ref name) => Ok(Value::symbol(name)),

            TokenKind::RightParen => Err(Error::syntax(
                token.line,
                token.column,
                "unexpected ')'",
            )),
            TokenKind::Dot => Err(Error::syntax(
                token.line,
                token.column,
                "unexpected '.' outside a list",
            )),
            TokenKind::Eof => Err(Error::incomplete(
                token.line,
                token.column,
                "unexpected end of input",
            )),
        }
    }

    /// Parses list elements after an opening paren, including a dotted tail
    fn parse_list(&mut self, open: &Token, depth: usize) -> Result<Value> {
        let mut items = Vec::new();

        loop {
            let kind = self.peek()?.kind.clone();
            match kind {
                TokenKind::RightParen => {
                    self.advance()?;
                    return Ok(Value::list(items));
                }
                TokenKind::Eof => {
                    return Err(Error::incomplete(
                        open.line,
                        open.column,
                        "unclosed parenthesis",
                    ));
                }
                TokenKind::Dot => {
                    let dot = self.advance()?;
                    if items.is_empty() {
                        return Err(Error::syntax(
                            dot.line,
                            dot.column,
                            "'.' must follow at least one element",
                        ));
                    }
                    let tail = self.parse_expression(depth + 1)?;
                    let close = self.advance()?;
                    return match close.kind {
                        TokenKind::RightParen => Ok(Value::list_with_tail(items, tail)),
                        TokenKind::Eof => Err(Error::incomplete(
                            open.line,
                            open.column,
                            "unclosed parenthesis",
                        )),
                        _ => Err(Error::syntax(
                            close.line,
                            close.column,
                            format!("expected ')' after dotted tail, found {}", close.kind),
                        )),
                    };
                }
                _ => items.push(self.parse_expression(depth + 1)?),
            }
        }
    }

    /// `'x` → `(quote x)`, and likewise for the other shorthands
    fn parse_quoted(&mut self, name: &str, depth: usize) -> Result<Value> {
        let quoted = self.parse_expression(depth + 1)?;
        Ok(Value::list(vec![Value::symbol(name), quoted]))
    }

    fn peek(&mut self) -> Result<&Token> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.scanner.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn advance(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scanner.next_token(),
        }
    }
}

impl Iterator for SExprParser {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_form().transpose()
    }
}

/// Reads all forms in `text`
pub fn read(text: &str) -> Result<Vec<Value>> {
    SExprParser::new(text).parse()
}

/// Reads exactly the first form in `text`
pub fn read_one(text: &str) -> Result<Value> {
    SExprParser::new(text)
        .next_form()?
        .ok_or_else(|| Error::incomplete(1, 1, "no form to read"))
}

/// Drops a leading `#!` line, keeping its newline so line numbers still match the file
pub fn strip_shebang(source: &str) -> &str {
    if !source.starts_with("#!") {
        return source;
    }
    match source.find('\n') {
        Some(end) => &source[end..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_shebang() {
        assert_eq!(strip_shebang("#!/usr/bin/env psil\n(+ 1 2)"), "\n(+ 1 2)");
        assert_eq!(strip_shebang("#!psil"), "");
        assert_eq!(strip_shebang("(+ 1 2)"), "(+ 1 2)");
    }

    fn read_str(source: &str) -> String {
        read_one(source).unwrap().to_string()
    }

    #[test]
    fn test_parse_atoms() {
        assert_eq!(read_one("42").unwrap(), Value::Int(42));
        assert_eq!(read_one("0x10").unwrap(), Value::Int(16));
        assert_eq!(read_one("#t").unwrap(), Value::Bool(true));
        assert_eq!(read_one("foo").unwrap().as_symbol(), Some("foo"));
        assert_eq!(read_one("\"hi\"").unwrap(), Value::string("hi"));
    }

    #[test]
    fn test_parse_nested_list() {
        assert_eq!(read_str("(a (b c) ())"), "(a (b c) ())");
        assert_eq!(read_str("()"), "()");
    }

    #[test]
    fn test_parse_dotted() {
        assert_eq!(read_str("(a . b)"), "(a . b)");
        assert_eq!(read_str("(a b . (c))"), "(a b c)");
        assert!(read("(. a)").is_err());
        assert!(read("(a . b c)").is_err());
    }

    #[test]
    fn test_quote_shorthands_expand() {
        let form = read_one("'x").unwrap();
        let items = form.to_vec().unwrap();
        assert_eq!(items[0].as_symbol(), Some("quote"));
        assert_eq!(items[1].as_symbol(), Some("x"));

        let form = read_one("`(a ,b ,@c)").unwrap();
        assert_eq!(form.car().unwrap().as_symbol(), Some("quasiquote"));
        assert_eq!(form.to_string(), "`(a ,b ,@c)");
    }

    #[test]
    fn test_multiple_forms() {
        let forms = read("1 (a) \"s\" ; trailing comment").unwrap();
        assert_eq!(forms.len(), 3);
    }

    #[test]
    fn test_unclosed_is_incomplete() {
        let err = read("(define x 1").unwrap_err();
        assert!(err.is_incomplete());
        let err = read("'").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_stray_close_paren() {
        let err = read(")").unwrap_err();
        assert!(!err.is_incomplete());
        assert!(err.to_string().contains("unexpected ')'"));
    }

    #[test]
    fn test_lazy_reading() {
        let mut reader = SExprParser::new("(a) (b) )");
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "(".repeat(600), ")".repeat(600));
        let err = read(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting"));

        let ok = format!("{}{}", "(".repeat(100), ")".repeat(100));
        assert!(read(&ok).is_ok());
    }

    #[test]
    fn test_empty_input() {
        assert!(read("").unwrap().is_empty());
        assert!(read("   ; only a comment").unwrap().is_empty());
        assert!(read_one("").is_err());
    }
}
