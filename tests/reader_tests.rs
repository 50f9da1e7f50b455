//! Tests for the Psil reader: tokens, data values and error reporting

use psil::{read, read_one, Error, ErrorKind, Reader, Scanner, TokenKind, Value};

fn read_str(source: &str) -> String {
    read_one(source).unwrap().to_string()
}

#[test]
fn test_atoms() {
    assert_eq!(read_one("42").unwrap(), Value::Int(42));
    assert_eq!(read_one("-17").unwrap(), Value::Int(-17));
    assert_eq!(read_one("+5").unwrap(), Value::Int(5));
    assert_eq!(read_one("0xff").unwrap(), Value::Int(255));
    assert_eq!(read_one("2.5").unwrap(), Value::Float(2.5));
    assert_eq!(read_one("1e3").unwrap(), Value::Float(1000.0));
    assert_eq!(read_one("#t").unwrap(), Value::Bool(true));
    assert_eq!(read_one("#f").unwrap(), Value::Bool(false));
    assert_eq!(read_one("()").unwrap(), Value::Nil);
    assert_eq!(read_one("foo-bar?").unwrap(), Value::symbol("foo-bar?"));
    assert_eq!(read_one("-").unwrap(), Value::symbol("-"));
    assert_eq!(read_one("->x").unwrap(), Value::symbol("->x"));
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        read_one(r#""line\nnext \"quoted\" back\\slash""#).unwrap(),
        Value::string("line\nnext \"quoted\" back\\slash")
    );
    assert_eq!(read_str(r#""a\tb""#), r#""a\tb""#);
}

#[test]
fn test_lists_and_dotted_pairs() {
    assert_eq!(read_str("(1 2 3)"), "(1 2 3)");
    assert_eq!(read_str("(1 . 2)"), "(1 . 2)");
    assert_eq!(read_str("(1 2 . 3)"), "(1 2 . 3)");
    assert_eq!(read_str("(1 . (2 3))"), "(1 2 3)");
    assert_eq!(read_str("((a b) (c . d))"), "((a b) (c . d))");
}

#[test]
fn test_quote_shorthands() {
    assert_eq!(read_str("'x"), "'x");
    assert_eq!(read_str("(quote x)"), "'x");
    assert_eq!(read_str("`(a ,b ,@c)"), "`(a ,b ,@c)");

    let quoted = read_one("'(1 2)").unwrap();
    let items = quoted.list_items().unwrap();
    assert_eq!(items[0], Value::symbol("quote"));
    assert_eq!(items[1].to_string(), "(1 2)");
}

#[test]
fn test_comments_and_whitespace() {
    let forms = read("; leading comment\n  1 ; trailing\n\t(2 ; inside\n 3)\n").unwrap();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0], Value::Int(1));
    assert_eq!(forms[1].to_string(), "(2 3)");
    assert!(read("   ; nothing here\n").unwrap().is_empty());
}

#[test]
fn test_printed_form_reads_back() {
    for source in ["(a (b . c) \"s\\n\" 1.5 -3 #t #f ())", "'(x `(y ,z))", "(1 2 . 3)"] {
        let value = read_one(source).unwrap();
        let again = read_one(&value.to_string()).unwrap();
        assert_eq!(value, again, "round trip of {}", source);
    }
}

#[test]
fn test_unclosed_list_is_incomplete() {
    let err = read("(define (f x)\n  (+ x 1)").unwrap_err();
    assert!(err.is_incomplete());
    assert_eq!(err.kind(), ErrorKind::Syntax);
    match err {
        Error::SyntaxError { line, col, .. } => {
            assert_eq!((line, col), (1, 1));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(read("'").unwrap_err().is_incomplete());
    assert!(read("\"abc").unwrap_err().is_incomplete());
}

#[test]
fn test_hard_syntax_errors() {
    for source in [")", "(1 . )", "(. 1)", "(1 . 2 3)", "#q", "\"bad \\q escape\""] {
        let err = read(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "source: {}", source);
        assert!(!err.is_incomplete(), "source: {}", source);
    }
}

#[test]
fn test_error_positions() {
    let err = read("(a b)\n  )").unwrap_err();
    match err {
        Error::SyntaxError { line, col, .. } => assert_eq!((line, col), (2, 3)),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_reader_yields_forms_before_error() {
    let mut reader = Reader::new("1 (2) ) 4");
    assert_eq!(reader.next().unwrap().unwrap(), Value::Int(1));
    assert_eq!(reader.next().unwrap().unwrap().to_string(), "(2)");
    assert!(reader.next().unwrap().is_err());
    assert!(reader.next().is_none());
}

#[test]
fn test_read_one_on_empty_input() {
    let err = read_one("  ; only a comment").unwrap_err();
    assert!(err.is_incomplete());
}

#[test]
fn test_scanner_positions() {
    let tokens = Scanner::new("(a\n  \"b\")").scan_tokens().unwrap();
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::LeftParen,
            TokenKind::Symbol("a".to_string()),
            TokenKind::String("b".to_string()),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]
    );
    assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
}

#[test]
fn test_integer_literal_out_of_range() {
    let err = read("99999999999999999999").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}
