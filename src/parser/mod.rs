//! Psil Reader
//!
//! Turns source text into S-expression forms, one top-level form at a time.

mod sexpr_parser;

pub use sexpr_parser::{read, read_one, strip_shebang, SExprParser, MAX_PARSE_DEPTH};
