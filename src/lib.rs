//! # Psil - An Embeddable S-Expression Lisp
//!
//! Psil is a small Lisp interpreter meant to live inside a host program. It
//! reads S-expressions, evaluates them with lexically scoped closures and
//! proper tail calls, expands non-hygienic `defmacro` macros, and shares its
//! global definitions with the host through a [`Namespace`].
//!
//! ## Quick Start
//!
//! ```rust
//! use psil::{Interpreter, Value};
//!
//! # fn main() -> psil::Result<()> {
//! let mut interp = Interpreter::new();
//! let result = interp.eval_str(
//!     r#"
//!     (define (sum-to n acc)
//!       (if (= n 0) acc (sum-to (- n 1) (+ acc n))))
//!     (sum-to 10 0)
//!     "#,
//! )?;
//! assert_eq!(result, Value::Int(55));
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading and Evaluating by Hand
//!
//! The reader and evaluator can be driven separately:
//!
//! ```rust
//! use psil::{builtins, Environment, EvalConfig, Evaluator, Reader, Value};
//!
//! # fn main() -> psil::Result<()> {
//! let global = Environment::global(EvalConfig::default());
//! builtins::install(&global);
//!
//! let mut evaluator = Evaluator::new(global.clone());
//! let mut result = Value::Nil;
//! for form in Reader::new("(define xs '(1 2 3)) (map (lambda (x) (* x x)) xs)") {
//!     result = evaluator.eval(&form?, &global)?;
//! }
//! assert_eq!(result.to_string(), "(1 4 9)");
//! # Ok(())
//! # }
//! ```
//!
//! ### Sharing a Namespace with the Host
//!
//! ```rust
//! use psil::{psil, HostValue, Namespace};
//!
//! # fn main() -> psil::Result<()> {
//! let ns = Namespace::new();
//! ns.set("limit", 3);
//! ns.define_fn("greet", |args| {
//!     let name = args.first().and_then(HostValue::as_str).unwrap_or("nobody");
//!     Ok(HostValue::from(format!("hello, {}", name)))
//! });
//!
//! let result = psil(r#"(define seen (+ limit 1)) (greet "psil")"#, Some(&ns))?;
//! assert_eq!(result, HostValue::from("hello, psil"));
//! assert_eq!(ns.get("seen"), Some(HostValue::Int(4)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Language Overview
//!
//! ### Data Types
//!
//! - **Atoms**: integers, floats, strings, symbols, `#t`/`#f`, the empty list `()`
//! - **Pairs**: `(a . b)`, with proper lists ending in `()`
//! - **Procedures**: closures, builtins and host functions
//! - Only `#f` is false; `()` and `0` are true
//!
//! ### Special Forms
//!
//! - `(quote x)` / `'x`, `(quasiquote x)` / `` `x `` with `,x` and `,@x`
//! - `(if test then [else])`
//! - `(lambda (a (o b) . rest) body...)`
//! - `(define name value)`, `(define (name params...) body...)`
//! - `(defmacro name params body...)`
//! - `(begin forms...)`
//!
//! The standard macros `and`, `or`, `when`, `unless`, `let`, `let*` and
//! `cond` are written in Psil and loaded into every [`Interpreter`].
//!
//! ## Architecture
//!
//! ```text
//! Source Text → Scanner → Tokens → Reader → Values → Evaluator → Value
//!                                                      ↕
//!                                              Namespace (host)
//! ```
//!
//! - [`Scanner`] - Tokenizes source text
//! - [`Reader`] - Builds data values from tokens, one form at a time
//! - [`Evaluator`] - Evaluates forms with tail calls and a depth limit
//! - [`Environment`] - Chain of frames ending in the global frame
//! - [`Namespace`] - Host-visible storage behind the global frame
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`]; [`Error::kind`] gives the coarse
//! [`ErrorKind`] an embedder would branch on.
//!
//! ```rust
//! use psil::{ErrorKind, Interpreter};
//!
//! let mut interp = Interpreter::new();
//! let err = interp.eval_str("(// 10 0)").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Division);
//! assert!(err.to_string().contains("Division by zero"));
//! ```

#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]

/// Version of the Psil interpreter
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bridge;
pub mod corpus;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;

// Re-export main types
pub use bridge::{from_host, to_host, HostFunction, HostValue, Namespace};
pub use error::{Error, ErrorKind, Result};
pub use interpreter::{make_interpreter, psil, Interpreter};
pub use lexer::{SExprScanner, Token, TokenKind};
pub use parser::{read, read_one, SExprParser};
pub use runtime::{builtins, Environment, EvalConfig, LispEvaluator, Value, DEFAULT_MAX_DEPTH};

/// Type alias for the S-expression scanner (lexer).
/// Converts raw source text into tokens for the reader.
pub type Scanner = SExprScanner;

/// Type alias for the S-expression reader.
/// Converts source text into data values, one top-level form at a time.
pub type Parser = SExprParser;

/// Alias for [`Parser`]; Lisp calls this stage the reader.
pub type Reader = SExprParser;

/// Type alias for the Lisp evaluator.
pub type Evaluator = LispEvaluator;
