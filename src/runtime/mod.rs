//! Runtime execution for Psil: values, environments, evaluation and macros

pub mod builtins;
mod environment;
pub mod expander;
mod lisp_evaluator;
pub mod prelude;
pub(crate) mod stack;
mod value;

pub use environment::Environment;
pub use lisp_evaluator::{EvalConfig, LispEvaluator, SpecialForm, DEFAULT_MAX_DEPTH};
pub use value::{Arity, Builtin, BuiltinFn, Lambda, Pair, Params, Value};
