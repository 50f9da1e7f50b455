//! Standard macros written in Psil itself

use crate::error::Result;
use crate::parser::SExprParser;
use crate::runtime::{builtins, Environment, EvalConfig, LispEvaluator};

/// Source of the standard macros
pub const PRELUDE: &str = include_str!("prelude.psil");

/// Evaluates the prelude into `env`
pub fn load(env: &Environment) -> Result<()> {
    let mut evaluator = LispEvaluator::new(env.clone());
    for form in SExprParser::new(PRELUDE) {
        evaluator.eval(&form?, env)?;
    }
    tracing::debug!("prelude loaded");
    Ok(())
}

/// A global frame holding the builtins and the prelude, with no namespace attached
pub fn standard_global(config: EvalConfig) -> Result<Environment> {
    let global = Environment::global(config);
    builtins::install(&global);
    load(&global)?;
    Ok(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read;
    use crate::runtime::Value;

    fn eval_with_prelude(source: &str) -> Value {
        let global = Environment::global(EvalConfig::default());
        builtins::install(&global);
        load(&global).unwrap();
        let mut evaluator = LispEvaluator::new(global.clone());
        let mut result = Value::Nil;
        for form in read(source).unwrap() {
            result = evaluator.eval(&form, &global).unwrap();
        }
        result
    }

    #[test]
    fn test_prelude_defines_macros() {
        let global = Environment::global(EvalConfig::default());
        builtins::install(&global);
        load(&global).unwrap();
        for name in ["and", "or", "when", "unless", "let", "let*", "cond"] {
            assert!(
                matches!(global.lookup(name), Ok(Value::Macro(_))),
                "{} should be a macro",
                name
            );
        }
    }

    #[test]
    fn test_and_or() {
        assert_eq!(eval_with_prelude("(and 1 2 3)"), Value::Int(3));
        assert_eq!(eval_with_prelude("(and 1 #f 3)"), Value::Bool(false));
        assert_eq!(eval_with_prelude("(and)"), Value::Bool(true));
        assert_eq!(eval_with_prelude("(or #f 2)"), Value::Int(2));
        assert_eq!(eval_with_prelude("(or)"), Value::Bool(false));
    }

    #[test]
    fn test_let_forms() {
        assert_eq!(eval_with_prelude("(let ((x 2) (y 3)) (* x y))"), Value::Int(6));
        assert_eq!(
            eval_with_prelude("(let* ((x 2) (y (+ x 1))) (* x y))"),
            Value::Int(6)
        );
    }

    #[test]
    fn test_cond() {
        let source = "(define (sign n) (cond ((< n 0) 'neg) ((= n 0) 'zero) (else 'pos)))
                      (list (sign -5) (sign 0) (sign 5))";
        assert_eq!(eval_with_prelude(source).to_string(), "(neg zero pos)");
        assert_eq!(eval_with_prelude("(cond (#f 1))"), Value::Nil);
    }
}
