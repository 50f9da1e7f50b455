//! Embedding entry points

use crate::bridge::{from_host, to_host_in, HostValue, Namespace};
use crate::error::Result;
use crate::parser::SExprParser;
use crate::runtime::{prelude, Environment, EvalConfig, LispEvaluator, Value};

/// A Psil interpreter: a global frame seeded with builtins and prelude
/// macros, backed by a host [`Namespace`]
///
/// Top-level definitions are written into the namespace, so the embedder
/// sees them as [`HostValue`]s and can call defined procedures through
/// [`Interpreter::call`] or [`HostFunction::call`](crate::HostFunction::call).
pub struct Interpreter {
    global: Environment,
    namespace: Namespace,
}

impl Interpreter {
    /// Creates an interpreter with a fresh namespace and default settings
    pub fn new() -> Self {
        Self::with_namespace_and_config(Namespace::new(), EvalConfig::default())
    }

    /// Creates an interpreter whose globals live in `namespace`
    pub fn with_namespace(namespace: Namespace) -> Self {
        Self::with_namespace_and_config(namespace, EvalConfig::default())
    }

    /// Creates an interpreter with custom evaluation settings
    pub fn with_config(config: EvalConfig) -> Self {
        Self::with_namespace_and_config(Namespace::new(), config)
    }

    pub fn with_namespace_and_config(namespace: Namespace, config: EvalConfig) -> Self {
        // The prelude is compiled in, so a load failure is a bug in this crate.
        let global = match prelude::standard_global(config) {
            Ok(global) => global,
            Err(err) => panic!("prelude failed to load: {}", err),
        };
        global.attach_namespace(namespace.clone());
        Interpreter { global, namespace }
    }

    /// The namespace backing the global frame
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The global frame
    pub fn global_env(&self) -> &Environment {
        &self.global
    }

    /// Evaluation settings in effect
    pub fn config(&self) -> EvalConfig {
        self.global.config()
    }

    /// An evaluator bound to this interpreter's global frame
    pub fn evaluator(&self) -> LispEvaluator {
        LispEvaluator::new(self.global.clone())
    }

    /// Evaluates one form at top level
    pub fn eval_form(&mut self, form: &Value) -> Result<Value> {
        self.evaluator().eval(form, &self.global)
    }

    /// Reads and evaluates every form in `source`, returning the last value
    ///
    /// Forms are read one at a time, so definitions made before a syntax
    /// error remain in effect.
    pub fn eval_str(&mut self, source: &str) -> Result<Value> {
        let mut evaluator = self.evaluator();
        let mut result = Value::Nil;
        for form in SExprParser::new(source) {
            result = evaluator.eval(&form?, &self.global)?;
        }
        Ok(result)
    }

    /// Like [`Interpreter::eval_str`], converting the result for the host
    pub fn run(&mut self, source: &str) -> Result<HostValue> {
        let value = self.eval_str(source)?;
        Ok(to_host_in(&value, Some(&self.global)))
    }

    /// Looks up a global binding
    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.global.lookup(name)
    }

    /// Binds a host value in the namespace
    pub fn define(&mut self, name: &str, value: impl Into<HostValue>) {
        self.namespace.set(name, value);
    }

    /// Registers a host closure callable from Psil
    pub fn define_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[HostValue]) -> Result<HostValue> + 'static,
    {
        self.namespace.define_fn(name, func);
    }

    /// Calls a global procedure with host arguments
    pub fn call(&mut self, name: &str, args: &[HostValue]) -> Result<HostValue> {
        let callee = self.lookup(name)?;
        let args = args.iter().map(from_host).collect();
        let result = self.evaluator().apply(&callee, args)?;
        Ok(to_host_in(&result, Some(&self.global)))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates `source` against `namespace` (or a fresh one) and returns the
/// last value
///
/// ```
/// use psil::{psil, HostValue, Namespace};
///
/// let ns = Namespace::new();
/// ns.define_fn("sq", |args| {
///     let n = args[0].as_i64().unwrap_or(0);
///     Ok(HostValue::Int(n * n))
/// });
/// let result = psil("(define (fact n) (if (< n 2) 1 (* n (fact (- n 1))))) (sq (fact 3))", Some(&ns)).unwrap();
/// assert_eq!(result, HostValue::Int(36));
///
/// let fact = ns.get("fact").unwrap();
/// let value = fact.as_function().unwrap().call(&[HostValue::Int(5)]).unwrap();
/// assert_eq!(value, HostValue::Int(120));
/// ```
pub fn psil(source: &str, namespace: Option<&Namespace>) -> Result<HostValue> {
    let namespace = namespace.cloned().unwrap_or_default();
    Interpreter::with_namespace(namespace).run(source)
}

/// Evaluates `source` and hands back its value for the host
///
/// When the last form evaluates to a procedure the result is a
/// [`HostValue::Function`] the host can call directly.
pub fn make_interpreter(source: &str, namespace: Option<&Namespace>) -> Result<HostValue> {
    psil(source, namespace)
}
