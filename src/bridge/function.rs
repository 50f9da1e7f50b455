use std::fmt;
use std::rc::Rc;

use super::{from_host, to_host_in, HostValue};
use crate::error::Result;
use crate::runtime::{prelude, Environment, EvalConfig, LispEvaluator, Value};

type NativeFn = dyn Fn(&[HostValue]) -> Result<HostValue>;

/// A callable crossing the host boundary in either direction
///
/// Native functions are Rust closures registered by the embedder.
/// Interpreted functions wrap a Psil procedure so the host can call it
/// with host arguments; converting one back into the interpreter yields
/// the original procedure.
#[derive(Clone)]
pub struct HostFunction {
    name: Rc<str>,
    kind: Callable,
}

#[derive(Clone)]
enum Callable {
    Native(Rc<NativeFn>),
    Interpreted {
        procedure: Rc<Value>,
        /// Global frame of the interpreter the procedure came from
        global: Option<Environment>,
    },
}

impl HostFunction {
    /// Wraps a host closure
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue> + 'static,
    {
        HostFunction {
            name: Rc::from(name),
            kind: Callable::Native(Rc::new(func)),
        }
    }

    /// Wraps a Psil procedure (closure or builtin)
    ///
    /// Closures always run against the root of their captured frame. A
    /// builtin runs against `global` when given, otherwise against a fresh
    /// global frame holding only the builtins and the prelude.
    pub(crate) fn interpreted(procedure: Value, global: Option<Environment>) -> Self {
        let name: Rc<str> = match &procedure {
            Value::Closure(lambda) => Rc::from(lambda.display_name()),
            Value::Builtin(builtin) => Rc::from(builtin.name),
            other => Rc::from(other.type_name()),
        };
        HostFunction {
            name,
            kind: Callable::Interpreted {
                procedure: Rc::new(procedure),
                global,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when this wraps a Psil procedure
    pub fn is_interpreted(&self) -> bool {
        matches!(self.kind, Callable::Interpreted { .. })
    }

    /// The wrapped Psil procedure, if any
    pub(crate) fn interpreted_value(&self) -> Option<&Value> {
        match &self.kind {
            Callable::Interpreted { procedure, .. } => Some(&**procedure),
            Callable::Native(_) => None,
        }
    }

    /// Calls the function with host arguments
    ///
    /// Interpreted procedures run against the global frame they were
    /// defined in; errors propagate unchanged.
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue> {
        match &self.kind {
            Callable::Native(func) => {
                tracing::trace!(function = %self.name, argc = args.len(), "calling host function");
                func(args)
            }
            Callable::Interpreted { procedure, global } => {
                let global = match (&**procedure, global) {
                    (Value::Closure(lambda), _) => lambda.env.root(),
                    (_, Some(global)) => global.clone(),
                    (_, None) => prelude::standard_global(EvalConfig::default())?,
                };
                let mut evaluator = LispEvaluator::new(global.clone());
                let args = args.iter().map(from_host).collect();
                let result = evaluator.apply(procedure, args)?;
                Ok(to_host_in(&result, Some(&global)))
            }
        }
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        match (&self.kind, &other.kind) {
            (Callable::Native(a), Callable::Native(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (
                Callable::Interpreted { procedure: a, .. },
                Callable::Interpreted { procedure: b, .. },
            ) => a.identical(b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = if self.is_interpreted() {
            "interpreted"
        } else {
            "native"
        };
        write!(f, "HostFunction({}, {})", self.name, kind)
    }
}
