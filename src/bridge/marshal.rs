use std::rc::Rc;

use super::{HostFunction, HostRef, HostValue};
use crate::runtime::stack::guarded;
use crate::runtime::{Environment, Value};

/// Converts an interpreter value into its host representation
///
/// Closures and builtins become callable [`HostFunction`]s. Values with no
/// host-native shape are wrapped so [`from_host`] restores them exactly.
/// A builtin converted here is not tied to any interpreter; calling it from
/// the host runs it against a fresh frame of builtins and prelude macros.
pub fn to_host(value: &Value) -> HostValue {
    to_host_in(value, None)
}

/// Like [`to_host`], tying builtins to the interpreter owning `global`
pub(crate) fn to_host_in(value: &Value, global: Option<&Environment>) -> HostValue {
    match value {
        Value::Nil => HostValue::Null,
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Int(n) => HostValue::Int(*n),
        Value::Float(x) => HostValue::Float(*x),
        Value::String(s) => HostValue::Str(s.to_string()),
        Value::Pair(_) => match value.list_items() {
            Some(items) => guarded(|| {
                HostValue::List(items.iter().map(|item| to_host_in(item, global)).collect())
            }),
            None => HostValue::Psil(value.clone()),
        },
        Value::Closure(_) | Value::Builtin(_) => HostValue::Function(HostFunction::interpreted(
            value.clone(),
            global.map(Environment::root),
        )),
        Value::Host(HostRef::Function(func)) => HostValue::Function(func.clone()),
        Value::Host(HostRef::Opaque(object)) => HostValue::Opaque(Rc::clone(object)),
        Value::Symbol(_) | Value::Macro(_) => HostValue::Psil(value.clone()),
    }
}

/// Converts a host value into an interpreter value
///
/// Host callables become applicable procedures; wrapped Psil procedures
/// unwrap to the original value.
pub fn from_host(host: &HostValue) -> Value {
    match host {
        HostValue::Null => Value::Nil,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Int(n) => Value::Int(*n),
        HostValue::Float(x) => Value::Float(*x),
        HostValue::Str(s) => Value::string(s),
        HostValue::List(items) => guarded(|| Value::list(items.iter().map(from_host).collect())),
        HostValue::Function(func) => match func.interpreted_value() {
            Some(procedure) => procedure.clone(),
            None => Value::Host(HostRef::Function(func.clone())),
        },
        HostValue::Opaque(object) => Value::Host(HostRef::Opaque(Rc::clone(object))),
        HostValue::Psil(value) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(to_host(&Value::Int(3)), HostValue::Int(3));
        assert_eq!(to_host(&Value::Nil), HostValue::Null);
        assert_eq!(from_host(&HostValue::Str("s".into())), Value::string("s"));
        assert_eq!(from_host(&HostValue::Null), Value::Nil);
    }

    #[test]
    fn test_lists_become_vectors() {
        let list = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(
            to_host(&list),
            HostValue::List(vec![HostValue::Int(1), HostValue::Str("a".into())])
        );
        assert_eq!(from_host(&to_host(&list)), list);
    }

    #[test]
    fn test_non_native_values_wrap() {
        let sym = Value::symbol("foo");
        assert!(matches!(to_host(&sym), HostValue::Psil(_)));
        assert_eq!(from_host(&to_host(&sym)).as_symbol(), Some("foo"));

        let dotted = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(from_host(&to_host(&dotted)).to_string(), "(1 . 2)");
    }

    #[test]
    fn test_deeply_nested_lists_convert() {
        let nested = (0..100_000).fold(Value::Nil, |acc, _| Value::list(vec![acc]));
        let host = to_host(&nested);
        let back = from_host(&host);
        assert!(back.equal(&nested));
    }

    #[test]
    fn test_native_function_is_applicable() {
        let func = HostFunction::new("id", |args| Ok(args[0].clone()));
        let value = from_host(&HostValue::Function(func));
        assert!(value.is_procedure());
    }
}
