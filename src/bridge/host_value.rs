use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use super::HostFunction;
use crate::error::{Error, Result};
use crate::runtime::stack::guarded;
use crate::runtime::Value;

/// A value as seen from the embedding program
///
/// Scalars, strings and proper lists map to native variants; procedures
/// become [`HostFunction`]s; anything without a natural host shape (symbols,
/// macros, improper lists) travels as [`HostValue::Psil`] and converts back
/// unchanged.
#[derive(Clone)]
pub enum HostValue {
    /// Absent value; corresponds to the empty list
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Proper list
    List(Vec<HostValue>),
    /// Callable
    Function(HostFunction),
    /// Opaque host object carried through the interpreter untouched
    Opaque(Rc<dyn Any>),
    /// Interpreter value with no host-native shape
    Psil(Value),
}

impl HostValue {
    /// Wraps an arbitrary host object
    pub fn opaque<T: Any>(object: T) -> Self {
        HostValue::Opaque(Rc::new(object))
    }

    /// Name of the variant, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "string",
            HostValue::List(_) => "list",
            HostValue::Function(_) => "function",
            HostValue::Opaque(_) => "opaque",
            HostValue::Psil(v) => v.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(n) => Some(*n as f64),
            HostValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Downcasts an opaque object
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            HostValue::Opaque(object) => object.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Converts a JSON document; objects become lists of `(key value)` pairs
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => HostValue::Null,
            JsonValue::Bool(b) => HostValue::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => HostValue::Int(i),
                None => HostValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => HostValue::Str(s.clone()),
            JsonValue::Array(items) => {
                guarded(|| HostValue::List(items.iter().map(Self::from_json).collect()))
            }
            JsonValue::Object(map) => HostValue::List(
                map.iter()
                    .map(|(k, v)| HostValue::List(vec![HostValue::Str(k.clone()), Self::from_json(v)]))
                    .collect(),
            ),
        }
    }

    /// Converts to JSON; functions, opaque objects and non-data values are rejected
    pub fn to_json(&self) -> Result<JsonValue> {
        match self {
            HostValue::Null => Ok(JsonValue::Null),
            HostValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            HostValue::Int(n) => Ok(JsonValue::from(*n)),
            HostValue::Float(x) => serde_json::Number::from_f64(*x)
                .map(JsonValue::Number)
                .ok_or_else(|| Error::type_error("finite float", x.to_string())),
            HostValue::Str(s) => Ok(JsonValue::String(s.clone())),
            HostValue::List(items) => guarded(|| {
                items
                    .iter()
                    .map(HostValue::to_json)
                    .collect::<Result<Vec<_>>>()
                    .map(JsonValue::Array)
            }),
            other => Err(Error::type_error("JSON-compatible value", other.type_name())),
        }
    }
}

// Nested lists are flattened onto a worklist so deep nesting cannot
// overflow the stack on drop.
impl Drop for HostValue {
    fn drop(&mut self) {
        let items = match self {
            HostValue::List(items) if items.iter().any(|item| matches!(item, HostValue::List(_))) => {
                std::mem::take(items)
            }
            _ => return,
        };
        let mut pending = items;
        while let Some(mut item) = pending.pop() {
            if let HostValue::List(inner) = &mut item {
                pending.append(inner);
            }
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => guarded(|| a == b),
            (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
            (HostValue::Opaque(a), HostValue::Opaque(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (HostValue::Psil(a), HostValue::Psil(b)) => a.equal(b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "Null"),
            HostValue::Bool(b) => write!(f, "Bool({})", b),
            HostValue::Int(n) => write!(f, "Int({})", n),
            HostValue::Float(x) => write!(f, "Float({:?})", x),
            HostValue::Str(s) => write!(f, "Str({:?})", s),
            HostValue::List(items) => f.debug_tuple("List").field(items).finish(),
            HostValue::Function(func) => write!(f, "Function({})", func.name()),
            HostValue::Opaque(_) => write!(f, "Opaque(..)"),
            HostValue::Psil(v) => write!(f, "Psil({})", v),
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Null
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Int(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Int(n.into())
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        HostValue::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<HostFunction> for HostValue {
    fn from(f: HostFunction) -> Self {
        HostValue::Function(f)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(HostValue::Null)
    }
}

impl From<&JsonValue> for HostValue {
    fn from(json: &JsonValue) -> Self {
        HostValue::from_json(json)
    }
}

impl TryFrom<HostValue> for i64 {
    type Error = Error;

    fn try_from(value: HostValue) -> Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| Error::type_error("int", value.type_name()))
    }
}

impl TryFrom<HostValue> for f64 {
    type Error = Error;

    fn try_from(value: HostValue) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| Error::type_error("number", value.type_name()))
    }
}

impl TryFrom<HostValue> for bool {
    type Error = Error;

    fn try_from(value: HostValue) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| Error::type_error("bool", value.type_name()))
    }
}

impl TryFrom<HostValue> for String {
    type Error = Error;

    fn try_from(value: HostValue) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::type_error("string", value.type_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_conversions() {
        assert_eq!(HostValue::from(5i64), HostValue::Int(5));
        assert_eq!(HostValue::from("x"), HostValue::Str("x".to_string()));
        assert_eq!(
            HostValue::from(vec![1i64, 2]),
            HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)])
        );
        assert_eq!(HostValue::from(None::<i64>), HostValue::Null);
    }

    #[test]
    fn test_try_from() {
        assert_eq!(i64::try_from(HostValue::Int(3)).unwrap(), 3);
        assert_eq!(f64::try_from(HostValue::Int(3)).unwrap(), 3.0);
        assert!(String::try_from(HostValue::Int(3)).is_err());
    }

    #[test]
    fn test_json_conversion() {
        let doc = json!({"name": "psil", "tags": [1, 2.5, true, null]});
        let host = HostValue::from_json(&doc);
        let pairs = host.as_list().unwrap();
        assert_eq!(pairs.len(), 2);

        let back = HostValue::from_json(&json!([1, "two", [3.5]])).to_json().unwrap();
        assert_eq!(back, json!([1, "two", [3.5]]));
    }

    #[test]
    fn test_deeply_nested_list_drop() {
        let nested = (0..200_000).fold(HostValue::Null, |acc, _| HostValue::List(vec![acc]));
        drop(nested);
    }

    #[test]
    fn test_opaque_round_trip() {
        let handle = HostValue::opaque(vec![1u8, 2, 3]);
        assert_eq!(handle.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
        assert_eq!(handle.clone(), handle);
        assert!(handle.to_json().is_err());
    }
}
