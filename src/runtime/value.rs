use std::fmt;
use std::rc::Rc;

use crate::bridge::HostRef;
use crate::error::{Error, Result};
use crate::runtime::stack::guarded;
use crate::runtime::{Environment, LispEvaluator};

/// Runtime value representation
///
/// Values are immutable once constructed. Lists are chains of [`Pair`]
/// cells terminated by [`Value::Nil`]; a chain ending in any other value is
/// an improper list.
#[derive(Clone)]
pub enum Value {
    /// The empty list
    Nil,
    /// `#t` / `#f`
    Bool(bool),
    /// 64-bit integer value
    Int(i64),
    /// 64-bit floating-point value
    Float(f64),
    /// String value
    String(Rc<str>),
    /// Symbol, compared by name
    Symbol(Rc<str>),
    /// Cons cell (reference-counted, immutable)
    Pair(Rc<Pair>),
    /// Function value closing over its defining environment
    Closure(Rc<Lambda>),
    /// Code transformer, invoked with unevaluated argument forms
    Macro(Rc<Lambda>),
    /// Primitive procedure implemented in Rust
    Builtin(Builtin),
    /// Host-bridged callable or opaque host handle
    Host(HostRef),
}

/// A cons cell
pub struct Pair {
    car: Value,
    cdr: Value,
}

impl Pair {
    /// Head of the cell
    pub fn car(&self) -> &Value {
        &self.car
    }

    /// Tail of the cell
    pub fn cdr(&self) -> &Value {
        &self.cdr
    }
}

// Cells reachable only through this one are unlinked onto a worklist, so
// neither long tails nor deep nesting through `car` recurse on drop.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach(&mut self.car, &mut pending);
        detach(&mut self.cdr, &mut pending);
        while let Some(cell) = pending.pop() {
            if let Ok(mut pair) = Rc::try_unwrap(cell) {
                detach(&mut pair.car, &mut pending);
                detach(&mut pair.cdr, &mut pending);
            }
        }
    }
}

fn detach(slot: &mut Value, pending: &mut Vec<Rc<Pair>>) {
    if let Value::Pair(_) = slot {
        if let Value::Pair(cell) = std::mem::replace(slot, Value::Nil) {
            pending.push(cell);
        }
    }
}

/// Parameter list of a closure or macro
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    /// Positional parameters that must be supplied
    pub required: Vec<Rc<str>>,
    /// Parameters written `(o name)`, bound to nil when missing
    pub optional: Vec<Rc<str>>,
    /// Variadic parameter collecting remaining arguments as a list
    pub rest: Option<Rc<str>>,
}

impl Params {
    /// Parses a parameter specification: `(a b)`, `(a (o b) . rest)` or a bare symbol
    pub fn parse(spec: &Value, form: &str) -> Result<Params> {
        let mut params = Params::default();
        let mut cursor = spec.clone();

        loop {
            match cursor {
                Value::Nil => break,
                Value::Symbol(name) => {
                    params.rest = Some(name);
                    break;
                }
                Value::Pair(cell) => {
                    match cell.car() {
                        Value::Symbol(name) => {
                            if !params.optional.is_empty() {
                                return Err(Error::malformed(
                                    form,
                                    format!("required parameter {} after optional ones", name),
                                ));
                            }
                            params.required.push(name.clone());
                        }
                        optional => {
                            let name = Self::optional_name(optional).ok_or_else(|| {
                                Error::malformed(form, format!("bad parameter {}", optional))
                            })?;
                            params.optional.push(name);
                        }
                    }
                    cursor = cell.cdr().clone();
                }
                other => {
                    return Err(Error::malformed(
                        form,
                        format!("bad parameter list tail {}", other),
                    ))
                }
            }
        }

        Ok(params)
    }

    /// `(o name)` → `name`
    fn optional_name(param: &Value) -> Option<Rc<str>> {
        let items = param.list_items()?;
        match items.as_slice() {
            [Value::Symbol(marker), Value::Symbol(name)] if &**marker == "o" => Some(name.clone()),
            _ => None,
        }
    }

    /// Checks an argument count without touching any environment
    pub fn check_arity(&self, name: &str, got: usize) -> Result<()> {
        let min = self.required.len();
        let max = min + self.optional.len();
        if got < min || (self.rest.is_none() && got > max) {
            return Err(Error::ArityError {
                name: name.to_string(),
                expected: self.describe(),
                got,
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        let min = self.required.len();
        let max = min + self.optional.len();
        match (&self.rest, min == max) {
            (Some(_), _) => format!("at least {}", min),
            (None, true) => min.to_string(),
            (None, false) => format!("{} to {}", min, max),
        }
    }
}

/// Shared body of closures and macros
pub struct Lambda {
    /// Name recorded by `(define (name ...) ...)` or `defmacro`
    pub name: Option<Rc<str>>,
    /// Parameter list
    pub params: Params,
    /// Body forms, evaluated in sequence
    pub body: Vec<Value>,
    /// Captured defining environment
    pub env: Environment,
}

impl Lambda {
    /// Name used in error messages
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("lambda")
    }
}

/// Accepted argument counts of a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// n or more arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
}

impl Arity {
    /// Checks an argument count
    pub fn check(self, name: &str, got: usize) -> Result<()> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(min, max) => got >= min && got <= max,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Arity::Exact(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {}", n),
            Arity::Range(min, max) => format!("{} to {}", min, max),
        };
        Err(Error::ArityError {
            name: name.to_string(),
            expected,
            got,
        })
    }
}

/// Signature of primitive procedures
pub type BuiltinFn = fn(&mut LispEvaluator, Vec<Value>) -> Result<Value>;

/// Primitive procedure
#[derive(Clone, Copy)]
pub struct Builtin {
    /// Global name
    pub name: &'static str,
    /// Accepted argument counts
    pub arity: Arity,
    /// Implementation
    pub func: BuiltinFn,
}

impl Value {
    /// Creates a symbol
    pub fn symbol(name: &str) -> Self {
        Value::Symbol(Rc::from(name))
    }

    /// Creates a string value
    pub fn string(text: &str) -> Self {
        Value::String(Rc::from(text))
    }

    /// Creates a cons cell
    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Pair(Rc::new(Pair { car, cdr }))
    }

    /// Creates a proper list
    pub fn list(items: Vec<Value>) -> Self {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Creates a list whose last cell points at `tail`
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Self {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "closure",
            Value::Macro(_) => "macro",
            Value::Builtin(_) => "builtin",
            Value::Host(HostRef::Function(_)) => "host-function",
            Value::Host(HostRef::Opaque(_)) => "host-object",
        }
    }

    /// Only `#f` is false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// True for `Nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True for `Nil` or a pair chain ending in `Nil`
    pub fn is_list(&self) -> bool {
        self.list_items().is_some()
    }

    /// True for values that can be applied to arguments
    pub fn is_procedure(&self) -> bool {
        matches!(
            self,
            Value::Closure(_) | Value::Builtin(_) | Value::Host(HostRef::Function(_))
        )
    }

    /// Symbol name, if this is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Cons cell, if this is a pair
    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Value::Pair(cell) => Some(cell),
            _ => None,
        }
    }

    /// Head of a pair or a type error
    pub fn car(&self) -> Result<&Value> {
        self.as_pair()
            .map(Pair::car)
            .ok_or_else(|| Error::type_error("pair", self.type_name()))
    }

    /// Tail of a pair or a type error
    pub fn cdr(&self) -> Result<&Value> {
        self.as_pair()
            .map(Pair::cdr)
            .ok_or_else(|| Error::type_error("pair", self.type_name()))
    }

    /// Splits a list into its elements and its terminal tail (`Nil` for proper lists)
    pub fn list_parts(&self) -> (Vec<Value>, Value) {
        let mut items = Vec::new();
        let mut cursor = self;
        while let Value::Pair(cell) = cursor {
            items.push(cell.car.clone());
            cursor = &cell.cdr;
        }
        (items, cursor.clone())
    }

    /// Elements of a proper list, or `None` for anything else
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self.list_parts() {
            (items, Value::Nil) => Some(items),
            _ => None,
        }
    }

    /// Elements of a proper list, or a type error
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.list_items()
            .ok_or_else(|| Error::type_error("list", self.type_name()))
    }

    /// Structural equality; numbers compare numerically across int and float
    pub fn equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(_), Value::Pair(_)) => guarded(|| {
                let (left, left_tail) = self.list_parts();
                let (right, right_tail) = other.list_parts();
                left.len() == right.len()
                    && left.iter().zip(right.iter()).all(|(a, b)| a.equal(b))
                    && left_tail.equal(&right_tail)
            }),
            _ => self.identical(other),
        }
    }

    /// Identity for pairs and procedures, value equality for atoms
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Pair(_), _) | (_, Value::Pair(_)) => false,
            _ => self.equal(other),
        }
    }

    /// Text used by `concat`, `print` and `error`: strings without quotes
    pub fn display_text(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

fn write_escaped(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            '\0' => write!(f, "\\0")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

/// Reader shorthand for a two-element `(quote x)`-style list
fn shorthand(cell: &Pair) -> Option<(&'static str, &Value)> {
    let prefix = match cell.car.as_symbol()? {
        "quote" => "'",
        "quasiquote" => "`",
        "unquote" => ",",
        "unquote-splicing" => ",@",
        _ => return None,
    };
    match &cell.cdr {
        Value::Pair(rest) if rest.cdr.is_nil() => Some((prefix, &rest.car)),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::String(s) => write_escaped(f, s),
            Value::Symbol(name) => write!(f, "{}", name),
            Value::Pair(cell) => guarded(|| {
                if let Some((prefix, quoted)) = shorthand(cell) {
                    return write!(f, "{}{}", prefix, quoted);
                }
                let (items, tail) = self.list_parts();
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if !tail.is_nil() {
                    write!(f, " . {}", tail)?;
                }
                write!(f, ")")
            }),
            Value::Closure(lambda) => match &lambda.name {
                Some(name) => write!(f, "<lambda {}>", name),
                None => write!(f, "<lambda>"),
            },
            Value::Macro(lambda) => match &lambda.name {
                Some(name) => write!(f, "<macro {}>", name),
                None => write!(f, "<macro>"),
            },
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            Value::Host(HostRef::Function(func)) => write!(f, "<host-function {}>", func.name()),
            Value::Host(HostRef::Opaque(_)) => write!(f, "<host-object>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
