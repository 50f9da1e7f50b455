//! Primitive procedures installed in every global frame

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::{Error, Result};
use crate::parser::{strip_shebang, SExprParser};
use crate::runtime::expander;
use crate::runtime::value::{Arity, Builtin, BuiltinFn};
use crate::runtime::{Environment, LispEvaluator, Value};

static GENSYM_COUNTER: AtomicU64 = AtomicU64::new(0);

const BUILTINS: &[(&str, Arity, BuiltinFn)] = &[
    // Arithmetic
    ("+", Arity::AtLeast(0), add),
    ("-", Arity::AtLeast(1), sub),
    ("*", Arity::AtLeast(0), mul),
    ("/", Arity::AtLeast(1), div),
    ("//", Arity::AtLeast(1), floor_div),
    ("%", Arity::Exact(2), modulo),
    ("**", Arity::Exact(2), pow),
    // Bitwise
    ("&", Arity::AtLeast(0), bit_and),
    ("|", Arity::AtLeast(0), bit_or),
    ("^", Arity::Exact(2), bit_xor),
    ("~", Arity::Exact(1), bit_not),
    ("<<", Arity::Exact(2), shift_left),
    (">>", Arity::Exact(2), shift_right),
    // Bitwise
// Comparison
    ("=", Arity::AtLeast(1), num_eq),
    ("<", Arity::AtLeast(1), lt),
    (">", Arity::AtLeast(1), gt),
    ("<=", Arity::AtLeast(1), le),
    (">=", Arity::AtLeast(1), ge),
    ("==", Arity::AtLeast(1), equal_chain),
    ("!=", Arity::Exact(2), not_equal),
    ("eq?", Arity::Exact(2), eq_p),
    ("equal?", Arity::Exact(2), equal_p),
    ("not", Arity::Exact(1), not),
    ("in", Arity::Exact(2), in_p),
    ("not-in", Arity::Exact(2), not_in_p),
    // Lists
    ("list", Arity::AtLeast(0), list),
    ("cons", Arity::Exact(2), cons),
    ("car", Arity::Exact(1), car),
    ("cdr", Arity::Exact(1), cdr),
    ("caar", Arity::Exact(1), caar),
    ("cadr", Arity::Exact(1), cadr),
    ("cdar", Arity::Exact(1), cdar),
    ("cddr", Arity::Exact(1), cddr),
    ("caaar", Arity::Exact(1), caaar),
    ("caadr", Arity::Exact(1), caadr),
    ("caddr", Arity::Exact(1), caddr),
    ("cadddr", Arity::Exact(1), cadddr),
    ("caaaar", Arity::Exact(1), caaaar),
    ("length", Arity::Exact(1), length),
    ("append", Arity::AtLeast(0), append),
    ("reverse", Arity::Exact(1), reverse),
    ("list-tail", Arity::Exact(2), list_tail),
    ("list-ref", Arity::Exact(2), list_ref),
    // Predicates
    ("null?", Arity::Exact(1), null_p),
    ("pair?", Arity::Exact(1), pair_p),
    ("list?", Arity::Exact(1), list_p),
    ("number?", Arity::Exact(1), number_p),
    ("integer?", Arity::Exact(1), integer_p),
    ("float?", Arity::Exact(1), float_p),
    ("string?", Arity::Exact(1), string_p),
    ("symbol?", Arity::Exact(1), symbol_p),
    ("boolean?", Arity::Exact(1), boolean_p),
    ("procedure?", Arity::Exact(1), procedure_p),
    ("macro?", Arity::Exact(1), macro_p),
    // Strings and symbols
    ("symbol->string", Arity::Exact(1), symbol_to_string),
    ("string->symbol", Arity::Exact(1), string_to_symbol),
    ("number->string", Arity::Exact(1), number_to_string),
    ("string-length", Arity::Exact(1), string_length),
    ("concat", Arity::AtLeast(0), concat),
    ("gensym", Arity::Range(0, 1), gensym),
    // Evaluation
    ("apply", Arity::AtLeast(2), apply),
    ("map", Arity::AtLeast(2), map),
    ("eval", Arity::Exact(1), eval),
    ("include", Arity::Exact(1), include),
    ("macroexpand-1", Arity::Exact(1), macroexpand_1),
    ("macroexpand", Arity::Exact(1), macroexpand),
    ("macroexpand-all", Arity::Exact(1), macroexpand_all),
    // Output and errors
    ("print", Arity::AtLeast(0), print),
    ("error", Arity::AtLeast(0), error),
];

fn int_arg(value: &Value) -> Result<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(Error::type_error("int", other.type_name())),
    }
}

fn fold_bits(init: i64, args: &[Value], op: fn(i64, i64) -> i64) -> Result<Value> {
    let mut acc = init;
    for arg in args {
        acc = op(acc, int_arg(arg)?);
    }
    Ok(Value::Int(acc))
}

fn bit_and(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    fold_bits(-1, &args, |a, b| a & b)
}

fn bit_or(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    fold_bits(0, &args, |a, b| a | b)
}

fn bit_xor(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    fold_bits(0, &args, |a, b| a ^ b)
}

fn bit_not(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Int(!int_arg(&args[0])?))
}

fn shift_count(value: &Value) -> Result<u32> {
    match int_arg(value)? {
        n if n < 0 => Err(Error::type_error("non-negative shift count", n.to_string())),
        n => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
    }
}

/// Left shift; bits shifted past the sign are an overflow
fn shift_left(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let n = int_arg(&args[0])?;
    let count = shift_count(&args[1])?;
    if n == 0 {
        return Ok(Value::Int(0));
    }
    if count >= 64 {
        return Err(overflow("<<"));
    }
    let shifted = n << count;
    if shifted >> count != n {
        return Err(overflow("<<"));
    }
    Ok(Value::Int(shifted))
}

/// Arithmetic right shift
fn shift_right(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let n = int_arg(&args[0])?;
    let count = shift_count(&args[1])?;
    Ok(Value::Int(n >> count.min(63)))
}


/// Binds every builtin (and `nil`) in `env`
pub fn install(env: &Environment) {
    for &(name, arity, func) in BUILTINS {
        env.define(name, Value::Builtin(Builtin { name, arity, func }));
    }
    env.define("nil", Value::Nil);
}

/// Names of all builtin procedures
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _, _)| *name)
}

// Numbers

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(value: &Value) -> Result<Num> {
        match value {
            Value::Int(n) => Ok(Num::Int(*n)),
            Value::Float(x) => Ok(Num::Float(*x)),
            other => Err(Error::type_error("number", other.type_name())),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(x) => Value::Float(x),
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(n) => n == 0,
            Num::Float(x) => x == 0.0,
        }
    }
}

fn overflow(op: &str) -> Error {
    Error::Overflow { op: op.to_string() }
}

/// Folds a binary operation, staying integral while both sides are integers
fn fold_numbers(
    op: &str,
    init: Num,
    args: &[Value],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut acc = init;
    for arg in args {
        acc = match (acc, Num::from_value(arg)?) {
            (Num::Int(a), Num::Int(b)) => Num::Int(int_op(a, b).ok_or_else(|| overflow(op))?),
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        };
    }
    Ok(acc.into_value())
}

fn add(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    fold_numbers("+", Num::Int(0), &args, i64::checked_add, |a, b| a + b)
}

fn sub(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let first = Num::from_value(&args[0])?;
    if args.len() == 1 {
        return match first {
            Num::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| overflow("-")),
            Num::Float(x) => Ok(Value::Float(-x)),
        };
    }
    fold_numbers("-", first, &args[1..], i64::checked_sub, |a, b| a - b)
}

fn mul(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    fold_numbers("*", Num::Int(1), &args, i64::checked_mul, |a, b| a * b)
}

/// True division; always produces a float
fn div(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let (mut acc, rest) = if args.len() == 1 {
        (1.0, &args[..])
    } else {
        (Num::from_value(&args[0])?.as_f64(), &args[1..])
    };
    for arg in rest {
        let divisor = Num::from_value(arg)?;
        if divisor.is_zero() {
            return Err(Error::DivisionByZero);
        }
        acc /= divisor.as_f64();
    }
    Ok(Value::Float(acc))
}

/// Division rounding toward negative infinity
fn floor_div(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let mut acc = Num::from_value(&args[0])?;
    for arg in &args[1..] {
        let divisor = Num::from_value(arg)?;
        if divisor.is_zero() {
            return Err(Error::DivisionByZero);
        }
        acc = match (acc, divisor) {
            (Num::Int(a), Num::Int(b)) => {
                let q = a.checked_div(b).ok_or_else(|| overflow("//"))?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Num::Int(q - 1)
                } else {
                    Num::Int(q)
                }
            }
            (a, b) => Num::Float((a.as_f64() / b.as_f64()).floor()),
        };
    }
    Ok(acc.into_value())
}

/// Remainder taking the sign of the divisor
fn modulo(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let a = Num::from_value(&args[0])?;
    let b = Num::from_value(&args[1])?;
    if b.is_zero() {
        return Err(Error::DivisionByZero);
    }
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            // i64::MIN % -1 overflows in the hardware; the result is 0
            let r = a.checked_rem(b).unwrap_or(0);
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                Ok(Value::Float(r + b))
            } else {
                Ok(Value::Float(r))
            }
        }
    }
}

fn pow(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let (base, exp) = (Num::from_value(&args[0])?, Num::from_value(&args[1])?);
    if base.is_zero() && exp.as_f64() < 0.0 {
        return Err(Error::DivisionByZero);
    }
    match (base, exp) {
        (Num::Int(base), Num::Int(exp)) if exp >= 0 => {
            let exp = u32::try_from(exp).map_err(|_| overflow("**"))?;
            base.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow("**"))
        }
        (base, exp) => Ok(Value::Float(base.as_f64().powf(exp.as_f64()))),
    }
}

// Comparison

fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Some(x.cmp(y))),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        _ => {
            let x = Num::from_value(a)?.as_f64();
            let y = Num::from_value(b)?.as_f64();
            Ok(x.partial_cmp(&y))
        }
    }
}

fn compare_chain(args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    for pair in args.windows(2) {
        match compare(&pair[0], &pair[1])? {
            Some(ordering) if accept(ordering) => {}
            _ => return Ok(Value::Bool(false)),
        }
    }
    Ok(Value::Bool(true))
}

fn num_eq(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    compare_chain(&args, |o| o == Ordering::Equal)
}

fn lt(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    compare_chain(&args, |o| o == Ordering::Less)
}

fn gt(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    compare_chain(&args, |o| o == Ordering::Greater)
}

fn le(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    compare_chain(&args, |o| o != Ordering::Greater)
}

fn ge(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    compare_chain(&args, |o| o != Ordering::Less)
}

fn equal_chain(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args.windows(2).all(|w| w[0].equal(&w[1]))))
}

fn not_equal(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(!args[0].equal(&args[1])))
}

fn eq_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args[0].identical(&args[1])))
}

fn equal_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args[0].equal(&args[1])))
}

fn not(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// List membership by `equal?`, or substring search when both are strings
fn contains(item: &Value, container: &Value) -> Result<bool> {
    match (item, container) {
        (Value::String(needle), Value::String(haystack)) => Ok(haystack.contains(&**needle)),
        (other, Value::String(_)) => Err(Error::type_error("string", other.type_name())),
        (item, list) => Ok(list.to_vec()?.iter().any(|element| element.equal(item))),
    }
}

fn in_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    contains(&args[0], &args[1]).map(Value::Bool)
}

fn not_in_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    contains(&args[0], &args[1]).map(|found| Value::Bool(!found))
}

// Lists

fn list(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::list(args))
}

fn cons(_: &mut LispEvaluator, mut args: Vec<Value>) -> Result<Value> {
    let cdr = args.pop().unwrap_or(Value::Nil);
    let car = args.pop().unwrap_or(Value::Nil);
    Ok(Value::cons(car, cdr))
}

fn car(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].car().cloned()
}

fn cdr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr().cloned()
}

fn caar(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].car()?.car().cloned()
}

fn cadr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr()?.car().cloned()
}

fn cdar(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].car()?.cdr().cloned()
}

fn cddr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr()?.cdr().cloned()
}

fn caaar(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].car()?.car()?.car().cloned()
}

fn caadr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr()?.car()?.car().cloned()
}

fn caddr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr()?.cdr()?.car().cloned()
}

fn cadddr(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].cdr()?.cdr()?.cdr()?.car().cloned()
}

fn caaaar(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    args[0].car()?.car()?.car()?.car().cloned()
}

fn length(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let count = match &args[0] {
        Value::String(s) => s.chars().count(),
        other => other.to_vec()?.len(),
    };
    Ok(Value::Int(count as i64))
}

/// Copies every argument but the last; the last becomes the shared tail
fn append(_: &mut LispEvaluator, mut args: Vec<Value>) -> Result<Value> {
    let tail = match args.pop() {
        Some(last) => last,
        None => return Ok(Value::Nil),
    };
    let mut items = Vec::new();
    for arg in &args {
        items.extend(arg.to_vec()?);
    }
    Ok(Value::list_with_tail(items, tail))
}

fn reverse(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let mut items = args[0].to_vec()?;
    items.reverse();
    Ok(Value::list(items))
}

fn index_arg(value: &Value) -> Result<usize> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(Error::type_error("non-negative integer", other.type_name())),
    }
}

fn list_tail(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let k = index_arg(&args[1])?;
    let mut cursor = args[0].clone();
    for _ in 0..k {
        cursor = cursor
            .cdr()
            .map_err(|_| Error::type_error(format!("list of at least {} elements", k), "shorter list"))?
            .clone();
    }
    Ok(cursor)
}

fn list_ref(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let k = index_arg(&args[1])?;
    let mut cursor = &args[0];
    for _ in 0..k {
        cursor = cursor.cdr()?;
    }
    cursor
        .car()
        .cloned()
        .map_err(|_| Error::type_error(format!("list of more than {} elements", k), "shorter list"))
}

// Predicates

fn null_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args[0].is_nil()))
}

fn pair_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Pair(_))))
}

fn list_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args[0].is_list()))
}

fn number_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_) | Value::Float(_))))
}

fn integer_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}

fn float_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Float(_))))
}

fn string_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::String(_))))
}

fn symbol_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn boolean_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn procedure_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(args[0].is_procedure()))
}

fn macro_p(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Macro(_))))
}

// Strings and symbols

fn symbol_to_string(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    match &args[0] {
        Value::Symbol(name) => Ok(Value::String(name.clone())),
        other => Err(Error::type_error("symbol", other.type_name())),
    }
}

fn string_to_symbol(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    match &args[0] {
        Value::String(text) => Ok(Value::Symbol(text.clone())),
        other => Err(Error::type_error("string", other.type_name())),
    }
}

fn number_to_string(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let num = Num::from_value(&args[0])?;
    Ok(Value::string(&num.into_value().to_string()))
}

fn string_length(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(Error::type_error("string", other.type_name())),
    }
}

/// Joins the display text of every argument
fn concat(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let text: String = args.iter().map(Value::display_text).collect();
    Ok(Value::string(&text))
}

/// Fresh symbol that no reader-produced symbol can collide with in practice
fn gensym(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let prefix = match args.first() {
        None => "_g_".to_string(),
        Some(Value::String(s)) | Some(Value::Symbol(s)) => s.to_string(),
        Some(other) => return Err(Error::type_error("string or symbol", other.type_name())),
    };
    let n = GENSYM_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    Ok(Value::symbol(&format!("{}{}", prefix, n)))
}

// Evaluation

fn apply(evaluator: &mut LispEvaluator, mut args: Vec<Value>) -> Result<Value> {
    let spread = args.pop().unwrap_or(Value::Nil);
    let callee = args.remove(0);
    args.extend(spread.to_vec()?);
    evaluator.apply(&callee, args)
}

/// Applies a procedure elementwise, stopping at the shortest list
fn map(evaluator: &mut LispEvaluator, mut args: Vec<Value>) -> Result<Value> {
    let callee = args.remove(0);
    let lists = args
        .iter()
        .map(Value::to_vec)
        .collect::<Result<Vec<_>>>()?;
    let count = lists.iter().map(Vec::len).min().unwrap_or(0);

    let mut results = Vec::with_capacity(count);
    for i in 0..count {
        let call_args = lists.iter().map(|items| items[i].clone()).collect();
        results.push(evaluator.apply(&callee, call_args)?);
    }
    Ok(Value::list(results))
}

fn eval(evaluator: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let global = evaluator.global().clone();
    evaluator.eval(&args[0], &global)
}

/// Reads a file and evaluates its forms in the global frame, skipping a leading `#!` line
fn include(evaluator: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let path = match &args[0] {
        Value::String(path) => path.clone(),
        other => return Err(Error::type_error("string", other.type_name())),
    };
    let source = std::fs::read_to_string(&*path)
        .map_err(|err| Error::host("include", format!("{}: {}", path, err)))?;
    tracing::debug!(path = %path, "include");

    let global = evaluator.global().clone();
    let mut result = Value::Nil;
    for form in SExprParser::new(strip_shebang(&source)) {
        result = evaluator.eval(&form?, &global)?;
    }
    Ok(result)
}

fn macroexpand_1(evaluator: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let global = evaluator.global().clone();
    Ok(expander::expand_once(evaluator, &args[0], &global)?.unwrap_or_else(|| args[0].clone()))
}

fn macroexpand(evaluator: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let global = evaluator.global().clone();
    expander::expand(evaluator, &args[0], &global)
}

fn macroexpand_all(evaluator: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let global = evaluator.global().clone();
    expander::expand_all(evaluator, &args[0], &global)
}

// Output and errors

fn print(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let line: Vec<String> = args.iter().map(Value::display_text).collect();
    println!("{}", line.join(" "));
    Ok(Value::Nil)
}

fn error(_: &mut LispEvaluator, args: Vec<Value>) -> Result<Value> {
    let message: Vec<String> = args.iter().map(Value::display_text).collect();
    Err(Error::UserError(message.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EvalConfig;

    fn call(name: &str, args: Vec<Value>) -> Result<Value> {
        let global = Environment::global(EvalConfig::default());
        install(&global);
        let mut evaluator = LispEvaluator::new(global.clone());
        let callee = global.lookup(name)?;
        evaluator.apply(&callee, args)
    }

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(call("+", ints(&[1, 2, 3])).unwrap(), Value::Int(6));
        assert!(matches!(call("+", vec![]).unwrap(), Value::Int(0)));
        assert_eq!(call("-", ints(&[5])).unwrap(), Value::Int(-5));
        assert_eq!(call("-", ints(&[10, 3, 2])).unwrap(), Value::Int(5));
        assert!(matches!(
            call("*", vec![Value::Int(2), Value::Float(1.5)]).unwrap(),
            Value::Float(x) if x == 3.0
        ));
    }

    #[test]
    fn test_overflow_detected() {
        let err = call("+", vec![Value::Int(i64::MAX), Value::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
        let err = call("**", ints(&[2, 64])).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
    }

    #[test]
    fn test_division_family() {
        assert!(matches!(call("/", ints(&[7, 2])).unwrap(), Value::Float(x) if x == 3.5));
        assert!(matches!(call("/", ints(&[6, 3])).unwrap(), Value::Float(x) if x == 2.0));
        assert!(matches!(call("//", ints(&[-7, 2])).unwrap(), Value::Int(-4)));
        assert!(matches!(call("%", ints(&[-7, 3])).unwrap(), Value::Int(2)));
        assert!(matches!(call("%", ints(&[7, -3])).unwrap(), Value::Int(-2)));
        for op in ["/", "//", "%"] {
            let err = call(op, ints(&[1, 0])).unwrap_err();
            assert!(matches!(err, Error::DivisionByZero), "{}", op);
        }
        let err = call("/", vec![Value::Int(1), Value::Float(0.0)]).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call("<", ints(&[1, 2, 3])).unwrap(), Value::Bool(true));
        assert_eq!(call("<", ints(&[1, 3, 2])).unwrap(), Value::Bool(false));
        assert_eq!(
            call("=", vec![Value::Int(2), Value::Float(2.0)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call("<", vec![Value::string("a"), Value::string("b")]).unwrap(),
            Value::Bool(true)
        );
        assert!(call("<", vec![Value::Int(1), Value::string("b")]).is_err());
    }

    #[test]
    fn test_list_operations() {
        let list = Value::list(ints(&[1, 2, 3]));
        assert_eq!(call("car", vec![list.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("cadr", vec![list.clone()]).unwrap(), Value::Int(2));
        assert_eq!(call("length", vec![list.clone()]).unwrap(), Value::Int(3));
        assert_eq!(
            call("reverse", vec![list.clone()]).unwrap().to_string(),
            "(3 2 1)"
        );
        assert_eq!(
            call("list-tail", vec![list.clone(), Value::Int(2)]).unwrap().to_string(),
            "(3)"
        );
        assert_eq!(call("list-ref", vec![list.clone(), Value::Int(1)]).unwrap(), Value::Int(2));
        assert!(call("list-ref", vec![list, Value::Int(3)]).is_err());
        assert!(call("car", vec![Value::Nil]).is_err());
    }

    #[test]
    fn test_append_shares_last() {
        let result = call(
            "append",
            vec![Value::list(ints(&[1])), Value::list(ints(&[2, 3])), Value::Int(4)],
        )
        .unwrap();
        assert_eq!(result.to_string(), "(1 2 3 . 4)");
        assert_eq!(call("append", vec![]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_gensym_unique() {
        let a = call("gensym", vec![]).unwrap();
        let b = call("gensym", vec![]).unwrap();
        assert!(a.as_symbol().unwrap().starts_with("_g_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_concat_and_error() {
        let text = call("concat", vec![Value::string("a"), Value::Int(1), Value::symbol("b")]).unwrap();
        assert_eq!(text, Value::string("a1b"));
        let err = call("error", vec![Value::string("bad"), Value::Int(7)]).unwrap_err();
        assert_eq!(err.to_string(), "User error: bad 7");
    }

    #[test]
    fn test_zero_to_negative_power() {
        assert!(matches!(call("**", ints(&[0, -1])).unwrap_err(), Error::DivisionByZero));
        let err = call("**", vec![Value::Float(0.0), Value::Int(-2)]).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
        assert!(matches!(call("**", ints(&[2, -1])).unwrap(), Value::Float(x) if x == 0.5));
        assert_eq!(call("**", ints(&[0, 0])).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(call("&", ints(&[12, 10])).unwrap(), Value::Int(8));
        assert_eq!(call("&", vec![]).unwrap(), Value::Int(-1));
        assert_eq!(call("|", ints(&[12, 3])).unwrap(), Value::Int(15));
        assert_eq!(call("|", vec![]).unwrap(), Value::Int(0));
        assert_eq!(call("^", ints(&[6, 3])).unwrap(), Value::Int(5));
        assert_eq!(call("~", ints(&[5])).unwrap(), Value::Int(-6));
        assert_eq!(call("<<", ints(&[3, 4])).unwrap(), Value::Int(48));
        assert_eq!(call(">>", ints(&[-16, 2])).unwrap(), Value::Int(-4));
        assert_eq!(call(">>", ints(&[5, 100])).unwrap(), Value::Int(0));
        assert!(matches!(call("<<", ints(&[1, 63])).unwrap_err(), Error::Overflow { .. }));
        assert!(matches!(call("<<", ints(&[1, -1])).unwrap_err(), Error::TypeError { .. }));
        assert!(matches!(
            call("&", vec![Value::Float(1.0)]).unwrap_err(),
            Error::TypeError { .. }
        ));
    }

    #[test]
    fn test_membership() {
        let list = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(call("in", vec![Value::Float(1.0), list.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(call("not-in", vec![Value::string("b"), list]).unwrap(), Value::Bool(true));
        assert_eq!(
            call("in", vec![Value::string("ell"), Value::string("hello")]).unwrap(),
            Value::Bool(true)
        );
        assert!(call("in", vec![Value::Int(1), Value::string("1")]).is_err());
        assert!(call("in", vec![Value::Int(1), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_nested_accessors() {
        let nested = crate::parser::read_one("((1 2) (3 4) 5 6)").unwrap();
        assert_eq!(call("caar", vec![nested.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("cdar", vec![nested.clone()]).unwrap().to_string(), "(2)");
        assert_eq!(call("caadr", vec![nested.clone()]).unwrap(), Value::Int(3));
        assert_eq!(call("cadddr", vec![nested.clone()]).unwrap(), Value::Int(6));
        let deep = crate::parser::read_one("((((x))))").unwrap();
        assert_eq!(call("caaar", vec![deep.clone()]).unwrap().to_string(), "(x)");
        assert_eq!(call("caaaar", vec![deep]).unwrap().to_string(), "x");
    }

    #[test]
    fn test_builtin_arity() {
        let err = call("car", vec![]).unwrap_err();
        assert!(matches!(err, Error::ArityError { .. }));
    }
}
