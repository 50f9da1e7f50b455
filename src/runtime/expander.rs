//! Macro expansion and quasiquote templates
//!
//! Macros are non-hygienic: the expansion is spliced into the call site
//! and evaluated there, so symbols it introduces resolve in the caller's
//! environment. Use `gensym` for temporaries.
//!
//! Expansion itself is unbounded. A macro that keeps expanding into
//! another call of itself in tail position loops forever, like any other
//! infinite tail loop; nested (non-tail) expansion is bounded by the
//! evaluation depth limit.

use crate::error::{Error, Result};
use crate::runtime::stack::guarded;
use crate::runtime::value::Lambda;
use crate::runtime::{Environment, LispEvaluator, Value};

/// Runs a macro body with the unevaluated argument forms bound to its parameters
pub fn expand_macro(evaluator: &mut LispEvaluator, mac: &Lambda, args: &Value) -> Result<Value> {
    let forms = args
        .list_items()
        .ok_or_else(|| Error::malformed(mac.display_name(), "improper macro call"))?;
    tracing::debug!(name = mac.display_name(), argc = forms.len(), "expanding macro");

    let frame = evaluator.bind_params(mac, forms)?;
    evaluator.eval_body(&mac.body, &frame)
}

/// Expands `form` once if its head names a macro in `env`
pub fn expand_once(
    evaluator: &mut LispEvaluator,
    form: &Value,
    env: &Environment,
) -> Result<Option<Value>> {
    let cell = match form {
        Value::Pair(cell) => cell,
        _ => return Ok(None),
    };
    match cell.car().as_symbol().and_then(|name| env.try_lookup(name)) {
        Some(Value::Macro(mac)) => expand_macro(evaluator, &mac, cell.cdr()).map(Some),
        _ => Ok(None),
    }
}

/// Expands the head of `form` repeatedly until it no longer names a macro
pub fn expand(evaluator: &mut LispEvaluator, form: &Value, env: &Environment) -> Result<Value> {
    let mut current = form.clone();
    while let Some(expanded) = expand_once(evaluator, &current, env)? {
        current = expanded;
    }
    Ok(current)
}

/// Expands macros throughout `form`, leaving quoted data alone
pub fn expand_all(evaluator: &mut LispEvaluator, form: &Value, env: &Environment) -> Result<Value> {
    evaluator.global().enter_eval()?;
    let result = expand_all_at(evaluator, form, env, 0);
    evaluator.global().leave_eval();
    result
}

fn expand_all_at(
    evaluator: &mut LispEvaluator,
    form: &Value,
    env: &Environment,
    qq_depth: usize,
) -> Result<Value> {
    let form = if qq_depth == 0 {
        expand(evaluator, form, env)?
    } else {
        form.clone()
    };
    let cell = match &form {
        Value::Pair(cell) => cell,
        _ => return Ok(form),
    };

    // Number of leading elements kept verbatim
    let keep = match (cell.car().as_symbol(), qq_depth) {
        (Some("quote"), _) => return Ok(form.clone()),
        (Some("quasiquote"), depth) => {
            return rebuild_quoted(evaluator, &form, env, depth + 1);
        }
        (Some("unquote") | Some("unquote-splicing"), depth) if depth > 0 => {
            return rebuild_quoted(evaluator, &form, env, depth - 1);
        }
        (Some("lambda"), 0) => 2,
        (Some("defmacro"), 0) => 3,
        (Some("define"), 0) if matches!(cell.cdr().car(), Ok(Value::Pair(_))) => 2,
        _ => 0,
    };

    let (items, tail) = form.list_parts();
    let mut expanded = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if i < keep {
            expanded.push(item.clone());
        } else {
            let item = recurse(evaluator, item, env, qq_depth)?;
            expanded.push(item);
        }
    }
    let tail = recurse(evaluator, &tail, env, qq_depth)?;
    Ok(Value::list_with_tail(expanded, tail))
}

/// `(head arg)` with `arg` expanded at the adjusted quasiquote depth
fn rebuild_quoted(
    evaluator: &mut LispEvaluator,
    form: &Value,
    env: &Environment,
    depth: usize,
) -> Result<Value> {
    let (items, tail) = form.list_parts();
    let mut rebuilt = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if i == 0 {
            rebuilt.push(item.clone());
        } else {
            rebuilt.push(recurse(evaluator, item, env, depth)?);
        }
    }
    Ok(Value::list_with_tail(rebuilt, tail))
}

fn recurse(
    evaluator: &mut LispEvaluator,
    form: &Value,
    env: &Environment,
    qq_depth: usize,
) -> Result<Value> {
    if !matches!(form, Value::Pair(_)) {
        return Ok(form.clone());
    }
    evaluator.global().enter_eval()?;
    let result = guarded(|| expand_all_at(evaluator, form, env, qq_depth));
    evaluator.global().leave_eval();
    result
}

/// Instantiates a quasiquote template
///
/// `depth` is 1 for the outermost template. Nested quasiquotes raise it,
/// and only unquotes at depth 1 are evaluated.
pub fn quasiquote(
    evaluator: &mut LispEvaluator,
    template: &Value,
    env: &Environment,
    depth: usize,
) -> Result<Value> {
    guarded(|| instantiate(evaluator, template, env, depth))
}

fn instantiate(
    evaluator: &mut LispEvaluator,
    template: &Value,
    env: &Environment,
    depth: usize,
) -> Result<Value> {
    let cell = match template {
        Value::Pair(cell) => cell,
        _ => return Ok(template.clone()),
    };

    if let Some(arg) = single_argument(template, "unquote") {
        return if depth == 1 {
            evaluator.eval(&arg, env)
        } else {
            let inner = quasiquote(evaluator, &arg, env, depth - 1)?;
            Ok(Value::list(vec![cell.car().clone(), inner]))
        };
    }
    if let Some(arg) = single_argument(template, "quasiquote") {
        let inner = quasiquote(evaluator, &arg, env, depth + 1)?;
        return Ok(Value::list(vec![cell.car().clone(), inner]));
    }

    let mut items = Vec::new();
    let mut cursor = template.clone();
    loop {
        let next = match &cursor {
            Value::Pair(cell) => {
                // `(a . ,b)` reads as `(a unquote b)`
                if single_argument(&cursor, "unquote").is_some() {
                    break;
                }
                let element = cell.car();
                match single_argument(element, "unquote-splicing") {
                    Some(spliced) if depth == 1 => {
                        let value = evaluator.eval(&spliced, env)?;
                        let spliced_items = value
                            .list_items()
                            .ok_or_else(|| Error::type_error("list", value.type_name()))?;
                        items.extend(spliced_items);
                    }
                    Some(spliced) => {
                        let inner = quasiquote(evaluator, &spliced, env, depth - 1)?;
                        items.push(Value::list(vec![Value::symbol("unquote-splicing"), inner]));
                    }
                    None => items.push(quasiquote(evaluator, element, env, depth)?),
                }
                cell.cdr().clone()
            }
            _ => break,
        };
        cursor = next;
    }

    let tail = quasiquote(evaluator, &cursor, env, depth)?;
    Ok(Value::list_with_tail(items, tail))
}

/// The argument of a two-element list headed by `keyword`
fn single_argument(form: &Value, keyword: &str) -> Option<Value> {
    let cell = form.as_pair()?;
    if cell.car().as_symbol() != Some(keyword) {
        return None;
    }
    let rest = cell.cdr().as_pair()?;
    if rest.cdr().is_nil() {
        Some(rest.car().clone())
    } else {
        None
    }
}
