use std::rc::Rc;

use crate::bridge::{from_host, to_host_in, HostRef};
use crate::error::{Error, Result};
use crate::runtime::expander;
use crate::runtime::stack::guarded;
use crate::runtime::value::{Lambda, Params};
use crate::runtime::{Environment, Value};

/// Default bound on nested (non-tail) evaluation
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Evaluation settings shared by everything running against one global frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of non-tail evaluations
    pub max_depth: usize,
    /// Log a warning when a definition replaces an existing binding
    pub warn_on_redefine: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            warn_on_redefine: true,
        }
    }
}

/// Keywords recognized in head position regardless of bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    If,
    Lambda,
    Define,
    Defmacro,
    Begin,
}

impl SpecialForm {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "quote" => SpecialForm::Quote,
            "quasiquote" => SpecialForm::Quasiquote,
            "unquote" => SpecialForm::Unquote,
            "unquote-splicing" => SpecialForm::UnquoteSplicing,
            "if" => SpecialForm::If,
            "lambda" => SpecialForm::Lambda,
            "define" => SpecialForm::Define,
            "defmacro" => SpecialForm::Defmacro,
            "begin" => SpecialForm::Begin,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::Quasiquote => "quasiquote",
            SpecialForm::Unquote => "unquote",
            SpecialForm::UnquoteSplicing => "unquote-splicing",
            SpecialForm::If => "if",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Define => "define",
            SpecialForm::Defmacro => "defmacro",
            SpecialForm::Begin => "begin",
        }
    }
}

/// How a form is evaluated, decided by its shape and head binding
enum FormKind {
    SelfEvaluating,
    Variable(Rc<str>),
    Special(SpecialForm, Value),
    MacroCall(Rc<Lambda>, Value),
    Application {
        /// Already-resolved head, when the head is a bound symbol
        callee: Option<Value>,
        head: Value,
        args: Value,
    },
}

/// Outcome of a special form: a final value, or a form to evaluate in tail position
enum Step {
    Done(Value),
    Tail(Value),
}

/// S-expression evaluator
///
/// Tail positions (`if` branches, the last form of `begin` and of a closure
/// body, macro expansions) are evaluated by looping instead of recursing,
/// so tail-recursive loops run in constant stack. Non-tail nesting is
/// counted against [`EvalConfig::max_depth`] on the global frame.
pub struct LispEvaluator {
    global: Environment,
}

impl LispEvaluator {
    /// Creates an evaluator bound to a global frame
    pub fn new(global: Environment) -> Self {
        LispEvaluator {
            global: global.root(),
        }
    }

    /// The global frame used by `eval` and the macroexpand builtins
    pub fn global(&self) -> &Environment {
        &self.global
    }

    pub fn config(&self) -> EvalConfig {
        self.global.config()
    }

    /// Evaluates `form` in `env`
    pub fn eval(&mut self, form: &Value, env: &Environment) -> Result<Value> {
        self.global.enter_eval()?;
        let result = guarded(|| self.eval_loop(form.clone(), env.clone()));
        self.global.leave_eval();
        result
    }

    /// Evaluates forms in sequence, returning the last value (nil when empty)
    pub fn eval_body(&mut self, body: &[Value], env: &Environment) -> Result<Value> {
        let mut result = Value::Nil;
        for form in body {
            result = self.eval(form, env)?;
        }
        Ok(result)
    }

    /// Applies a procedure to already-evaluated arguments
    pub fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Closure(lambda) => {
                let frame = self.bind_params(lambda, args)?;
                self.eval_body(&lambda.body, &frame)
            }
            Value::Builtin(builtin) => {
                builtin.arity.check(builtin.name, args.len())?;
                (builtin.func)(self, args)
            }
            Value::Host(HostRef::Function(func)) => {
                let host_args: Vec<_> = args
                    .iter()
                    .map(|arg| to_host_in(arg, Some(&self.global)))
                    .collect();
                let result = func.call(&host_args)?;
                Ok(from_host(&result))
            }
            other => Err(Error::NotCallable {
                type_name: other.type_name().to_string(),
            }),
        }
    }

    /// Creates the call frame for a closure or macro, checking arity first
    pub(crate) fn bind_params(&self, lambda: &Lambda, args: Vec<Value>) -> Result<Environment> {
        let params = &lambda.params;
        params.check_arity(lambda.display_name(), args.len())?;

        let frame = lambda.env.extend();
        let mut args = args.into_iter();
        for name in &params.required {
            frame.bind(name, args.next().unwrap_or(Value::Nil));
        }
        for name in &params.optional {
            frame.bind(name, args.next().unwrap_or(Value::Nil));
        }
        if let Some(rest) = &params.rest {
            frame.bind(rest, Value::list(args.collect()));
        }
        Ok(frame)
    }

    fn eval_loop(&mut self, mut form: Value, mut env: Environment) -> Result<Value> {
        loop {
            match self.classify(&form, &env)? {
                FormKind::SelfEvaluating => return Ok(form),

                FormKind::Variable(name) => return env.lookup(&name),

                FormKind::Special(special, args) => match self.eval_special(special, &args, &env)? {
                    Step::Done(value) => return Ok(value),
                    Step::Tail(next) => form = next,
                },

                FormKind::MacroCall(mac, args) => {
                    form = expander::expand_macro(self, &mac, &args)?;
                }

                FormKind::Application { callee, head, args } => {
                    let callee = match callee {
                        Some(value) => value,
                        None => self.eval(&head, &env)?,
                    };
                    let args = self.eval_args(&args, &env)?;

                    let lambda = match callee {
                        Value::Closure(lambda) => lambda,
                        other => return self.apply(&other, args),
                    };
                    let frame = self.bind_params(&lambda, args)?;
                    match lambda.body.split_last() {
                        None => return Ok(Value::Nil),
                        Some((last, init)) => {
                            for body_form in init {
                                self.eval(body_form, &frame)?;
                            }
                            form = last.clone();
                            env = frame;
                        }
                    }
                }
            }
        }
    }

    fn classify(&self, form: &Value, env: &Environment) -> Result<FormKind> {
        let cell = match form {
            Value::Symbol(name) if is_keyword(name) => return Ok(FormKind::SelfEvaluating),
            Value::Symbol(name) => return Ok(FormKind::Variable(name.clone())),
            Value::Pair(cell) => cell,
            _ => return Ok(FormKind::SelfEvaluating),
        };

        let head = cell.car();
        let args = cell.cdr().clone();

        if let Value::Symbol(name) = head {
            if let Some(special) = SpecialForm::from_name(name) {
                return Ok(FormKind::Special(special, args));
            }
            if is_keyword(name) {
                return Ok(FormKind::Application {
                    callee: Some(head.clone()),
                    head: head.clone(),
                    args,
                });
            }
            return Ok(match env.lookup(name)? {
                Value::Macro(mac) => FormKind::MacroCall(mac, args),
                callee => FormKind::Application {
                    callee: Some(callee),
                    head: head.clone(),
                    args,
                },
            });
        }

        Ok(FormKind::Application {
            callee: None,
            head: head.clone(),
            args,
        })
    }

    fn eval_args(&mut self, args: &Value, env: &Environment) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        let mut cursor = args;
        loop {
            match cursor {
                Value::Nil => return Ok(values),
                Value::Pair(cell) => {
                    values.push(self.eval(cell.car(), env)?);
                    cursor = cell.cdr();
                }
                _ => {
                    return Err(Error::malformed(
                        "application",
                        "improper argument list",
                    ))
                }
            }
        }
    }

    fn eval_special(&mut self, special: SpecialForm, args: &Value, env: &Environment) -> Result<Step> {
        let form = special.name();
        let items = args
            .list_items()
            .ok_or_else(|| Error::malformed(form, "improper form"))?;

        match special {
            SpecialForm::Quote => {
                expect_count(form, &items, 1, Some(1))?;
                Ok(Step::Done(items[0].clone()))
            }

            SpecialForm::Quasiquote => {
                expect_count(form, &items, 1, Some(1))?;
                expander::quasiquote(self, &items[0], env, 1).map(Step::Done)
            }

            SpecialForm::Unquote | SpecialForm::UnquoteSplicing => {
                Err(Error::malformed(form, "used outside quasiquote"))
            }

            SpecialForm::If => {
                expect_count(form, &items, 2, Some(3))?;
                if self.eval(&items[0], env)?.is_truthy() {
                    Ok(Step::Tail(items[1].clone()))
                } else {
                    match items.get(2) {
                        Some(alternative) => Ok(Step::Tail(alternative.clone())),
                        None => Ok(Step::Done(Value::Nil)),
                    }
                }
            }

            SpecialForm::Lambda => {
                expect_count(form, &items, 1, None)?;
                let params = Params::parse(&items[0], form)?;
                Ok(Step::Done(Value::Closure(Rc::new(Lambda {
                    name: None,
                    params,
                    body: items[1..].to_vec(),
                    env: env.clone(),
                }))))
            }

            SpecialForm::Define => {
                expect_count(form, &items, 2, None)?;
                match &items[0] {
                    Value::Symbol(name) => {
                        expect_count(form, &items, 2, Some(2))?;
                        let value = self.eval(&items[1], env)?;
                        self.define(env, name, value.clone());
                        Ok(Step::Done(value))
                    }
                    Value::Pair(signature) => {
                        let name = signature.car().as_symbol().ok_or_else(|| {
                            Error::malformed(form, "procedure name must be a symbol")
                        })?;
                        let closure = Value::Closure(Rc::new(Lambda {
                            name: Some(Rc::from(name)),
                            params: Params::parse(signature.cdr(), form)?,
                            body: items[1..].to_vec(),
                            env: env.clone(),
                        }));
                        self.define(env, name, closure.clone());
                        Ok(Step::Done(closure))
                    }
                    other => Err(Error::malformed(
                        form,
                        format!("cannot define {}", other),
                    )),
                }
            }

            SpecialForm::Defmacro => {
                expect_count(form, &items, 2, None)?;
                let name = items[0]
                    .as_symbol()
                    .ok_or_else(|| Error::malformed(form, "macro name must be a symbol"))?;
                let mac = Value::Macro(Rc::new(Lambda {
                    name: Some(Rc::from(name)),
                    params: Params::parse(&items[1], form)?,
                    body: items[2..].to_vec(),
                    env: env.clone(),
                }));
                self.define(env, name, mac.clone());
                Ok(Step::Done(mac))
            }

            SpecialForm::Begin => match items.split_last() {
                None => Ok(Step::Done(Value::Nil)),
                Some((last, init)) => {
                    for item in init {
                        self.eval(item, env)?;
                    }
                    Ok(Step::Tail(last.clone()))
                }
            },
        }
    }

    fn define(&self, env: &Environment, name: &str, value: Value) {
        tracing::debug!(name, kind = value.type_name(), "define");
        let replaced = env.define(name, value);
        if replaced && self.config().warn_on_redefine {
            tracing::warn!(name, "redefining");
        }
    }
}

/// Symbols written `:name` evaluate to themselves
pub fn is_keyword(name: &str) -> bool {
    name.starts_with(':')
}

fn expect_count(form: &str, items: &[Value], min: usize, max: Option<usize>) -> Result<()> {
    let count = items.len();
    if count < min || max.map_or(false, |max| count > max) {
        let expected = match max {
            Some(max) if max == min => format!("{} argument(s)", min),
            Some(max) => format!("{} to {} arguments", min, max),
            None => format!("at least {} argument(s)", min),
        };
        return Err(Error::malformed(
            form,
            format!("expected {}, got {}", expected, count),
        ));
    }
    Ok(())
}
