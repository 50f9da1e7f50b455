use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::bridge::{to_host_in, Namespace};
use crate::error::{Error, Result};
use crate::runtime::{EvalConfig, Value};

/// Lexical environment: a frame of bindings plus a link to the enclosing frame
///
/// Frames are shared through `Rc`, so a closure keeps its defining frame
/// alive after the call that created it returns. Several child frames may
/// share one parent. Parent links only point outward, so frames form a DAG,
/// never a cycle. The outermost frame is the global frame; its
/// definitions are written through to the host [`Namespace`], and
/// interpreter-level bindings (builtins and prelude macros) shadow host
/// entries of the same name.
#[derive(Clone)]
pub struct Environment {
    frame: Rc<Frame>,
}

struct Frame {
    /// Bindings created in this frame
    vars: RefCell<HashMap<Rc<str>, Value>>,
    /// Enclosing frame (None for the global frame)
    parent: Option<Environment>,
    /// Present only on the global frame
    global: Option<GlobalState>,
}

/// Interpreter-wide state stored on the global frame
struct GlobalState {
    namespace: RefCell<Option<Namespace>>,
    config: Cell<EvalConfig>,
    depth: Cell<usize>,
}

impl Environment {
    /// Creates a global frame with no host namespace attached yet
    ///
    /// Definitions made before [`Environment::attach_namespace`] stay in the
    /// frame itself; this is how builtins and prelude macros are seeded.
    pub fn global(config: EvalConfig) -> Self {
        Environment {
            frame: Rc::new(Frame {
                vars: RefCell::new(HashMap::new()),
                parent: None,
                global: Some(GlobalState {
                    namespace: RefCell::new(None),
                    config: Cell::new(config),
                    depth: Cell::new(0),
                }),
            }),
        }
    }

    /// Creates a new empty frame whose parent is `self`
    pub fn extend(&self) -> Self {
        Environment {
            frame: Rc::new(Frame {
                vars: RefCell::new(HashMap::new()),
                parent: Some(self.clone()),
                global: None,
            }),
        }
    }

    /// Routes later global definitions into `namespace`
    pub(crate) fn attach_namespace(&self, namespace: Namespace) {
        if let Some(state) = &self.root().frame.global {
            *state.namespace.borrow_mut() = Some(namespace);
        }
    }

    /// The host namespace backing the global frame, if one is attached
    pub fn namespace(&self) -> Option<Namespace> {
        self.root()
            .frame
            .global
            .as_ref()
            .and_then(|state| state.namespace.borrow().clone())
    }

    /// True for the outermost frame
    pub fn is_global(&self) -> bool {
        self.frame.parent.is_none()
    }

    /// The outermost frame of this chain
    pub fn root(&self) -> Environment {
        let mut env = self;
        while let Some(parent) = &env.frame.parent {
            env = parent;
        }
        env.clone()
    }

    /// Evaluation settings stored on the global frame
    pub fn config(&self) -> EvalConfig {
        self.root()
            .frame
            .global
            .as_ref()
            .map(|state| state.config.get())
            .unwrap_or_default()
    }

    /// Looks up a variable, walking outward through enclosing frames
    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.try_lookup(name).ok_or_else(|| Error::UnboundSymbol {
            name: name.to_string(),
        })
    }

    /// Looks up a variable, returning `None` when it is unbound everywhere
    pub fn try_lookup(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.frame.vars.borrow().get(name) {
                return Some(value.clone());
            }
            match &env.frame.parent {
                Some(parent) => env = parent,
                None => break,
            }
        }

        let namespace = env.frame.global.as_ref()?.namespace.borrow().clone()?;
        namespace.value(name)
    }

    /// Binds `name` in this frame only, never in an ancestor
    ///
    /// In the global frame with a namespace attached the value is stored in
    /// the namespace, alongside its host form, and any interpreter-level
    /// binding of the same name is removed. Returns true when the name was
    /// already bound in this frame.
    pub fn define(&self, name: &str, value: Value) -> bool {
        let namespace = self
            .frame
            .global
            .as_ref()
            .and_then(|state| state.namespace.borrow().clone());

        match namespace {
            Some(namespace) => {
                let shadowed = self.frame.vars.borrow_mut().remove(name).is_some();
                let host = to_host_in(&value, Some(self));
                let replaced = namespace.bind(name, value, host);
                shadowed || replaced
            }
            None => self
                .frame
                .vars
                .borrow_mut()
                .insert(Rc::from(name), value)
                .is_some(),
        }
    }

    /// Binds a parameter in a call frame
    pub(crate) fn bind(&self, name: &Rc<str>, value: Value) {
        self.frame
            .vars
            .borrow_mut()
            .insert(Rc::clone(name), value);
    }

    /// True when `name` is bound in this frame (or its namespace)
    pub fn contains_local(&self, name: &str) -> bool {
        if self.frame.vars.borrow().contains_key(name) {
            return true;
        }
        self.frame
            .global
            .as_ref()
            .and_then(|state| state.namespace.borrow().clone())
            .map(|namespace| namespace.contains(name))
            .unwrap_or(false)
    }

    /// Names bound directly in this frame, sorted
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .frame
            .vars
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect();
        names.sort();
        names
    }

    /// Number of frames from here to the global frame, inclusive
    pub fn depth(&self) -> usize {
        let mut count = 1;
        let mut env = self;
        while let Some(parent) = &env.frame.parent {
            count += 1;
            env = parent;
        }
        count
    }

    /// True when both handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    /// Increments the shared evaluation depth, failing past the configured limit
    pub(crate) fn enter_eval(&self) -> Result<()> {
        let root = self.root();
        if let Some(state) = &root.frame.global {
            let limit = state.config.get().max_depth;
            let depth = state.depth.get();
            if depth >= limit {
                return Err(Error::ResourceExhausted { limit });
            }
            state.depth.set(depth + 1);
        }
        Ok(())
    }

    /// Undoes one [`Environment::enter_eval`]
    pub(crate) fn leave_eval(&self) {
        let root = self.root();
        if let Some(state) = &root.frame.global {
            state.depth.set(state.depth.get().saturating_sub(1));
        }
    }
}
