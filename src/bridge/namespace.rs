use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{from_host, HostFunction, HostValue};
use crate::error::Result;
use crate::runtime::Value;

/// Host-owned mapping from names to values
///
/// Cloning a `Namespace` yields another handle to the same table, so the
/// embedder keeps seeing everything interpreted code defines at top level.
///
/// Each entry keeps the host form and, once interpreted code has bound or
/// read it, the interpreter value it stands for. Lookups from Psil return
/// that value itself, so a global list keeps its identity and is not
/// rebuilt per reference. [`Namespace::set`] replaces both.
///
/// Closures defined at top level capture the global frame, which in turn
/// references this table. Call [`Namespace::clear`] when an interpreter's
/// definitions are no longer needed to release those reference cycles.
#[derive(Clone, Default)]
pub struct Namespace {
    entries: Rc<RefCell<HashMap<String, Entry>>>,
}

struct Entry {
    host: HostValue,
    value: Option<Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `name`, if any
    pub fn get(&self, name: &str) -> Option<HostValue> {
        self.entries.borrow().get(name).map(|entry| entry.host.clone())
    }

    /// Binds `name`, returning the previous value
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> Option<HostValue> {
        let entry = Entry {
            host: value.into(),
            value: None,
        };
        let previous = self.entries.borrow_mut().insert(name.to_string(), entry);
        previous.map(|entry| entry.host)
    }

    /// Binds `name` to an interpreter value and its host form; true when it replaced a binding
    pub(crate) fn bind(&self, name: &str, value: Value, host: HostValue) -> bool {
        let entry = Entry {
            host,
            value: Some(value),
        };
        let previous = self.entries.borrow_mut().insert(name.to_string(), entry);
        previous.is_some()
    }

    /// Interpreter value bound to `name`, converting and caching a host-set entry on first use
    pub(crate) fn value(&self, name: &str) -> Option<Value> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.get_mut(name)?;
        if let Some(value) = &entry.value {
            return Some(value.clone());
        }
        let value = from_host(&entry.host);
        entry.value = Some(value.clone());
        Some(value)
    }

    /// Registers a host closure callable from Psil as `name`
    pub fn define_fn<F>(&self, name: &str, func: F) -> Option<HostValue>
    where
        F: Fn(&[HostValue]) -> Result<HostValue> + 'static,
    {
        self.set(name, HostFunction::new(name, func))
    }

    pub fn remove(&self, name: &str) -> Option<HostValue> {
        let previous = self.entries.borrow_mut().remove(name);
        previous.map(|entry| entry.host)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Bound names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drops every binding
    pub fn clear(&self) {
        // Take the table first so destructors never run under the borrow.
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        drop(entries);
    }

    /// True when both handles share one table
    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("names", &self.names())
            .finish()
    }
}
