//! Host bridge
//!
//! Conversions between interpreter values and the embedding program's
//! values, host-callable wrappers for Psil procedures, and the shared
//! [`Namespace`] that backs the global frame.

use std::any::Any;
use std::rc::Rc;

mod function;
mod host_value;
mod marshal;
mod namespace;

pub use function::HostFunction;
pub use host_value::HostValue;
pub use marshal::{from_host, to_host};
pub(crate) use marshal::to_host_in;
pub use namespace::Namespace;

/// A host object living inside an interpreter value
#[derive(Clone)]
pub enum HostRef {
    /// Host callable, applicable from Psil
    Function(HostFunction),
    /// Opaque object, passed through unchanged
    Opaque(Rc<dyn Any>),
}

impl HostRef {
    /// Identity comparison
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        match (self, other) {
            (HostRef::Function(a), HostRef::Function(b)) => a.ptr_eq(b),
            (HostRef::Opaque(a), HostRef::Opaque(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}
