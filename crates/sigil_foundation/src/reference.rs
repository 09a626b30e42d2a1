//! Shared mutable cells backing by-reference aliasing.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

/// A reference-counted, interior-mutable storage cell.
///
/// Every variable slot or array element bound to the same `Reference`
/// observes writes made through any of them. A reference never points at
/// another reference: constructing or storing one collapses to the
/// underlying cell.
#[derive(Clone)]
pub struct Reference(Rc<RefCell<Value>>);

impl Reference {
    /// Wraps a value in a fresh cell, or returns the existing cell if the
    /// value already is a reference.
    #[must_use]
    pub fn new(value: Value) -> Self {
        match value {
            Value::Reference(r) => r,
            other => Self(Rc::new(RefCell::new(other))),
        }
    }

    /// Returns a copy of the referenced value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Overwrites the referenced value.
    pub fn set(&self, value: Value) {
        let value = value.deref_value();
        *self.0.borrow_mut() = value;
    }

    /// Borrows the referenced value.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Value> {
        self.0.borrow()
    }

    /// Mutably borrows the referenced value.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, Value> {
        self.0.borrow_mut()
    }

    /// Returns true if both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the number of handles sharing this cell.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Returns a handle that identifies this cell without counting as an
    /// alias of it.
    #[must_use]
    pub fn downgrade(&self) -> WeakReference {
        WeakReference(Rc::downgrade(&self.0))
    }
}

/// A non-owning handle to a [`Reference`] cell.
#[derive(Clone)]
pub struct WeakReference(Weak<RefCell<Value>>);

impl WeakReference {
    /// Returns true if this handle was taken from `cell`.
    #[must_use]
    pub fn is(&self, cell: &Reference) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&cell.0))
    }

    /// Returns true while some [`Reference`] to the cell remains.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&<weak {:p}>", self.0.as_ptr())
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(value) => write!(f, "&{:?}", *value),
            Err(_) => write!(f, "&<borrowed>"),
        }
    }
}
