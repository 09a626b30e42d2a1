//! Object handles.
//!
//! The object system is deliberately small: a property bag (`stdClass`),
//! callable handles pushed by the call protocol, and the iterator objects
//! created by `foreach`. Objects have handle semantics; cloning an
//! [`Object`] copies the handle, not the object.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::array::Array;
use crate::iterator::ArrayIterator;

/// Shared handle to an object.
#[derive(Clone)]
pub struct Object(Rc<ObjectKind>);

/// What an object is.
pub enum ObjectKind {
    /// Generic property bag.
    StdClass(RefCell<Array>),
    /// Callable handle to a function-table entry.
    Closure {
        /// Index into the function table.
        index: u32,
        /// Function name, for display.
        name: Arc<str>,
    },
    /// `foreach` cursor.
    Iterator(RefCell<ArrayIterator>),
}

impl Object {
    /// Creates a `stdClass` with the given properties.
    #[must_use]
    pub fn std_class(properties: Array) -> Self {
        Self(Rc::new(ObjectKind::StdClass(RefCell::new(properties))))
    }

    /// Creates a callable handle.
    #[must_use]
    pub fn closure(index: u32, name: impl Into<Arc<str>>) -> Self {
        Self(Rc::new(ObjectKind::Closure {
            index,
            name: name.into(),
        }))
    }

    /// Wraps an iterator.
    #[must_use]
    pub fn iterator(iterator: ArrayIterator) -> Self {
        Self(Rc::new(ObjectKind::Iterator(RefCell::new(iterator))))
    }

    /// Returns what this object is.
    #[must_use]
    pub fn kind(&self) -> &ObjectKind {
        &self.0
    }

    /// Returns the class name.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match *self.0 {
            ObjectKind::StdClass(_) => "stdClass",
            ObjectKind::Closure { .. } => "Closure",
            ObjectKind::Iterator(_) => "ArrayIterator",
        }
    }

    /// Returns true if both handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the function-table index of a callable handle.
    #[must_use]
    pub fn callee(&self) -> Option<u32> {
        match *self.0 {
            ObjectKind::Closure { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Returns a copy of the object's properties, for array casts.
    #[must_use]
    pub fn properties(&self) -> Option<Array> {
        match &*self.0 {
            ObjectKind::StdClass(props) => Some(props.borrow().clone()),
            _ => None,
        }
    }

    /// Borrows the iterator state of an iterator object.
    #[must_use]
    pub fn iterator_mut(&self) -> Option<RefMut<'_, ArrayIterator>> {
        match &*self.0 {
            ObjectKind::Iterator(it) => Some(it.borrow_mut()),
            _ => None,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ObjectKind::StdClass(props) => match props.try_borrow() {
                Ok(props) => write!(f, "stdClass {:?}", *props),
                Err(_) => write!(f, "stdClass {{..}}"),
            },
            ObjectKind::Closure { name, .. } => write!(f, "Closure({name})"),
            ObjectKind::Iterator(_) => write!(f, "ArrayIterator"),
        }
    }
}
