//! Cursor over an array, driving the `foreach` protocol.

use std::fmt;

use crate::array::{Array, Key};
use crate::reference::Reference;
use crate::value::Value;

/// Iterator over an array, either a private snapshot (by-value `foreach`)
/// or the live array inside a reference cell (by-reference `foreach`).
///
/// The cursor remembers the key it last yielded, so it keeps its place
/// when the body inserts or removes other entries.
#[derive(Clone)]
pub struct ArrayIterator {
    source: Source,
    cursor: usize,
    current: Option<Key>,
}

#[derive(Clone)]
enum Source {
    Owned(Array),
    Shared(Reference),
}

impl ArrayIterator {
    /// Iterates over a snapshot of `array`.
    #[must_use]
    pub fn new(array: Array) -> Self {
        Self {
            source: Source::Owned(array),
            cursor: 0,
            current: None,
        }
    }

    /// Iterates over the array stored in `cell`, observing writes to it.
    #[must_use]
    pub fn by_reference(cell: Reference) -> Self {
        Self {
            source: Source::Shared(cell),
            cursor: 0,
            current: None,
        }
    }

    fn with_array<R>(&self, f: impl FnOnce(&Array) -> R) -> R {
        match &self.source {
            Source::Owned(array) => f(array),
            Source::Shared(cell) => match &*cell.borrow() {
                Value::Array(array) => f(array),
                _ => f(&Array::new()),
            },
        }
    }

    fn sync(&mut self) {
        let (cursor, current) = self.with_array(|array| {
            let start = self
                .current
                .as_ref()
                .and_then(|key| array.position_of(key))
                .unwrap_or(self.cursor);
            match array.seek(start) {
                Some(pos) => (pos, array.entry_at(pos).map(|(key, _)| key)),
                None => (array.position_end(), None),
            }
        });
        self.cursor = cursor;
        self.current = current;
    }

    /// Moves back to the first entry.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.current = None;
        self.sync();
    }

    /// Returns true while the cursor is on an entry.
    pub fn valid(&mut self) -> bool {
        self.sync();
        self.current.is_some()
    }

    /// Returns the current key.
    #[must_use]
    pub fn key(&self) -> Option<Value> {
        self.current.as_ref().map(Key::to_value)
    }

    /// Returns the current value as stored.
    #[must_use]
    pub fn current(&self) -> Option<Value> {
        let key = self.current.as_ref()?;
        self.with_array(|array| array.get(key).cloned())
    }

    /// Returns a reference bound to the current element, converting the
    /// element into a reference in place when the source is shared.
    pub fn current_ref(&mut self) -> Option<Reference> {
        let key = self.current.clone()?;
        match &mut self.source {
            Source::Owned(array) => bind_element(array, &key),
            Source::Shared(cell) => match &mut *cell.borrow_mut() {
                Value::Array(array) => bind_element(array, &key),
                _ => None,
            },
        }
    }

    /// Advances past the current entry.
    pub fn next(&mut self) {
        let cursor = self.with_array(|array| match &self.current {
            Some(key) => array.position_of(key).map_or(self.cursor, |pos| pos + 1),
            None => array.seek(self.cursor).map_or(self.cursor, |pos| pos + 1),
        });
        self.cursor = cursor;
        self.current = None;
    }
}

fn bind_element(array: &mut Array, key: &Key) -> Option<Reference> {
    let slot = array.get_mut(key)?;
    if let Value::Reference(r) = slot {
        return Some(r.clone());
    }
    let reference = Reference::new(std::mem::take(slot));
    *slot = Value::Reference(reference.clone());
    Some(reference)
}

impl fmt::Debug for ArrayIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayIterator")
            .field("shared", &matches!(self.source, Source::Shared(_)))
            .field("cursor", &self.cursor)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(it: &mut ArrayIterator) -> Vec<(Value, Value)> {
        let mut out = Vec::new();
        it.rewind();
        while it.valid() {
            out.push((it.key().unwrap(), it.current().unwrap()));
            it.next();
        }
        out
    }

    #[test]
    fn walks_snapshot_in_order() {
        let array: Array = [(Key::from("b"), Value::Int(1)), (Key::Int(0), Value::Int(2))]
            .into_iter()
            .collect();
        let mut it = ArrayIterator::new(array);
        assert_eq!(collect(&mut it), vec![
            (Value::from("b"), Value::Int(1)),
            (Value::Int(0), Value::Int(2)),
        ]);
    }

    #[test]
    fn empty_array_is_never_valid() {
        let mut it = ArrayIterator::new(Array::new());
        it.rewind();
        assert!(!it.valid());
        assert_eq!(it.current(), None);
    }

    #[test]
    fn shared_iteration_sees_appends() {
        let cell = Reference::new(Value::Array(Array::from_values([Value::Int(1)])));
        let mut it = ArrayIterator::by_reference(cell.clone());
        it.rewind();
        assert!(it.valid());
        if let Value::Array(array) = &mut *cell.borrow_mut() {
            array.push(Value::Int(2));
        }
        it.next();
        assert!(it.valid());
        assert_eq!(it.current(), Some(Value::Int(2)));
    }

    #[test]
    fn current_ref_binds_element_in_place() {
        let cell = Reference::new(Value::Array(Array::from_values([Value::Int(1)])));
        let mut it = ArrayIterator::by_reference(cell.clone());
        it.rewind();
        assert!(it.valid());
        let element = it.current_ref().unwrap();
        element.set(Value::Int(10));
        let Value::Array(array) = cell.get() else {
            panic!("expected array");
        };
        assert_eq!(array.get(&Key::Int(0)).unwrap().deref_value(), Value::Int(10));
    }

    #[test]
    fn cursor_survives_removal_of_current() {
        let cell = Reference::new(Value::Array(Array::from_values([
            Value::Int(0),
            Value::Int(1),
            Value::Int(2),
        ])));
        let mut it = ArrayIterator::by_reference(cell.clone());
        it.rewind();
        assert!(it.valid());
        if let Value::Array(array) = &mut *cell.borrow_mut() {
            array.remove(&Key::Int(0));
        }
        it.next();
        assert!(it.valid());
        assert_eq!(it.key(), Some(Value::Int(1)));
    }
}
