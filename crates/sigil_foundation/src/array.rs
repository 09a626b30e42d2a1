//! Insertion-ordered hash table backing the array value.
//!
//! An array starts in *list mode*: a dense vector whose keys are exactly
//! `0..len` in insertion order. The first key that breaks that shape
//! (a string key, a gap, an out-of-order insert, or a delete anywhere but
//! the end) converts it to *map mode*, an ordered slot vector with
//! tombstones plus a key index. Both layouts are persistent structures, so
//! cloning an array is O(1) and mutation copies only what it touches.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use im::{HashMap, Vector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::value::Value;

/// Tombstone count above which a map-mode array is compacted.
const COMPACT_THRESHOLD: usize = 32;

/// Array key: integers and strings only.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Key {
    /// Integer key.
    Int(i64),
    /// String key that is not a canonical decimal integer.
    Str(Arc<str>),
}

impl Key {
    /// Builds a key from a string, folding canonical decimal integers
    /// (`"7"`, `"-3"`, but not `"07"` or `"+1"`) to integer keys.
    #[must_use]
    pub fn from_string(s: &str) -> Self {
        if is_canonical_int(s) {
            if let Ok(n) = s.parse::<i64>() {
                return Self::Int(n);
            }
        }
        Self::Str(Arc::from(s))
    }

    /// Converts the key back to a value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::Int(*n),
            Self::Str(s) => Value::String(s.clone()),
        }
    }
}

fn is_canonical_int(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
        && s != "-0"
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Ordered associative array.
#[derive(Clone, Default)]
pub struct Array {
    repr: Repr,
    /// One past the largest non-negative integer key ever inserted.
    next_key: i64,
    /// Set once an element may hold a reference, directly or nested.
    may_alias: bool,
}

#[derive(Clone)]
enum Repr {
    List(Vector<Value>),
    Map(Table),
}

impl Default for Repr {
    fn default() -> Self {
        Self::List(Vector::new())
    }
}

#[derive(Clone, Default)]
struct Table {
    slots: Vector<Option<(Key, Value)>>,
    index: HashMap<Key, usize>,
    len: usize,
}

impl Table {
    fn from_list(list: &Vector<Value>) -> Self {
        let mut table = Self::default();
        for (i, value) in list.iter().enumerate() {
            let key = Key::Int(i as i64);
            table.index.insert(key.clone(), i);
            table.slots.push_back(Some((key, value.clone())));
        }
        table.len = list.len();
        table
    }

    fn compact(&mut self) {
        let mut slots = Vector::new();
        let mut index = HashMap::new();
        for (key, value) in self.slots.iter().flatten() {
            index.insert(key.clone(), slots.len());
            slots.push_back(Some((key.clone(), value.clone())));
        }
        self.slots = slots;
        self.index = index;
    }
}

impl Array {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list-mode array from values keyed `0..n`.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let list: Vector<Value> = values.into_iter().collect();
        let next_key = list.len() as i64;
        let may_alias = list.iter().any(Value::may_alias);
        Self {
            repr: Repr::List(list),
            next_key,
            may_alias,
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::List(list) => list.len(),
            Repr::Map(table) => table.len,
        }
    }

    /// Returns true if the array has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the array is in dense list mode.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.repr, Repr::List(_))
    }

    /// Returns the key the next append will use.
    #[must_use]
    pub fn next_key(&self) -> i64 {
        self.next_key
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &Key) -> Option<&Value> {
        match &self.repr {
            Repr::List(list) => match key {
                Key::Int(i) if *i >= 0 => list.get(*i as usize),
                _ => None,
            },
            Repr::Map(table) => table
                .index
                .get(key)
                .and_then(|&pos| table.slots.get(pos))
                .and_then(|slot| slot.as_ref().map(|(_, v)| v)),
        }
    }

    /// Looks up a key for mutation.
    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Value> {
        self.may_alias = true;
        match &mut self.repr {
            Repr::List(list) => match key {
                Key::Int(i) if *i >= 0 => list.get_mut(*i as usize),
                _ => None,
            },
            Repr::Map(table) => {
                let pos = *table.index.get(key)?;
                table
                    .slots
                    .get_mut(pos)
                    .and_then(|slot| slot.as_mut().map(|(_, v)| v))
            }
        }
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Writes `value` under `key`. An existing key keeps its position.
    pub fn insert(&mut self, key: Key, value: Value) {
        let may_alias = self.may_alias || value.may_alias();
        if let Some(slot) = self.get_mut(&key) {
            *slot = value;
            self.may_alias = may_alias;
            return;
        }
        self.may_alias = may_alias;
        if let Key::Int(n) = key {
            if n >= self.next_key {
                self.next_key = n.saturating_add(1);
            }
        }
        match &mut self.repr {
            Repr::List(list) if key == Key::Int(list.len() as i64) => list.push_back(value),
            Repr::List(list) => {
                let mut table = Table::from_list(list);
                Self::table_append(&mut table, key, value);
                self.repr = Repr::Map(table);
            }
            Repr::Map(table) => Self::table_append(table, key, value),
        }
    }

    fn table_append(table: &mut Table, key: Key, value: Value) {
        table.index.insert(key.clone(), table.slots.len());
        table.slots.push_back(Some((key, value)));
        table.len += 1;
    }

    /// Appends at [`Self::next_key`] and returns the key used.
    pub fn push(&mut self, value: Value) -> Key {
        let key = Key::Int(self.next_key);
        self.insert(key.clone(), value);
        key
    }

    /// Returns the slot for `key`, inserting null if absent.
    pub fn entry(&mut self, key: Key) -> &mut Value {
        let pos = match self.position_of(&key) {
            Some(pos) => pos,
            None => {
                self.insert(key.clone(), Value::Null);
                self.position_end() - 1
            }
        };
        self.may_alias = true;
        match &mut self.repr {
            Repr::List(list) => &mut list[pos],
            Repr::Map(table) => &mut table.slots[pos].get_or_insert_with(|| (key, Value::Null)).1,
        }
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        if let Repr::List(list) = &mut self.repr {
            match key {
                Key::Int(i) if *i >= 0 && (*i as usize) < list.len() => {
                    if *i as usize == list.len() - 1 {
                        return list.pop_back();
                    }
                    self.repr = Repr::Map(Table::from_list(list));
                }
                _ => return None,
            }
        }
        let Repr::Map(table) = &mut self.repr else {
            return None;
        };
        let pos = table.index.remove(key)?;
        let removed = table.slots.get_mut(pos).and_then(Option::take);
        table.len -= 1;
        let tombstones = table.slots.len() - table.len;
        if tombstones > COMPACT_THRESHOLD && tombstones > table.len {
            table.compact();
        }
        removed.map(|(_, v)| v)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> + '_ {
        let (list, slots) = match &self.repr {
            Repr::List(list) => (Some(list), None),
            Repr::Map(table) => (None, Some(&table.slots)),
        };
        let dense = list
            .into_iter()
            .flat_map(|l| l.iter().enumerate())
            .map(|(i, v)| (Key::Int(i as i64), v));
        let sparse = slots
            .into_iter()
            .flat_map(|s| s.iter().flatten())
            .map(|(k, v)| (k.clone(), v));
        dense.chain(sparse)
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterates values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Returns the keys sorted by `compare`.
    pub fn keys_ordered<F>(&self, mut compare: F) -> Vec<Key>
    where
        F: FnMut(&Key, &Key) -> Ordering,
    {
        let mut keys: Vec<Key> = self.keys().collect();
        keys.sort_by(|a, b| compare(a, b));
        keys
    }

    /// Left-biased union: keys of `other` are added only where absent.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            if !result.contains_key(&key) {
                result.insert(key, value.clone());
            }
        }
        result
    }

    /// Returns true if an element may be a reference.
    #[must_use]
    pub fn may_alias(&self) -> bool {
        self.may_alias
    }

    /// Returns a copy in which references held only by this array are
    /// replaced by their values, recursively.
    ///
    /// References still shared with a variable or another element are
    /// kept, so copying an array preserves the aliasing its elements
    /// participate in but drops bindings left over from element writes.
    #[must_use]
    pub fn separate(&self) -> Self {
        if !self.may_alias {
            return self.clone();
        }
        let mut out = Self::new();
        for (key, value) in self.iter() {
            out.insert(key, value.separate());
        }
        out.next_key = self.next_key;
        out
    }

    /// Like [`separate`](Self::separate), but detaches `target`; see
    /// [`Value::separate_from`].
    #[must_use]
    pub fn separate_from(&self, target: &Reference, created: bool) -> Self {
        if !self.may_alias {
            return self.clone();
        }
        let mut out = Self::new();
        let mut dropped = false;
        for (key, value) in self.iter() {
            match value {
                Value::Reference(r) if created && r.ptr_eq(target) => dropped = true,
                other => out.insert(key, other.separate_from(target, created)),
            }
        }
        if !dropped {
            out.next_key = self.next_key;
        }
        out
    }

    // Cursor positions, used by iterators that must survive mutation.

    /// Returns the number of storage positions, including tombstones.
    #[must_use]
    pub fn position_end(&self) -> usize {
        match &self.repr {
            Repr::List(list) => list.len(),
            Repr::Map(table) => table.slots.len(),
        }
    }

    /// Returns the first live position at or after `from`.
    #[must_use]
    pub fn seek(&self, from: usize) -> Option<usize> {
        match &self.repr {
            Repr::List(list) => (from < list.len()).then_some(from),
            Repr::Map(table) => (from..table.slots.len())
                .find(|&pos| matches!(table.slots.get(pos), Some(Some(_)))),
        }
    }

    /// Returns the entry stored at a live position.
    #[must_use]
    pub fn entry_at(&self, pos: usize) -> Option<(Key, &Value)> {
        match &self.repr {
            Repr::List(list) => list.get(pos).map(|v| (Key::Int(pos as i64), v)),
            Repr::Map(table) => table
                .slots
                .get(pos)
                .and_then(|slot| slot.as_ref().map(|(k, v)| (k.clone(), v))),
        }
    }

    /// Returns the value stored at a live position for mutation.
    pub fn value_at_mut(&mut self, pos: usize) -> Option<&mut Value> {
        self.may_alias = true;
        match &mut self.repr {
            Repr::List(list) => list.get_mut(pos),
            Repr::Map(table) => table
                .slots
                .get_mut(pos)
                .and_then(|slot| slot.as_mut().map(|(_, v)| v)),
        }
    }

    /// Returns the storage position of a key.
    #[must_use]
    pub fn position_of(&self, key: &Key) -> Option<usize> {
        match &self.repr {
            Repr::List(list) => match key {
                Key::Int(i) if *i >= 0 && (*i as usize) < list.len() => Some(*i as usize),
                _ => None,
            },
            Repr::Map(table) => table.index.get(key).copied(),
        }
    }
}

impl FromIterator<(Key, Value)> for Array {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        let mut array = Self::new();
        for (key, value) in iter {
            array.insert(key, value);
        }
        array
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl PartialEq for Array {
    /// Strict, order-sensitive equality.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
