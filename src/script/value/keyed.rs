//! Dicts and sets.
//!
//! Both keep insertion order. Lookups go through [`Key`], a hashable image of
//! a value in which numbers that compare equal (`1`, `1.0`, `True`) collapse to
//! the same key.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::game::{Direction, Entity, Ground, Item, Primitive};
use crate::script::builtins::Builtin;
use crate::script::value::{MAX_VALUE_DEPTH, RuntimeError, Value, ValueResult, float_to_int};

/// Hashable image of a script value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// `None`
    None,
    /// Ints, bools and integral floats.
    Int(i64),
    /// Bit pattern of any other float.
    Float(u64),
    /// Strings.
    Str(String),
    /// Tuples of hashable values.
    Tuple(Vec<Key>),
    /// Direction constants.
    Direction(Direction),
    /// `Item.X`
    Item(Item),
    /// `Entity.X`
    Entity(Entity),
    /// `Ground.X`
    Ground(Ground),
    /// Builtins referenced by name.
    Builtin(Builtin),
    /// Primitives referenced by name.
    Primitive(Primitive),
}

impl Key {
    /// The key of `value`.
    ///
    /// # Errors
    ///
    /// `TypeError` for mutable values (lists, dicts, sets) and anything
    /// containing one.
    pub fn of(value: &Value) -> ValueResult<Key> {
        Self::of_at(value, 0)
    }

    fn of_at(value: &Value, depth: usize) -> ValueResult<Key> {
        if depth > MAX_VALUE_DEPTH {
            return Err(RuntimeError::type_error("unhashable type: nesting too deep"));
        }
        Ok(match value {
            Value::None => Key::None,
            Value::Bool(b) => Key::Int(i64::from(*b)),
            Value::Int(i) => Key::Int(*i),
            Value::Float(f) => match float_to_int(*f) {
                Some(i) if f.fract() == 0.0 => Key::Int(i),
                _ => Key::Float(f.to_bits()),
            },
            Value::Str(s) => Key::Str(s.to_string()),
            Value::Tuple(items) => Key::Tuple(
                items
                    .iter()
                    .map(|item| Self::of_at(item, depth + 1))
                    .collect::<ValueResult<_>>()?,
            ),
            Value::Direction(d) => Key::Direction(*d),
            Value::Item(item) => Key::Item(*item),
            Value::Entity(entity) => Key::Entity(*entity),
            Value::Ground(ground) => Key::Ground(*ground),
            Value::Builtin(b) => Key::Builtin(*b),
            Value::Primitive(p) => Key::Primitive(*p),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "unhashable type: '{}'",
                    other.type_name()
                )));
            }
        })
    }

    /// The value `hash()` reports: integers hash to themselves.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn hash_value(&self) -> i64 {
        if let Key::Int(i) = self {
            return *i;
        }
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish() as i64
    }
}

/// An insertion-ordered dict.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    slots: HashMap<Key, usize>,
    entries: Vec<(Key, Value, Value)>,
}

impl Dict {
    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dict has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value stored under `key`.
    ///
    /// # Errors
    ///
    /// `TypeError` when `key` is unhashable.
    pub fn get(&self, key: &Value) -> ValueResult<Option<&Value>> {
        Ok(self.get_hashed(&Key::of(key)?))
    }

    fn get_hashed(&self, key: &Key) -> Option<&Value> {
        self.slots.get(key).map(|&i| &self.entries[i].2)
    }

    /// Store `value` under `key`, keeping the original key on overwrite.
    ///
    /// # Errors
    ///
    /// `TypeError` when `key` is unhashable.
    pub fn insert(&mut self, key: Value, value: Value) -> ValueResult<()> {
        let hashed = Key::of(&key)?;
        self.insert_hashed(hashed, key, value);
        Ok(())
    }

    fn insert_hashed(&mut self, hashed: Key, key: Value, value: Value) {
        if let Some(&i) = self.slots.get(&hashed) {
            self.entries[i].2 = value;
            return;
        }
        self.slots.insert(hashed.clone(), self.entries.len());
        self.entries.push((hashed, key, value));
    }

    /// Whether `key` is present.
    ///
    /// # Errors
    ///
    /// `TypeError` when `key` is unhashable.
    pub fn contains(&self, key: &Value) -> ValueResult<bool> {
        Ok(self.slots.contains_key(&Key::of(key)?))
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, k, _)| k.clone()).collect()
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(_, k, v)| (k, v))
    }

    /// Entries of `self` overwritten and extended by `other`.
    #[must_use]
    pub fn merged(&self, other: &Dict) -> Dict {
        let mut out = self.clone();
        for (hashed, key, value) in &other.entries {
            out.insert_hashed(hashed.clone(), key.clone(), value.clone());
        }
        out
    }

    pub(super) fn equals_at(&self, other: &Dict, depth: usize) -> bool {
        self.len() == other.len()
            && self.entries.iter().all(|(hashed, _, value)| {
                other
                    .get_hashed(hashed)
                    .is_some_and(|theirs| value.equals_at(theirs, depth + 1))
            })
    }
}

/// An insertion-ordered set.
#[derive(Debug, Clone, Default)]
pub struct Set {
    slots: HashMap<Key, usize>,
    items: Vec<(Key, Value)>,
}

impl Set {
    /// Build a set from values, dropping duplicates.
    ///
    /// # Errors
    ///
    /// `TypeError` when a value is unhashable.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> ValueResult<Set> {
        let mut set = Set::default();
        for value in values {
            set.insert(value)?;
        }
        Ok(set)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `value`; returns whether it was new.
    ///
    /// # Errors
    ///
    /// `TypeError` when `value` is unhashable.
    pub fn insert(&mut self, value: Value) -> ValueResult<bool> {
        let hashed = Key::of(&value)?;
        Ok(self.insert_hashed(hashed, value))
    }

    fn insert_hashed(&mut self, hashed: Key, value: Value) -> bool {
        if self.slots.contains_key(&hashed) {
            return false;
        }
        self.slots.insert(hashed.clone(), self.items.len());
        self.items.push((hashed, value));
        true
    }

    /// Whether `value` is a member.
    ///
    /// # Errors
    ///
    /// `TypeError` when `value` is unhashable.
    pub fn contains(&self, value: &Value) -> ValueResult<bool> {
        Ok(self.slots.contains_key(&Key::of(value)?))
    }

    /// Members in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.items.iter().map(|(_, v)| v.clone()).collect()
    }

    fn filtered(&self, keep: impl Fn(&Key) -> bool) -> Set {
        let mut out = Set::default();
        for (hashed, value) in &self.items {
            if keep(hashed) {
                out.insert_hashed(hashed.clone(), value.clone());
            }
        }
        out
    }

    /// `self | other`
    #[must_use]
    pub fn union(&self, other: &Set) -> Set {
        let mut out = self.clone();
        for (hashed, value) in &other.items {
            out.insert_hashed(hashed.clone(), value.clone());
        }
        out
    }

    /// `self & other`
    #[must_use]
    pub fn intersection(&self, other: &Set) -> Set {
        self.filtered(|k| other.slots.contains_key(k))
    }

    /// `self - other`
    #[must_use]
    pub fn difference(&self, other: &Set) -> Set {
        self.filtered(|k| !other.slots.contains_key(k))
    }

    /// `self ^ other`
    #[must_use]
    pub fn symmetric_difference(&self, other: &Set) -> Set {
        self.difference(other).union(&other.difference(self))
    }

    /// Whether every member of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Set) -> bool {
        self.items.iter().all(|(k, _)| other.slots.contains_key(k))
    }
}
