//! Runtime values of the script interpreter.
//!
//! Values follow the dynamic semantics scripts expect: ints and floats mix
//! freely, lists, dicts and sets are shared mutable references, tuples and
//! strings are immutable. Integer arithmetic is checked and overflows raise an
//! error instead of wrapping. Sequences longer than [`MAX_SEQUENCE_LEN`] raise
//! `MemoryError` before anything is allocated.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::game::{Direction, Entity, Ground, Item, Primitive};
use crate::script::ast::{BinOp, CmpOp, FunctionDef, UnaryOp};
use crate::script::builtins::Builtin;

mod keyed;

pub use keyed::{Dict, Key, Set};

/// Nesting depth past which printing and comparison stop descending.
const MAX_VALUE_DEPTH: usize = 64;

/// Longest list, tuple or string (in bytes) an operation may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Fail with `MemoryError` when a result of `len` elements would be too long.
///
/// # Errors
///
/// `MemoryError` past [`MAX_SEQUENCE_LEN`].
pub fn ensure_len(len: usize) -> ValueResult<()> {
    if len > MAX_SEQUENCE_LEN {
        return Err(RuntimeError::memory(format!(
            "sequence of {len} elements exceeds the limit of {MAX_SEQUENCE_LEN}"
        )));
    }
    Ok(())
}

/// An error raised by a value operation, before a line is attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct RuntimeError {
    /// Error class, e.g. `TypeError`.
    pub class: &'static str,
    /// Description.
    pub message: String,
}

impl RuntimeError {
    /// A `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            class: "TypeError",
            message: message.into(),
        }
    }

    /// A `ValueError`.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self {
            class: "ValueError",
            message: message.into(),
        }
    }

    /// An `IndexError`.
    pub fn index_error(message: impl Into<String>) -> Self {
        Self {
            class: "IndexError",
            message: message.into(),
        }
    }

    /// A `ZeroDivisionError`.
    pub fn zero_division(message: impl Into<String>) -> Self {
        Self {
            class: "ZeroDivisionError",
            message: message.into(),
        }
    }

    /// An `OverflowError`.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self {
            class: "OverflowError",
            message: message.into(),
        }
    }

    /// A `KeyError`.
    pub fn key_error(message: impl Into<String>) -> Self {
        Self {
            class: "KeyError",
            message: message.into(),
        }
    }

    /// A `MemoryError`.
    pub fn memory(message: impl Into<String>) -> Self {
        Self {
            class: "MemoryError",
            message: message.into(),
        }
    }
}

/// Result of a value operation.
pub type ValueResult<T> = Result<T, RuntimeError>;

/// A user function together with its evaluated defaults.
#[derive(Debug)]
pub struct Closure {
    /// Definition.
    pub def: Arc<FunctionDef>,
    /// Default values, aligned with the trailing parameters.
    pub defaults: Vec<Value>,
}

/// An integer range, stored lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    /// First value.
    pub start: i64,
    /// Exclusive bound.
    pub stop: i64,
    /// Non-zero stride.
    pub step: i64,
}

impl Range {
    /// Number of values produced.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        let (start, stop, step) = (i128::from(self.start), i128::from(self.stop), i128::from(self.step));
        let n = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        n as usize
    }

    /// Whether the range produces nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th value, if in range.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<i64> {
        if i >= self.len() {
            return None;
        }
        let offset = i64::try_from(i).ok()?.checked_mul(self.step)?;
        self.start.checked_add(offset)
    }

    fn contains(&self, v: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= v && v < self.stop
        } else {
            self.stop < v && v <= self.start
        };
        in_bounds && (i128::from(v) - i128::from(self.start)) % i128::from(self.step) == 0
    }
}

/// Bounds of a `slice(...)` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceBounds {
    /// Start, or `None` for the beginning.
    pub lower: Option<i64>,
    /// End, or `None` for the end.
    pub upper: Option<i64>,
}

impl SliceBounds {
    fn bound(value: Option<i64>) -> Value {
        value.map_or(Value::None, Value::Int)
    }
}

/// A script value.
#[derive(Debug, Clone)]
pub enum Value {
    /// `None`
    None,
    /// `True`/`False`
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double.
    Float(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Shared mutable list.
    List(Rc<RefCell<Vec<Value>>>),
    /// Immutable tuple.
    Tuple(Rc<[Value]>),
    /// Shared mutable dict.
    Dict(Rc<RefCell<Dict>>),
    /// Shared mutable set.
    Set(Rc<RefCell<Set>>),
    /// `slice(...)`
    Slice(SliceBounds),
    /// `range(...)`
    Range(Range),
    /// `North`, `East`, ...
    Direction(Direction),
    /// `Item.X`
    Item(Item),
    /// `Entity.X`
    Entity(Entity),
    /// `Ground.X`
    Ground(Ground),
    /// A user function.
    Function(Rc<Closure>),
    /// A builtin referenced by name.
    Builtin(Builtin),
    /// A farm primitive referenced by name.
    Primitive(Primitive),
}

impl Value {
    /// Build a string value.
    #[must_use]
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    /// Build a list value.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Build a tuple value.
    #[must_use]
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::from(items))
    }

    /// Build a dict value.
    #[must_use]
    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Build a set value.
    #[must_use]
    pub fn set(set: Set) -> Self {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    /// Name of the value's type, as shown in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Slice(_) => "slice",
            Value::Range(_) => "range",
            Value::Direction(_) => "Direction",
            Value::Item(_) => "Item",
            Value::Entity(_) => "Entity",
            Value::Ground(_) => "Ground",
            Value::Function(_) => "function",
            Value::Builtin(_) | Value::Primitive(_) => "builtin_function_or_method",
        }
    }

    /// Truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Set(set) => !set.borrow().is_empty(),
            Value::Range(r) => !r.is_empty(),
            _ => true,
        }
    }

    /// Integer view of ints and bools.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Float view of any number.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(int_to_float(*i)),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// The `repr()` form.
    #[must_use]
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    fn write_repr(&self, out: &mut String, depth: usize) {
        if depth > MAX_VALUE_DEPTH {
            out.push_str("...");
            return;
        }
        match self {
            Value::Str(s) => {
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
            }
            Value::List(items) => {
                out.push('[');
                write_items(out, &items.borrow(), depth);
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                write_items(out, items, depth);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, depth + 1);
                    out.push_str(": ");
                    value.write_repr(out, depth + 1);
                }
                out.push('}');
            }
            Value::Set(set) => {
                let members = set.borrow().values();
                if members.is_empty() {
                    out.push_str("set()");
                } else {
                    out.push('{');
                    write_items(out, &members, depth);
                    out.push('}');
                }
            }
            other => {
                let _ = write!(out, "{other}");
            }
        }
    }

    /// Number of elements of a sized value.
    ///
    /// # Errors
    ///
    /// `TypeError` for values without a length.
    pub fn len(&self) -> ValueResult<usize> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.borrow().len()),
            Value::Tuple(items) => Ok(items.len()),
            Value::Dict(dict) => Ok(dict.borrow().len()),
            Value::Set(set) => Ok(set.borrow().len()),
            Value::Range(r) => Ok(r.len()),
            other => Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// Whether a sized value has no elements.
    ///
    /// # Errors
    ///
    /// `TypeError` for values without a length.
    pub fn is_empty(&self) -> ValueResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Iterate over the elements of an iterable.
    ///
    /// # Errors
    ///
    /// `TypeError` for non-iterables.
    pub fn iter(&self) -> ValueResult<ValueIter> {
        match self {
            Value::Str(s) => Ok(ValueIter::Chars {
                chars: s.chars().collect(),
                index: 0,
            }),
            Value::List(items) => Ok(ValueIter::List {
                items: Rc::clone(items),
                index: 0,
            }),
            Value::Tuple(items) => Ok(ValueIter::Tuple {
                items: Rc::clone(items),
                index: 0,
            }),
            Value::Dict(dict) => Ok(ValueIter::Tuple {
                items: Rc::from(dict.borrow().keys()),
                index: 0,
            }),
            Value::Set(set) => Ok(ValueIter::Tuple {
                items: Rc::from(set.borrow().values()),
                index: 0,
            }),
            Value::Range(r) => Ok(ValueIter::Range { range: *r, index: 0 }),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Collect an iterable into a vector.
    ///
    /// # Errors
    ///
    /// `TypeError` for non-iterables, `MemoryError` for ranges too long to
    /// hold.
    pub fn to_vec(&self) -> ValueResult<Vec<Value>> {
        if let Value::Range(r) = self {
            ensure_len(r.len())?;
        }
        Ok(self.iter()?.collect())
    }

    /// `self[index]`.
    ///
    /// # Errors
    ///
    /// `TypeError` for non-integer indices or unsubscriptable values,
    /// `IndexError` when out of range, `KeyError` for missing dict keys.
    pub fn index(&self, index: &Value) -> ValueResult<Value> {
        if let Value::Dict(dict) = self {
            return dict
                .borrow()
                .get(index)?
                .cloned()
                .ok_or_else(|| RuntimeError::key_error(index.repr()));
        }
        if let Value::Slice(bounds) = index {
            return self.slice(&SliceBounds::bound(bounds.lower), &SliceBounds::bound(bounds.upper));
        }
        let type_name = self.type_name();
        let len = match self {
            Value::Str(_) | Value::List(_) | Value::Tuple(_) | Value::Range(_) => self.len()?,
            other => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not subscriptable",
                    other.type_name()
                )));
            }
        };
        let i = normalize_index(index, len, type_name)?;
        let value = match self {
            Value::Str(s) => s.chars().nth(i).map(|c| Value::str(c.encode_utf8(&mut [0; 4]))),
            Value::List(items) => items.borrow().get(i).cloned(),
            Value::Tuple(items) => items.get(i).cloned(),
            Value::Range(r) => r.get(i).map(Value::Int),
            _ => None,
        };
        value.ok_or_else(|| RuntimeError::index_error(format!("{type_name} index out of range")))
    }

    /// `self[index] = value`.
    ///
    /// # Errors
    ///
    /// `TypeError` unless `self` is a list or dict, or for unhashable dict
    /// keys; `IndexError` when out of range.
    pub fn set_index(&self, index: &Value, value: Value) -> ValueResult<()> {
        if let Value::Dict(dict) = self {
            return dict.borrow_mut().insert(index.clone(), value);
        }
        let Value::List(items) = self else {
            return Err(RuntimeError::type_error(format!(
                "'{}' object does not support item assignment",
                self.type_name()
            )));
        };
        let len = items.borrow().len();
        let i = normalize_index(index, len, "list")?;
        items.borrow_mut()[i] = value;
        Ok(())
    }

    /// `self[lower:upper]`.
    ///
    /// # Errors
    ///
    /// `TypeError` for unsliceable values or non-integer bounds.
    pub fn slice(&self, lower: &Value, upper: &Value) -> ValueResult<Value> {
        let len = self.len()?;
        let bound = |v: &Value, default: usize| -> ValueResult<usize> {
            match v {
                Value::None => Ok(default),
                v => {
                    let i = v.as_int().ok_or_else(|| {
                        RuntimeError::type_error("slice indices must be integers or None")
                    })?;
                    Ok(clamp_index(i, len))
                }
            }
        };
        let lo = bound(lower, 0)?;
        let hi = bound(upper, len)?.max(lo);
        match self {
            Value::Str(s) => Ok(Value::str(&s.chars().skip(lo).take(hi - lo).collect::<String>())),
            Value::List(items) => Ok(Value::list(items.borrow()[lo..hi].to_vec())),
            Value::Tuple(items) => Ok(Value::tuple(items[lo..hi].to_vec())),
            Value::Range(r) => {
                let at = |i: usize| {
                    i64::try_from(i)
                        .unwrap_or(i64::MAX)
                        .saturating_mul(r.step)
                        .saturating_add(r.start)
                };
                Ok(Value::Range(Range {
                    start: at(lo),
                    stop: at(hi),
                    step: r.step,
                }))
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `needle in self`.
    ///
    /// # Errors
    ///
    /// `TypeError` for non-containers, or a non-string needle in a string.
    pub fn contains(&self, needle: &Value) -> ValueResult<bool> {
        match self {
            Value::Str(haystack) => match needle {
                Value::Str(n) => Ok(haystack.contains(&**n)),
                other => Err(RuntimeError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Value::List(items) => Ok(items.borrow().iter().any(|v| v.equals(needle))),
            Value::Tuple(items) => Ok(items.iter().any(|v| v.equals(needle))),
            Value::Dict(dict) => dict.borrow().contains(needle),
            Value::Set(set) => set.borrow().contains(needle),
            Value::Range(r) => Ok(match needle {
                Value::Float(f) if f.fract() == 0.0 => {
                    float_to_int(*f).is_some_and(|i| r.contains(i))
                }
                v => v.as_int().is_some_and(|i| r.contains(i)),
            }),
            other => Err(RuntimeError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Structural equality with numeric coercion.
    #[must_use]
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> bool {
        if depth > MAX_VALUE_DEPTH {
            return false;
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_equals(&a.borrow(), &b.borrow(), depth)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_equals(a, b, depth),
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().equals_at(&b.borrow(), depth)
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.is_subset(&b)
            }
            (Value::Slice(a), Value::Slice(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => {
                let (la, lb) = (a.len(), b.len());
                la == lb && (la == 0 || (a.start == b.start && (la == 1 || a.step == b.step)))
            }
            (Value::Direction(a), Value::Direction(b)) => a == b,
            (Value::Item(a), Value::Item(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a == b,
            (Value::Ground(a), Value::Ground(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y) == Some(Ordering::Equal),
                    _ => false,
                },
            },
        }
    }

    /// Identity as far as scripts can observe it.
    #[must_use]
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => false,
            (a, b) => a.equals(b),
        }
    }

    /// Ordering for `<`, `max()`, `sorted()`; `None` when unordered (NaN).
    ///
    /// # Errors
    ///
    /// `TypeError` when the two values cannot be ordered.
    pub fn partial_order(&self, other: &Value, symbol: &str) -> ValueResult<Option<Ordering>> {
        self.partial_order_at(other, symbol, 0)
    }

    fn partial_order_at(&self, other: &Value, symbol: &str, depth: usize) -> ValueResult<Option<Ordering>> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                seq_order(&a.borrow(), &b.borrow(), symbol, depth)
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_order(a, b, symbol, depth),
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                Ok(match (a.is_subset(&b), b.is_subset(&a)) {
                    (true, true) => Some(Ordering::Equal),
                    (true, false) => Some(Ordering::Less),
                    (false, true) => Some(Ordering::Greater),
                    (false, false) => None,
                })
            }
            (a, b) => {
                if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
                    return Ok(Some(x.cmp(&y)));
                }
                if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
                    return Ok(x.partial_cmp(&y));
                }
                Err(RuntimeError::type_error(format!(
                    "'{symbol}' not supported between instances of '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                )))
            }
        }
    }
}

fn write_items(out: &mut String, items: &[Value], depth: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, depth + 1);
    }
}

fn seq_equals(a: &[Value], b: &[Value], depth: usize) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals_at(y, depth + 1))
}

fn seq_order(a: &[Value], b: &[Value], symbol: &str, depth: usize) -> ValueResult<Option<Ordering>> {
    if depth > MAX_VALUE_DEPTH {
        return Ok(None);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.equals_at(y, depth + 1) {
            return x.partial_order_at(y, symbol, depth + 1);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

fn normalize_index(index: &Value, len: usize, type_name: &str) -> ValueResult<usize> {
    let Some(i) = index.as_int() else {
        return Err(RuntimeError::type_error(format!(
            "{type_name} indices must be integers, not {}",
            index.type_name()
        )));
    };
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if i < 0 { i.saturating_add(len_i) } else { i };
    usize::try_from(resolved)
        .ok()
        .filter(|&r| r < len)
        .ok_or_else(|| RuntimeError::index_error(format!("{type_name} index out of range")))
}

fn clamp_index(i: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if i < 0 { i.saturating_add(len_i).max(0) } else { i.min(len_i) };
    usize::try_from(resolved).unwrap_or(0)
}

/// Nearest float to `i`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn int_to_float(i: i64) -> f64 {
    i as f64
}

/// Convert an integral float to `i64` when it fits.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn float_to_int(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

/// Format a float the way scripts print it: `1.0`, `0.25`, `1e-07`, `inf`.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let raw = format!("{f:e}");
        let (mantissa, exponent) = raw.split_once('e').unwrap_or((&raw, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    let text = f.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) | Value::Set(_) => f.write_str(&self.repr()),
            Value::Slice(b) => write!(
                f,
                "slice({}, {}, None)",
                SliceBounds::bound(b.lower),
                SliceBounds::bound(b.upper)
            ),
            Value::Range(r) if r.step == 1 => write!(f, "range({}, {})", r.start, r.stop),
            Value::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
            Value::Direction(d) => f.write_str(d.name()),
            Value::Item(item) => write!(f, "Item.{}", item.identifier()),
            Value::Entity(entity) => write!(f, "Entity.{}", entity.identifier()),
            Value::Ground(ground) => write!(f, "Ground.{}", ground.identifier()),
            Value::Function(closure) => write!(f, "<function {}>", closure.def.name),
            Value::Builtin(b) => write!(f, "<built-in function {}>", b.name()),
            Value::Primitive(p) => write!(f, "<built-in function {}>", p.name()),
        }
    }
}

/// Iterator over an iterable value.
///
/// Lists are read live, so writes made while looping are observed.
#[derive(Debug)]
pub enum ValueIter {
    /// Characters of a string.
    Chars {
        /// Characters.
        chars: Vec<char>,
        /// Next position.
        index: usize,
    },
    /// A shared list.
    List {
        /// The list.
        items: Rc<RefCell<Vec<Value>>>,
        /// Next position.
        index: usize,
    },
    /// A tuple.
    Tuple {
        /// The tuple.
        items: Rc<[Value]>,
        /// Next position.
        index: usize,
    },
    /// A range.
    Range {
        /// The range.
        range: Range,
        /// Next position.
        index: usize,
    },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let value = match self {
            ValueIter::Chars { chars, index } => chars
                .get(*index)
                .map(|c| Value::str(c.encode_utf8(&mut [0; 4]))),
            ValueIter::List { items, index } => items.borrow().get(*index).cloned(),
            ValueIter::Tuple { items, index } => items.get(*index).cloned(),
            ValueIter::Range { range, index } => range.get(*index).map(Value::Int),
        }?;
        match self {
            ValueIter::Chars { index, .. }
            | ValueIter::List { index, .. }
            | ValueIter::Tuple { index, .. }
            | ValueIter::Range { index, .. } => *index += 1,
        }
        Some(value)
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Float(f) => Some(Num::Float(*f)),
        v => v.as_int().map(Num::Int),
    }
}

fn unsupported(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

fn overflow() -> RuntimeError {
    RuntimeError::overflow("integer overflow")
}

/// Repetition count and checked result length of `len * times`.
fn repeat_len(len: usize, times: i64) -> ValueResult<(usize, usize)> {
    let times = usize::try_from(times).unwrap_or(0);
    let total = len.checked_mul(times).unwrap_or(usize::MAX);
    ensure_len(total)?;
    Ok((times, total))
}

fn repeat(items: &[Value], times: i64) -> ValueResult<Vec<Value>> {
    let (times, total) = repeat_len(items.len(), times)?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Evaluate a unary operator.
///
/// # Errors
///
/// `TypeError` for non-numeric operands of `-`/`+`, `OverflowError` on
/// negating `i64::MIN`.
pub fn unary(op: UnaryOp, operand: &Value) -> ValueResult<Value> {
    match (op, num(operand)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.truthy())),
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (_, None) => Err(RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            operand.type_name()
        ))),
    }
}

/// Evaluate an arithmetic operator.
///
/// # Errors
///
/// `TypeError` for unsupported operands, `ZeroDivisionError`, and
/// `OverflowError` when integer results leave the 64-bit range.
pub fn binary(op: BinOp, a: &Value, b: &Value) -> ValueResult<Value> {
    match (num(a), num(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => int_binary(op, x, y),
        (Some(_), Some(_)) if op.is_bitwise() => Err(unsupported(op.symbol(), a, b)),
        (Some(x), Some(y)) => {
            let to_f = |n: Num| match n {
                Num::Int(i) => int_to_float(i),
                Num::Float(f) => f,
            };
            float_binary(op, to_f(x), to_f(y))
        }
        _ => sequence_binary(op, a, b),
    }
}

fn int_binary(op: BinOp, x: i64, y: i64) -> ValueResult<Value> {
    let value = match op {
        BinOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinOp::Div => {
            return float_binary(BinOp::Div, int_to_float(x), int_to_float(y));
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(RuntimeError::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(RuntimeError::zero_division("integer division or modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }
        }
        BinOp::Pow => {
            if y < 0 {
                return float_binary(BinOp::Pow, int_to_float(x), int_to_float(y));
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).ok_or_else(overflow)?
        }
        BinOp::BitOr => x | y,
        BinOp::BitAnd => x & y,
        BinOp::BitXor => x ^ y,
    };
    Ok(Value::Int(value))
}

fn float_binary(op: BinOp, x: f64, y: f64) -> ValueResult<Value> {
    let value = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(RuntimeError::zero_division("float modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(RuntimeError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if x < 0.0 && y.fract() != 0.0 {
                return Err(RuntimeError::value_error("math domain error"));
            }
            let result = x.powf(y);
            if result.is_infinite() && x.is_finite() && y.is_finite() {
                return Err(RuntimeError::overflow("numerical result out of range"));
            }
            result
        }
        BinOp::BitOr | BinOp::BitAnd | BinOp::BitXor => {
            return Err(RuntimeError::type_error(format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                op.symbol()
            )));
        }
    };
    Ok(Value::Float(value))
}

fn sequence_binary(op: BinOp, a: &Value, b: &Value) -> ValueResult<Value> {
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            ensure_len(x.len().saturating_add(y.len()))?;
            Ok(Value::str(&format!("{x}{y}")))
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            ensure_len(x.len().saturating_add(y.len()))?;
            let mut items = x.clone();
            items.extend(y.iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            ensure_len(x.len().saturating_add(y.len()))?;
            Ok(Value::tuple(x.iter().chain(y.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(_) | Value::List(_) | Value::Tuple(_), n) if n.as_int().is_some() => {
            repeat_sequence(a, n.as_int().unwrap_or(0))
        }
        (BinOp::Mul, n, Value::Str(_) | Value::List(_) | Value::Tuple(_)) if n.as_int().is_some() => {
            repeat_sequence(b, n.as_int().unwrap_or(0))
        }
        (BinOp::BitOr | BinOp::BitAnd | BinOp::BitXor | BinOp::Sub, Value::Set(x), Value::Set(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            Ok(Value::set(set_binary(op, &x, &y)))
        }
        (BinOp::BitOr, Value::Dict(x), Value::Dict(y)) => Ok(Value::dict(x.borrow().merged(&y.borrow()))),
        _ => Err(unsupported(op.symbol(), a, b)),
    }
}

fn repeat_sequence(seq: &Value, times: i64) -> ValueResult<Value> {
    match seq {
        Value::Str(s) => {
            let (times, _) = repeat_len(s.len(), times)?;
            Ok(Value::str(&s.repeat(times)))
        }
        Value::List(items) => Ok(Value::list(repeat(&items.borrow(), times)?)),
        other => Ok(Value::tuple(repeat(&other.to_vec()?, times)?)),
    }
}

/// Set algebra for `|`, `&`, `^` and `-`.
#[must_use]
pub fn set_binary(op: BinOp, x: &Set, y: &Set) -> Set {
    match op {
        BinOp::BitOr => x.union(y),
        BinOp::BitAnd => x.intersection(y),
        BinOp::BitXor => x.symmetric_difference(y),
        _ => x.difference(y),
    }
}

/// Evaluate one comparison link.
///
/// # Errors
///
/// `TypeError` for unordered operand types or non-container `in` targets.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> ValueResult<bool> {
    let symbol = match op {
        CmpOp::Eq => return Ok(a.equals(b)),
        CmpOp::Ne => return Ok(!a.equals(b)),
        CmpOp::In => return b.contains(a),
        CmpOp::NotIn => return b.contains(a).map(|found| !found),
        CmpOp::Is => return Ok(a.is(b)),
        CmpOp::IsNot => return Ok(!a.is(b)),
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    };
    let Some(ordering) = a.partial_order(b, symbol)? else {
        return Ok(false);
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn test_display_matches_script_conventions() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Float(1e-7).to_string(), "1e-07");
        assert_eq!(Value::Float(2.5e20).to_string(), "2.5e+20");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Entity(Entity::Pumpkin).to_string(), "Entity.PUMPKIN");
        assert_eq!(Value::Direction(Direction::North).to_string(), "North");
        let list = Value::list(vec![int(1), Value::str("a"), Value::tuple(vec![int(2)])]);
        assert_eq!(list.to_string(), "[1, 'a', (2,)]");
    }

    #[test]
    fn test_floor_division_and_modulo_round_down() {
        assert!(binary(BinOp::FloorDiv, &int(-7), &int(2)).unwrap().equals(&int(-4)));
        assert!(binary(BinOp::Mod, &int(-7), &int(2)).unwrap().equals(&int(1)));
        assert!(binary(BinOp::Mod, &int(7), &int(-2)).unwrap().equals(&int(-1)));
        assert!(binary(BinOp::Mod, &Value::Float(-1.5), &int(1)).unwrap().equals(&Value::Float(0.5)));
    }

    #[test]
    fn test_true_division_is_float() {
        let v = binary(BinOp::Div, &int(7), &int(2)).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 3.5).abs() < 1e-12));
        let err = binary(BinOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.class, "ZeroDivisionError");
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let err = binary(BinOp::Mul, &int(i64::MAX), &int(2)).unwrap_err();
        assert_eq!(err.class, "OverflowError");
        let err = binary(BinOp::Pow, &int(10), &int(40)).unwrap_err();
        assert_eq!(err.class, "OverflowError");
        assert!(binary(BinOp::Pow, &int(2), &int(10)).unwrap().equals(&int(1024)));
    }

    #[test]
    fn test_negative_exponent_gives_float() {
        let v = binary(BinOp::Pow, &int(2), &int(-1)).unwrap();
        assert!(matches!(v, Value::Float(f) if (f - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_mixed_type_errors() {
        let err = binary(BinOp::Add, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err.class, "TypeError");
        assert!(err.message.contains("'int' and 'str'"));
        let err = compare(CmpOp::Lt, &int(1), &Value::str("a")).unwrap_err();
        assert!(err.message.contains("'<'"));
    }

    #[test]
    fn test_sequence_operators() {
        let a = Value::list(vec![int(1)]);
        let b = Value::list(vec![int(2)]);
        assert_eq!(binary(BinOp::Add, &a, &b).unwrap().to_string(), "[1, 2]");
        assert_eq!(binary(BinOp::Mul, &int(3), &Value::str("ab")).unwrap().to_string(), "ababab");
        assert_eq!(binary(BinOp::Mul, &a, &int(-1)).unwrap().to_string(), "[]");
    }

    #[test]
    fn test_equality_coerces_numbers() {
        assert!(int(1).equals(&Value::Float(1.0)));
        assert!(int(1).equals(&Value::Bool(true)));
        assert!(!Value::str("1").equals(&int(1)));
        assert!(!Value::list(vec![]).equals(&Value::tuple(vec![])));
        assert!(!Value::Float(f64::NAN).equals(&Value::Float(f64::NAN)));
    }

    #[test]
    fn test_lists_are_shared() {
        let a = Value::list(vec![int(0)]);
        let b = a.clone();
        b.set_index(&int(0), int(9)).unwrap();
        assert!(a.index(&int(0)).unwrap().equals(&int(9)));
        assert!(a.is(&b));
        assert!(!a.is(&Value::list(vec![int(9)])));
    }

    #[test]
    fn test_indexing_and_slicing() {
        let t = Value::tuple(vec![int(1), int(2), int(3)]);
        assert!(t.index(&int(-1)).unwrap().equals(&int(3)));
        assert_eq!(t.index(&int(3)).unwrap_err().class, "IndexError");
        assert_eq!(t.index(&Value::str("x")).unwrap_err().class, "TypeError");
        assert_eq!(t.slice(&int(1), &Value::None).unwrap().to_string(), "(2, 3)");
        assert_eq!(Value::str("hello").slice(&Value::None, &int(-2)).unwrap().to_string(), "hel");
        assert_eq!(t.set_index(&int(0), int(0)).unwrap_err().class, "TypeError");
    }

    #[test]
    fn test_ranges() {
        let r = Range { start: 10, stop: 0, step: -3 };
        assert_eq!(r.len(), 4);
        let values: Vec<String> = Value::Range(r).iter().unwrap().map(|v| v.to_string()).collect();
        assert_eq!(values, ["10", "7", "4", "1"]);
        assert!(Value::Range(r).contains(&int(7)).unwrap());
        assert!(!Value::Range(r).contains(&int(8)).unwrap());
        let sliced = Value::Range(Range { start: 0, stop: 10, step: 1 }).slice(&int(2), &int(5)).unwrap();
        assert_eq!(sliced.to_vec().unwrap().len(), 3);
        assert!(sliced.index(&int(0)).unwrap().equals(&int(2)));
    }

    #[test]
    fn test_ordering_of_sequences() {
        let a = Value::tuple(vec![int(1), int(2)]);
        let b = Value::tuple(vec![int(1), int(3)]);
        assert!(compare(CmpOp::Lt, &a, &b).unwrap());
        assert!(compare(CmpOp::Gt, &Value::str("b"), &Value::str("a")).unwrap());
        assert!(!compare(CmpOp::Lt, &Value::Float(f64::NAN), &int(1)).unwrap());
    }

    #[test]
    fn test_cyclic_list_prints() {
        let a = Value::list(vec![int(0)]);
        a.set_index(&int(0), a.clone()).unwrap();
        assert!(a.repr().contains("..."));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::tuple(vec![Value::None]).truthy());
        assert!(!Value::Range(Range { start: 0, stop: 0, step: 1 }).truthy());
        assert!(Value::Entity(Entity::Nothing).truthy());
    }

    #[test]
    fn test_repetition_past_the_length_limit_is_a_memory_error() {
        let err = binary(BinOp::Mul, &Value::str("ab"), &int(1 << 62)).unwrap_err();
        assert_eq!(err.class, "MemoryError");
        let err = binary(BinOp::Mul, &Value::list(vec![int(0)]), &int(1_000_000_000_000)).unwrap_err();
        assert_eq!(err.class, "MemoryError");
        let err = binary(BinOp::Mul, &int(i64::MAX), &Value::tuple(vec![int(1), int(2)])).unwrap_err();
        assert_eq!(err.class, "MemoryError");
        let big = Value::Range(Range { start: 0, stop: i64::MAX, step: 1 });
        assert_eq!(big.to_vec().unwrap_err().class, "MemoryError");
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &int(-3)).unwrap().to_string(), "");
        assert_eq!(binary(BinOp::Mul, &int(2), &Value::list(vec![int(7)])).unwrap().to_string(), "[7, 7]");
    }

    #[test]
    fn test_bitwise_operators_on_ints() {
        assert!(binary(BinOp::BitOr, &int(0b1010), &int(0b0101)).unwrap().equals(&int(15)));
        assert!(binary(BinOp::BitAnd, &int(12), &int(10)).unwrap().equals(&int(8)));
        assert!(binary(BinOp::BitXor, &int(-1), &int(5)).unwrap().equals(&int(-6)));
        assert!(binary(BinOp::BitOr, &Value::Bool(true), &int(2)).unwrap().equals(&int(3)));
        let err = binary(BinOp::BitAnd, &Value::Float(1.0), &int(1)).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for &: 'float' and 'int'");
    }

    #[test]
    fn test_dict_indexing_and_membership() {
        let dict = Value::dict(Dict::default());
        dict.set_index(&Value::tuple(vec![int(1), int(2)]), Value::str("carrot")).unwrap();
        dict.set_index(&int(3), Value::Entity(Entity::Tree)).unwrap();
        assert_eq!(dict.len().unwrap(), 2);
        assert!(dict.contains(&Value::tuple(vec![int(1), int(2)])).unwrap());
        assert!(dict.contains(&Value::Float(3.0)).unwrap());
        assert_eq!(dict.index(&int(3)).unwrap().to_string(), "Entity.TREE");
        let err = dict.index(&Value::str("x")).unwrap_err();
        assert_eq!((err.class, err.message.as_str()), ("KeyError", "'x'"));
        let err = dict.set_index(&Value::list(vec![]), Value::None).unwrap_err();
        assert_eq!(err.class, "TypeError");
        assert_eq!(dict.repr(), "{(1, 2): 'carrot', 3: Entity.TREE}");
        let keys: Vec<String> = dict.iter().unwrap().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["(1, 2)", "3"]);
    }

    #[test]
    fn test_set_operators_and_comparisons() {
        let set = |v: &[i64]| Value::set(Set::from_values(v.iter().copied().map(Value::Int)).unwrap());
        let a = set(&[1, 2, 3]);
        let b = set(&[3, 4]);
        assert_eq!(binary(BinOp::BitOr, &a, &b).unwrap().to_string(), "{1, 2, 3, 4}");
        assert_eq!(binary(BinOp::BitAnd, &a, &b).unwrap().to_string(), "{3}");
        assert_eq!(binary(BinOp::Sub, &a, &b).unwrap().to_string(), "{1, 2}");
        assert_eq!(binary(BinOp::BitXor, &a, &b).unwrap().to_string(), "{1, 2, 4}");
        assert_eq!(set(&[]).to_string(), "set()");
        assert!(set(&[2, 1, 3]).equals(&a));
        assert!(compare(CmpOp::Lt, &set(&[1]), &a).unwrap());
        assert!(!compare(CmpOp::Le, &b, &a).unwrap());
        assert!(!set(&[]).truthy());
        assert_eq!(binary(BinOp::Add, &a, &b).unwrap_err().class, "TypeError");
    }

    #[test]
    fn test_slice_objects_index_sequences() {
        let bounds = Value::Slice(SliceBounds { lower: Some(1), upper: None });
        assert_eq!(bounds.to_string(), "slice(1, None, None)");
        let list = Value::list(vec![int(1), int(2), int(3)]);
        assert_eq!(list.index(&bounds).unwrap().to_string(), "[2, 3]");
        assert_eq!(Value::str("wood").index(&bounds).unwrap().to_string(), "ood");
    }
}
