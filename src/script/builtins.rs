//! Pure builtins available to scripts.
//!
//! Everything here is a function of its arguments. The builtins that need
//! the farm (`time`, `random`, `choice`) or call back into the script
//! (`map`, `filter`) are evaluated by the interpreter instead.

use std::cmp::Ordering;

use crate::script::value::{
    Dict, Key, Range, RuntimeError, Set, SliceBounds, Value, ValueResult, binary, ensure_len, float_to_int,
    int_to_float,
};
use crate::script::ast::BinOp;

/// Builtin functions, by script name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `bool(x)`
    Bool,
    /// `float(x)`
    Float,
    /// `int(x)`
    Int,
    /// `list(iterable)`
    List,
    /// `range(stop)` / `range(start, stop[, step])`
    Range,
    /// `str(x)`
    Str,
    /// `tuple(iterable)`
    Tuple,
    /// `dict([mapping_or_pairs])`
    Dict,
    /// `set([iterable])`
    Set,
    /// `slice(stop)` / `slice(start, stop)`
    Slice,
    /// `hash(x)`
    Hash,
    /// `abs(x)`
    Abs,
    /// `all(iterable)`
    All,
    /// `any(iterable)`
    Any,
    /// `chr(code)`
    Chr,
    /// `divmod(a, b)`
    Divmod,
    /// `enumerate(iterable[, start])`
    Enumerate,
    /// `filter(function, iterable)`
    Filter,
    /// `hex(x)`
    Hex,
    /// `len(x)`
    Len,
    /// `map(function, iterable)`
    Map,
    /// `max(...)`
    Max,
    /// `min(...)`
    Min,
    /// `ord(c)`
    Ord,
    /// `pow(base, exp[, mod])`
    Pow,
    /// `reversed(seq)`
    Reversed,
    /// `round(x[, ndigits])`
    Round,
    /// `sorted(iterable)`
    Sorted,
    /// `sum(iterable[, start])`
    Sum,
    /// `zip(*iterables)`
    Zip,
    /// `time()`
    Time,
    /// `random()`
    Random,
    /// `choice(seq)`
    Choice,
}

impl Builtin {
    /// All builtins.
    pub const ALL: [Builtin; 33] = [
        Builtin::Bool,
        Builtin::Float,
        Builtin::Int,
        Builtin::List,
        Builtin::Range,
        Builtin::Str,
        Builtin::Tuple,
        Builtin::Dict,
        Builtin::Set,
        Builtin::Slice,
        Builtin::Hash,
        Builtin::Abs,
        Builtin::All,
        Builtin::Any,
        Builtin::Chr,
        Builtin::Divmod,
        Builtin::Enumerate,
        Builtin::Filter,
        Builtin::Hex,
        Builtin::Len,
        Builtin::Map,
        Builtin::Max,
        Builtin::Min,
        Builtin::Ord,
        Builtin::Pow,
        Builtin::Reversed,
        Builtin::Round,
        Builtin::Sorted,
        Builtin::Sum,
        Builtin::Zip,
        Builtin::Time,
        Builtin::Random,
        Builtin::Choice,
    ];

    /// Name scripts call the builtin by.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Bool => "bool",
            Builtin::Float => "float",
            Builtin::Int => "int",
            Builtin::List => "list",
            Builtin::Range => "range",
            Builtin::Str => "str",
            Builtin::Tuple => "tuple",
            Builtin::Dict => "dict",
            Builtin::Set => "set",
            Builtin::Slice => "slice",
            Builtin::Hash => "hash",
            Builtin::Abs => "abs",
            Builtin::All => "all",
            Builtin::Any => "any",
            Builtin::Chr => "chr",
            Builtin::Divmod => "divmod",
            Builtin::Enumerate => "enumerate",
            Builtin::Filter => "filter",
            Builtin::Hex => "hex",
            Builtin::Len => "len",
            Builtin::Map => "map",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Ord => "ord",
            Builtin::Pow => "pow",
            Builtin::Reversed => "reversed",
            Builtin::Round => "round",
            Builtin::Sorted => "sorted",
            Builtin::Sum => "sum",
            Builtin::Zip => "zip",
            Builtin::Time => "time",
            Builtin::Random => "random",
            Builtin::Choice => "choice",
        }
    }

    /// Look up a builtin by script name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Accepted argument counts, inclusive. `usize::MAX` means variadic.
    #[must_use]
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Time | Builtin::Random => (0, 0),
            Builtin::Bool
            | Builtin::Float
            | Builtin::Int
            | Builtin::List
            | Builtin::Str
            | Builtin::Tuple
            | Builtin::Dict
            | Builtin::Set => (0, 1),
            Builtin::Abs
            | Builtin::All
            | Builtin::Any
            | Builtin::Chr
            | Builtin::Hash
            | Builtin::Hex
            | Builtin::Len
            | Builtin::Ord
            | Builtin::Reversed
            | Builtin::Sorted
            | Builtin::Choice => (1, 1),
            Builtin::Divmod | Builtin::Filter | Builtin::Map => (2, 2),
            Builtin::Enumerate | Builtin::Round | Builtin::Slice | Builtin::Sum => (1, 2),
            Builtin::Range => (1, 3),
            Builtin::Pow => (2, 3),
            Builtin::Max | Builtin::Min => (1, usize::MAX),
            Builtin::Zip => (0, usize::MAX),
        }
    }

    /// Whether the interpreter must evaluate this builtin itself.
    #[must_use]
    pub const fn needs_interpreter(self) -> bool {
        matches!(
            self,
            Builtin::Map | Builtin::Filter | Builtin::Time | Builtin::Random | Builtin::Choice
        )
    }
}

/// Check an argument count against a `(min, max)` arity.
///
/// # Errors
///
/// `TypeError` naming the function when the count is outside the range.
pub fn check_arity(name: &str, (min, max): (usize, usize), given: usize) -> ValueResult<()> {
    if given >= min && given <= max {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {min}")
    } else if max == usize::MAX {
        format!("at least {min}")
    } else if given < min {
        format!("at least {min}")
    } else {
        format!("at most {max}")
    };
    let plural = if expected.ends_with(" 1") { "" } else { "s" };
    Err(RuntimeError::type_error(format!(
        "{name}() takes {expected} argument{plural} ({given} given)"
    )))
}

/// Evaluate a pure builtin.
///
/// # Errors
///
/// Raises the same error classes scripts see from the equivalent builtin:
/// `TypeError`, `ValueError`, `OverflowError`, `ZeroDivisionError`,
/// `MemoryError`.
pub fn call(builtin: Builtin, args: &[Value]) -> ValueResult<Value> {
    check_arity(builtin.name(), builtin.arity(), args.len())?;
    match builtin {
        Builtin::Bool => Ok(Value::Bool(args.first().is_some_and(Value::truthy))),
        Builtin::Float => to_float(args.first()),
        Builtin::Int => to_int(args.first()),
        Builtin::Str => Ok(Value::str(&args.first().map(ToString::to_string).unwrap_or_default())),
        Builtin::List => Ok(Value::list(collect(args.first())?)),
        Builtin::Tuple => Ok(Value::tuple(collect(args.first())?)),
        Builtin::Dict => args.first().map_or_else(|| Ok(Dict::default()), to_dict).map(Value::dict),
        Builtin::Set => Ok(Value::set(Set::from_values(collect(args.first())?)?)),
        Builtin::Slice => slice(args),
        Builtin::Hash => Ok(Value::Int(Key::of(&args[0])?.hash_value())),
        Builtin::Range => range(args),
        Builtin::Abs => abs(&args[0]),
        Builtin::All => Ok(Value::Bool(args[0].iter()?.all(|v| v.truthy()))),
        Builtin::Any => Ok(Value::Bool(args[0].iter()?.any(|v| v.truthy()))),
        Builtin::Chr => chr(&args[0]),
        Builtin::Ord => ord(&args[0]),
        Builtin::Divmod => Ok(Value::tuple(vec![
            binary(BinOp::FloorDiv, &args[0], &args[1])?,
            binary(BinOp::Mod, &args[0], &args[1])?,
        ])),
        Builtin::Enumerate => enumerate(args),
        Builtin::Hex => hex(&args[0]),
        Builtin::Len => Ok(Value::Int(len_as_int(args[0].len()?))),
        Builtin::Max => extreme(args, "max", Ordering::Greater),
        Builtin::Min => extreme(args, "min", Ordering::Less),
        Builtin::Pow => pow(args),
        Builtin::Reversed => {
            let mut items = args[0].to_vec()?;
            items.reverse();
            Ok(Value::list(items))
        }
        Builtin::Round => round(args),
        Builtin::Sorted => Ok(Value::list(sorted(args[0].to_vec()?)?)),
        Builtin::Sum => {
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(RuntimeError::type_error("sum() can't sum strings"));
            }
            for v in args[0].iter()? {
                total = binary(BinOp::Add, &total, &v)?;
            }
            Ok(total)
        }
        Builtin::Zip => zip(args),
        Builtin::Map | Builtin::Filter | Builtin::Time | Builtin::Random | Builtin::Choice => {
            Err(RuntimeError::type_error(format!(
                "{}() cannot be evaluated here",
                builtin.name()
            )))
        }
    }
}

fn len_as_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn collect(arg: Option<&Value>) -> ValueResult<Vec<Value>> {
    arg.map_or_else(|| Ok(Vec::new()), Value::to_vec)
}

fn to_dict(arg: &Value) -> ValueResult<Dict> {
    if let Value::Dict(dict) = arg {
        return Ok(dict.borrow().clone());
    }
    let mut dict = Dict::default();
    for (i, pair) in arg.iter()?.enumerate() {
        let items = pair.to_vec().map_err(|_| {
            RuntimeError::type_error(format!(
                "cannot convert dictionary update sequence element #{i} to a sequence"
            ))
        })?;
        let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
            RuntimeError::value_error(format!(
                "dictionary update sequence element #{i} has length {}; 2 is required",
                items.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(dict)
}

fn slice(args: &[Value]) -> ValueResult<Value> {
    let bound = |v: &Value| match v {
        Value::None => Ok(None),
        v => v
            .as_int()
            .map(Some)
            .ok_or_else(|| RuntimeError::type_error("slice indices must be integers or None")),
    };
    let (lower, upper) = match args {
        [upper] => (None, bound(upper)?),
        [lower, upper, ..] => (bound(lower)?, bound(upper)?),
        [] => unreachable!("arity checked"),
    };
    Ok(Value::Slice(SliceBounds { lower, upper }))
}

fn to_float(arg: Option<&Value>) -> ValueResult<Value> {
    let Some(v) = arg else {
        return Ok(Value::Float(0.0));
    };
    if let Some(f) = v.as_float() {
        return Ok(Value::Float(f));
    }
    if let Value::Str(s) = v {
        let text = s.trim();
        return text
            .replace('_', "")
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| RuntimeError::value_error(format!("could not convert string to float: '{s}'")));
    }
    Err(RuntimeError::type_error(format!(
        "float() argument must be a string or a real number, not '{}'",
        v.type_name()
    )))
}

fn to_int(arg: Option<&Value>) -> ValueResult<Value> {
    let Some(v) = arg else {
        return Ok(Value::Int(0));
    };
    match v {
        Value::Float(f) if f.is_nan() => Err(RuntimeError::value_error("cannot convert float NaN to integer")),
        Value::Float(f) => float_to_int(*f)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("cannot convert float infinity to integer")),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| RuntimeError::value_error(format!("invalid literal for int() with base 10: '{s}'"))),
        v => v.as_int().map(Value::Int).ok_or_else(|| {
            RuntimeError::type_error(format!(
                "int() argument must be a string or a real number, not '{}'",
                v.type_name()
            ))
        }),
    }
}

fn int_arg(v: &Value, what: &str) -> ValueResult<i64> {
    v.as_int().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "'{}' object cannot be interpreted as an integer ({what})",
            v.type_name()
        ))
    })
}

fn range(args: &[Value]) -> ValueResult<Value> {
    let ints = args
        .iter()
        .map(|v| int_arg(v, "range"))
        .collect::<ValueResult<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked"),
    };
    if step == 0 {
        return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn abs(v: &Value) -> ValueResult<Value> {
    match v {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        v => match v.as_int() {
            Some(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("integer overflow")),
            None => Err(RuntimeError::type_error(format!(
                "bad operand type for abs(): '{}'",
                v.type_name()
            ))),
        },
    }
}

fn chr(v: &Value) -> ValueResult<Value> {
    let code = int_arg(v, "chr")?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
        .ok_or_else(|| RuntimeError::value_error("chr() arg not in range(0x110000)"))
}

fn ord(v: &Value) -> ValueResult<Value> {
    let Value::Str(s) = v else {
        return Err(RuntimeError::type_error(format!(
            "ord() expected string of length 1, but {} found",
            v.type_name()
        )));
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(RuntimeError::type_error(format!(
            "ord() expected a character, but string of length {} found",
            s.chars().count()
        ))),
    }
}

fn hex(v: &Value) -> ValueResult<Value> {
    let i = int_arg(v, "hex")?;
    let text = if i < 0 {
        format!("-0x{:x}", i.unsigned_abs())
    } else {
        format!("0x{i:x}")
    };
    Ok(Value::str(&text))
}

fn enumerate(args: &[Value]) -> ValueResult<Value> {
    let start = args.get(1).map_or(Ok(0), |v| int_arg(v, "enumerate"))?;
    let mut out = Vec::new();
    let mut index = start;
    ensure_len(args[0].len()?)?;
    for item in args[0].iter()? {
        out.push(Value::tuple(vec![Value::Int(index), item]));
        index = index
            .checked_add(1)
            .ok_or_else(|| RuntimeError::overflow("integer overflow"))?;
    }
    Ok(Value::list(out))
}

fn zip(args: &[Value]) -> ValueResult<Value> {
    let mut iters = args.iter().map(Value::iter).collect::<ValueResult<Vec<_>>>()?;
    let shortest = args.iter().map(Value::len).collect::<ValueResult<Vec<_>>>()?;
    ensure_len(shortest.into_iter().min().unwrap_or(0))?;
    let mut out = Vec::new();
    if iters.is_empty() {
        return Ok(Value::list(out));
    }
    'outer: loop {
        let mut row = Vec::with_capacity(iters.len());
        for it in &mut iters {
            match it.next() {
                Some(v) => row.push(v),
                None => break 'outer,
            }
        }
        out.push(Value::tuple(row));
    }
    Ok(Value::list(out))
}

fn extreme(args: &[Value], name: &str, want: Ordering) -> ValueResult<Value> {
    let candidates = if args.len() == 1 { args[0].to_vec()? } else { args.to_vec() };
    let mut best: Option<Value> = None;
    for v in candidates {
        best = Some(match best {
            None => v,
            Some(current) => {
                if v.partial_order(&current, if want == Ordering::Greater { ">" } else { "<" })? == Some(want) {
                    v
                } else {
                    current
                }
            }
        });
    }
    best.ok_or_else(|| RuntimeError::value_error(format!("{name}() arg is an empty sequence")))
}

/// Stable sort using script ordering.
///
/// # Errors
///
/// `TypeError` when two elements cannot be ordered.
pub fn sorted(mut items: Vec<Value>) -> ValueResult<Vec<Value>> {
    let mut failure = None;
    items.sort_by(|a, b| match a.partial_order(b, "<") {
        Ok(order) => order.unwrap_or(Ordering::Equal),
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(items),
    }
}

fn pow(args: &[Value]) -> ValueResult<Value> {
    let Some(modulus) = args.get(2) else {
        return binary(BinOp::Pow, &args[0], &args[1]);
    };
    let (Some(base), Some(exp), Some(m)) = (args[0].as_int(), args[1].as_int(), modulus.as_int()) else {
        return Err(RuntimeError::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if m == 0 {
        return Err(RuntimeError::value_error("pow() 3rd argument cannot be 0"));
    }
    if exp < 0 {
        return Err(RuntimeError::value_error("pow() 2nd argument cannot be negative"));
    }
    let m128 = i128::from(m);
    let mut result: i128 = 1;
    let mut b = i128::from(base).rem_euclid(m128.abs());
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * b) % m128.abs();
        }
        b = (b * b) % m128.abs();
        e >>= 1;
    }
    // Result takes the sign of the modulus.
    if m < 0 && result != 0 {
        result += m128;
    }
    Ok(Value::Int(i64::try_from(result).unwrap_or(0)))
}

fn round(args: &[Value]) -> ValueResult<Value> {
    let x = &args[0];
    let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(v) => Some(int_arg(v, "round")?),
    };
    match (x, digits) {
        (Value::Float(f), None) => {
            let r = f.round_ties_even();
            if r.is_nan() {
                return Err(RuntimeError::value_error("cannot convert float NaN to integer"));
            }
            float_to_int(r)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("cannot convert float infinity to integer"))
        }
        (Value::Float(f), Some(n)) => {
            let n = i32::try_from(n.clamp(-308, 308)).unwrap_or(0);
            let scale = 10f64.powi(n);
            let scaled = f * scale;
            if !scaled.is_finite() {
                return Ok(Value::Float(*f));
            }
            Ok(Value::Float(scaled.round_ties_even() / scale))
        }
        (v, None) => v.as_int().map(Value::Int).ok_or_else(|| not_number("round", v)),
        (v, Some(n)) => {
            let i = v.as_int().ok_or_else(|| not_number("round", v))?;
            if n >= 0 {
                return Ok(Value::Int(i));
            }
            let scale = 10f64.powi(i32::try_from(-n).unwrap_or(i32::MAX).min(308));
            let r = (int_to_float(i) / scale).round_ties_even() * scale;
            float_to_int(r)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("integer overflow"))
        }
    }
}

fn not_number(name: &str, v: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "type {} doesn't define __{name}__ method",
        v.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    fn show(b: Builtin, args: &[Value]) -> String {
        call(b, args).unwrap().to_string()
    }

    #[test]
    fn test_names_round_trip() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_name(b.name()), Some(b));
        }
        assert_eq!(Builtin::from_name("print"), None);
        assert_eq!(Builtin::from_name("dict"), Some(Builtin::Dict));
        assert_eq!(Builtin::from_name("frozenset"), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(show(Builtin::Int, &[Value::Float(-2.7)]), "-2");
        assert_eq!(show(Builtin::Int, &[Value::str(" 42 ")]), "42");
        assert_eq!(show(Builtin::Float, &[Value::Int(3)]), "3.0");
        assert_eq!(show(Builtin::Str, &[Value::Float(0.5)]), "0.5");
        assert_eq!(show(Builtin::Bool, &[Value::list(vec![])]), "False");
        assert_eq!(call(Builtin::Int, &[Value::str("x")]).unwrap_err().class, "ValueError");
        assert_eq!(call(Builtin::Int, &[Value::Float(f64::NAN)]).unwrap_err().class, "ValueError");
    }

    #[test]
    fn test_round_is_bankers() {
        assert_eq!(show(Builtin::Round, &[Value::Float(2.5)]), "2");
        assert_eq!(show(Builtin::Round, &[Value::Float(3.5)]), "4");
        assert_eq!(show(Builtin::Round, &[Value::Float(-0.5)]), "0");
        assert_eq!(show(Builtin::Round, &[Value::Float(1.25), Value::Int(1)]), "1.2");
        assert_eq!(show(Builtin::Round, &[Value::Int(1250), Value::Int(-2)]), "1200");
    }

    #[test]
    fn test_sequences() {
        assert_eq!(show(Builtin::Sorted, &[ints(&[3, 1, 2])]), "[1, 2, 3]");
        assert_eq!(show(Builtin::Reversed, &[ints(&[1, 2])]), "[2, 1]");
        assert_eq!(show(Builtin::Sum, &[ints(&[1, 2, 3])]), "6");
        assert_eq!(show(Builtin::Max, &[ints(&[1, 9, 2])]), "9");
        assert_eq!(show(Builtin::Min, &[Value::Int(4), Value::Float(2.5)]), "2.5");
        assert_eq!(show(Builtin::Enumerate, &[Value::str("ab"), Value::Int(1)]), "[(1, 'a'), (2, 'b')]");
        assert_eq!(show(Builtin::Zip, &[ints(&[1, 2, 3]), Value::str("ab")]), "[(1, 'a'), (2, 'b')]");
        assert_eq!(show(Builtin::List, &[call(Builtin::Range, &[Value::Int(3)]).unwrap()]), "[0, 1, 2]");
        assert_eq!(show(Builtin::Len, &[Value::str("héllo")]), "5");
        assert!(call(Builtin::All, &[ints(&[])]).unwrap().truthy());
        assert!(!call(Builtin::Any, &[ints(&[0, 0])]).unwrap().truthy());
    }

    #[test]
    fn test_errors() {
        assert_eq!(call(Builtin::Max, &[ints(&[])]).unwrap_err().class, "ValueError");
        assert_eq!(call(Builtin::Range, &[Value::Int(0), Value::Int(5), Value::Int(0)]).unwrap_err().class, "ValueError");
        assert_eq!(call(Builtin::Sorted, &[Value::list(vec![Value::Int(1), Value::str("a")])]).unwrap_err().class, "TypeError");
        let err = call(Builtin::Len, &[]).unwrap_err();
        assert_eq!(err.message, "len() takes exactly 1 argument (0 given)");
        let err = call(Builtin::Len, &[Value::Int(1)]).unwrap_err();
        assert!(err.message.contains("has no len()"));
    }

    #[test]
    fn test_numeric_helpers() {
        assert_eq!(show(Builtin::Abs, &[Value::Int(-4)]), "4");
        assert_eq!(show(Builtin::Divmod, &[Value::Int(-7), Value::Int(2)]), "(-4, 1)");
        assert_eq!(show(Builtin::Pow, &[Value::Int(3), Value::Int(4), Value::Int(5)]), "1");
        assert_eq!(show(Builtin::Pow, &[Value::Int(2), Value::Int(3)]), "8");
        assert_eq!(show(Builtin::Hex, &[Value::Int(255)]), "0xff");
        assert_eq!(show(Builtin::Hex, &[Value::Int(-1)]), "-0x1");
        assert_eq!(show(Builtin::Chr, &[Value::Int(65)]), "A");
        assert_eq!(show(Builtin::Ord, &[Value::str("A")]), "65");
    }

    #[test]
    fn test_dict_set_and_hash() {
        let pairs = Value::list(vec![
            Value::tuple(vec![Value::str("a"), Value::Int(1)]),
            Value::list(vec![Value::str("b"), Value::Int(2)]),
        ]);
        assert_eq!(show(Builtin::Dict, &[pairs]), "{'a': 1, 'b': 2}");
        assert_eq!(show(Builtin::Dict, &[]), "{}");
        let err = call(Builtin::Dict, &[Value::list(vec![Value::tuple(vec![Value::Int(1)])])]).unwrap_err();
        assert_eq!(err.message, "dictionary update sequence element #0 has length 1; 2 is required");
        assert_eq!(call(Builtin::Dict, &[ints(&[1])]).unwrap_err().class, "TypeError");
        assert_eq!(show(Builtin::Set, &[ints(&[3, 1, 3])]), "{3, 1}");
        assert_eq!(show(Builtin::Set, &[]), "set()");
        assert_eq!(show(Builtin::Hash, &[Value::Int(42)]), "42");
        assert_eq!(show(Builtin::Hash, &[Value::Bool(true)]), "1");
        assert_eq!(call(Builtin::Hash, &[ints(&[1])]).unwrap_err().message, "unhashable type: 'list'");
    }

    #[test]
    fn test_slice_objects() {
        assert_eq!(show(Builtin::Slice, &[Value::Int(2)]), "slice(None, 2, None)");
        assert_eq!(show(Builtin::Slice, &[Value::Int(1), Value::None]), "slice(1, None, None)");
        let err = call(Builtin::Slice, &[Value::str("x")]).unwrap_err();
        assert_eq!(err.class, "TypeError");
    }

    #[test]
    fn test_enumerate_stops_at_the_length_limit() {
        let huge = call(Builtin::Range, &[Value::Int(i64::MAX)]).unwrap();
        assert_eq!(call(Builtin::Enumerate, &[huge.clone()]).unwrap_err().class, "MemoryError");
        assert_eq!(call(Builtin::Zip, &[huge.clone(), huge]).unwrap_err().class, "MemoryError");
    }
}
