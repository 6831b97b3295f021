//! Record keys and key-path evaluation

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use crate::engine::{EngineError, EngineResult};

/// Largest integer a key generator or an f64 can represent exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A valid engine key: a finite number or a string.
///
/// Keys are totally ordered: every number sorts before every string, numbers
/// compare numerically and strings compare by UTF-16 code unit, matching the
/// ordering IndexedDB applies to the same key types.
///
/// The representation is private; every constructor validates, so a `Key`
/// never holds NaN, an infinity, `-0.0` or an integer rounded past 2^53.
#[derive(Debug, Clone)]
pub struct Key(Repr);

#[derive(Debug, Clone)]
enum Repr {
    Number(f64),
    String(String),
}

/// Borrowed view of a key, for engines that map keys onto their own types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyRef<'a> {
    Number(f64),
    String(&'a str),
}

impl Key {
    /// Build a numeric key, rejecting NaN and infinities.
    pub fn number(n: f64) -> EngineResult<Self> {
        if !n.is_finite() {
            return Err(EngineError::data(format!("{} is not a valid key", n)));
        }
        // Collapses -0.0 into 0.0
        Ok(Key(Repr::Number(n + 0.0)))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Key(Repr::String(s.into()))
    }

    /// Interpret a record value as a key.
    pub fn from_value(value: &Value) -> EngineResult<Self> {
        match value {
            Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Key::try_from(i),
                (_, Some(u), _) => Key::try_from(u),
                (_, _, Some(f)) => Key::number(f),
                _ => Err(EngineError::data(format!("{} is not a valid key", n))),
            },
            Value::String(s) => Ok(Key::string(s.as_str())),
            other => Err(EngineError::data(format!(
                "{} is not a valid key",
                type_name(other)
            ))),
        }
    }

    /// Render the key as a record value. Integral numbers become JSON integers.
    pub fn to_value(&self) -> Value {
        match &self.0 {
            Repr::Number(n) if is_safe_integer(*n) => Value::from(*n as i64),
            Repr::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Repr::String(s) => Value::String(s.clone()),
        }
    }

    pub fn as_key_ref(&self) -> KeyRef<'_> {
        match &self.0 {
            Repr::Number(n) => KeyRef::Number(*n),
            Repr::String(s) => KeyRef::String(s),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.0 {
            Repr::Number(n) => Some(*n),
            Repr::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.0 {
            Repr::Number(_) => None,
            Repr::String(s) => Some(s),
        }
    }
}

fn is_safe_integer(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            // Finite and never -0.0, so total order equals numeric order
            (Repr::Number(a), Repr::Number(b)) => a.total_cmp(b),
            (Repr::Number(_), Repr::String(_)) => Ordering::Less,
            (Repr::String(_), Repr::Number(_)) => Ordering::Greater,
            (Repr::String(a), Repr::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Number(n) if is_safe_integer(*n) => write!(f, "{}", *n as i64),
            Repr::Number(n) => write!(f, "{}", n),
            Repr::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::string(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::string(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::string(s.as_str())
    }
}

/// Integer types that always fit in an f64 exactly.
macro_rules! impl_key_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(n: $ty) -> Self {
                    Key(Repr::Number(f64::from(n)))
                }
            }
        )*
    };
}

impl_key_from_int!(i8, i16, i32, u8, u16, u32);

/// Wider integers are only keys up to 2^53 in magnitude; past that, distinct
/// integers would round to the same f64.
macro_rules! impl_key_try_from_int {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<$ty> for Key {
                type Error = EngineError;

                fn try_from(n: $ty) -> EngineResult<Self> {
                    if (n as i128).unsigned_abs() > MAX_SAFE_INTEGER as u128 {
                        return Err(EngineError::data(format!(
                            "{} is not exactly representable as a key",
                            n
                        )));
                    }
                    Ok(Key(Repr::Number(n as f64)))
                }
            }
        )*
    };
}

impl_key_try_from_int!(i64, isize, u64, usize);

impl TryFrom<f64> for Key {
    type Error = EngineError;

    fn try_from(n: f64) -> EngineResult<Self> {
        Key::number(n)
    }
}

impl TryFrom<&Value> for Key {
    type Error = EngineError;

    fn try_from(value: &Value) -> EngineResult<Self> {
        Key::from_value(value)
    }
}

/// Evaluate a dotted key path (`"profile.id"`) against a record.
///
/// The empty path selects the record itself. Returns `None` when any segment
/// is missing or walks through a non-object.
pub fn evaluate_key_path<'a>(path: &str, record: &'a Value) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

/// Write a generated key into a record at the given key path, creating
/// intermediate objects as needed.
pub fn inject_key(path: &str, record: &mut Value, key: &Key) -> EngineResult<()> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments
        .pop()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::data("cannot inject a key at an empty key path"))?;

    let mut current = record;
    for segment in segments {
        let object = current.as_object_mut().ok_or_else(|| {
            EngineError::data(format!("cannot inject key at '{}': not an object", path))
        })?;
        current = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let object = current.as_object_mut().ok_or_else(|| {
        EngineError::data(format!("cannot inject key at '{}': not an object", path))
    })?;
    object.insert(last.to_string(), key.to_value());
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_sort_before_strings() {
        let mut keys = vec![Key::from("b"), Key::from(10), Key::from("a"), Key::from(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::from(2), Key::from(10), Key::from("a"), Key::from("b")]
        );
    }

    #[test]
    fn test_negative_zero_equals_zero() {
        assert_eq!(Key::number(-0.0).unwrap(), Key::from(0));
    }

    #[test]
    fn test_negative_zero_sorts_as_zero() {
        let zero = Key::from(0);
        let negative_zero = Key::number(-0.0).unwrap();
        assert_eq!(negative_zero.cmp(&zero), Ordering::Equal);
        assert_eq!(Key::from_value(&json!(-0.0)).unwrap(), zero);
        assert_eq!(negative_zero.as_f64().map(f64::is_sign_negative), Some(false));
    }

    #[test]
    fn test_non_finite_numbers_are_not_keys() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Key::try_from(n).unwrap_err();
            assert_eq!(err.kind, crate::engine::EngineErrorKind::DataError);
        }
    }

    #[test]
    fn test_wide_integers_within_safe_range() {
        let max = 1u64 << 53;
        assert_eq!(Key::try_from(max).unwrap().to_value(), json!(max));
        assert_eq!(Key::try_from(-(max as i64)).unwrap().to_string(), "-9007199254740992");
        assert_eq!(Key::try_from(42usize).unwrap(), Key::from(42));
    }

    #[test]
    fn test_wide_integers_past_safe_range_rejected() {
        let max = 1u64 << 53;
        assert!(Key::try_from(max + 1).is_err());
        assert!(Key::try_from(u64::MAX).is_err());
        assert!(Key::try_from(i64::MIN).is_err());
        assert!(Key::from_value(&json!(max + 1)).is_err());
    }

    #[test]
    fn test_from_value_rejects_invalid_keys() {
        assert!(Key::from_value(&json!(null)).is_err());
        assert!(Key::from_value(&json!(true)).is_err());
        assert!(Key::from_value(&json!({"a": 1})).is_err());
        assert!(Key::from_value(&json!([1, 2])).is_err());
        assert!(Key::number(f64::NAN).is_err());
    }

    #[test]
    fn test_to_value_keeps_integers() {
        assert_eq!(Key::from(7).to_value(), json!(7));
        assert_eq!(Key::number(1.5).unwrap().to_value(), json!(1.5));
        assert_eq!(Key::from("x").to_value(), json!("x"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::from(3).to_string(), "3");
        assert_eq!(Key::from("id").to_string(), "\"id\"");
    }

    #[test]
    fn test_evaluate_nested_key_path() {
        let record = json!({"id": "1", "profile": {"email": "a@b.c"}});
        assert_eq!(evaluate_key_path("id", &record), Some(&json!("1")));
        assert_eq!(
            evaluate_key_path("profile.email", &record),
            Some(&json!("a@b.c"))
        );
        assert_eq!(evaluate_key_path("profile.phone", &record), None);
        assert_eq!(evaluate_key_path("id.deeper", &record), None);
        assert_eq!(evaluate_key_path("", &record), Some(&record));
    }

    #[test]
    fn test_inject_key_creates_parents() {
        let mut record = json!({"name": "Jane"});
        inject_key("meta.id", &mut record, &Key::from(4)).unwrap();
        assert_eq!(record, json!({"name": "Jane", "meta": {"id": 4}}));
    }

    #[test]
    fn test_inject_key_into_non_object_fails() {
        let mut record = json!("plain");
        assert!(inject_key("id", &mut record, &Key::from(1)).is_err());
    }
}
