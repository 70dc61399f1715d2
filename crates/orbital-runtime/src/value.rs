//! Helpers over runtime values.
//!
//! Runtime values are plain `serde_json::Value`s. Numbers are computed as
//! `f64` and written back through [`number`], so integral results compare
//! equal to JSON integer literals.

use orbital_ir::json_number;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Wraps an `f64` result.
pub fn number(n: f64) -> Value {
    json_number(n)
}

/// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The numeric value of a JSON number.
pub fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Loose numeric coercion used by arithmetic: numbers, numeric strings and
/// booleans convert; everything else is `None`.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Structural equality. Numbers compare by value, so `1` equals `1.0`.
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| equals(x, y)))
        }
        _ => a == b,
    }
}

/// Ordering for comparison operators: numbers by value, strings
/// lexicographically. Mixed or non-scalar operands are unordered.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => to_number(a)?.partial_cmp(&to_number(b)?),
    }
}

/// Total order used for sorting: null < bool < number < string < others.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            compare(a, b).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// String form used for concatenation and object keys. Strings are
/// unquoted, `null` is empty, everything else is compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => format!("{f}"),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Name of a value's JSON type, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True for null, `""`, `[]` and `{}`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Follows a dotted path through objects and arrays. Numeric segments index
/// arrays. Missing steps yield `None`.
pub fn get_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, step)
}

/// Follows already-split segments.
pub fn get_segments<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |v, segment| step(v, segment))
}

fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Returns a copy of `value` with the dotted path set, creating
/// intermediate objects as needed.
pub fn set_path(value: &Value, path: &str, new_value: Value) -> Value {
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(value, &segments, new_value)
}

fn set_segments(value: &Value, segments: &[&str], new_value: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return new_value;
    };
    match value {
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if index < items.len() {
                    let mut items = items.clone();
                    items[index] = set_segments(&items[index], rest, new_value);
                    return Value::Array(items);
                }
            }
            value.clone()
        }
        Value::Object(map) => {
            let mut map = map.clone();
            let child = map.get(*head).cloned().unwrap_or(Value::Null);
            map.insert(head.to_string(), set_segments(&child, rest, new_value));
            Value::Object(map)
        }
        _ => {
            let mut map = Map::new();
            map.insert(head.to_string(), set_segments(&Value::Null, rest, new_value));
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!truthy(&falsy), "{falsy}");
        }
        for truthy_value in [json!(true), json!(1), json!("0"), json!([]), json!({})] {
            assert!(truthy(&truthy_value), "{truthy_value}");
        }
    }

    #[test]
    fn test_numeric_equality() {
        assert!(equals(&json!(1), &json!(1.0)));
        assert!(equals(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!equals(&json!([1, 2]), &json!([2, 1])));
        assert!(!equals(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(null), &json!(1)), None);
        assert_eq!(compare(&json!([1]), &json!(1)), None);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&json!(3.0)), "3");
        assert_eq!(to_text(&json!(2.5)), "2.5");
        assert_eq!(to_text(&json!(null)), "");
        assert_eq!(to_text(&json!(true)), "true");
        assert_eq!(to_text(&json!([1])), "[1]");
    }

    #[test]
    fn test_paths() {
        let value = json!({"a": {"b": [10, {"c": 3}]}});
        assert_eq!(get_path(&value, "a.b.1.c"), Some(&json!(3)));
        assert_eq!(get_path(&value, "a.x.y"), None);
        assert_eq!(get_path(&value, ""), Some(&value));

        let updated = set_path(&value, "a.d.e", json!(1));
        assert_eq!(updated["a"]["d"]["e"], json!(1));
        assert_eq!(updated["a"]["b"], value["a"]["b"]);
        // Input is untouched.
        assert!(value["a"].get("d").is_none());
    }
}
