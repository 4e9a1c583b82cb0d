//! JSON normalization and deterministic serialization.
//!
//! [`to_json`] is the "serialize then deserialize" round trip applied to a
//! live value: hidden members are dropped, custom serializers are applied,
//! non-finite numbers become `null` and `-0` becomes `0`. [`stringify`]
//! renders a plain JSON tree with object keys sorted at every level.

use std::cmp::Ordering;

use serde_json::{Map, Number};

use crate::error::{StateError, StateResult};
use crate::value::{Array, Object, Value};

/// `2^63` and `2^64` as floats, the integer ranges of `i64` and `u64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

/// Object key ordering: lexicographic over UTF-16 code units.
///
/// This differs from byte order only for characters outside the Basic
/// Multilingual Plane compared against `U+E000..=U+FFFF`.
pub fn key_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Converts a live value into its JSON form.
///
/// Fails with [`StateError::CyclicValue`] when a container is reachable
/// from itself. Shared, non-cyclic sub-trees are simply duplicated.
pub fn to_json(value: &Value) -> StateResult<serde_json::Value> {
    let mut stack = Vec::new();
    to_json_inner(value, &mut stack)
}

fn to_json_inner(value: &Value, stack: &mut Vec<usize>) -> StateResult<serde_json::Value> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => Ok(number_to_json(*n)),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Array(arr) => array_to_json(arr, stack),
        Value::Object(obj) => match obj.serializer() {
            Some(serializer) => {
                let replacement = serializer(obj);
                match &replacement {
                    // An object serializing to itself is written member-wise.
                    Value::Object(inner) if inner.ptr_eq(obj) => members_to_json(obj, stack),
                    _ => {
                        enter(obj.addr(), stack)?;
                        let json = to_json_inner(&replacement, stack);
                        stack.pop();
                        json
                    }
                }
            }
            None => members_to_json(obj, stack),
        },
    }
}

fn enter(addr: usize, stack: &mut Vec<usize>) -> StateResult<()> {
    if stack.contains(&addr) {
        return Err(StateError::CyclicValue);
    }
    stack.push(addr);
    Ok(())
}

fn array_to_json(arr: &Array, stack: &mut Vec<usize>) -> StateResult<serde_json::Value> {
    enter(arr.addr(), stack)?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr.to_vec() {
        out.push(to_json_inner(&item, stack)?);
    }
    stack.pop();
    Ok(serde_json::Value::Array(out))
}

fn members_to_json(obj: &Object, stack: &mut Vec<usize>) -> StateResult<serde_json::Value> {
    enter(obj.addr(), stack)?;
    let mut out = Map::new();
    for (key, item) in obj.entries() {
        out.insert(key, to_json_inner(&item, stack)?);
    }
    stack.pop();
    Ok(serde_json::Value::Object(out))
}

/// JSON form of a number: non-finite values become `null`, `-0` becomes
/// `0` and integral values are stored as integers.
///
/// Integral values in the `i64` or `u64` range print as plain digits.
/// Magnitudes of `2^64` and above keep the float form, such as `1e20`.
pub fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n == 0.0 {
        return serde_json::Value::Number(Number::from(0));
    }
    if n.fract() == 0.0 {
        if (-I64_BOUND..I64_BOUND).contains(&n) {
            return serde_json::Value::Number(Number::from(n as i64));
        }
        if n > 0.0 && n < U64_BOUND {
            return serde_json::Value::Number(Number::from(n as u64));
        }
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Builds a fresh live tree from plain JSON. No containers are shared.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect::<Object>(),
        ),
    }
}

/// Normalized scalar form of `value`, if it has one.
///
/// Only objects declaring a custom serializer can normalize to a scalar.
/// Conversion failures are ignored and yield `None`.
pub(crate) fn normalize(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    if obj.serializer().is_none() {
        return None;
    }
    match to_json(value) {
        Ok(json) if !json.is_object() && !json.is_array() => Some(from_json(&json)),
        _ => None,
    }
}

/// Parses JSON text.
pub fn parse(text: &str) -> StateResult<serde_json::Value> {
    serde_json::from_str(text).map_err(|err| StateError::InvalidData(err.to_string()))
}

/// Serializes `val` to a deterministic JSON string with sorted object keys.
pub fn stringify(val: &serde_json::Value) -> String {
    let mut out = String::new();
    write_value(&mut out, val);
    out
}

fn write_value(out: &mut String, val: &serde_json::Value) {
    match val {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&n.to_string()),
        serde_json::Value::String(s) => write_string(out, s),
        serde_json::Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        serde_json::Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort_by(|a, b| key_cmp(a, b));
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &obj[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn astral_keys_sort_before_high_bmp_keys() {
        // U+1F600 encodes as a 0xD83D surrogate, below U+FF01.
        let val = json!({"\u{FF01}": 1, "\u{1F600}": 2, "a": 0});
        assert_eq!(stringify(&val), "{\"a\":0,\"\u{1F600}\":2,\"\u{FF01}\":1}");
    }

    #[test]
    fn empty_key_sorts_first_at_every_level() {
        let val = json!({"a": null, "": {"b": 1, "a": 2, "": []}});
        assert_eq!(stringify(&val), r#"{"":{"":[],"a":2,"b":1},"a":null}"#);
    }

    #[test]
    fn large_integers_print_without_exponent() {
        assert_eq!(stringify(&number_to_json(1e19)), "10000000000000000000");
        assert_eq!(stringify(&number_to_json(2f64.powi(53) + 2.0)), "9007199254740994");
        assert_eq!(stringify(&number_to_json(-2f64.powi(60))), "-1152921504606846976");
        assert_eq!(from_json(&number_to_json(1e19)).as_f64(), Some(1e19));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(stringify(&json!("say \"hi\"\n")), r#""say \"hi\"\n""#);
        assert_eq!(stringify(&json!("\u{0001}")), r#""\u0001""#);
    }

    #[test]
    fn key_cmp_uses_utf16_order() {
        assert_eq!(key_cmp("a", "b"), Ordering::Less);
        assert_eq!(key_cmp("", "a"), Ordering::Less);
        // U+1F600 is a surrogate pair starting at 0xD83D, below U+FF01.
        assert_eq!(key_cmp("\u{1F600}", "\u{FF01}"), Ordering::Less);
    }

    #[test]
    fn numbers_follow_json_rules() {
        assert_eq!(number_to_json(f64::NAN), json!(null));
        assert_eq!(number_to_json(f64::INFINITY), json!(null));
        assert_eq!(stringify(&number_to_json(-0.0)), "0");
        assert_eq!(stringify(&number_to_json(3.0)), "3");
        assert_eq!(stringify(&number_to_json(1.5)), "1.5");
    }

    #[test]
    fn hidden_members_are_dropped() {
        let obj = Object::new();
        obj.insert("shown", 1).unwrap();
        obj.define_hidden("hidden", 2).unwrap();
        assert_eq!(to_json(&Value::Object(obj)).unwrap(), json!({"shown": 1}));
    }

    #[test]
    fn cycles_fail() {
        let arr = Array::new();
        arr.push(arr.clone()).unwrap();
        assert!(matches!(to_json(&Value::Array(arr)), Err(StateError::CyclicValue)));
    }

    #[test]
    fn shared_subtrees_are_duplicated() {
        let shared = Value::from(json!({"x": 1}));
        let root = Array::from(vec![shared.clone(), shared]);
        assert_eq!(to_json(&Value::Array(root)).unwrap(), json!([{"x": 1}, {"x": 1}]));
    }

    #[test]
    fn custom_serializer_replaces_object() {
        let stamp = Object::with_serializer(|_| Value::from("2024-01-01"));
        stamp.insert("year", 2024).unwrap();
        assert_eq!(to_json(&Value::Object(stamp.clone())).unwrap(), json!("2024-01-01"));
        assert_eq!(normalize(&Value::Object(stamp)), Some(Value::from("2024-01-01")));
    }

    #[test]
    fn plain_objects_do_not_normalize() {
        assert!(normalize(&Value::from(json!({"a": 1}))).is_none());
        assert!(normalize(&Value::from(1)).is_none());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse("{"), Err(StateError::InvalidData(_))));
    }
}
