//! Structural equality over live values.

use crate::json::normalize;
use crate::value::{Array, Object, Value};

/// SameValue number identity: `NaN` equals itself, `+0` and `-0` differ.
pub fn same_value(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a.to_bits() == b.to_bits()
}

/// Performs a deep equality check between two live values.
///
/// - objects declaring a custom serializer that yields a scalar compare as
///   that scalar;
/// - numbers compare with [`same_value`];
/// - arrays compare by length then element-wise;
/// - objects compare their sorted own member names (hidden members
///   included) and then the member values.
///
/// Cycles are tolerated: each side keeps a stack of the containers being
/// visited, and a container met again on its own stack is equal to its
/// counterpart only if both sit at the same stack position. This rule is
/// positional, not an isomorphism check: two differently shaped cyclic
/// graphs can compare equal when their traversals happen to line up.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use json_joy_state::{equals, Value};
///
/// let a = Value::from(json!({"foo": [1, 2, 3]}));
/// let b = Value::from(json!({"foo": [1, 2, 3]}));
/// assert!(equals(&a, &b));
/// assert!(!equals(&Value::from(0.0), &Value::from(-0.0)));
/// assert!(equals(&Value::from(f64::NAN), &Value::from(f64::NAN)));
/// ```
pub fn equals(a: &Value, b: &Value) -> bool {
    let mut visited_a = Vec::new();
    let mut visited_b = Vec::new();
    equals_inner(a, b, &mut visited_a, &mut visited_b)
}

fn equals_inner(a: &Value, b: &Value, visited_a: &mut Vec<usize>, visited_b: &mut Vec<usize>) -> bool {
    if let Some(a) = normalize(a) {
        return equals_inner(&a, b, visited_a, visited_b);
    }
    if let Some(b) = normalize(b) {
        return equals_inner(a, &b, visited_a, visited_b);
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => same_value(*a, *b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            if arr_a.ptr_eq(arr_b) {
                return true;
            }
            if let Some(result) = revisit(arr_a.addr(), arr_b.addr(), visited_a, visited_b) {
                return result;
            }
            visited_a.push(arr_a.addr());
            visited_b.push(arr_b.addr());
            let result = arrays_equal(arr_a, arr_b, visited_a, visited_b);
            visited_a.pop();
            visited_b.pop();
            result
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            if obj_a.ptr_eq(obj_b) {
                return true;
            }
            if let Some(result) = revisit(obj_a.addr(), obj_b.addr(), visited_a, visited_b) {
                return result;
            }
            visited_a.push(obj_a.addr());
            visited_b.push(obj_b.addr());
            let result = objects_equal(obj_a, obj_b, visited_a, visited_b);
            visited_a.pop();
            visited_b.pop();
            result
        }
        // Different kinds are never equal
        _ => false,
    }
}

/// Position-based verdict for a pair where either side is already being
/// visited; `None` when neither is.
fn revisit(a: usize, b: usize, visited_a: &[usize], visited_b: &[usize]) -> Option<bool> {
    let pos_a = visited_a.iter().position(|&addr| addr == a);
    let pos_b = visited_b.iter().position(|&addr| addr == b);
    if pos_a.is_none() && pos_b.is_none() {
        return None;
    }
    Some(pos_a == pos_b)
}

fn arrays_equal(a: &Array, b: &Array, visited_a: &mut Vec<usize>, visited_b: &mut Vec<usize>) -> bool {
    let items_a = a.to_vec();
    let items_b = b.to_vec();
    if items_a.len() != items_b.len() {
        return false;
    }
    items_a
        .iter()
        .zip(items_b.iter())
        .all(|(x, y)| equals_inner(x, y, visited_a, visited_b))
}

fn objects_equal(a: &Object, b: &Object, visited_a: &mut Vec<usize>, visited_b: &mut Vec<usize>) -> bool {
    let keys_a = a.own_keys();
    let keys_b = b.own_keys();
    if keys_a.len() != keys_b.len() {
        return false;
    }
    for (key_a, key_b) in keys_a.iter().zip(keys_b.iter()) {
        if key_a != key_b {
            return false;
        }
        match (a.get_own(key_a), b.get_own(key_b)) {
            (Some(x), Some(y)) => {
                if !equals_inner(&x, &y, visited_a, visited_b) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}
