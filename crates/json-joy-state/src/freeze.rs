use crate::value::Value;

/// Recursively freezes every container reachable from `value` and returns
/// the same value.
///
/// Frozen containers reject any mutation with
/// [`StateError::Frozen`](crate::StateError::Frozen). Scalars are returned
/// untouched. Hidden members are frozen too. The walk keeps a stack of
/// the containers on the current path, so cycles terminate; freezing is
/// idempotent, which makes a plain membership check sufficient.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use json_joy_state::{deep_freeze, StateError, Value};
///
/// let value = deep_freeze(&Value::from(json!({"a": {"b": [1]}})));
/// let inner = value.as_object().unwrap().get("a").unwrap();
/// let err = inner.as_object().unwrap().insert("c", 2).unwrap_err();
/// assert!(matches!(err, StateError::Frozen));
/// ```
pub fn deep_freeze(value: &Value) -> Value {
    let mut visited = Vec::new();
    freeze(value, &mut visited);
    value.clone()
}

fn freeze(value: &Value, visited: &mut Vec<usize>) {
    let Some(addr) = value.container_addr() else {
        return;
    };
    if visited.contains(&addr) {
        return;
    }
    let children = match value {
        Value::Array(arr) => {
            arr.freeze();
            arr.to_vec()
        }
        Value::Object(obj) => {
            obj.freeze();
            obj.own_values()
        }
        _ => return,
    };
    visited.push(addr);
    for child in &children {
        freeze(child, visited);
    }
    visited.pop();
}
