//! Live value model.
//!
//! A [`Value`] is a tagged JSON-like datum. Containers ([`Array`] and
//! [`Object`]) are shared, interior-mutable handles: cloning a `Value`
//! that holds a container shares the container, exactly like references
//! to objects in a dynamic language. This is what lets a live tree hold
//! shared sub-trees and even cycles, which the comparator tolerates and
//! the diff engine rejects. Cyclic graphs are reference-counted cycles
//! and are only reclaimed once the caller breaks them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{StateError, StateResult};
use crate::json::key_cmp;

/// Custom JSON conversion hook attached to an [`Object`].
pub type Serializer = Rc<dyn Fn(&Object) -> Value>;

/// Runtime kind of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

/// A live JSON-like value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns true when both values hold the very same container.
    pub fn same_container(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Identity of the container held by this value, used by the
    /// visited stacks of the comparator, the diff engine and the freezer.
    pub(crate) fn container_addr(&self) -> Option<usize> {
        match self {
            Value::Array(arr) => Some(arr.addr()),
            Value::Object(obj) => Some(obj.addr()),
            _ => None,
        }
    }

    /// JSON form of this value, see [`crate::json::to_json`].
    pub fn to_json(&self) -> StateResult<serde_json::Value> {
        crate::json::to_json(self)
    }
}

/// SameValue structural equality, see [`crate::equal::equals`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::equal::equals(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = Vec::new();
        debug_value(self, f, &mut stack)
    }
}

fn debug_value(value: &Value, f: &mut fmt::Formatter<'_>, stack: &mut Vec<usize>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write!(f, "{n:?}"),
        Value::String(s) => write!(f, "{s:?}"),
        Value::Array(arr) => {
            if stack.contains(&arr.addr()) {
                return f.write_str("[Circular]");
            }
            stack.push(arr.addr());
            f.write_str("[")?;
            for (i, item) in arr.to_vec().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                debug_value(item, f, stack)?;
            }
            stack.pop();
            f.write_str("]")
        }
        Value::Object(obj) => {
            if stack.contains(&obj.addr()) {
                return f.write_str("{Circular}");
            }
            stack.push(obj.addr());
            f.write_str("{")?;
            for (i, (key, item)) in obj.entries().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key:?}: ")?;
                debug_value(item, f, stack)?;
            }
            stack.pop();
            f.write_str("}")
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Value::Array(arr)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from(items))
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        crate::json::from_json(json)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        crate::json::from_json(&json)
    }
}

#[derive(Default)]
struct ArrayData {
    items: Vec<Value>,
    frozen: bool,
}

/// Shared handle to a mutable array.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<ArrayData>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    /// Snapshot of the current items. Containers inside are shared.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Writes `value` at `index`; writing past the end pads with `Null`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> StateResult<()> {
        let mut data = self.writable()?;
        if index >= data.items.len() {
            data.items.resize(index + 1, Value::Null);
        }
        data.items[index] = value.into();
        Ok(())
    }

    pub fn push(&self, value: impl Into<Value>) -> StateResult<()> {
        self.writable()?.items.push(value.into());
        Ok(())
    }

    pub fn pop(&self) -> StateResult<Option<Value>> {
        Ok(self.writable()?.items.pop())
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> StateResult<()> {
        let mut data = self.writable()?;
        let index = index.min(data.items.len());
        data.items.insert(index, value.into());
        Ok(())
    }

    pub fn remove(&self, index: usize) -> StateResult<Option<Value>> {
        let mut data = self.writable()?;
        if index < data.items.len() {
            Ok(Some(data.items.remove(index)))
        } else {
            Ok(None)
        }
    }

    pub fn truncate(&self, len: usize) -> StateResult<()> {
        self.writable()?.items.truncate(len);
        Ok(())
    }

    pub fn clear(&self) -> StateResult<()> {
        self.writable()?.items.clear();
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub(crate) fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn writable(&self) -> StateResult<std::cell::RefMut<'_, ArrayData>> {
        let data = self.0.borrow_mut();
        if data.frozen {
            return Err(StateError::Frozen);
        }
        Ok(data)
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Array(Rc::new(RefCell::new(ArrayData {
            items,
            frozen: false,
        })))
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Array::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Array(self.clone()), f)
    }
}

#[derive(Default)]
struct ObjectData {
    members: BTreeMap<String, Value>,
    hidden: BTreeMap<String, Value>,
    serializer: Option<Serializer>,
    frozen: bool,
}

/// Shared handle to a mutable string-keyed object.
///
/// Besides its enumerable members an object may carry hidden
/// (non-enumerable) members, which take part in structural equality but
/// are invisible to the diff engine and dropped from JSON, and an
/// optional custom [`Serializer`] that replaces the object's JSON form.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object whose JSON form is produced by `serializer`.
    pub fn with_serializer<F>(serializer: F) -> Self
    where
        F: Fn(&Object) -> Value + 'static,
    {
        let obj = Self::new();
        obj.0.borrow_mut().serializer = Some(Rc::new(serializer));
        obj
    }

    /// Number of enumerable members.
    pub fn len(&self) -> usize {
        self.0.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().members.is_empty()
    }

    /// Enumerable member lookup.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().members.get(key).cloned()
    }

    /// Hidden member lookup.
    pub fn get_hidden(&self, key: &str) -> Option<Value> {
        self.0.borrow().hidden.get(key).cloned()
    }

    /// True if `key` is an own member, enumerable or hidden.
    pub fn contains_key(&self, key: &str) -> bool {
        let data = self.0.borrow();
        data.members.contains_key(key) || data.hidden.contains_key(key)
    }

    /// Assigns `key`. Assigning to an existing hidden member keeps it
    /// hidden.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> StateResult<Option<Value>> {
        let key = key.into();
        let value = value.into();
        let mut data = self.writable()?;
        if let Some(slot) = data.hidden.get_mut(&key) {
            return Ok(Some(std::mem::replace(slot, value)));
        }
        Ok(data.members.insert(key, value))
    }

    /// Defines (or redefines) `key` as a hidden member.
    pub fn define_hidden(&self, key: impl Into<String>, value: impl Into<Value>) -> StateResult<()> {
        let key = key.into();
        let mut data = self.writable()?;
        data.members.remove(&key);
        data.hidden.insert(key, value.into());
        Ok(())
    }

    /// Removes an own member, enumerable or hidden.
    pub fn remove(&self, key: &str) -> StateResult<Option<Value>> {
        let mut data = self.writable()?;
        match data.members.remove(key) {
            Some(value) => Ok(Some(value)),
            None => Ok(data.hidden.remove(key)),
        }
    }

    /// Removes every own member, enumerable and hidden.
    pub fn clear(&self) -> StateResult<()> {
        let mut data = self.writable()?;
        data.members.clear();
        data.hidden.clear();
        Ok(())
    }

    /// Enumerable member names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.borrow().members.keys().cloned().collect();
        keys.sort_by(|a, b| key_cmp(a, b));
        keys
    }

    /// All own member names, enumerable and hidden, in sorted order.
    pub fn own_keys(&self) -> Vec<String> {
        let data = self.0.borrow();
        let mut keys: Vec<String> = data.members.keys().chain(data.hidden.keys()).cloned().collect();
        keys.sort_by(|a, b| key_cmp(a, b));
        keys
    }

    /// Enumerable members in sorted key order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .0
            .borrow()
            .members
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| key_cmp(&a.0, &b.0));
        entries
    }

    /// Own member lookup regardless of enumerability.
    pub(crate) fn get_own(&self, key: &str) -> Option<Value> {
        let data = self.0.borrow();
        data.members.get(key).or_else(|| data.hidden.get(key)).cloned()
    }

    /// Every own member value, enumerable and hidden.
    pub(crate) fn own_values(&self) -> Vec<Value> {
        let data = self.0.borrow();
        data.members.values().chain(data.hidden.values()).cloned().collect()
    }

    pub fn serializer(&self) -> Option<Serializer> {
        self.0.borrow().serializer.clone()
    }

    pub fn set_serializer<F>(&self, serializer: F) -> StateResult<()>
    where
        F: Fn(&Object) -> Value + 'static,
    {
        self.writable()?.serializer = Some(Rc::new(serializer));
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub(crate) fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn writable(&self) -> StateResult<std::cell::RefMut<'_, ObjectData>> {
        let data = self.0.borrow_mut();
        if data.frozen {
            return Err(StateError::Frozen);
        }
        Ok(data)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let members = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Object(Rc::new(RefCell::new(ObjectData {
            members,
            ..ObjectData::default()
        })))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Object(self.clone()), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clone_shares_containers() {
        let obj = Object::new();
        let alias = Value::Object(obj.clone());
        obj.insert("a", 1).unwrap();
        assert_eq!(alias.as_object().unwrap().get("a"), Some(Value::Number(1.0)));
        assert!(alias.same_container(&Value::Object(obj)));
    }

    #[test]
    fn array_set_past_end_pads_with_null() {
        let arr = Array::new();
        arr.set(2, "x").unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr.get(0).unwrap().is_null());
        assert_eq!(arr.get(2).unwrap().as_str(), Some("x"));
    }

    #[test]
    fn hidden_members_stay_hidden_on_assignment() {
        let obj = Object::new();
        obj.define_hidden("secret", 1).unwrap();
        obj.insert("secret", 2).unwrap();
        assert!(obj.get("secret").is_none());
        assert_eq!(obj.get_hidden("secret").unwrap().as_f64(), Some(2.0));
        assert!(obj.keys().is_empty());
        assert_eq!(obj.own_keys(), vec!["secret".to_string()]);
    }

    #[test]
    fn keys_are_sorted() {
        let value = Value::from(json!({"b": 1, "a": 2, "c": 3}));
        assert_eq!(value.as_object().unwrap().keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn debug_output_survives_cycles() {
        let obj = Object::new();
        obj.insert("self", obj.clone()).unwrap();
        let rendered = format!("{:?}", Value::Object(obj));
        assert_eq!(rendered, r#"{"self": {Circular}}"#);
    }

    #[test]
    fn remove_reaches_hidden_members() {
        let obj = Object::new();
        obj.define_hidden("h", true).unwrap();
        assert!(obj.contains_key("h"));
        assert_eq!(obj.remove("h").unwrap().and_then(|v| v.as_bool()), Some(true));
        assert!(!obj.contains_key("h"));
    }
}
