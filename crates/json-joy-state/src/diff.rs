//! Notification diff between the committed snapshot and the live value.
//!
//! The walk mirrors [`crate::equal::equals`] (same SameValue number rule)
//! but emits events while it goes:
//!
//! - a key present only in the live value fires the addition observers of
//!   the parent path,
//! - a key present only in the snapshot fires the deletion observers of
//!   the parent path,
//! - a scalar or kind mismatch fires the value-changed observers of the
//!   exact path,
//! - a container level where anything changed fires the value-changed
//!   observers of its own path with the live container, so every ancestor
//!   of a change hears about it.
//!
//! Objects with a custom serializer are diffed in their serialized form,
//! the same form the commit stores, whatever kind it has.
//!
//! Unlike the comparator, the diff does not support cyclic graphs. The
//! live tree is checked for cycles before any observer runs, and a live
//! container met again on the current path is rejected as well.

use std::cell::RefCell;
use std::collections::BTreeMap;

use log::trace;
use serde_json::{Map, Value as JsonValue};

use crate::equal::same_value;
use crate::error::{StateError, StateResult};
use crate::json::{from_json, key_cmp, to_json};
use crate::observer::Registries;
use crate::path::{join, PathKey, PathStep};
use crate::value::{Array, Object, Value};

/// Diffs `old` against `new`, firing observers from `registries`.
/// Returns whether anything changed.
pub(crate) fn notify(old: &JsonValue, new: &Value, registries: &RefCell<Registries>) -> StateResult<bool> {
    match to_json(new) {
        Err(StateError::CyclicValue) => return Err(StateError::CyclicReference),
        Err(err) => return Err(err),
        Ok(_) => {}
    }
    let mut diff = Diff {
        registries,
        path: Vec::new(),
        visited: Vec::new(),
    };
    diff.compare(old, new)
}

/// Serialized form of an object declaring a custom serializer, as a fresh
/// live tree; `None` for every other value.
fn serialized(value: &Value) -> StateResult<Option<Value>> {
    match value {
        Value::Object(obj) if obj.serializer().is_some() => match to_json(value) {
            Ok(json) => Ok(Some(from_json(&json))),
            Err(StateError::CyclicValue) => Err(StateError::CyclicReference),
            Err(err) => Err(err),
        },
        _ => Ok(None),
    }
}

struct Diff<'a> {
    registries: &'a RefCell<Registries>,
    path: Vec<PathStep>,
    visited: Vec<usize>,
}

impl Diff<'_> {
    fn compare(&mut self, old: &JsonValue, new: &Value) -> StateResult<bool> {
        if let Some(new) = serialized(new)? {
            return self.compare(old, &new);
        }
        match (old, new) {
            (JsonValue::Array(_) | JsonValue::Object(_), Value::Array(_) | Value::Object(_)) => {
                self.compare_containers(old, new)
            }
            (JsonValue::Number(a), Value::Number(b)) => {
                if same_value(a.as_f64().unwrap_or(f64::NAN), *b) {
                    return Ok(false);
                }
                self.changed_at_leaf(new)
            }
            (JsonValue::Null, Value::Null) => Ok(false),
            (JsonValue::Bool(a), Value::Bool(b)) if a == b => Ok(false),
            (JsonValue::String(a), Value::String(b)) if a == b => Ok(false),
            _ => self.changed_at_leaf(new),
        }
    }

    fn changed_at_leaf(&mut self, new: &Value) -> StateResult<bool> {
        let key = join(&self.path);
        self.fire_change(&key, new)?;
        Ok(true)
    }

    fn compare_containers(&mut self, old: &JsonValue, new: &Value) -> StateResult<bool> {
        let Some(addr) = new.container_addr() else {
            return self.changed_at_leaf(new);
        };
        if self.visited.contains(&addr) {
            return Err(StateError::CyclicReference);
        }
        self.visited.push(addr);
        let key = join(&self.path);
        let changed = match (old, new) {
            (JsonValue::Array(items), Value::Array(arr)) => self.compare_items(&key, items, arr)?,
            (JsonValue::Object(map), Value::Object(obj)) => self.compare_members(&key, map, obj)?,
            // Array replaced by an object or the other way round
            _ => true,
        };
        self.visited.pop();
        if changed {
            self.fire_change(&key, new)?;
        }
        Ok(changed)
    }

    fn compare_items(&mut self, key: &PathKey, old: &[JsonValue], new: &Array) -> StateResult<bool> {
        let new = new.to_vec();
        let mut changed = false;
        for i in 0..old.len().max(new.len()) {
            let step = PathStep::Index(i);
            match (old.get(i), new.get(i)) {
                (None, Some(added)) => {
                    let added = serialized(added)?.unwrap_or_else(|| added.clone());
                    self.fire_addition(key, &step, &added)?;
                    changed = true;
                }
                (Some(_), None) => {
                    self.fire_deletion(key, &step)?;
                    changed = true;
                }
                (Some(old_item), Some(new_item)) => {
                    changed |= self.descend(step, old_item, new_item)?;
                }
                (None, None) => {}
            }
        }
        Ok(changed)
    }

    fn compare_members(&mut self, key: &PathKey, old: &Map<String, JsonValue>, new: &Object) -> StateResult<bool> {
        let new: BTreeMap<String, Value> = new.entries().into_iter().collect();
        let mut names: Vec<&String> = old.keys().chain(new.keys()).collect();
        names.sort_by(|a, b| key_cmp(a, b));
        names.dedup();
        let mut changed = false;
        for name in names {
            let step = PathStep::Key(name.clone());
            match (old.get(name.as_str()), new.get(name)) {
                (None, Some(added)) => {
                    let added = serialized(added)?.unwrap_or_else(|| added.clone());
                    self.fire_addition(key, &step, &added)?;
                    changed = true;
                }
                (Some(_), None) => {
                    self.fire_deletion(key, &step)?;
                    changed = true;
                }
                (Some(old_member), Some(new_member)) => {
                    changed |= self.descend(step, old_member, new_member)?;
                }
                (None, None) => {}
            }
        }
        Ok(changed)
    }

    fn descend(&mut self, step: PathStep, old: &JsonValue, new: &Value) -> StateResult<bool> {
        self.path.push(step);
        let changed = self.compare(old, new)?;
        self.path.pop();
        Ok(changed)
    }

    fn fire_change(&self, key: &PathKey, value: &Value) -> StateResult<()> {
        let observers = self.registries.borrow().change.observers_at(key);
        for observer in observers {
            trace!("value changed at {key:?}");
            observer(Some(value)).map_err(StateError::Observer)?;
        }
        Ok(())
    }

    fn fire_addition(&self, key: &PathKey, step: &PathStep, value: &Value) -> StateResult<()> {
        let observers = self.registries.borrow().addition.observers_at(key);
        for observer in observers {
            trace!("member {step} added at {key:?}");
            observer(step, value).map_err(StateError::Observer)?;
        }
        Ok(())
    }

    fn fire_deletion(&self, key: &PathKey, step: &PathStep) -> StateResult<()> {
        let observers = self.registries.borrow().deletion.observers_at(key);
        for observer in observers {
            trace!("member {step} deleted at {key:?}");
            observer(step).map_err(StateError::Observer)?;
        }
        Ok(())
    }
}
