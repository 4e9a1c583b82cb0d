//! Observer registries.
//!
//! Three independent registries map a canonical path key to the callbacks
//! registered there, in registration order. Registration hands out an
//! [`ObserverId`] tagged with the registry it belongs to.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::{ObserverResult, StateError, StateResult};
use crate::path::{PathKey, PathStep};
use crate::value::Value;

/// Value-changed callback. Receives the new value at the observed path,
/// or `None` when a replay finds nothing there.
pub type ChangeObserver = Rc<dyn Fn(Option<&Value>) -> ObserverResult>;

/// Key-added callback. Receives the new key and its value.
pub type AdditionObserver = Rc<dyn Fn(&PathStep, &Value) -> ObserverResult>;

/// Key-removed callback. Receives the removed key.
pub type DeletionObserver = Rc<dyn Fn(&PathStep) -> ObserverResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    Change,
    Addition,
    Deletion,
}

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId {
    kind: ObserverKind,
    id: u64,
}

impl ObserverId {
    pub fn kind(&self) -> ObserverKind {
        self.kind
    }
}

pub(crate) struct Registry<F: ?Sized> {
    kind: ObserverKind,
    entries: HashMap<PathKey, BTreeMap<u64, Rc<F>>>,
}

impl<F: ?Sized> Registry<F> {
    fn new(kind: ObserverKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    fn insert(&mut self, key: PathKey, id: u64, observer: Rc<F>) -> ObserverId {
        self.entries.entry(key).or_default().insert(id, observer);
        ObserverId { kind: self.kind, id }
    }

    /// Removes `id` from `key`; an emptied key is dropped.
    pub(crate) fn remove(&mut self, key: &PathKey, id: ObserverId) -> StateResult<bool> {
        if id.kind != self.kind {
            return Err(StateError::InvalidArgument(format!(
                "{:?} observer handle passed to the {:?} registry",
                id.kind, self.kind
            )));
        }
        let Some(observers) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        let removed = observers.remove(&id.id).is_some();
        if observers.is_empty() {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    /// Callbacks registered at `key`, cloned so that none of the registry
    /// is borrowed while they run.
    pub(crate) fn observers_at(&self, key: &PathKey) -> Vec<Rc<F>> {
        self.entries
            .get(key)
            .map(|observers| observers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &PathKey) -> usize {
        self.entries.get(key).map_or(0, BTreeMap::len)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) struct Registries {
    next_id: u64,
    pub(crate) change: Registry<dyn Fn(Option<&Value>) -> ObserverResult>,
    pub(crate) addition: Registry<dyn Fn(&PathStep, &Value) -> ObserverResult>,
    pub(crate) deletion: Registry<dyn Fn(&PathStep) -> ObserverResult>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            next_id: 1,
            change: Registry::new(ObserverKind::Change),
            addition: Registry::new(ObserverKind::Addition),
            deletion: Registry::new(ObserverKind::Deletion),
        }
    }
}

impl Registries {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub(crate) fn add_change(&mut self, key: PathKey, observer: ChangeObserver) -> ObserverId {
        let id = self.next_id();
        self.change.insert(key, id, observer)
    }

    pub(crate) fn add_addition(&mut self, key: PathKey, observer: AdditionObserver) -> ObserverId {
        let id = self.next_id();
        self.addition.insert(key, id, observer)
    }

    pub(crate) fn add_deletion(&mut self, key: PathKey, observer: DeletionObserver) -> ObserverId {
        let id = self.next_id();
        self.deletion.insert(key, id, observer)
    }

    pub(crate) fn count(&self, kind: ObserverKind, key: &PathKey) -> usize {
        match kind {
            ObserverKind::Change => self.change.count(key),
            ObserverKind::Addition => self.addition.count(key),
            ObserverKind::Deletion => self.deletion.count(key),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.change.is_empty() && self.addition.is_empty() && self.deletion.is_empty()
    }
}
