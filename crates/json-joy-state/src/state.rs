//! The observable state store.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::diff;
use crate::error::{ObserverResult, StateError, StateResult};
use crate::json::{from_json, key_cmp, parse, stringify, to_json};
use crate::observer::{ObserverId, ObserverKind, Registries};
use crate::path::{path_key, value_at, PathStep};
use crate::persist::{PersistConfig, Persistence, StorageBackend};
use crate::value::{Object, Value};

/// A mutable JSON-like tree whose changes are reported to path-keyed
/// observers.
///
/// Callers mutate the live root returned by [`State::value`] and then call
/// [`State::notify_updates`], which diffs the live tree against the last
/// committed snapshot, fires observers and commits a new snapshot.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use json_joy_state::{PathStep, State, Value};
///
/// let state = State::new();
/// let added = Rc::new(RefCell::new(Vec::new()));
/// let sink = added.clone();
/// state.observe_property_addition(None, move |step: &PathStep, value: &Value| {
///     sink.borrow_mut().push((step.to_string(), value.as_f64()));
///     Ok(())
/// });
///
/// state.value().insert("y", 2).unwrap();
/// state.notify_updates().unwrap();
///
/// assert_eq!(*added.borrow(), vec![("y".to_string(), Some(2.0))]);
/// assert_eq!(state.serialize(), r#"{"y":2}"#);
/// ```
pub struct State {
    value: Object,
    snapshot: RefCell<Rc<JsonValue>>,
    registries: RefCell<Registries>,
    persistence: Option<Persistence>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Creates a store with an empty live root and an empty snapshot.
    pub fn new() -> Self {
        Self::with_persistence(None)
    }

    fn with_persistence(persistence: Option<Persistence>) -> Self {
        Self {
            value: Object::new(),
            snapshot: RefCell::new(Rc::new(JsonValue::Object(Default::default()))),
            registries: RefCell::new(Registries::default()),
            persistence,
        }
    }

    /// Creates a store mirrored into `backend`.
    ///
    /// The stored state is restored right away; failures of that first
    /// pass are logged and dropped. When the configuration asks for it, the
    /// store also restores itself whenever the backend reports that
    /// another context changed the slot.
    pub fn persistent<B>(backend: B, config: &PersistConfig) -> Rc<State>
    where
        B: StorageBackend + 'static,
    {
        let persistence = Persistence::new(Rc::new(backend), config);
        let state = Rc::new(Self::with_persistence(Some(persistence)));
        if let Err(err) = state.restore() {
            warn!("initial restore of {:?} failed: {err}", config.storage_key());
        }
        if config.watches_external() {
            let weak = Rc::downgrade(&state);
            let listener: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.on_external_change();
                }
            });
            if let Some(persistence) = &state.persistence {
                persistence.subscribe(listener);
            }
        }
        state
    }

    fn on_external_change(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if persistence.is_writing() {
            return;
        }
        debug!("external change to {:?}, restoring", persistence.key());
        if let Err(err) = self.restore() {
            warn!("restore of {:?} after external change failed: {err}", persistence.key());
        }
    }

    /// The live root object. Mutations become visible to observers at the
    /// next [`notify_updates`](Self::notify_updates).
    pub fn value(&self) -> Object {
        self.value.clone()
    }

    /// Reads the committed snapshot at a dot-path; `None` reads the whole
    /// snapshot. Missing paths yield `None`.
    pub fn get(&self, path: Option<&str>) -> Option<JsonValue> {
        let snapshot = Rc::clone(&self.snapshot.borrow());
        value_at(&snapshot, path).cloned()
    }

    /// Registers a value-changed observer at `path` (`None` is the root)
    /// and immediately replays the committed value there.
    ///
    /// If the replay fails the observer stays registered and the error is
    /// returned.
    pub fn observe_property<F>(&self, path: Option<&str>, observer: F) -> StateResult<ObserverId>
    where
        F: Fn(Option<&Value>) -> ObserverResult + 'static,
    {
        let observer = Rc::new(observer);
        let id = self
            .registries
            .borrow_mut()
            .add_change(path_key(path), observer.clone());
        let current = self.get(path).map(|json| from_json(&json));
        observer(current.as_ref()).map_err(StateError::Observer)?;
        Ok(id)
    }

    /// Registers a key-added observer at `path`.
    pub fn observe_property_addition<F>(&self, path: Option<&str>, observer: F) -> ObserverId
    where
        F: Fn(&PathStep, &Value) -> ObserverResult + 'static,
    {
        self.registries
            .borrow_mut()
            .add_addition(path_key(path), Rc::new(observer))
    }

    /// Registers a key-removed observer at `path`.
    pub fn observe_property_deletion<F>(&self, path: Option<&str>, observer: F) -> ObserverId
    where
        F: Fn(&PathStep) -> ObserverResult + 'static,
    {
        self.registries
            .borrow_mut()
            .add_deletion(path_key(path), Rc::new(observer))
    }

    pub fn unobserve_property(&self, path: Option<&str>, id: ObserverId) -> StateResult<bool> {
        self.registries.borrow_mut().change.remove(&path_key(path), id)
    }

    pub fn unobserve_property_addition(&self, path: Option<&str>, id: ObserverId) -> StateResult<bool> {
        self.registries.borrow_mut().addition.remove(&path_key(path), id)
    }

    pub fn unobserve_property_deletion(&self, path: Option<&str>, id: ObserverId) -> StateResult<bool> {
        self.registries.borrow_mut().deletion.remove(&path_key(path), id)
    }

    /// Root value-changed observer, see [`observe_property`](Self::observe_property).
    pub fn observe<F>(&self, observer: F) -> StateResult<ObserverId>
    where
        F: Fn(Option<&Value>) -> ObserverResult + 'static,
    {
        self.observe_property(None, observer)
    }

    pub fn unobserve(&self, id: ObserverId) -> StateResult<bool> {
        self.unobserve_property(None, id)
    }

    /// Number of observers of `kind` registered at `path`.
    pub fn observer_count(&self, kind: ObserverKind, path: Option<&str>) -> usize {
        self.registries.borrow().count(kind, &path_key(path))
    }

    pub fn has_observers(&self) -> bool {
        !self.registries.borrow().is_empty()
    }

    /// The committed snapshot as JSON text with sorted keys.
    pub fn serialize(&self) -> String {
        stringify(&self.snapshot.borrow())
    }

    /// Replaces every own member of the live root with the members of the
    /// JSON object (or array) in `text`.
    ///
    /// The snapshot is untouched until the next notification pass. On a
    /// parse failure the live root is left as it was.
    pub fn unserialize(&self, text: &str) -> StateResult<()> {
        let mut members: Vec<(String, JsonValue)> = match parse(text)? {
            JsonValue::Object(map) => map.into_iter().collect(),
            JsonValue::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| (idx.to_string(), item))
                .collect(),
            other => {
                return Err(StateError::InvalidData(format!(
                    "expected an object or an array, got {other}"
                )))
            }
        };
        members.sort_by(|a, b| key_cmp(&a.0, &b.0));
        self.value.clear()?;
        for (key, item) in members {
            self.value.insert(key, from_json(&item))?;
        }
        Ok(())
    }

    /// Commits the live root as the new snapshot and mirrors it into the
    /// attached storage, if any.
    pub fn save(&self) -> StateResult<()> {
        let json = to_json(&Value::Object(self.value.clone()))?;
        *self.snapshot.borrow_mut() = Rc::new(json);
        debug!("snapshot committed");
        if let Some(persistence) = &self.persistence {
            persistence.write(&self.serialize());
        }
        Ok(())
    }

    /// Reloads the stored state, if storage is attached, then runs a
    /// notification pass. Storage and parse failures are logged and
    /// skipped.
    pub fn restore(&self) -> StateResult<()> {
        if let Some(persistence) = &self.persistence {
            if let Some(text) = persistence.read() {
                if let Err(err) = self.unserialize(&text) {
                    warn!("ignoring stored state under {:?}: {err}", persistence.key());
                }
            }
        }
        self.notify_updates()
    }

    /// Diffs the live root against the snapshot, fires observers and
    /// commits.
    ///
    /// An observer error or a cyclic live tree aborts the pass before the
    /// commit. Observers must not mutate the live tree.
    pub fn notify_updates(&self) -> StateResult<()> {
        let snapshot = Rc::clone(&self.snapshot.borrow());
        let changed = diff::notify(&snapshot, &Value::Object(self.value.clone()), &self.registries)?;
        if changed {
            debug!("notification pass found changes");
        } else {
            debug!("notification pass found no changes");
        }
        self.save()
    }
}
