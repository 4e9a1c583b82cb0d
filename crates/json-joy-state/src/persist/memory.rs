use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::{StorageBackend, SubscriptionId};
use crate::error::StorageError;

type Listener = Rc<dyn Fn()>;

#[derive(Default)]
struct Inner {
    items: RefCell<HashMap<String, String>>,
    next_listener_id: Cell<u64>,
    listeners: RefCell<BTreeMap<u64, (String, Listener)>>,
    unavailable: Cell<bool>,
    quota: Cell<Option<usize>>,
}

/// In-process storage shared by every clone.
///
/// Each clone is a handle onto the same map, so two states built over
/// clones of one `MemoryStorage` behave like two contexts sharing a
/// session store. A write that changes the stored text notifies the
/// listeners subscribed to that key once the write is done.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.items.borrow().get(key).cloned()
    }

    /// Removes `key`, notifying its listeners if it existed.
    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.inner.items.borrow_mut().remove(key);
        if removed.is_some() {
            self.notify(key);
        }
        removed
    }

    /// Makes every subsequent load and store fail, or succeed again.
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.set(!available);
    }

    /// Caps the length of stored texts; longer writes fail.
    pub fn set_quota(&self, quota: Option<usize>) {
        self.inner.quota.set(quota);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.inner.unavailable.get() {
            return Err(StorageError::Unavailable("memory storage disabled".into()));
        }
        Ok(())
    }

    fn notify(&self, key: &str) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .values()
            .filter(|(k, _)| k == key)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        Ok(self.get(key))
    }

    fn store(&self, key: &str, text: &str) -> Result<(), StorageError> {
        self.check_available()?;
        if let Some(quota) = self.inner.quota.get() {
            if text.len() > quota {
                return Err(StorageError::Unavailable(format!(
                    "quota of {quota} bytes exceeded by {} bytes",
                    text.len() - quota
                )));
            }
        }
        let previous = self.inner.items.borrow_mut().insert(key.to_owned(), text.to_owned());
        if previous.as_deref() != Some(text) {
            self.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: Rc<dyn Fn()>) -> Option<SubscriptionId> {
        let id = self.inner.next_listener_id.get().saturating_add(1);
        self.inner.next_listener_id.set(id);
        self.inner.listeners.borrow_mut().insert(id, (key.to_owned(), listener));
        Some(SubscriptionId(id))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.listeners.borrow_mut().remove(&id.0);
    }
}
