//! Persistence adapters.
//!
//! A persistent [`State`](crate::State) mirrors every commit into a
//! [`StorageBackend`] slot as sorted-key JSON text and reloads that slot on
//! [`restore`](crate::State::restore). Backends may also signal changes
//! made by another context sharing the same storage.

mod config;
mod file;
mod memory;

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, warn};

pub use config::{PersistConfig, StorageScope};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// Handle of an external-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Keyed text storage backing a persistent state.
pub trait StorageBackend {
    /// Stored text under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the text stored under `key`.
    fn store(&self, key: &str, text: &str) -> Result<(), StorageError>;

    /// Registers `listener` to run whenever the text under `key` changes.
    /// Backends without change signals return `None`.
    fn subscribe(&self, _key: &str, _listener: Rc<dyn Fn()>) -> Option<SubscriptionId> {
        None
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

/// Storage slot attached to a state.
pub(crate) struct Persistence {
    backend: Rc<dyn StorageBackend>,
    key: String,
    subscription: Cell<Option<SubscriptionId>>,
    writing: Cell<bool>,
}

impl Persistence {
    pub(crate) fn new(backend: Rc<dyn StorageBackend>, config: &PersistConfig) -> Self {
        Self {
            backend,
            key: config.storage_key().to_owned(),
            subscription: Cell::new(None),
            writing: Cell::new(false),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Stored text, or `None` when the slot is empty or unreadable.
    pub(crate) fn read(&self) -> Option<String> {
        match self.backend.load(&self.key) {
            Ok(Some(text)) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                warn!("failed to load state from {:?}: {err}", self.key);
                None
            }
        }
    }

    pub(crate) fn write(&self, text: &str) {
        self.writing.set(true);
        let result = self.backend.store(&self.key, text);
        self.writing.set(false);
        if let Err(err) = result {
            warn!("failed to store state under {:?}: {err}", self.key);
        }
    }

    /// True while this slot's own write is in progress.
    pub(crate) fn is_writing(&self) -> bool {
        self.writing.get()
    }

    pub(crate) fn subscribe(&self, listener: Rc<dyn Fn()>) {
        let id = self.backend.subscribe(&self.key, listener);
        if id.is_none() {
            debug!("storage for {:?} has no change signal", self.key);
        }
        self.subscription.set(id);
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.backend.unsubscribe(id);
        }
    }
}
