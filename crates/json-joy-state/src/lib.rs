//! Observable JSON state store.
//!
//! A [`State`] holds a live, mutable tree of JSON-like [`Value`]s next to
//! the snapshot committed at the last notification pass. Observers are
//! registered per dot-path and come in three flavours:
//! - value-changed observers, which also hear about every change below
//!   their path,
//! - key-added observers,
//! - key-removed observers.
//!
//! The crate also provides a structural comparator ([`equals`]) with
//! SameValue number semantics, a deep freeze utility ([`deep_freeze`]) and
//! pluggable persistence ([`persist`]).
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use json_joy_state::{State, Value};
//!
//! let state = State::new();
//! state.value().insert("a", Value::from(json!({"b": 5}))).unwrap();
//! state.notify_updates().unwrap();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! state
//!     .observe_property(Some("a.b"), move |value: Option<&Value>| {
//!         sink.borrow_mut().push(value.and_then(Value::as_f64));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let a = state.value().get("a").unwrap();
//! a.as_object().unwrap().insert("b", 6).unwrap();
//! state.notify_updates().unwrap();
//!
//! assert_eq!(*seen.borrow(), vec![Some(5.0), Some(6.0)]);
//! assert_eq!(state.get(Some("a.b")), Some(json!(6)));
//! ```

mod diff;
pub mod equal;
pub mod error;
pub mod freeze;
pub mod json;
pub mod observer;
pub mod path;
pub mod persist;
pub mod state;
pub mod value;

pub use equal::{equals, same_value};
pub use error::{ObserverError, ObserverResult, StateError, StateResult, StorageError};
pub use freeze::deep_freeze;
pub use json::{from_json, parse, stringify, to_json};
pub use observer::{ObserverId, ObserverKind};
pub use path::PathStep;
pub use persist::{FileStorage, MemoryStorage, PersistConfig, StorageBackend, StorageScope, SubscriptionId};
pub use state::State;
pub use value::{Array, Kind, Object, Value};
