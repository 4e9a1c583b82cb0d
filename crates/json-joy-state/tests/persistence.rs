use std::cell::RefCell;
use std::rc::Rc;

use json_joy_state::{
    FileStorage, MemoryStorage, PathStep, PersistConfig, State, StorageBackend, StorageError,
    Value,
};
use serde_json::json;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn restores_on_construction() {
    init_logger();
    let storage = MemoryStorage::new();
    storage
        .store("json-joy-state.session", r#"{"user":{"name":"ann"}}"#)
        .unwrap();

    let state = State::persistent(storage.clone(), &PersistConfig::session());
    assert_eq!(state.get(Some("user.name")), Some(json!("ann")));
    assert_eq!(
        state.value().get("user").and_then(|v| v.as_object().map(|o| o.keys())),
        Some(vec!["name".to_string()])
    );
}

#[test]
fn commits_are_mirrored_into_storage() {
    init_logger();
    let storage = MemoryStorage::new();
    let state = State::persistent(storage.clone(), &PersistConfig::durable().key("app"));

    state.value().insert("b", 2).unwrap();
    state.value().insert("a", Value::from(json!([1, {"z": null, "y": true}]))).unwrap();
    state.notify_updates().unwrap();

    assert_eq!(
        storage.get("app").as_deref(),
        Some(r#"{"a":[1,{"y":true,"z":null}],"b":2}"#)
    );
}

#[test]
fn durable_states_follow_each_other() {
    init_logger();
    let storage = MemoryStorage::new();
    let config = PersistConfig::durable().key("shared");
    let writer = State::persistent(storage.clone(), &config);
    let reader = State::persistent(storage.clone(), &config);

    let added = Rc::new(RefCell::new(Vec::new()));
    let sink = added.clone();
    reader.observe_property_addition(None, move |step: &PathStep, _: &Value| {
        sink.borrow_mut().push(step.to_string());
        Ok(())
    });
    writer.value().insert("count", 0).unwrap();
    writer.notify_updates().unwrap();
    assert_eq!(*added.borrow(), vec!["count"]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    reader
        .observe_property(Some("count"), move |value: Option<&Value>| {
            sink.borrow_mut().push(value.and_then(Value::as_f64));
            Ok(())
        })
        .unwrap();

    writer.value().insert("count", 1).unwrap();
    writer.notify_updates().unwrap();

    assert_eq!(*seen.borrow(), vec![Some(0.0), Some(1.0)]);
    assert_eq!(reader.get(None), Some(json!({"count": 1})));
    assert_eq!(writer.get(None), reader.get(None));
}

#[test]
fn session_states_do_not_watch() {
    init_logger();
    let storage = MemoryStorage::new();
    let config = PersistConfig::session().key("tab");
    let first = State::persistent(storage.clone(), &config);
    let second = State::persistent(storage.clone(), &config);
    assert_eq!(storage.listener_count(), 0);

    first.value().insert("x", 1).unwrap();
    first.notify_updates().unwrap();
    assert_eq!(second.get(Some("x")), None);

    second.restore().unwrap();
    assert_eq!(second.get(Some("x")), Some(json!(1)));
}

#[test]
fn dropping_a_state_unsubscribes() {
    init_logger();
    let storage = MemoryStorage::new();
    let state = State::persistent(storage.clone(), &PersistConfig::durable());
    assert_eq!(storage.listener_count(), 1);
    drop(state);
    assert_eq!(storage.listener_count(), 0);
    storage.store("json-joy-state.client", r#"{"late":1}"#).unwrap();
}

#[test]
fn external_clear_keeps_live_data() {
    init_logger();
    let storage = MemoryStorage::new();
    let state = State::persistent(storage.clone(), &PersistConfig::durable().key("k"));
    state.value().insert("x", 1).unwrap();
    state.notify_updates().unwrap();

    storage.remove("k");
    // Nothing stored: the live tree is kept and written back.
    assert_eq!(state.get(None), Some(json!({"x": 1})));
    assert_eq!(storage.get("k").as_deref(), Some(r#"{"x":1}"#));
}

#[test]
fn corrupt_storage_is_ignored() {
    init_logger();
    let storage = MemoryStorage::new();
    storage.store("bad", "{not json").unwrap();
    let state = State::persistent(storage.clone(), &PersistConfig::session().key("bad"));
    assert_eq!(state.get(None), Some(json!({})));
    assert_eq!(storage.get("bad").as_deref(), Some("{}"));

    storage.store("scalar", "42").unwrap();
    let state = State::persistent(storage, &PersistConfig::session().key("scalar"));
    assert_eq!(state.get(None), Some(json!({})));
}

#[test]
fn unavailable_storage_degrades_to_memory() {
    init_logger();
    let storage = MemoryStorage::new();
    storage.set_available(false);
    let state = State::persistent(storage.clone(), &PersistConfig::session());
    state.value().insert("x", 1).unwrap();
    state.notify_updates().unwrap();
    assert_eq!(state.get(Some("x")), Some(json!(1)));

    storage.set_available(true);
    storage.set_quota(Some(4));
    state.value().insert("y", 2).unwrap();
    state.notify_updates().unwrap();
    assert_eq!(state.serialize(), r#"{"x":1,"y":2}"#);
    assert_eq!(storage.get("json-joy-state.session"), None);
}

#[test]
fn file_storage_survives_restart() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = PersistConfig::durable().key("profile");
    {
        let state = State::persistent(FileStorage::new(dir.path()), &config);
        state.value().insert("theme", "dark").unwrap();
        state.value().insert("sizes", Value::from(json!([12, 14]))).unwrap();
        state.notify_updates().unwrap();
    }

    let text = std::fs::read_to_string(dir.path().join("profile.json")).unwrap();
    assert_eq!(text, r#"{"sizes":[12,14],"theme":"dark"}"#);

    let state = State::persistent(FileStorage::new(dir.path()), &config);
    assert_eq!(state.get(Some("theme")), Some(json!("dark")));
    assert_eq!(state.get(Some("sizes.1")), Some(json!(14)));
}

#[test]
fn file_storage_with_invalid_key_stays_in_memory() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());
    assert!(matches!(storage.load("../escape"), Err(StorageError::InvalidKey(_))));

    let state = State::persistent(storage, &PersistConfig::durable().key("../escape"));
    state.value().insert("x", 1).unwrap();
    state.notify_updates().unwrap();
    assert_eq!(state.get(Some("x")), Some(json!(1)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
