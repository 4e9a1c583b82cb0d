use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use json_joy_state::{equals, parse, stringify, PathStep, State, Value};
use proptest::prelude::*;
use serde_json::{json, Map, Value as JsonValue};

fn arb_json() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        (-1_000_000i64..1_000_000).prop_map(|n| json!(n)),
        "[a-z \"\\\\]{0,6}".prop_map(JsonValue::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(JsonValue::Array),
            prop::collection::btree_map("[a-e]{1,3}", inner, 0..6)
                .prop_map(|members| JsonValue::Object(members.into_iter().collect())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Map<String, JsonValue>> {
    prop::collection::btree_map("[a-e]{1,2}", arb_json(), 0..6)
        .prop_map(|members| members.into_iter().collect())
}

proptest! {
    #[test]
    fn equals_is_reflexive(doc in arb_json()) {
        let value = Value::from(&doc);
        prop_assert!(equals(&value, &value));
        prop_assert!(equals(&value, &Value::from(&doc)));
    }

    #[test]
    fn equals_is_symmetric(a in arb_json(), b in arb_json()) {
        let (a, b) = (Value::from(&a), Value::from(&b));
        prop_assert_eq!(equals(&a, &b), equals(&b, &a));
    }

    #[test]
    fn equals_agrees_with_json_equality(a in arb_json(), b in arb_json()) {
        prop_assert_eq!(equals(&Value::from(&a), &Value::from(&b)), a == b);
    }

    #[test]
    fn stringify_round_trips(doc in arb_json()) {
        let text = stringify(&doc);
        let parsed = parse(&text).unwrap();
        prop_assert_eq!(&parsed, &doc);
        prop_assert_eq!(stringify(&parsed), text.clone());
        // serde_json's default map is ordered, so its output has sorted keys too
        prop_assert_eq!(text, serde_json::to_string(&doc).unwrap());
    }

    #[test]
    fn commit_matches_live_value(members in arb_object()) {
        let doc = JsonValue::Object(members);
        let state = State::new();
        state.unserialize(&stringify(&doc)).unwrap();
        state.save().unwrap();
        prop_assert_eq!(state.get(None), Some(doc.clone()));
        prop_assert_eq!(Value::Object(state.value()).to_json().unwrap(), doc);
    }

    #[test]
    fn second_pass_is_quiet(before in arb_object(), after in arb_object()) {
        let state = State::new();
        state.unserialize(&JsonValue::Object(before).to_string()).unwrap();
        state.notify_updates().unwrap();
        state.unserialize(&JsonValue::Object(after).to_string()).unwrap();
        state.notify_updates().unwrap();

        let calls = Rc::new(RefCell::new(0usize));
        let sink = calls.clone();
        state.observe(move |_: Option<&Value>| {
            *sink.borrow_mut() += 1;
            Ok(())
        }).unwrap();
        state.notify_updates().unwrap();
        prop_assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn top_level_additions_and_deletions(before in arb_object(), after in arb_object()) {
        let state = State::new();
        state.unserialize(&JsonValue::Object(before.clone()).to_string()).unwrap();
        state.notify_updates().unwrap();

        let added = Rc::new(RefCell::new(BTreeSet::new()));
        let deleted = Rc::new(RefCell::new(BTreeSet::new()));
        let (add_sink, del_sink) = (added.clone(), deleted.clone());
        state.observe_property_addition(None, move |step: &PathStep, _: &Value| {
            add_sink.borrow_mut().insert(step.to_string());
            Ok(())
        });
        state.observe_property_deletion(None, move |step: &PathStep| {
            del_sink.borrow_mut().insert(step.to_string());
            Ok(())
        });

        state.unserialize(&JsonValue::Object(after.clone()).to_string()).unwrap();
        state.notify_updates().unwrap();

        let expected_added: BTreeSet<String> =
            after.keys().filter(|k| !before.contains_key(*k)).cloned().collect();
        let expected_deleted: BTreeSet<String> =
            before.keys().filter(|k| !after.contains_key(*k)).cloned().collect();
        prop_assert_eq!(&*added.borrow(), &expected_added);
        prop_assert_eq!(&*deleted.borrow(), &expected_deleted);
        prop_assert_eq!(state.get(None), Some(JsonValue::Object(after)));
    }
}
