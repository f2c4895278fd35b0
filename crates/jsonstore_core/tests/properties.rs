//! End-to-end behaviour of identifiers, merges and the commit pipeline.

mod common;

use common::{TestStore, User, THREE_USERS};
use jsonstore_core::{CoreError, Store, StoreConfig};
use jsonstore_storage::InMemoryTextStore;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn sequential_inserts_get_ids_in_order() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();

    for i in 0..25 {
        assert!(docs.insert_one(json!({ "n": i })).unwrap());
    }
    let ids: Vec<Value> = docs.all().unwrap().iter().map(|d| d["id"].clone()).collect();
    let expected: Vec<Value> = (0..25).map(Value::from).collect();
    assert_eq!(ids, expected);
    assert_eq!(docs.next_id(), json!(25));
}

#[test]
fn update_is_idempotent_on_untouched_fields() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();
    docs.insert_one(json!({ "id": 1, "a": 1, "b": 2 })).unwrap();

    docs.update_by_id(1, json!({ "b": 3 })).unwrap();
    assert_eq!(docs.find_by_id(1).unwrap().unwrap(), json!({ "id": 1, "a": 1, "b": 3 }));
    docs.update_by_id(1, json!({ "b": 3 })).unwrap();
    assert_eq!(docs.find_by_id(1).unwrap().unwrap(), json!({ "id": 1, "a": 1, "b": 3 }));
}

#[test]
fn textual_ids_skip_documents_without_key() {
    let store = Store::open_in_memory(StoreConfig::new().key_field("myId")).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();
    assert_eq!(store.key_field(), "myId");

    docs.insert_one(json!({ "myId": "hello2" })).unwrap();
    assert_eq!(docs.next_id(), json!("hello3"));

    docs.insert_one(json!({ "name": "no id" })).unwrap();
    assert_eq!(docs.next_id(), json!("hello3"));
    assert!(docs.all().unwrap()[1].get("myId").is_none());

    docs.insert_one(json!({ "myId": "" })).unwrap();
    assert_eq!(docs.all().unwrap()[2]["myId"], "hello3");
    assert_eq!(docs.next_id(), json!("hello4"));
}

#[test]
fn textual_ids_start_at_zero() {
    let store = Store::open_in_memory(StoreConfig::new().key_field("myId")).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();

    docs.insert_one(json!({ "myId": "" })).unwrap();
    docs.insert_one(json!({ "myId": null })).unwrap();
    let ids: Vec<Value> = docs.all().unwrap().iter().map(|d| d["myId"].clone()).collect();
    assert_eq!(ids, vec![json!("0"), json!("1")]);
}

#[test]
fn reopened_store_sees_inserted_document() {
    let store = TestStore::with_content(THREE_USERS, StoreConfig::default());
    let users = store.dynamic_collection("user").unwrap();
    let expected_id = users.next_id();

    assert!(users.insert_one(json!({ "name": "Teddy" })).unwrap());
    store.close();

    let reopened = store.reopen(StoreConfig::default());
    let users = reopened.dynamic_collection("user").unwrap();
    assert_eq!(users.count(), 4);
    let teddy = &users.all().unwrap()[3];
    assert_eq!(teddy["name"], "Teddy");
    assert_eq!(teddy["id"], expected_id);
    assert_eq!(expected_id, json!(4));

    // Other top-level values are untouched.
    assert_eq!(reopened.get_item::<i64>("counter").unwrap(), 7);
}

#[test]
fn minified_output() {
    let store = TestStore::with_config(StoreConfig::new().minify(true));
    store.insert_item("a", 1_i64).unwrap();
    assert_eq!(store.raw(), r#"{"a":1}"#);

    let pretty = TestStore::new();
    pretty.insert_item("a", 1_i64).unwrap();
    assert!(pretty.raw().contains('\n'));
}

#[test]
fn handles_on_same_file_do_not_clobber_each_other() {
    let first = TestStore::new();
    let second = first.reopen(StoreConfig::default());

    first.dynamic_collection("doc").unwrap().insert_one(json!({ "by": "first" })).unwrap();
    // The second handle never loaded that document, but commits on top of it.
    second.dynamic_collection("doc").unwrap().insert_one(json!({ "by": "second" })).unwrap();

    let raw: Value = serde_json::from_str(&first.raw()).unwrap();
    assert_eq!(raw["doc"], json!([{ "by": "first", "id": 0 }, { "by": "second", "id": 1 }]));
}

#[test]
fn persist_failure_surfaces_and_keeps_state() {
    let backend = Arc::new(InMemoryTextStore::with_text(r#"{"doc":[{"id":0}]}"#));
    let store = Store::open_with_backend(Box::new(Arc::clone(&backend)), StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();

    backend.set_fail_writes(true);
    assert!(matches!(docs.insert_one(json!({})), Err(CoreError::Persist { .. })));
    assert_eq!(docs.count(), 1);
    assert!(matches!(store.insert_item("k", 1_i64), Err(CoreError::Persist { .. })));

    backend.set_fail_writes(false);
    assert!(docs.insert_one(json!({})).unwrap());
    assert_eq!(docs.count(), 2);
}

#[test]
fn malformed_file_is_rejected_on_open() {
    let backend = InMemoryTextStore::with_text("[1,2,3]");
    assert!(matches!(
        Store::open_with_backend(Box::new(backend), StoreConfig::default()),
        Err(CoreError::InvalidFormat { .. })
    ));
}

#[test]
fn parallel_threads_get_unique_ids() {
    let store = TestStore::new();
    let users = store.collection::<User>("user").unwrap();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let users = users.clone();
            scope.spawn(move || {
                for i in 0..10 {
                    let user = User {
                        name: format!("t{t}-{i}"),
                        ..User::default()
                    };
                    assert!(users.insert_one(user).unwrap());
                }
            });
        }
    });

    let ids: HashSet<i64> = users.all().unwrap().iter().map(|u| u.id).collect();
    assert_eq!(ids, (0..40).collect());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_async_inserts_get_unique_ids() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let docs = docs.clone();
            tokio::spawn(async move { docs.insert_one_async(json!({ "n": i })).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }

    let all = docs.all().unwrap();
    assert_eq!(all.len(), 100);
    let ids: HashSet<i64> = all.iter().filter_map(|d| d["id"].as_i64()).collect();
    assert_eq!(ids, (0..100).collect());
    assert!(!store.is_busy());
}

#[tokio::test]
async fn async_collection_twins() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();

    assert!(docs.insert_many_async(vec![json!({ "n": 1 }), json!({ "n": 2 })]).await.unwrap());
    assert!(docs.update_one_async(|d| d["n"] == 1, json!({ "n": 10 })).await.unwrap());
    assert!(docs.update_many_async(|_| true, json!({ "seen": true })).await.unwrap());
    assert!(docs.update_by_id_async(1, json!({ "n": 20 })).await.unwrap());
    assert!(docs.replace_one_async(|d| d["n"] == 10, json!({ "id": 0, "n": 11 }), false).await.unwrap());
    assert!(!docs.replace_many_async(|d| d["n"] == 99, json!({}), false).await.unwrap());
    assert!(docs.replace_by_id_async(1, json!({ "id": 1, "n": 21 })).await.unwrap());
    assert!(docs.delete_one_async(|d| d["n"] == 11).await.unwrap());
    assert!(docs.delete_by_id_async(1).await.unwrap());
    assert!(!docs.delete_many_async(|_| true).await.unwrap());
    assert_eq!(docs.count(), 0);
}

#[test]
fn mutations_after_close_fail() {
    let store = Store::open_in_memory(StoreConfig::default()).unwrap();
    let docs = store.dynamic_collection("doc").unwrap();
    docs.insert_one(json!({})).unwrap();

    store.close();
    assert!(matches!(docs.insert_one(json!({})), Err(CoreError::StoreClosed)));
    assert_eq!(docs.count(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn inserted_documents_survive_reopen(names in proptest::collection::vec("[a-zA-Z ]{0,12}", 1..20)) {
        let store = TestStore::new();
        let docs = store.dynamic_collection("doc").unwrap();
        for name in &names {
            docs.insert_one(json!({ "name": name })).unwrap();
        }

        let reopened = store.reopen(StoreConfig::default());
        let stored: Vec<String> = reopened
            .dynamic_collection("doc")
            .unwrap()
            .all()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap_or_default().to_string())
            .collect();
        prop_assert_eq!(stored, names);
    }
}
