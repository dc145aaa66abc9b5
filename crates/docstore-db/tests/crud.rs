mod common;
use common::*;

use bson::{doc, Bson};
use docstore_db::{DbError, FindOptions};
use docstore_store::MemoryKv;

#[test]
fn insert_then_find_one_round_trips() {
    let kv = MemoryKv::new();
    let coll = new_collection(&kv);

    let result = coll
        .insert_one(doc! { "name": "A", "age": 30, "tags": ["x", "y"] })
        .unwrap();

    let found = coll.find_one(&doc! { "name": "A" }).unwrap().unwrap();
    assert_eq!(found.get("_id").unwrap(), &result.id);
    assert_eq!(found.get_i32("age").unwrap(), 30);
}

#[test]
fn duplicate_id_insert_is_rejected() {
    let kv = MemoryKv::new();
    let coll = new_collection(&kv);
    coll.insert_one(doc! { "_id": "acct-1", "name": "Acme" }).unwrap();

    let err = coll.insert_one(doc! { "_id": "acct-1", "name": "Dup" }).unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey(_)));
}

#[test]
fn delete_then_find_returns_nothing() {
    let kv = MemoryKv::new();
    seed_records(&kv);
    let coll = new_collection(&kv);

    let result = coll.delete_one(&doc! { "_id": "acct-1" }).unwrap();
    assert_eq!(result.deleted, 1);
    assert!(coll.find_one(&doc! { "_id": "acct-1" }).unwrap().is_none());
}

#[test]
fn find_with_sort_skip_limit() {
    let kv = MemoryKv::new();
    seed_records(&kv);
    let coll = new_collection(&kv);

    let options = FindOptions {
        sort: Some(docstore_db::Sort {
            keys: vec![docstore_db::SortKey {
                path: "revenue".to_string(),
                direction: docstore_db::SortDirection::Descending,
            }],
        }),
        skip: Some(1),
        limit: Some(2),
        projection: None,
    };
    let out = coll.find(&doc! {}, &options).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get_str("_id").unwrap(), "acct-4");
    assert_eq!(out[1].get_str("_id").unwrap(), "acct-2");
}

#[test]
fn count_documents_obeys_filter_and_options() {
    let kv = MemoryKv::new();
    seed_records(&kv);
    let coll = new_collection(&kv);

    let count = coll.count_documents(&doc! { "status": "active" }, &FindOptions::default()).unwrap();
    assert_eq!(count, 3);
}

#[test]
fn estimated_document_count_ignores_filters() {
    let kv = MemoryKv::new();
    seed_records(&kv);
    let coll = new_collection(&kv);
    assert_eq!(coll.estimated_document_count().unwrap(), 5);
}

#[test]
fn distinct_returns_deduplicated_values() {
    let kv = MemoryKv::new();
    seed_records(&kv);
    let coll = new_collection(&kv);

    let mut statuses = coll.distinct("status", &doc! {}).unwrap();
    statuses.sort_by_key(|v| format!("{v:?}"));
    assert_eq!(
        statuses,
        vec![
            Bson::String("active".into()),
            Bson::String("rejected".into()),
            Bson::String("snoozed".into())
        ]
    );
}
