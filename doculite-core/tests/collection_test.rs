use doculite_core::error::CollectionError;
use doculite_core::Collection;
use serde_json::json;

#[test]
fn primary_key_identity_holds_after_insert() {
    let mut c = Collection::new(None);
    let id = c.insert_one(json!({"name": "a"})).unwrap();
    let doc = c.get(&id).unwrap();
    assert_eq!(doc.get("_id").unwrap(), &serde_json::Value::String(id));
}

#[test]
fn insert_one_contains_and_returned_id_agree() {
    let mut c = Collection::new(None);
    let id = c.insert_one(json!({"name": "a"})).unwrap();
    assert!(c.contains(&id));
    assert_eq!(c.get(&id).unwrap().get("_id").unwrap().as_str().unwrap(), id);
}

#[test]
fn find_null_and_empty_filter_match_everything() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    c.set("b", json!({"v": 2})).unwrap();

    let mut all_ids: Vec<String> = c.find(&serde_json::Value::Null, 0).unwrap();
    all_ids.sort();
    let mut empty_ids: Vec<String> = c.find(&json!({}), 0).unwrap();
    empty_ids.sort();
    assert_eq!(all_ids, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(all_ids, empty_ids);
}

#[test]
fn empty_collection_matches_nothing() {
    let mut c = Collection::new(None);
    assert_eq!(c.find(&json!({"v": 1}), 0).unwrap(), Vec::<String>::new());
    assert_eq!(c.find(&serde_json::Value::Null, 0).unwrap(), Vec::<String>::new());
}

#[test]
fn limit_zero_is_unlimited_and_large_limit_is_all_matches() {
    let mut c = Collection::new(None);
    for i in 0..5 {
        c.set(&format!("id{}", i), json!({"v": 1})).unwrap();
    }
    assert_eq!(c.find(&json!({"v": 1}), 0).unwrap().len(), 5);
    assert_eq!(c.find(&json!({"v": 1}), 100).unwrap().len(), 5);
    assert_eq!(c.find(&json!({"v": 1}), 2).unwrap().len(), 2);
}

#[test]
fn index_has_no_empty_buckets_after_deletes() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    c.set("b", json!({"v": 1})).unwrap();
    c.index("v", true).unwrap();
    c.delete("a").unwrap();
    c.delete("b").unwrap();
    let idx = c.index("v", true).unwrap();
    assert!(!idx.has_empty_buckets());
}

#[test]
fn delete_one_without_match_is_not_an_error() {
    let mut c = Collection::new(None);
    assert_eq!(c.delete_one(&json!({"v": 1})).unwrap(), None);
}

#[test]
fn replace_one_via_primary_key_branch_returns_affected_id() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    let result = c
        .replace_one(&json!({"_id": "a"}), json!({"v": 99}), false)
        .unwrap();
    assert_eq!(result, Some("a".to_string()));
    assert_eq!(c.get("a").unwrap().get("v").unwrap(), 99);
}

#[test]
fn replace_one_without_upsert_and_no_match_returns_none() {
    let mut c = Collection::new(None);
    let result = c
        .replace_one(&json!({"v": 123}), json!({"v": 1}), false)
        .unwrap();
    assert_eq!(result, None);
}

#[test]
fn closed_collection_rejects_every_op_but_close() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    c.close().unwrap();
    assert!(matches!(c.get("a"), Err(CollectionError::Closed)));
    assert!(matches!(c.set("b", json!({})), Err(CollectionError::Closed)));
    assert!(matches!(c.find(&json!({}), 0), Err(CollectionError::Closed)));
    assert!(c.close().is_ok());
}

#[test]
fn index_on_primary_key_is_rejected() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    assert!(c.index("_id", true).is_err());
}

#[test]
fn index_without_build_flag_is_not_found_until_built() {
    let mut c = Collection::new(None);
    c.set("a", json!({"v": 1})).unwrap();
    assert!(c.index("v", false).is_err());
    assert!(c.index("v", true).is_ok());
    assert!(c.index("v", false).is_ok());
}
