use doculite_core::Collection;
use serde_json::{json, Value};
use std::fs;

fn tmp_path(name: &str) -> String {
    format!("/tmp/doculite_test_{}.ndjson", name)
}

#[test]
fn dump_then_reload_preserves_every_document() {
    let path = tmp_path("roundtrip");
    let _ = fs::remove_file(&path);

    {
        let mut c = Collection::open(&path, None).unwrap();
        c.set("a", json!({"v": 1})).unwrap();
        c.set("b", json!({"v": 2})).unwrap();
        c.close().unwrap();
    }

    let mut reopened = Collection::open(&path, None).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get("a").unwrap().get("v").unwrap(), 1);
    assert_eq!(reopened.get("b").unwrap().get("v").unwrap(), 2);
    reopened.close().unwrap();

    let _ = fs::remove_file(&path);
}

#[test]
fn s6_flush_writes_one_ndjson_line_per_document_in_insertion_order() {
    let path = tmp_path("s6");
    let _ = fs::remove_file(&path);

    let mut c = Collection::open(&path, None).unwrap();
    c.set("a", json!({"v": 1})).unwrap();
    c.set("b", json!({"v": 2})).unwrap();
    c.set("c", json!({"v": 3})).unwrap();
    c.flush().unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);

    let parsed: Vec<Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let ids: Vec<&str> = parsed
        .iter()
        .map(|doc| doc.get("_id").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    c.close().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn requires_flush_clears_after_flush_and_is_false_with_no_pending_writes() {
    let path = tmp_path("requires_flush");
    let _ = fs::remove_file(&path);

    let mut c = Collection::open(&path, None).unwrap();
    assert!(!c.requires_flush());
    c.set("a", json!({"v": 1})).unwrap();
    assert!(c.requires_flush());
    c.flush().unwrap();
    assert!(!c.requires_flush());

    c.close().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn memory_sentinel_never_touches_disk() {
    let mut c = Collection::open(":memory:", None).unwrap();
    c.set("a", json!({"v": 1})).unwrap();
    c.flush().unwrap();
    assert!(!std::path::Path::new(":memory:").exists());
    c.close().unwrap();
}

#[test]
fn empty_file_opens_as_empty_collection() {
    let path = tmp_path("empty");
    let _ = fs::remove_file(&path);
    fs::write(&path, "").unwrap();

    let mut c = Collection::open(&path, None).unwrap();
    assert_eq!(c.len(), 0);
    assert_eq!(c.find(&Value::Null, 0).unwrap(), Vec::<String>::new());
    c.close().unwrap();

    let _ = fs::remove_file(&path);
}
