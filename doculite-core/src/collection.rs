//! The collection: an insertion-ordered set of documents, its secondary
//! indexes, and (optionally) the NDJSON file it persists to.

use crate::error::{CollectionError, Result};
use crate::index::Index;
use crate::planner::{self, IndexSource};
use crate::storage::Sink;
use crate::value::{normalize, Document};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom, Write};
use uuid::Uuid;

pub struct Collection {
    primary_key: String,
    docs: HashMap<String, Document>,
    order: Vec<String>,
    dirty: HashSet<String>,
    indexes: HashMap<String, Index>,
    sink: Option<Sink>,
    sink_path: Option<String>,
    requires_flush: bool,
    closed: bool,
}

impl Collection {
    /// A purely in-memory collection with no backing file at all.
    pub fn new(primary_key: Option<&str>) -> Self {
        Collection {
            primary_key: primary_key.unwrap_or("_id").to_string(),
            docs: HashMap::new(),
            order: Vec::new(),
            dirty: HashSet::new(),
            indexes: HashMap::new(),
            sink: None,
            sink_path: None,
            requires_flush: false,
            closed: false,
        }
    }

    /// Open (creating if absent) the NDJSON file at `path`, replaying its
    /// contents into memory. The sentinel path `:memory:` binds an
    /// in-memory sink with no filesystem I/O.
    pub fn open(path: &str, primary_key: Option<&str>) -> Result<Self> {
        let primary_key = primary_key.unwrap_or("_id").to_string();
        let mut sink = Sink::open(path)?;
        let mut contents = String::new();
        sink.handle_mut().read_to_string(&mut contents)?;

        let mut collection = Collection {
            primary_key,
            docs: HashMap::new(),
            order: Vec::new(),
            dirty: HashSet::new(),
            indexes: HashMap::new(),
            sink: Some(sink),
            sink_path: Some(path.to_string()),
            requires_flush: false,
            closed: false,
        };

        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)?;
            let obj = value
                .as_object()
                .ok_or_else(|| CollectionError::Internal("NDJSON line is not an object".into()))?
                .clone();
            let id = obj
                .get(&collection.primary_key)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CollectionError::TypeMismatch(
                        "persisted document is missing its primary key".into(),
                    )
                })?
                .to_string();
            collection.order.push(id.clone());
            collection.docs.insert(id, obj);
        }
        Ok(collection)
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Live view over documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.order
            .iter()
            .filter_map(move |id| self.docs.get(id).map(|doc| (id.as_str(), doc)))
    }

    pub fn requires_flush(&self) -> bool {
        self.requires_flush
    }

    fn assert_open(&self) -> Result<()> {
        if self.closed {
            return Err(CollectionError::Closed);
        }
        Ok(())
    }

    /// Returns a deep copy of the document stored under `id`.
    pub fn get(&self, id: &str) -> Result<Document> {
        self.assert_open()?;
        self.docs
            .get(id)
            .cloned()
            .ok_or_else(|| CollectionError::NotFound(format!("no document with id {}", id)))
    }

    /// Store `doc` under `id`. The document is normalized first; a missing
    /// primary key field is filled in with `id`, a present-but-mismatched
    /// one is a type error.
    pub fn set(&mut self, id: &str, doc: Value) -> Result<()> {
        self.assert_open()?;
        let normalized = normalize(&doc)?;
        let mut obj = normalized.as_object().cloned().ok_or_else(|| {
            CollectionError::TypeMismatch("document must be a JSON object".into())
        })?;

        match obj.get(&self.primary_key) {
            Some(Value::String(existing)) if existing == id => {}
            Some(Value::String(_)) => {
                return Err(CollectionError::TypeMismatch(format!(
                    "primary key in document does not match id {}",
                    id
                )))
            }
            Some(_) => {
                return Err(CollectionError::TypeMismatch(
                    "primary key must be a string".into(),
                ))
            }
            None => {
                obj.insert(self.primary_key.clone(), Value::String(id.to_string()));
            }
        }

        if !self.docs.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.docs.insert(id.to_string(), obj);
        self.dirty.insert(id.to_string());
        self.requires_flush = self.sink.is_some();
        Ok(())
    }

    /// Insert `doc`, assigning a fresh v4 UUID as its primary key if it
    /// doesn't already carry one. Returns the assigned id.
    pub fn insert_one(&mut self, doc: Value) -> Result<String> {
        self.assert_open()?;
        let normalized = normalize(&doc)?;
        let obj = normalized.as_object().cloned().ok_or_else(|| {
            CollectionError::TypeMismatch("document must be a JSON object".into())
        })?;
        let id = match obj.get(&self.primary_key) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(CollectionError::TypeMismatch(
                    "primary key must be a string".into(),
                ))
            }
            None => Uuid::new_v4().to_string(),
        };
        self.set(&id, Value::Object(obj))?;
        Ok(id)
    }

    /// Fill in any missing primary keys and upsert every document.
    pub fn update(&mut self, docs: Vec<Value>) -> Result<Vec<String>> {
        docs.into_iter().map(|doc| self.insert_one(doc)).collect()
    }

    fn remove_internal(&mut self, id: &str) {
        self.docs.remove(id);
        self.order.retain(|existing| existing != id);
        for index in self.indexes.values_mut() {
            index.remove_id(id);
        }
        self.dirty.remove(id);
        self.requires_flush = self.sink.is_some();
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.assert_open()?;
        if !self.docs.contains_key(id) {
            return Err(CollectionError::NotFound(format!(
                "no document with id {}",
                id
            )));
        }
        self.remove_internal(id);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.assert_open()?;
        self.docs.clear();
        self.order.clear();
        self.dirty.clear();
        self.indexes.clear();
        self.requires_flush = self.sink.is_some();
        Ok(())
    }

    /// Delete the first match for `filter`, if any. Absence of a match is
    /// not an error.
    pub fn delete_one(&mut self, filter: &Value) -> Result<Option<String>> {
        self.assert_open()?;
        let matched = self.find(filter, 1)?;
        match matched.into_iter().next() {
            Some(id) => {
                self.remove_internal(&id);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub fn delete_many(&mut self, filter: &Value) -> Result<Vec<String>> {
        self.assert_open()?;
        let matched = self.find(filter, 0)?;
        for id in &matched {
            self.remove_internal(id);
        }
        Ok(matched)
    }

    /// Replace the document matching `filter` with `replacement`. When
    /// `filter` is exactly `{primary_key: id}`, the id is used directly;
    /// otherwise the first query match is used. If nothing matches and
    /// `upsert` is true, `replacement` is inserted. The affected id is
    /// returned in every branch, including the direct-id branch.
    pub fn replace_one(
        &mut self,
        filter: &Value,
        replacement: Value,
        upsert: bool,
    ) -> Result<Option<String>> {
        self.assert_open()?;
        if let Some(id) = exact_primary_key_filter(filter, &self.primary_key) {
            if self.docs.contains_key(&id) || upsert {
                self.set(&id, replacement)?;
                return Ok(Some(id));
            }
            return Ok(None);
        }

        let matched = self.find(filter, 1)?;
        if let Some(id) = matched.into_iter().next() {
            self.set(&id, replacement)?;
            return Ok(Some(id));
        }
        if upsert {
            let id = self.insert_one(replacement)?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Fetch the named secondary index, refreshing dirty ids first.
    /// Requesting the primary key is an error; requesting an unbuilt
    /// index with `build=false` is not-found rather than building it.
    pub fn index(&mut self, key: &str, build: bool) -> Result<&Index> {
        self.assert_open()?;
        if key == self.primary_key {
            return Err(CollectionError::TypeMismatch(
                "the primary key is not a secondary index".into(),
            ));
        }
        self.update_indexes();
        if self.indexes.contains_key(key) {
            return Ok(self.indexes.get(key).unwrap());
        }
        if build {
            let idx = Index::build(&self.docs, key, &self.primary_key)?;
            self.indexes.insert(key.to_string(), idx);
            Ok(self.indexes.get(key).unwrap())
        } else {
            Err(CollectionError::NotFound(format!(
                "no index built for key {}",
                key
            )))
        }
    }

    pub fn find(&mut self, filter: &Value, limit: usize) -> Result<Vec<String>> {
        self.assert_open()?;
        planner::find(self, filter, limit)
    }

    pub fn find_one(&mut self, filter: &Value) -> Result<Option<String>> {
        Ok(self.find(filter, 1)?.into_iter().next())
    }

    /// Write one JSON object per line, in insertion order.
    pub fn dump(&self, out: &mut dyn Write) -> Result<()> {
        for id in &self.order {
            if let Some(doc) = self.docs.get(id) {
                let line = serde_json::to_string(doc)?;
                writeln!(out, "{}", line).map_err(CollectionError::from)?;
            }
        }
        Ok(())
    }

    /// Truncate the backing file and rewrite every document, in
    /// insertion order. A no-op (and always successful) when there is no
    /// backing file to diverge from.
    pub fn flush(&mut self) -> Result<()> {
        self.assert_open()?;
        if let Some(sink) = &mut self.sink {
            let handle = sink.handle_mut();
            handle.set_len(0)?;
            handle.seek(SeekFrom::Start(0))?;
            let mut buf = Vec::new();
            for id in &self.order {
                if let Some(doc) = self.docs.get(id) {
                    serde_json::to_writer(&mut buf, doc)?;
                    buf.push(b'\n');
                }
            }
            handle.write_all(&buf)?;
            handle.sync_all()?;
        }
        crate::logging::log_flush(self.sink_path.as_deref(), self.order.len());
        self.requires_flush = false;
        Ok(())
    }

    /// Flush and release the backing file. After `close`, every operation
    /// other than another `close` call fails with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        crate::logging::log_close(self.sink_path.as_deref());
        self.sink = None;
        self.indexes.clear();
        self.closed = true;
        Ok(())
    }

    /// Re-home every dirty id against every known index: remove stale
    /// entries, re-resolve and re-insert. `O(|dirty| * |indexes|)`,
    /// independent of collection size.
    fn update_indexes(&mut self) {
        if self.dirty.is_empty() {
            return;
        }
        let dirty: Vec<String> = self.dirty.drain().collect();
        for id in &dirty {
            for index in self.indexes.values_mut() {
                index.remove_id(id);
            }
        }
        for id in &dirty {
            if let Some(doc) = self.docs.get(id) {
                for index in self.indexes.values_mut() {
                    index.index_one(id, doc);
                }
            }
        }
    }
}

fn exact_primary_key_filter(filter: &Value, primary_key: &str) -> Option<String> {
    let obj = filter.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(primary_key)?.as_str().map(|s| s.to_string())
}

impl IndexSource for Collection {
    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn contains_id(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    fn all_ids(&self) -> HashSet<String> {
        self.docs.keys().cloned().collect()
    }

    fn ordered_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    fn index_for(&mut self, key: &str) -> Result<&Index> {
        self.update_indexes();
        if !self.indexes.contains_key(key) {
            let idx = Index::build(&self.docs, key, &self.primary_key)?;
            self.indexes.insert(key.to_string(), idx);
        }
        Ok(self.indexes.get(key).unwrap())
    }
}
