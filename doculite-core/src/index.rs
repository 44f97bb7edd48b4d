//! Secondary index over one dotted field: a bucket map from canonical
//! value to the set of primary ids that resolve to it, built lazily and
//! maintained incrementally via a dirty-id list kept by the collection.

use crate::error::{CollectionError, Result};
use crate::path::{self, PathLookup};
use crate::value::{Canonical, Document, DICT_PLACEHOLDER};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Field-comparison operators dispatched against an index's bucket keys.
/// `$exists` is handled by the planner directly (it needs the union of all
/// buckets, not a per-key predicate), so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Regex,
    Type,
    Where,
}

impl Operator {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            "$regex" => Some(Operator::Regex),
            "$type" => Some(Operator::Type),
            "$where" => Some(Operator::Where),
            _ => None,
        }
    }
}

/// One secondary index, keyed by canonical value, over a single dotted
/// field path.
#[derive(Debug, Default)]
pub struct Index {
    key: String,
    buckets: HashMap<BucketKey, HashSet<String>>,
}

/// Canonical value, plus whether it came from a dict-valued resolution
/// (the `DICT_PLACEHOLDER` sentinel), used as the bucket's hash key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BucketKey {
    Value(Canonical),
    Dict,
}

impl Index {
    /// Build an index over `key` from scratch against every document.
    /// Missing values are silently skipped; mapping-valued resolutions are
    /// recorded under the dict sentinel.
    pub fn build(docs: &HashMap<String, Document>, key: &str, primary_key: &str) -> Result<Self> {
        if key == primary_key {
            return Err(CollectionError::MalformedFilter(format!(
                "cannot build a secondary index on the primary key field {}",
                primary_key
            )));
        }
        let mut index = Index {
            key: key.to_string(),
            buckets: HashMap::new(),
        };
        for (id, doc) in docs {
            index.index_one(id, doc);
        }
        index.prune_empty();
        crate::logging::log_index_built(key, index.buckets.len());
        Ok(index)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resolve `doc`'s value for this index's field and insert `id` into
    /// the matching bucket. Missing values are skipped. A key that itself
    /// contains a literal dot is indexed under both its nested-descent
    /// resolution and its flat-key resolution (the "dual match" rule),
    /// with a deprecation warning logged for the flat match.
    pub fn index_one(&mut self, id: &str, doc: &Document) {
        if let PathLookup::Found(value) = path::resolve(doc, &self.key) {
            self.insert_value(id, &value);
        }
        if self.key.contains('.') {
            if let PathLookup::Found(value) = path::resolve_flat(doc, &self.key) {
                crate::logging::log_dotted_key_deprecation(&self.key);
                self.insert_value(id, &value);
            }
        }
    }

    fn insert_value(&mut self, id: &str, value: &Value) {
        let bucket_key = bucket_key_for(value);
        self.buckets
            .entry(bucket_key)
            .or_default()
            .insert(id.to_string());
    }

    /// Remove `id` from every bucket, pruning any bucket left empty.
    pub fn remove_id(&mut self, id: &str) {
        self.buckets.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    fn prune_empty(&mut self) {
        self.buckets.retain(|_, ids| !ids.is_empty());
    }

    /// Union of every bucket's ids: every id that has a value at all for
    /// this field (used by `$exists: true`).
    pub fn all_indexed_ids(&self) -> HashSet<String> {
        self.buckets.values().flatten().cloned().collect()
    }

    pub fn has_empty_buckets(&self) -> bool {
        self.buckets.values().any(|ids| ids.is_empty())
    }

    /// Equality lookup: the ids whose resolved value canonicalizes equal
    /// to `value`. A mapping-valued `value` never equality-matches (it
    /// only ever satisfies `$exists`).
    pub fn equals(&self, value: &Value) -> HashSet<String> {
        match bucket_key_for(value) {
            BucketKey::Dict => HashSet::new(),
            key => self.buckets.get(&key).cloned().unwrap_or_default(),
        }
    }

    /// Scan every bucket key and union the buckets for which `op(key, arg)`
    /// holds, per the operator semantics table.
    pub fn find_with_operator(&self, op: Operator, arg: &Value) -> Result<HashSet<String>> {
        let mut out = HashSet::new();
        match op {
            Operator::Eq => return Ok(self.equals(arg)),
            Operator::Ne => {
                let target = bucket_key_for(arg);
                for (key, ids) in &self.buckets {
                    if *key != target {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
            Operator::In => {
                let items = arg.as_array().ok_or_else(|| {
                    CollectionError::MalformedFilter("$in requires a list argument".into())
                })?;
                for item in items {
                    out.extend(self.equals(item));
                }
            }
            Operator::Nin => {
                let items = arg.as_array().ok_or_else(|| {
                    CollectionError::MalformedFilter("$nin requires a list argument".into())
                })?;
                let targets: HashSet<BucketKey> = items.iter().map(bucket_key_for).collect();
                for (key, ids) in &self.buckets {
                    if !targets.contains(key) {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let target = Canonical::from_value(arg);
                for (key, ids) in &self.buckets {
                    let BucketKey::Value(value) = key else {
                        continue;
                    };
                    let matches = match value.partial_cmp(&target) {
                        Some(ord) => match op {
                            Operator::Gt => ord.is_gt(),
                            Operator::Gte => ord.is_ge(),
                            Operator::Lt => ord.is_lt(),
                            Operator::Lte => ord.is_le(),
                            _ => unreachable!(),
                        },
                        // incomparable types never match, they never fail
                        None => false,
                    };
                    if matches {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
            Operator::Regex => {
                let pattern = arg.as_str().ok_or_else(|| {
                    CollectionError::MalformedFilter("$regex requires a string argument".into())
                })?;
                let re = Regex::new(pattern).map_err(|e| {
                    CollectionError::MalformedFilter(format!("invalid $regex pattern: {}", e))
                })?;
                for (key, ids) in &self.buckets {
                    let is_match = match key {
                        BucketKey::Value(Canonical::Str(s)) => re.is_match(s),
                        // non-strings never match a regex
                        _ => false,
                    };
                    if is_match {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
            Operator::Type => {
                let name = arg.as_str().ok_or_else(|| {
                    CollectionError::MalformedFilter("$type requires a string argument".into())
                })?;
                if !matches!(name, "int" | "float" | "bool" | "str" | "list" | "null") {
                    return Err(CollectionError::MalformedFilter(format!(
                        "unknown $type name: {}",
                        name
                    )));
                }
                for (key, ids) in &self.buckets {
                    if type_name(key) == name {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
            Operator::Where => {
                let source = arg.as_str().ok_or_else(|| {
                    CollectionError::MalformedFilter("$where requires a string argument".into())
                })?;
                let expr = crate::where_expr::parse(source)?;
                for (key, ids) in &self.buckets {
                    let value = value_for(key);
                    if crate::where_expr::eval(&expr, &value)? {
                        out.extend(ids.iter().cloned());
                    }
                }
            }
        }
        Ok(out)
    }
}

fn bucket_key_for(value: &Value) -> BucketKey {
    if value.is_object() {
        BucketKey::Dict
    } else {
        BucketKey::Value(Canonical::from_value(value))
    }
}

fn type_name(key: &BucketKey) -> &'static str {
    match key {
        BucketKey::Dict => "dict",
        BucketKey::Value(Canonical::Null) => "null",
        BucketKey::Value(Canonical::Bool(_)) => "bool",
        BucketKey::Value(Canonical::Int(_)) => "int",
        BucketKey::Value(Canonical::Float(_)) => "float",
        BucketKey::Value(Canonical::Str(_)) => "str",
        BucketKey::Value(Canonical::Seq(_)) => "list",
        BucketKey::Value(Canonical::Dict) => "dict",
    }
}

fn value_for(key: &BucketKey) -> Value {
    match key {
        BucketKey::Dict | BucketKey::Value(Canonical::Dict) => {
            Value::Object(serde_json::Map::new())
        }
        BucketKey::Value(Canonical::Null) => Value::Null,
        BucketKey::Value(Canonical::Bool(b)) => Value::Bool(*b),
        BucketKey::Value(Canonical::Int(i)) => Value::from(*i),
        BucketKey::Value(Canonical::Float(bits)) => {
            serde_json::Number::from_f64(f64::from_bits(*bits))
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        BucketKey::Value(Canonical::Str(s)) => Value::String(s.clone()),
        BucketKey::Value(Canonical::Seq(items)) => Value::Array(
            items
                .iter()
                .map(|c| value_for(&BucketKey::Value(c.clone())))
                .collect(),
        ),
    }
}

#[allow(dead_code)]
pub(crate) const _DICT_PLACEHOLDER_REF: &str = DICT_PLACEHOLDER;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(pairs: &[(&str, Value)]) -> HashMap<String, Document> {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), v.as_object().unwrap().clone()))
            .collect()
    }

    #[test]
    fn build_skips_missing_values() {
        let d = docs(&[("a", json!({"age": 1})), ("b", json!({}))]);
        let idx = Index::build(&d, "age", "_id").unwrap();
        assert_eq!(idx.equals(&json!(1)).len(), 1);
        assert_eq!(idx.all_indexed_ids().len(), 1);
    }

    #[test]
    fn gt_excludes_incomparable_types() {
        let d = docs(&[("a", json!({"v": 5})), ("b", json!({"v": "x"}))]);
        let idx = Index::build(&d, "v", "_id").unwrap();
        let result = idx.find_with_operator(Operator::Gt, &json!(1)).unwrap();
        assert_eq!(result, HashSet::from(["a".to_string()]));
    }

    #[test]
    fn remove_id_prunes_empty_buckets() {
        let d = docs(&[("a", json!({"v": 1}))]);
        let mut idx = Index::build(&d, "v", "_id").unwrap();
        idx.remove_id("a");
        assert!(!idx.has_empty_buckets());
        assert_eq!(idx.all_indexed_ids().len(), 0);
    }

    #[test]
    fn type_rejects_unknown_name() {
        let d = docs(&[("a", json!({"v": 1}))]);
        let idx = Index::build(&d, "v", "_id").unwrap();
        assert!(idx
            .find_with_operator(Operator::Type, &json!("weird"))
            .is_err());
    }

    #[test]
    fn regex_only_matches_strings() {
        let d = docs(&[("a", json!({"v": "hello"})), ("b", json!({"v": 5}))]);
        let idx = Index::build(&d, "v", "_id").unwrap();
        let result = idx
            .find_with_operator(Operator::Regex, &json!("^he"))
            .unwrap();
        assert_eq!(result, HashSet::from(["a".to_string()]));
    }
}
