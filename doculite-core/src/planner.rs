//! Query planner/executor: turns a validated filter into a primary-id set
//! by building or reusing one secondary index per referenced field and
//! combining the per-field candidate sets under AND/OR/NOT.

use crate::error::Result;
use crate::index::{Index, Operator};
use crate::traverse;
use crate::value::normalize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// What the planner needs from its host: id bookkeeping and lazy,
/// dirty-refreshed access to per-field indexes. `Collection` implements
/// this; the planner itself has no notion of documents or persistence.
pub trait IndexSource {
    fn primary_key(&self) -> &str;
    fn contains_id(&self, id: &str) -> bool;
    fn all_ids(&self) -> HashSet<String>;
    /// All ids in insertion order, for the match-all boundary case.
    fn ordered_ids(&self) -> Vec<String>;
    /// Fetch (building and refreshing if necessary) the index for `key`.
    fn index_for(&mut self, key: &str) -> Result<&Index>;
}

/// `find(filter, limit)`. `filter` is the caller's raw (unnormalized)
/// value; it is never mutated, only read through a normalized copy.
pub fn find<T: IndexSource>(src: &mut T, filter: &Value, limit: usize) -> Result<Vec<String>> {
    let normalized = normalize(filter)?;
    crate::filter::validate(&normalized)?;

    if is_match_all(&normalized) {
        return Ok(apply_limit(src.ordered_ids(), limit));
    }

    let set = find_set_normalized(src, &normalized)?;
    Ok(apply_limit(set.into_iter().collect(), limit))
}

/// Same as `find` but returns the unordered id set with no limit applied;
/// used both as the public "give me every match" entry point and as the
/// recursive call for `$and`/`$or`/`$not` subtrees.
pub fn find_set<T: IndexSource>(src: &mut T, filter: &Value) -> Result<HashSet<String>> {
    let normalized = normalize(filter)?;
    crate::filter::validate(&normalized)?;
    find_set_normalized(src, &normalized)
}

fn is_match_all(normalized: &Value) -> bool {
    matches!(normalized, Value::Null) || matches!(normalized, Value::Object(m) if m.is_empty())
}

fn find_set_normalized<T: IndexSource>(src: &mut T, normalized: &Value) -> Result<HashSet<String>> {
    if is_match_all(normalized) {
        return Ok(src.all_ids());
    }
    let map = match normalized {
        Value::Object(map) => map.clone(),
        _ => unreachable!("validate() only accepts null or object filters"),
    };
    evaluate(src, map)
}

fn evaluate<T: IndexSource>(src: &mut T, mut working: Map<String, Value>) -> Result<HashSet<String>> {
    let mut candidates: Option<HashSet<String>> = None;

    // Primary-key short-circuit: an exact (undotted) match on the primary
    // key field is resolved against the id set directly, never through an
    // index.
    let primary_key = src.primary_key().to_string();
    if let Some(pk_value) = working.remove(&primary_key) {
        let matched = match pk_value.as_str() {
            Some(id) if src.contains_id(id) => HashSet::from([id.to_string()]),
            _ => HashSet::new(),
        };
        candidates = Some(intersect(candidates, matched));
        if candidates.as_ref().is_some_and(HashSet::is_empty) {
            return Ok(HashSet::new());
        }
    }

    let not_subtree = working.remove("$not");
    let and_subtrees = working.remove("$and");
    let or_subtrees = working.remove("$or");

    for (key, value) in traverse::flatten(&working) {
        let matched = evaluate_field_entry(src, &key, &value)?;
        candidates = Some(intersect(candidates, matched));
        if candidates.as_ref().is_some_and(HashSet::is_empty) {
            return Ok(HashSet::new());
        }
    }

    if let Some(subtree) = not_subtree {
        let excluded = find_set_normalized(src, &subtree)?;
        let universe = src.all_ids();
        let complement: HashSet<String> = universe.difference(&excluded).cloned().collect();
        candidates = Some(intersect(candidates, complement));
        if candidates.as_ref().is_some_and(HashSet::is_empty) {
            return Ok(HashSet::new());
        }
    }

    if let Some(Value::Array(subtrees)) = and_subtrees {
        for subtree in subtrees {
            let matched = find_set_normalized(src, &subtree)?;
            candidates = Some(intersect(candidates, matched));
            if candidates.as_ref().is_some_and(HashSet::is_empty) {
                return Ok(HashSet::new());
            }
        }
    }

    if let Some(Value::Array(subtrees)) = or_subtrees {
        let mut union = HashSet::new();
        for subtree in subtrees {
            union.extend(find_set_normalized(src, &subtree)?);
        }
        candidates = Some(intersect(candidates, union));
    }

    Ok(candidates.unwrap_or_else(|| src.all_ids()))
}

fn evaluate_field_entry<T: IndexSource>(
    src: &mut T,
    key: &str,
    value: &Value,
) -> Result<HashSet<String>> {
    match key.rfind('.') {
        Some(pos) if key[pos + 1..].starts_with('$') => {
            let base_key = &key[..pos];
            let op_name = &key[pos + 1..];
            if op_name == "$exists" {
                let index = src.index_for(base_key)?;
                let indexed = index.all_indexed_ids();
                return Ok(if value.as_bool().unwrap_or(false) {
                    indexed
                } else {
                    let universe = src.all_ids();
                    universe.difference(&indexed).cloned().collect()
                });
            }
            let op = Operator::parse(op_name).expect("operator already validated");
            let index = src.index_for(base_key)?;
            index.find_with_operator(op, value)
        }
        _ => {
            let index = src.index_for(key)?;
            Ok(index.equals(value))
        }
    }
}

fn intersect(acc: Option<HashSet<String>>, other: HashSet<String>) -> HashSet<String> {
    match acc {
        None => other,
        Some(existing) => existing.intersection(&other).cloned().collect(),
    }
}

fn apply_limit(mut ids: Vec<String>, limit: usize) -> Vec<String> {
    if limit > 0 && ids.len() > limit {
        ids.truncate(limit);
    }
    ids
}
