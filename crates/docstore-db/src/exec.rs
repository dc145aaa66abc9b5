//! Query execution (§4.6): stream candidate ids for the planned index
//! shape, re-fetch and re-verify every candidate against the full filter,
//! dedupe by id, then apply sort, skip, limit, and projection in that
//! order. Grounded on `slate-db/src/exec.rs`'s candidate-then-verify
//! pipeline, scoped to the single index the planner ever consults.

use std::collections::HashSet;

use bson::{Bson, Document};

use docstore_engine::{serialize_indexed_value, IndexSpec, KeyPrefix};
use docstore_query::{FilterExpr, FindOptions};

use docstore_store::Kv;

use crate::compare::compare_for_sort;
use crate::error::DbError;
use crate::filter_eval::matches;
use crate::path::{resolve_path, Resolved};
use crate::plan::{plan, IndexLookup, PlanNode};
use crate::record::{decode_record, record_key};

/// Run `filter`/`options` against `collection`, choosing among `indexes`.
pub fn find<K: Kv>(
    kv: &K,
    collection: &str,
    filter: &FilterExpr,
    options: &FindOptions,
    indexes: &[IndexSpec],
) -> Result<Vec<Document>, DbError> {
    let node = plan(filter, indexes);
    let candidates = candidate_ids(kv, collection, &node)?;

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for id in candidates {
        if !seen.insert(docstore_engine::encode_id(&id)) {
            continue;
        }
        let key = record_key::encode(collection, &id);
        let Some((bytes, _)) = kv.get(&key)? else { continue };
        let doc = decode_record(&bytes)?;
        if matches(filter, &doc) {
            results.push(doc);
        }
    }

    Ok(apply_pipeline(results, options))
}

fn candidate_ids<K: Kv>(kv: &K, collection: &str, node: &PlanNode) -> Result<Vec<Bson>, DbError> {
    match node {
        PlanNode::Scan => scan_all_ids(kv, collection),
        PlanNode::IndexScan { index, lookup } => index_scan_ids(kv, collection, index, lookup),
        PlanNode::Compound { index, lead } => compound_lead_ids(kv, collection, index, lead),
    }
}

fn scan_all_ids<K: Kv>(kv: &K, collection: &str) -> Result<Vec<Bson>, DbError> {
    let prefix = KeyPrefix::Record(collection).encode();
    let mut ids = Vec::new();
    for entry in kv.list_prefix(&prefix)? {
        let (key, _, _) = entry?;
        if let Some(id) = record_key::decode_id(&key) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn index_scan_ids<K: Kv>(
    kv: &K,
    collection: &str,
    index: &IndexSpec,
    lookup: &IndexLookup,
) -> Result<Vec<Bson>, DbError> {
    match lookup {
        IndexLookup::Eq(v) => eq_ids(kv, collection, index, v),
        IndexLookup::In(values) => {
            let mut ids = Vec::new();
            for v in values {
                ids.extend(eq_ids(kv, collection, index, v)?);
            }
            Ok(ids)
        }
        IndexLookup::Range { .. } => range_ids(kv, collection, index, lookup),
    }
}

fn eq_ids<K: Kv>(kv: &K, collection: &str, index: &IndexSpec, value: &Bson) -> Result<Vec<Bson>, DbError> {
    let composite = serialize_indexed_value(value).into_bytes();
    let prefix = KeyPrefix::IndexValue(collection, &index.name, &composite).encode();
    let mut ids = Vec::new();
    for entry in kv.list_prefix(&prefix)? {
        let (key, _, _) = entry?;
        if let Some(id) = docstore_engine::decode_id(&key[prefix.len()..]) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Range bound check against a raw composite-value byte string. The
/// serialization scheme (§4.5) is built so that byte order matches value
/// order for every indexable kind, so bounds can be compared as encoded
/// bytes without decoding back to `Bson`.
fn range_satisfied(composite: &[u8], lookup: &IndexLookup) -> bool {
    let IndexLookup::Range { gt, gte, lt, lte } = lookup else {
        return true;
    };
    if let Some(v) = gt {
        if composite <= serialize_indexed_value(v).as_bytes() {
            return false;
        }
    }
    if let Some(v) = gte {
        if composite < serialize_indexed_value(v).as_bytes() {
            return false;
        }
    }
    if let Some(v) = lt {
        if composite >= serialize_indexed_value(v).as_bytes() {
            return false;
        }
    }
    if let Some(v) = lte {
        if composite > serialize_indexed_value(v).as_bytes() {
            return false;
        }
    }
    true
}

fn range_ids<K: Kv>(
    kv: &K,
    collection: &str,
    index: &IndexSpec,
    lookup: &IndexLookup,
) -> Result<Vec<Bson>, DbError> {
    let prefix = KeyPrefix::IndexField(collection, &index.name).encode();
    let mut ids = Vec::new();
    for entry in kv.list_prefix(&prefix)? {
        let (key, _, _) = entry?;
        let rest = &key[prefix.len()..];
        // The final `\0` before the id bytes is the only separator this
        // layer needs; using the last one tolerates the embedded NUL byte
        // in the null sentinel (§4.5) as long as the id itself isn't null.
        let Some(sep) = rest.iter().rposition(|&b| b == 0) else { continue };
        let (composite, id_bytes) = (&rest[..sep], &rest[sep + 1..]);
        if range_satisfied(composite, lookup) {
            if let Some(id) = docstore_engine::decode_id(id_bytes) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

fn compound_lead_ids<K: Kv>(
    kv: &K,
    collection: &str,
    index: &IndexSpec,
    lead: &IndexLookup,
) -> Result<Vec<Bson>, DbError> {
    match lead {
        IndexLookup::Eq(v) => compound_eq_ids(kv, collection, index, v),
        IndexLookup::In(values) => {
            let mut ids = Vec::new();
            for v in values {
                ids.extend(compound_eq_ids(kv, collection, index, v)?);
            }
            Ok(ids)
        }
        IndexLookup::Range { .. } => Ok(Vec::new()),
    }
}

fn compound_eq_ids<K: Kv>(
    kv: &K,
    collection: &str,
    index: &IndexSpec,
    value: &Bson,
) -> Result<Vec<Bson>, DbError> {
    let mut prefix = KeyPrefix::IndexField(collection, &index.name).encode();
    prefix.extend_from_slice(&docstore_engine::lead_field_prefix(value));

    let mut ids = Vec::new();
    for entry in kv.list_prefix(&prefix)? {
        let (key, _, _) = entry?;
        let rest = &key[prefix.len()..];
        let Some(sep) = rest.iter().rposition(|&b| b == 0) else { continue };
        if let Some(id) = docstore_engine::decode_id(&rest[sep + 1..]) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn sort_value(doc: &Document, path: &str) -> Bson {
    match resolve_path(doc, path) {
        Resolved::Value(v) => v.clone(),
        Resolved::Many(vs) => vs.first().map(|v| (*v).clone()).unwrap_or(Bson::Null),
        Resolved::Absent => Bson::Null,
    }
}

fn apply_pipeline(mut results: Vec<Document>, options: &FindOptions) -> Vec<Document> {
    if let Some(sort) = &options.sort {
        if !sort.is_empty() {
            results.sort_by(|a, b| {
                for key in &sort.keys {
                    let av = sort_value(a, &key.path);
                    let bv = sort_value(b, &key.path);
                    let ord = compare_for_sort(&av, &bv);
                    let ord = if key.direction == docstore_query::SortDirection::Descending {
                        ord.reverse()
                    } else {
                        ord
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
    }

    let skip = options.skip.unwrap_or(0) as usize;
    let mut results: Vec<Document> = results.into_iter().skip(skip).collect();
    if let Some(limit) = options.limit {
        results.truncate(limit as usize);
    }

    if let Some(projection) = &options.projection {
        results.iter().map(|d| projection.apply(d)).collect()
    } else {
        results
    }
}
