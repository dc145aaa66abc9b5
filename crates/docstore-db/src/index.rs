//! Index manager (§4.5): create/drop/list, backfill with unique-violation
//! rollback, and per-write delta computation. Grounded on
//! `slate-engine/src/kv/catalog.rs::create_index`'s scan-and-backfill
//! shape, generalized to the compound-index case.

use std::collections::HashMap;

use bson::{Bson, Document};
use docstore_engine::{all_fields_present, composite_value, index_key, Catalog, IndexSpec};
use docstore_store::Kv;

use crate::error::DbError;
use crate::record::{decode_record, record_key};

/// One index maintenance action computed from an old/new document pair,
/// to be folded into the same atomic batch as the primary write (§4.7).
#[derive(Debug, Clone)]
pub enum IndexDelta {
    Insert(Vec<u8>),
    Delete(Vec<u8>),
}

/// Whether a document should be indexed at all under a (possibly sparse)
/// spec, and if so, the full entry key for it. Shared with the write
/// coordinator, which needs per-spec uniqueness info `index_deltas` below
/// doesn't expose.
pub(crate) fn entry_for(collection: &str, spec: &IndexSpec, doc: &Document, id: &Bson) -> Option<Vec<u8>> {
    if spec.sparse && !all_fields_present(doc, spec) {
        return None;
    }
    Some(index_key(collection, spec, doc, id))
}

/// Compute the index maintenance deltas for replacing `old` with `new`
/// (either may be absent, for inserts/deletes) under the given specs.
pub fn index_deltas(
    collection: &str,
    id: &Bson,
    old_doc: Option<&Document>,
    new_doc: Option<&Document>,
    specs: &[IndexSpec],
) -> Vec<IndexDelta> {
    let mut deltas = Vec::new();
    for spec in specs {
        let old_key = old_doc.and_then(|d| entry_for(collection, spec, d, id));
        let new_key = new_doc.and_then(|d| entry_for(collection, spec, d, id));
        if old_key == new_key {
            continue;
        }
        if let Some(k) = old_key {
            deltas.push(IndexDelta::Delete(k));
        }
        if let Some(k) = new_key {
            deltas.push(IndexDelta::Insert(k));
        }
    }
    deltas
}

pub struct IndexManager<'a, K: Kv> {
    kv: &'a K,
}

impl<'a, K: Kv> IndexManager<'a, K> {
    pub fn new(kv: &'a K) -> Self {
        Self { kv }
    }

    pub fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, DbError> {
        Ok(Catalog::new(self.kv).list_indexes(collection)?)
    }

    /// Create an index and backfill it from every document currently in
    /// the collection. If any two documents collide on a unique index's
    /// composite value, nothing is persisted — the whole operation rolls
    /// back (§4.5).
    pub fn create_index(&self, collection: &str, spec: &IndexSpec) -> Result<(), DbError> {
        if spec.fields.is_empty() {
            return Err(DbError::InvalidInput(format!(
                "index {} has an empty field list",
                spec.name
            )));
        }

        let prefix = docstore_engine::KeyPrefix::Record(collection).encode();
        let mut entries = Vec::new();
        let mut seen_composite: HashMap<Vec<u8>, Bson> = HashMap::new();

        for entry in self.kv.list_prefix(&prefix)? {
            let (key, value, _) = entry?;
            let id = decode_id_from_record_key(&key)?;
            let doc = decode_record(&value)?;

            if spec.sparse && !all_fields_present(&doc, spec) {
                continue;
            }

            if spec.unique {
                let composite = composite_value(&doc, spec);
                if let Some(existing) = seen_composite.insert(composite, id.clone()) {
                    return Err(DbError::DuplicateKey(format!(
                        "index {} backfill found duplicate value for ids {:?} and {:?}",
                        spec.name, existing, id
                    )));
                }
            }

            entries.push(index_key(collection, spec, &doc, &id));
        }

        Catalog::new(self.kv).create_index(collection, spec)?;
        for key in entries {
            self.kv.set(&key, &[])?;
        }
        Ok(())
    }

    pub fn drop_index(&self, collection: &str, index_name: &str) -> Result<(), DbError> {
        let specs = self.list_indexes(collection)?;
        let spec = specs
            .iter()
            .find(|s| s.name == index_name)
            .ok_or_else(|| DbError::IndexNotFound(index_name.to_string()))?;

        let prefix = docstore_engine::KeyPrefix::IndexField(collection, &spec.name).encode();
        let keys: Vec<Vec<u8>> = self
            .kv
            .list_prefix(&prefix)?
            .map(|r| r.map(|(k, _, _)| k))
            .collect::<Result<_, _>>()?;
        for key in keys {
            self.kv.delete(&key)?;
        }

        Catalog::new(self.kv).drop_index(collection, index_name)?;
        Ok(())
    }
}

fn decode_id_from_record_key(key: &[u8]) -> Result<Bson, DbError> {
    record_key::decode_id(key).ok_or_else(|| DbError::Encoding("malformed record key".into()))
}
