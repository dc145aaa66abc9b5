//! Write coordinator (§4.7): the per-collection surface callers actually
//! use — insert/update/delete plus the §6 read/metadata operations.
//! Grounded on `slate-db/src/database.rs`'s per-operation method shape,
//! adapted from the teacher's single global-write-lock transaction to one
//! `docstore-engine` atomic batch per mutating call, and from its
//! single-field index bookkeeping to `index_deltas`'s compound case.

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};

use docstore_engine::IndexSpec;
use docstore_query::{parse_filter, parse_update, FilterExpr, FindOptions, UpdateExpr};
use docstore_store::{Check, Kv, Op, StoreError};

use crate::error::DbError;
use crate::exec;
use crate::filter_eval::matches;
use crate::index::{self, index_deltas, IndexDelta, IndexManager};
use crate::path::{resolve_path, Resolved};
use crate::record::{decode_record, record_key};
use crate::update_apply::{self, apply_set_on_insert};

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub id: Bson,
}

#[derive(Debug, Default)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Bson>,
    pub errors: Vec<(usize, DbError)>,
}

#[derive(Debug, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted_id: Option<Bson>,
    pub errors: Vec<(usize, DbError)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// A single collection's write/read surface over a host KV (§6).
pub struct Collection<'a, K: Kv> {
    kv: &'a K,
    name: String,
}

impl<'a, K: Kv> Collection<'a, K> {
    pub fn new(kv: &'a K, name: impl Into<String>) -> Self {
        Self { kv, name: name.into() }
    }

    fn indexes(&self) -> Result<Vec<IndexSpec>, DbError> {
        IndexManager::new(self.kv).list_indexes(&self.name)
    }

    fn primary_key(&self, id: &Bson) -> Vec<u8> {
        record_key::encode(&self.name, id)
    }

    /// Compute the index-maintenance ops for replacing `old` with `new`,
    /// plus `Check::Absent` preconditions (and their keys, for duplicate
    /// classification) for any unique index the new document would enter
    /// under a key it didn't already hold. A document that keeps its own
    /// unique-index key across the update (the common case: the indexed
    /// field wasn't touched) must not precondition against its own
    /// still-present entry — `index_deltas` already skips that entry
    /// because `old_key == new_key`, so the check has to agree.
    fn index_batch(
        &self,
        id: &Bson,
        old: Option<&Document>,
        new: Option<&Document>,
        indexes: &[IndexSpec],
    ) -> (Vec<Op>, Vec<Check>, Vec<Vec<u8>>) {
        let ops = index_deltas(&self.name, id, old, new, indexes)
            .into_iter()
            .map(|delta| match delta {
                IndexDelta::Insert(k) => Op::Set(k, Vec::new()),
                IndexDelta::Delete(k) => Op::Delete(k),
            })
            .collect();

        let mut checks = Vec::new();
        let mut duplicate_keys = Vec::new();
        if let Some(new_doc) = new {
            for spec in indexes.iter().filter(|s| s.unique) {
                let Some(key) = index::entry_for(&self.name, spec, new_doc, id) else { continue };
                let old_key = old.and_then(|d| index::entry_for(&self.name, spec, d, id));
                if old_key.as_ref() == Some(&key) {
                    continue;
                }
                checks.push(Check::Absent(key.clone()));
                duplicate_keys.push(key);
            }
        }
        (ops, checks, duplicate_keys)
    }

    /// Run an atomic batch, classifying a failed check as `DuplicateKey` if
    /// its key is in `duplicate_keys`, `ConcurrentModification` otherwise.
    fn run_batch(&self, checks: Vec<Check>, ops: Vec<Op>, duplicate_keys: &[Vec<u8>]) -> Result<(), DbError> {
        match self.kv.atomic(&checks, &ops) {
            Ok(()) => Ok(()),
            Err(StoreError::CheckFailed(key)) => {
                let key_str = format!("{:?}", String::from_utf8_lossy(&key));
                if duplicate_keys.iter().any(|k| *k == key) {
                    Err(DbError::DuplicateKey(key_str))
                } else {
                    Err(DbError::ConcurrentModification(key_str))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert `doc`, which must already carry its final `_id`.
    fn insert_prepared(&self, doc: Document) -> Result<Bson, DbError> {
        let id = doc
            .get("_id")
            .cloned()
            .ok_or_else(|| DbError::InvalidInput("document missing _id".into()))?;
        let indexes = self.indexes()?;
        let primary_key = self.primary_key(&id);
        let bytes = bson::to_vec(&doc).map_err(|e| DbError::Encoding(e.to_string()))?;

        let (index_ops, mut checks, mut duplicate_keys) = self.index_batch(&id, None, Some(&doc), &indexes);
        checks.push(Check::Absent(primary_key.clone()));
        duplicate_keys.push(primary_key.clone());

        let mut ops = vec![Op::Set(primary_key, bytes)];
        ops.extend(index_ops);

        self.run_batch(checks, ops, &duplicate_keys)?;
        Ok(id)
    }

    pub fn insert_one(&self, mut doc: Document) -> Result<InsertOneResult, DbError> {
        if doc.get("_id").is_none() {
            doc.insert("_id", Bson::ObjectId(ObjectId::new()));
        }
        let id = self.insert_prepared(doc)?;
        Ok(InsertOneResult { id })
    }

    /// `ordered = true` halts at the first failure, keeping prior
    /// successes; `ordered = false` runs every document and accumulates
    /// per-index errors (§4.7).
    pub fn insert_many(&self, docs: Vec<Document>, ordered: bool) -> InsertManyResult {
        let mut result = InsertManyResult::default();
        for (i, doc) in docs.into_iter().enumerate() {
            match self.insert_one(doc) {
                Ok(r) => result.inserted_ids.push(r.id),
                Err(e) => {
                    result.errors.push((i, e));
                    if ordered {
                        break;
                    }
                }
            }
        }
        result
    }

    fn find_ids(&self, filter: &FilterExpr, indexes: &[IndexSpec]) -> Result<Vec<Bson>, DbError> {
        let docs = exec::find(self.kv, &self.name, filter, &FindOptions::default(), indexes)?;
        Ok(docs.into_iter().filter_map(|d| d.get("_id").cloned()).collect())
    }

    fn find_one_id(&self, filter: &FilterExpr, indexes: &[IndexSpec]) -> Result<Option<Bson>, DbError> {
        let mut options = FindOptions::default();
        options.limit = Some(1);
        let docs = exec::find(self.kv, &self.name, filter, &options, indexes)?;
        Ok(docs.into_iter().next().and_then(|d| d.get("_id").cloned()))
    }

    /// Re-read the document by id, re-verify it still matches `filter`
    /// (it may have changed since it was selected as a candidate), apply
    /// `update`, and commit. `Ok(None)` means the document no longer
    /// matches or is gone; `Ok(Some(modified))` reports whether applying
    /// the update actually changed it.
    fn apply_update(
        &self,
        id: &Bson,
        filter: &FilterExpr,
        update: &UpdateExpr,
        indexes: &[IndexSpec],
    ) -> Result<Option<bool>, DbError> {
        let primary_key = self.primary_key(id);
        let Some((bytes, version)) = self.kv.get(&primary_key)? else {
            return Ok(None);
        };
        let old = decode_record(&bytes)?;
        if !matches(filter, &old) {
            return Ok(None);
        }

        let new = update_apply::apply(update, &old);
        let modified = new != old;

        let (index_ops, mut checks, duplicate_keys) = self.index_batch(id, Some(&old), Some(&new), indexes);
        checks.push(Check::Version(primary_key.clone(), version));

        let bytes = bson::to_vec(&new).map_err(|e| DbError::Encoding(e.to_string()))?;
        let mut ops = vec![Op::Set(primary_key, bytes)];
        ops.extend(index_ops);

        self.run_batch(checks, ops, &duplicate_keys)?;
        Ok(Some(modified))
    }

    /// A literal `{_id: v}` equality from a filter document, used to seed
    /// an upsert's synthesized `_id`. An operator sub-document (`{_id:
    /// {$gt: ...}}`) isn't a literal match, so it's ignored.
    fn literal_id(filter_doc: &Document) -> Option<Bson> {
        match filter_doc.get("_id")? {
            Bson::Document(_) => None,
            v => Some(v.clone()),
        }
    }

    fn synthesize_upsert(&self, filter_doc: &Document, update: &UpdateExpr) -> Result<Bson, DbError> {
        let id = Self::literal_id(filter_doc).unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        let mut synthesized = doc! { "_id": id.clone() };
        apply_set_on_insert(update, &mut synthesized);
        let synthesized = update_apply::apply(update, &synthesized);
        self.insert_prepared(synthesized)?;
        Ok(id)
    }

    pub fn update_one(&self, filter_doc: &Document, update_doc: &Document, upsert: bool) -> Result<UpdateResult, DbError> {
        let filter = parse_filter(filter_doc)?;
        let update = parse_update(update_doc)?;
        let indexes = self.indexes()?;

        let Some(id) = self.find_one_id(&filter, &indexes)? else {
            if !upsert {
                return Ok(UpdateResult::default());
            }
            let id = self.synthesize_upsert(filter_doc, &update)?;
            return Ok(UpdateResult { matched: 0, modified: 1, upserted_id: Some(id), errors: Vec::new() });
        };

        match self.apply_update(&id, &filter, &update, &indexes)? {
            Some(modified) => Ok(UpdateResult {
                matched: 1,
                modified: modified as u64,
                upserted_id: None,
                errors: Vec::new(),
            }),
            None => Ok(UpdateResult::default()),
        }
    }

    /// Each matched document is updated in its own atomic batch (§4.7):
    /// no cross-document atomicity, but a failure on one document doesn't
    /// block the rest.
    pub fn update_many(&self, filter_doc: &Document, update_doc: &Document, upsert: bool) -> Result<UpdateResult, DbError> {
        let filter = parse_filter(filter_doc)?;
        let update = parse_update(update_doc)?;
        let indexes = self.indexes()?;

        let ids = self.find_ids(&filter, &indexes)?;
        if ids.is_empty() {
            if !upsert {
                return Ok(UpdateResult::default());
            }
            let id = self.synthesize_upsert(filter_doc, &update)?;
            return Ok(UpdateResult { matched: 0, modified: 1, upserted_id: Some(id), errors: Vec::new() });
        }

        let mut result = UpdateResult::default();
        for (i, id) in ids.iter().enumerate() {
            match self.apply_update(id, &filter, &update, &indexes) {
                Ok(Some(modified)) => {
                    result.matched += 1;
                    result.modified += modified as u64;
                }
                Ok(None) => {}
                Err(e) => result.errors.push((i, e)),
            }
        }
        Ok(result)
    }

    pub fn delete_one(&self, filter_doc: &Document) -> Result<DeleteResult, DbError> {
        let filter = parse_filter(filter_doc)?;
        let indexes = self.indexes()?;

        let Some(id) = self.find_one_id(&filter, &indexes)? else {
            return Ok(DeleteResult::default());
        };
        let primary_key = self.primary_key(&id);
        let Some((bytes, version)) = self.kv.get(&primary_key)? else {
            return Ok(DeleteResult::default());
        };
        let old = decode_record(&bytes)?;
        if !matches(&filter, &old) {
            return Ok(DeleteResult::default());
        }

        let (index_ops, _, _) = self.index_batch(&id, Some(&old), None, &indexes);
        let checks = vec![Check::Version(primary_key.clone(), version)];
        let mut ops = vec![Op::Delete(primary_key)];
        ops.extend(index_ops);

        self.run_batch(checks, ops, &[])?;
        Ok(DeleteResult { deleted: 1 })
    }

    /// All matches are deleted in a single atomic batch (§4.7): a version
    /// mismatch on any one of them fails the whole batch, reported as
    /// concurrent modification.
    pub fn delete_many(&self, filter_doc: &Document) -> Result<DeleteResult, DbError> {
        let filter = parse_filter(filter_doc)?;
        let indexes = self.indexes()?;
        let ids = self.find_ids(&filter, &indexes)?;

        let mut checks = Vec::new();
        let mut ops = Vec::new();
        for id in &ids {
            let primary_key = self.primary_key(id);
            let Some((bytes, version)) = self.kv.get(&primary_key)? else { continue };
            let old = decode_record(&bytes)?;
            if !matches(&filter, &old) {
                continue;
            }
            checks.push(Check::Version(primary_key.clone(), version));
            ops.push(Op::Delete(primary_key));
            let (index_ops, _, _) = self.index_batch(id, Some(&old), None, &indexes);
            ops.extend(index_ops);
        }

        if checks.is_empty() {
            return Ok(DeleteResult::default());
        }
        let deleted = checks.len() as u64;
        self.run_batch(checks, ops, &[])?;
        Ok(DeleteResult { deleted })
    }

    pub fn find(&self, filter_doc: &Document, options: &FindOptions) -> Result<Vec<Document>, DbError> {
        let filter = parse_filter(filter_doc)?;
        let indexes = self.indexes()?;
        exec::find(self.kv, &self.name, &filter, options, &indexes)
    }

    pub fn find_one(&self, filter_doc: &Document) -> Result<Option<Document>, DbError> {
        let mut options = FindOptions::default();
        options.limit = Some(1);
        Ok(self.find(filter_doc, &options)?.into_iter().next())
    }

    /// Obeys `options.skip`/`options.limit` like `find` (§6); no dedicated
    /// fast path, since nothing short of a full evaluation can apply the
    /// filter.
    pub fn count_documents(&self, filter_doc: &Document, options: &FindOptions) -> Result<u64, DbError> {
        Ok(self.find(filter_doc, options)?.len() as u64)
    }

    /// Prefix-scans the collection's record range without evaluating any
    /// filter (§6) — an approximate count that can't drift from a real
    /// document count the way a maintained counter could, but also never
    /// sees through stale entries since there are none to see through.
    pub fn estimated_document_count(&self) -> Result<u64, DbError> {
        let prefix = docstore_engine::KeyPrefix::Record(&self.name).encode();
        let mut count = 0u64;
        for entry in self.kv.list_prefix(&prefix)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Deduplicated values of `field` across every document matching
    /// `filter_doc`, flattening an array-valued field into its elements
    /// (§6).
    pub fn distinct(&self, field: &str, filter_doc: &Document) -> Result<Vec<Bson>, DbError> {
        let docs = self.find(filter_doc, &FindOptions::default())?;
        let mut values: Vec<Bson> = Vec::new();
        let mut push_unique = |v: &Bson| {
            if !values.iter().any(|seen| crate::compare::values_equal(seen, v)) {
                values.push(v.clone());
            }
        };

        for doc in &docs {
            match resolve_path(doc, field) {
                Resolved::Value(Bson::Array(items)) => items.iter().for_each(&mut push_unique),
                Resolved::Value(v) => push_unique(v),
                Resolved::Many(vs) => vs.iter().for_each(|v| push_unique(v)),
                Resolved::Absent => {}
            }
        }
        Ok(values)
    }

    pub fn list_indexes(&self) -> Result<Vec<IndexSpec>, DbError> {
        self.indexes()
    }

    pub fn create_index(&self, spec: &IndexSpec) -> Result<(), DbError> {
        IndexManager::new(self.kv).create_index(&self.name, spec)
    }

    pub fn drop_index(&self, index_name: &str) -> Result<(), DbError> {
        IndexManager::new(self.kv).drop_index(&self.name, index_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_engine::IndexDirection;
    use docstore_store::MemoryKv;

    fn email_index() -> IndexSpec {
        IndexSpec {
            name: "email_1".to_string(),
            fields: vec![("email".to_string(), IndexDirection::Ascending)],
            unique: true,
            sparse: false,
        }
    }

    #[test]
    fn insert_generates_id_when_absent() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        let result = coll.insert_one(doc! { "name": "a" }).unwrap();
        assert!(matches!(result.id, Bson::ObjectId(_)));
        let found = coll.find_one(&doc! { "name": "a" }).unwrap().unwrap();
        assert_eq!(found.get("_id").unwrap(), &result.id);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.insert_one(doc! { "_id": 1, "name": "a" }).unwrap();
        let err = coll.insert_one(doc! { "_id": 1, "name": "b" }).unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey(_)));
    }

    #[test]
    fn insert_many_ordered_stops_at_first_failure() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        let docs = vec![
            doc! { "_id": 1, "name": "a" },
            doc! { "_id": 1, "name": "dup" },
            doc! { "_id": 2, "name": "c" },
        ];
        let result = coll.insert_many(docs, true);
        assert_eq!(result.inserted_ids.len(), 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn insert_many_unordered_continues_past_failures() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        let docs = vec![
            doc! { "_id": 1, "name": "a" },
            doc! { "_id": 1, "name": "dup" },
            doc! { "_id": 2, "name": "c" },
        ];
        let result = coll.insert_many(docs, false);
        assert_eq!(result.inserted_ids.len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, 1);
        assert!(matches!(result.errors[0].1, DbError::DuplicateKey(_)));
    }

    #[test]
    fn update_one_patches_indexed_field() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.create_index(&email_index()).unwrap();
        coll.insert_one(doc! { "_id": 1, "email": "a@x.com" }).unwrap();

        let result = coll
            .update_one(&doc! { "_id": 1 }, &doc! { "$set": { "email": "b@x.com" } }, false)
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.modified, 1);

        assert!(coll.find_one(&doc! { "email": "a@x.com" }).unwrap().is_none());
        assert!(coll.find_one(&doc! { "email": "b@x.com" }).unwrap().is_some());
    }

    #[test]
    fn update_one_leaves_unique_index_alone_when_indexed_field_is_untouched() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.create_index(&email_index()).unwrap();
        coll.insert_one(doc! { "_id": 1, "email": "a@x.com", "visits": 0 }).unwrap();

        let result = coll
            .update_one(&doc! { "_id": 1 }, &doc! { "$inc": { "visits": 1 } }, false)
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.modified, 1);

        let found = coll.find_one(&doc! { "_id": 1 }).unwrap().unwrap();
        assert_eq!(found.get_i32("visits").unwrap(), 1);
        assert_eq!(found.get_str("email").unwrap(), "a@x.com");
    }

    #[test]
    fn update_one_rejects_unique_collision() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.create_index(&email_index()).unwrap();
        coll.insert_one(doc! { "_id": 1, "email": "a@x.com" }).unwrap();
        coll.insert_one(doc! { "_id": 2, "email": "b@x.com" }).unwrap();

        let err = coll
            .update_one(&doc! { "_id": 2 }, &doc! { "$set": { "email": "a@x.com" } }, false)
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey(_)));
    }

    #[test]
    fn update_one_upserts_when_no_match() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        let result = coll
            .update_one(&doc! { "_id": 1 }, &doc! { "$set": { "a": 1 } }, true)
            .unwrap();
        assert_eq!(result.matched, 0);
        assert_eq!(result.modified, 1);
        assert_eq!(result.upserted_id, Some(Bson::Int32(1)));

        let found = coll.find_one(&doc! { "_id": 1 }).unwrap().unwrap();
        assert_eq!(found.get_i32("a").unwrap(), 1);
    }

    #[test]
    fn update_one_without_upsert_reports_zero_matched() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        let result = coll
            .update_one(&doc! { "_id": 1 }, &doc! { "$set": { "a": 1 } }, false)
            .unwrap();
        assert_eq!(result.matched, 0);
        assert_eq!(result.modified, 0);
        assert_eq!(result.upserted_id, None);
    }

    #[test]
    fn update_many_patches_every_match() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.insert_one(doc! { "_id": 1, "status": "pending" }).unwrap();
        coll.insert_one(doc! { "_id": 2, "status": "pending" }).unwrap();
        coll.insert_one(doc! { "_id": 3, "status": "done" }).unwrap();

        let result = coll
            .update_many(&doc! { "status": "pending" }, &doc! { "$set": { "status": "active" } }, false)
            .unwrap();
        assert_eq!(result.matched, 2);
        assert_eq!(result.modified, 2);
        assert_eq!(coll.find(&doc! { "status": "active" }, &FindOptions::default()).unwrap().len(), 2);
    }

    #[test]
    fn delete_one_removes_document_and_index_entries() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.create_index(&email_index()).unwrap();
        coll.insert_one(doc! { "_id": 1, "email": "a@x.com" }).unwrap();

        let result = coll.delete_one(&doc! { "_id": 1 }).unwrap();
        assert_eq!(result.deleted, 1);
        assert!(coll.find_one(&doc! { "_id": 1 }).unwrap().is_none());

        // Re-inserting the same email must succeed, proving the unique
        // index entry was actually cleaned up.
        coll.insert_one(doc! { "_id": 2, "email": "a@x.com" }).unwrap();
    }

    #[test]
    fn delete_many_removes_every_match_in_one_batch() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.insert_one(doc! { "_id": 1, "status": "pending" }).unwrap();
        coll.insert_one(doc! { "_id": 2, "status": "pending" }).unwrap();
        coll.insert_one(doc! { "_id": 3, "status": "done" }).unwrap();

        let result = coll.delete_many(&doc! { "status": "pending" }).unwrap();
        assert_eq!(result.deleted, 2);
        assert_eq!(coll.estimated_document_count().unwrap(), 1);
    }

    #[test]
    fn distinct_flattens_array_values() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.insert_one(doc! { "_id": 1, "tags": ["a", "b"] }).unwrap();
        coll.insert_one(doc! { "_id": 2, "tags": ["b", "c"] }).unwrap();

        let mut values = coll.distinct("tags", &doc! {}).unwrap();
        values.sort_by_key(|v| format!("{v:?}"));
        assert_eq!(values, vec![Bson::String("a".into()), Bson::String("b".into()), Bson::String("c".into())]);
    }

    #[test]
    fn estimated_document_count_ignores_filter_semantics() {
        let kv = MemoryKv::new();
        let coll = Collection::new(&kv, "users");
        coll.insert_one(doc! { "_id": 1, "age": 1 }).unwrap();
        coll.insert_one(doc! { "_id": 2, "age": 2 }).unwrap();
        assert_eq!(coll.estimated_document_count().unwrap(), 2);
    }
}
