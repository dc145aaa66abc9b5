//! Collection/index metadata, persisted in the host KV under the
//! `IndexMeta` key region (§3's `("__indexes__", collection, index-name)`
//! table). Grounded on `slate-engine/src/kv/catalog.rs`'s scan-and-decode
//! style, generalized from the teacher's single-field index metadata to
//! the compound (multi-field) case §4.5 requires.

use docstore_store::Kv;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::key::{Key, KeyPrefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexDirection {
    Ascending,
    Descending,
}

/// One compound index definition (§3/§4.5). `fields` lists the indexed
/// paths in order; a query can only use this index via a prefix of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<(String, IndexDirection)>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    /// Derive the stable, deterministic index name from its field list,
    /// following the common `field1_1_field2_-1` convention.
    pub fn derive_name(fields: &[(String, IndexDirection)]) -> String {
        fields
            .iter()
            .map(|(path, dir)| {
                let sign = match dir {
                    IndexDirection::Ascending => "1",
                    IndexDirection::Descending => "-1",
                };
                format!("{path}_{sign}")
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A resolved collection handle: just the name plus the currently defined
/// index specs, snapshotted at the point `Catalog::collection` was called.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

/// Catalog operations over a host KV (§6). Thin wrapper: every call reads
/// or writes the `IndexMeta` key region directly, there is no in-memory
/// cache beyond what a caller keeps in a `CollectionHandle`.
pub struct Catalog<'a, K: Kv> {
    kv: &'a K,
}

impl<'a, K: Kv> Catalog<'a, K> {
    pub fn new(kv: &'a K) -> Self {
        Self { kv }
    }

    pub fn collection(&self, name: &str) -> Result<CollectionHandle, EngineError> {
        Ok(CollectionHandle {
            name: name.to_string(),
            indexes: self.list_indexes(name)?,
        })
    }

    pub fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, EngineError> {
        let prefix = KeyPrefix::IndexMetaForCollection(collection).encode();
        let mut specs = Vec::new();
        for entry in self.kv.list_prefix(&prefix)? {
            let (_, value, _) = entry?;
            let spec: IndexSpec = bson::from_slice(&value)
                .map_err(|e| EngineError::Encoding(format!("invalid index metadata: {e}")))?;
            specs.push(spec);
        }
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    pub fn create_index(&self, collection: &str, spec: &IndexSpec) -> Result<(), EngineError> {
        let key = Key::IndexMeta(collection, &spec.name).encode();
        let value = bson::to_vec(spec)
            .map_err(|e| EngineError::Encoding(format!("failed to serialize index spec: {e}")))?;
        self.kv.set(&key, &value)?;
        Ok(())
    }

    pub fn drop_index(&self, collection: &str, index_name: &str) -> Result<(), EngineError> {
        let key = Key::IndexMeta(collection, index_name).encode();
        self.kv.delete(&key)?;
        Ok(())
    }
}
