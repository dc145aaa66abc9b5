//! Index-entry primitives: given a document and an [`IndexSpec`], compute
//! the composite serialized value and the full KV key for that document's
//! entry in that index. Delta computation and backfill live one layer up
//! in the collection engine; this module only knows how to build one key.

use bson::{Bson, Document};

use crate::catalog::IndexSpec;
use crate::key::Key;
use crate::value::{encode_id, serialize_indexed_value};

const FIELD_SEP: u8 = 0x1f;

fn get_field(doc: &Document, path: &str) -> Option<&Bson> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for seg in segments {
        current = current.as_document()?.get(seg)?;
    }
    Some(current)
}

/// Compute the composite serialized value for `spec`'s fields against
/// `doc`. A missing or null field serializes through the same null
/// sentinel used for single fields (§4.5); with `spec.sparse` set, callers
/// should skip indexing the document entirely when any field is absent —
/// that decision belongs to the caller (the index manager), since it also
/// needs to know whether the field was present vs. merely null.
pub fn composite_value(doc: &Document, spec: &IndexSpec) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (path, _dir)) in spec.fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEP);
        }
        let value = get_field(doc, path).cloned().unwrap_or(Bson::Null);
        out.extend_from_slice(serialize_indexed_value(&value).as_bytes());
    }
    out
}

/// True if every field `spec` covers is present (not missing) in `doc`.
/// Used by a sparse index to decide whether to index a document at all.
pub fn all_fields_present(doc: &Document, spec: &IndexSpec) -> bool {
    spec.fields
        .iter()
        .all(|(path, _)| get_field(doc, path).is_some())
}

/// Build the full index entry key for `doc`'s `_id` in `spec`.
pub fn index_key(collection: &str, spec: &IndexSpec, doc: &Document, id: &Bson) -> Vec<u8> {
    let composite = composite_value(doc, spec);
    let id_bytes = encode_id(id);
    Key::Index(collection, &spec.name, &composite, &id_bytes).encode()
}

/// Byte fragment that prefixes every composite value whose leading field
/// serializes to `value`, used by the compound-index candidate scan (§4.6)
/// to narrow by the first field without the rest of the document.
pub fn lead_field_prefix(value: &Bson) -> Vec<u8> {
    let mut out = serialize_indexed_value(value).into_bytes();
    out.push(FIELD_SEP);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndexDirection;
    use bson::doc;

    fn spec() -> IndexSpec {
        IndexSpec {
            name: "age_1".to_string(),
            fields: vec![("age".to_string(), IndexDirection::Ascending)],
            unique: false,
            sparse: false,
        }
    }

    #[test]
    fn composite_value_uses_null_sentinel_for_missing_field() {
        let empty = doc! {};
        let present = doc! { "age": 25 };
        assert_ne!(composite_value(&empty, &spec()), composite_value(&present, &spec()));
    }

    #[test]
    fn compound_composite_joins_fields_in_order() {
        let compound = IndexSpec {
            name: "a_1_b_1".to_string(),
            fields: vec![
                ("a".to_string(), IndexDirection::Ascending),
                ("b".to_string(), IndexDirection::Ascending),
            ],
            unique: false,
            sparse: false,
        };
        let doc1 = doc! { "a": "x", "b": "y" };
        let doc2 = doc! { "a": "x", "b": "z" };
        assert_ne!(composite_value(&doc1, &compound), composite_value(&doc2, &compound));
    }

    #[test]
    fn all_fields_present_detects_missing() {
        assert!(!all_fields_present(&doc! {}, &spec()));
        assert!(all_fields_present(&doc! { "age": 1 }, &spec()));
    }

    #[test]
    fn dotted_path_resolves_nested_field() {
        let nested = IndexSpec {
            name: "addr.city_1".to_string(),
            fields: vec![("address.city".to_string(), IndexDirection::Ascending)],
            unique: false,
            sparse: false,
        };
        let doc = doc! { "address": { "city": "Austin" } };
        assert!(all_fields_present(&doc, &nested));
    }
}
