//! KV key layout (§3). Grounded on `slate-engine/src/encoding/key.rs`'s
//! tagged, `\0`-separated scheme, simplified from its length-prefixed
//! binary doc_id encoding to a type-tagged string encoding since this
//! engine's index values are strings (§4.5), not sortable binary blobs.

const INDEX_META_TAG: u8 = b'm';
const RECORD_TAG: u8 = b'r';
const INDEX_TAG: u8 = b'i';
const SEP: u8 = 0x00;

/// A structured key for one of the three KV regions the engine owns:
/// per-collection index metadata, document records, and index entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key<'a> {
    /// `m\0{collection}\0{index_name}`
    IndexMeta(&'a str, &'a str),
    /// `r\0{collection}\0{id_bytes}`
    Record(&'a str, &'a [u8]),
    /// `i\0{collection}\0{index_name}\0{composite_value}\0{id_bytes}`
    Index(&'a str, &'a str, &'a [u8], &'a [u8]),
}

impl<'a> Key<'a> {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Key::IndexMeta(collection, index_name) => {
                let mut buf = Vec::with_capacity(2 + collection.len() + 1 + index_name.len());
                buf.push(INDEX_META_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(index_name.as_bytes());
                buf
            }
            Key::Record(collection, id_bytes) => {
                let mut buf = Vec::with_capacity(2 + collection.len() + 1 + id_bytes.len());
                buf.push(RECORD_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(id_bytes);
                buf
            }
            Key::Index(collection, index_name, composite_value, id_bytes) => {
                let mut buf = Vec::with_capacity(
                    2 + collection.len()
                        + 1
                        + index_name.len()
                        + 1
                        + composite_value.len()
                        + 1
                        + id_bytes.len(),
                );
                buf.push(INDEX_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(index_name.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(composite_value);
                buf.push(SEP);
                buf.extend_from_slice(id_bytes);
                buf
            }
        }
    }
}

/// Structured scan prefixes for each key region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPrefix<'a> {
    IndexMetaForCollection(&'a str),
    Record(&'a str),
    IndexField(&'a str, &'a str),
    IndexValue(&'a str, &'a str, &'a [u8]),
}

impl<'a> KeyPrefix<'a> {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            KeyPrefix::IndexMetaForCollection(collection) => {
                let mut buf = Vec::with_capacity(2 + collection.len() + 1);
                buf.push(INDEX_META_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::Record(collection) => {
                let mut buf = Vec::with_capacity(2 + collection.len() + 1);
                buf.push(RECORD_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::IndexField(collection, index_name) => {
                let mut buf = Vec::with_capacity(2 + collection.len() + 1 + index_name.len() + 1);
                buf.push(INDEX_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(index_name.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::IndexValue(collection, index_name, composite_value) => {
                let mut buf = Vec::with_capacity(
                    2 + collection.len() + 1 + index_name.len() + 1 + composite_value.len() + 1,
                );
                buf.push(INDEX_TAG);
                buf.push(SEP);
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(index_name.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(composite_value);
                buf.push(SEP);
                buf
            }
        }
    }
}
