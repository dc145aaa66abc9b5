//! Document record storage: the primary `_id -> document` mapping that
//! underlies every collection (§3). Grounded on
//! `slate-engine/src/kv/record.rs`'s record-key/value split.

use bson::{Bson, Document};
use docstore_engine::Key;

use crate::error::DbError;

pub mod record_key {
    use super::*;

    pub fn encode(collection: &str, id: &Bson) -> Vec<u8> {
        let id_bytes = docstore_engine::encode_id(id);
        Key::Record(collection, &id_bytes).encode()
    }

    /// Recover the `_id` stored in a record key's tail. The layout is
    /// `r\0{collection}\0{id_bytes}`; skip the tag byte and collection name
    /// to reach it.
    pub fn decode_id(key: &[u8]) -> Option<Bson> {
        let rest = key.get(2..)?;
        let sep = rest.iter().position(|&b| b == 0)?;
        docstore_engine::decode_id(&rest[sep + 1..])
    }
}

pub fn decode_record(bytes: &[u8]) -> Result<Document, DbError> {
    bson::from_slice(bytes).map_err(|e| DbError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn record_key_round_trips_the_id() {
        let id = Bson::Int32(42);
        let key = record_key::encode("users", &id);
        assert_eq!(record_key::decode_id(&key), Some(Bson::Int64(42)));
    }

    #[test]
    fn record_key_is_scoped_per_collection() {
        let a = record_key::encode("users", &Bson::Int32(1));
        let b = record_key::encode("posts", &Bson::Int32(1));
        assert_ne!(a, b);
    }

    #[test]
    fn decode_record_round_trips_a_document() {
        let d = doc! { "_id": 1, "name": "ada" };
        let bytes = bson::to_vec(&d).unwrap();
        assert_eq!(decode_record(&bytes).unwrap(), d);
    }
}
