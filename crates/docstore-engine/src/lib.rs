mod catalog;
mod error;
mod index_entry;
mod key;
mod value;

pub use catalog::{Catalog, CollectionHandle, IndexDirection, IndexSpec};
pub use error::EngineError;
pub use index_entry::{all_fields_present, composite_value, index_key, lead_field_prefix};
pub use key::{Key, KeyPrefix};
pub use value::{decode_id, encode_id, serialize_indexed_value, type_discriminant, NULL_SENTINEL};
