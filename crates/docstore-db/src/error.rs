use std::fmt;

use docstore_engine::EngineError;
use docstore_query::{FilterParseError, UpdateParseError};
use docstore_store::StoreError;

/// The three error categories callers need to distinguish (§7), plus the
/// plumbing variants that thread errors up through the store and encoding
/// layers. Grounded on `slate-db/src/error.rs`'s manual `From` chain.
#[derive(Debug)]
pub enum DbError {
    /// A filter, update, index spec, or options document was malformed.
    InvalidInput(String),
    /// A unique index (or the primary key) rejected a write.
    DuplicateKey(String),
    /// An atomic write's optimistic-concurrency check failed; the caller
    /// should retry against the latest document state.
    ConcurrentModification(String),
    CollectionNotFound(String),
    IndexNotFound(String),
    Store(StoreError),
    Engine(EngineError),
    Encoding(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::DuplicateKey(msg) => write!(f, "duplicate key: {msg}"),
            Self::ConcurrentModification(msg) => write!(f, "concurrent modification: {msg}"),
            Self::CollectionNotFound(name) => write!(f, "collection not found: {name}"),
            Self::IndexNotFound(name) => write!(f, "index not found: {name}"),
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Engine(e) => write!(f, "engine error: {e}"),
            Self::Encoding(msg) => write!(f, "encoding error: {msg}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CheckFailed(key) => {
                Self::ConcurrentModification(format!("{:?}", String::from_utf8_lossy(&key)))
            }
            other => Self::Store(other),
        }
    }
}

impl From<EngineError> for DbError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::CollectionNotFound(name) => Self::CollectionNotFound(name),
            EngineError::IndexNotFound(name) => Self::IndexNotFound(name),
            EngineError::Store(e) => Self::from(e),
            EngineError::Encoding(msg) => Self::Encoding(msg),
        }
    }
}

impl From<FilterParseError> for DbError {
    fn from(e: FilterParseError) -> Self {
        Self::InvalidInput(e.0)
    }
}

impl From<UpdateParseError> for DbError {
    fn from(e: UpdateParseError) -> Self {
        Self::InvalidInput(e.0)
    }
}
