use crate::error::StoreError;

/// Opaque per-key version token. Returned from reads, passed back into
/// `atomic`'s checks to detect concurrent modification. Callers must not
/// assume anything about its internal structure beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(pub(crate) u64);

/// A precondition on a single key, evaluated atomically with every other
/// check in the same `atomic` call.
#[derive(Debug, Clone)]
pub enum Check {
    /// The key must not exist.
    Absent(Vec<u8>),
    /// The key must exist with exactly this version.
    Version(Vec<u8>, Version),
}

impl Check {
    pub fn key(&self) -> &[u8] {
        match self {
            Check::Absent(k) | Check::Version(k, _) => k,
        }
    }
}

/// A single write within an atomic batch.
#[derive(Debug, Clone)]
pub enum Op {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// The host KV contract (§6): get-by-key, set, delete, ordered range scan,
/// and atomic batches with per-key version checks. This is the sole
/// substrate the rest of the workspace is built on.
pub trait Kv {
    type Iter<'a>: Iterator<Item = Result<(Vec<u8>, Vec<u8>, Version), StoreError>> + 'a
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Version)>, StoreError>;

    /// Unconditional single-key write. Not part of an atomic batch.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<Version, StoreError>;

    /// Unconditional single-key delete. Not part of an atomic batch.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Ordered iteration over every key with the given prefix.
    fn list_prefix<'a>(&'a self, prefix: &[u8]) -> Result<Self::Iter<'a>, StoreError>;

    /// Ordered iteration over `start..end` (end exclusive).
    fn list_range<'a>(&'a self, start: &[u8], end: &[u8]) -> Result<Self::Iter<'a>, StoreError>;

    /// Commit `ops` only if every check in `checks` holds, evaluated against
    /// a single consistent view of the keyspace. Fails the whole batch
    /// (no partial application) if any check fails.
    fn atomic(&self, checks: &[Check], ops: &[Op]) -> Result<(), StoreError>;
}

/// Smallest byte string greater than every string with the given prefix,
/// used as the exclusive upper bound of a prefix scan. `None` if the prefix
/// is all `0xff` bytes (scan runs to the end of the keyspace).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last == 0xff {
            upper.pop();
        } else {
            *last += 1;
            return Some(upper);
        }
    }
    None
}
