use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// An `atomic` call's precondition on a key did not hold.
    CheckFailed(Vec<u8>),
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CheckFailed(key) => {
                write!(f, "atomic check failed for key {:?}", String::from_utf8_lossy(key))
            }
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
