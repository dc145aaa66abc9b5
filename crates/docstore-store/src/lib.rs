mod error;
mod kv;
mod memory;

pub use error::StoreError;
pub use kv::{Check, Kv, Op, Version, prefix_upper_bound};
pub use memory::MemoryKv;
