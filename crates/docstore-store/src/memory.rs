//! Reference in-memory `Kv` implementation. Not part of the engine's
//! public contract (§6 treats the host KV as an external collaborator) but
//! needed for the rest of the workspace to build and be tested against
//! something concrete.

use std::sync::Mutex;

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::kv::{Check, Kv, Op, Version};

type Entry = (Vec<u8>, u64);
type Table = OrdMap<Vec<u8>, Entry>;

pub struct MemoryKv {
    table: ArcSwap<Table>,
    write_lock: Mutex<()>,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self {
            table: ArcSwap::new(std::sync::Arc::new(Table::new())),
            write_lock: Mutex::new(()),
        }
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(current: Option<&Entry>) -> u64 {
        current.map(|(_, v)| v + 1).unwrap_or(1)
    }
}

impl Kv for MemoryKv {
    type Iter<'a> = MemoryIter;

    fn get(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Version)>, StoreError> {
        let table = self.table.load();
        Ok(table.get(key).map(|(v, ver)| (v.clone(), Version(*ver))))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<Version, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut table = (**self.table.load()).clone();
        let version = Self::next_version(table.get(key));
        table.insert(key.to_vec(), (value.to_vec(), version));
        self.table.store(std::sync::Arc::new(table));
        Ok(Version(version))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut table = (**self.table.load()).clone();
        table.remove(key);
        self.table.store(std::sync::Arc::new(table));
        Ok(())
    }

    fn list_prefix<'a>(&'a self, prefix: &[u8]) -> Result<Self::Iter<'a>, StoreError> {
        let table = self.table.load_full();
        let prefix = prefix.to_vec();
        let entries: Vec<_> = table
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(prefix.as_slice()))
            .map(|(k, (v, ver))| (k.clone(), v.clone(), Version(*ver)))
            .collect();
        Ok(MemoryIter {
            entries: entries.into_iter(),
        })
    }

    fn list_range<'a>(&'a self, start: &[u8], end: &[u8]) -> Result<Self::Iter<'a>, StoreError> {
        let table = self.table.load_full();
        let entries: Vec<_> = table
            .range(start.to_vec()..end.to_vec())
            .map(|(k, (v, ver))| (k.clone(), v.clone(), Version(*ver)))
            .collect();
        Ok(MemoryIter {
            entries: entries.into_iter(),
        })
    }

    fn atomic(&self, checks: &[Check], ops: &[Op]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut table = (**self.table.load()).clone();

        for check in checks {
            match check {
                Check::Absent(key) => {
                    if table.contains_key(key.as_slice()) {
                        return Err(StoreError::CheckFailed(key.clone()));
                    }
                }
                Check::Version(key, expected) => match table.get(key.as_slice()) {
                    Some((_, ver)) if *ver == expected.0 => {}
                    _ => return Err(StoreError::CheckFailed(key.clone())),
                },
            }
        }

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    let version = Self::next_version(table.get(key.as_slice()));
                    table.insert(key.clone(), (value.clone(), version));
                }
                Op::Delete(key) => {
                    table.remove(key.as_slice());
                }
            }
        }

        self.table.store(std::sync::Arc::new(table));
        Ok(())
    }
}

pub struct MemoryIter {
    entries: std::vec::IntoIter<(Vec<u8>, Vec<u8>, Version)>,
}

impl Iterator for MemoryIter {
    type Item = Result<(Vec<u8>, Vec<u8>, Version), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}
