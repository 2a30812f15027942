//! Process-local [`KvStore`] for tests and single-node embedding.

use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;

use super::{KvStore, PersistError, PersistResult};

/// Hash map behind a mutex; every call holds the mutex for one key operation.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> PersistResult<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| PersistError::Message("memory store mutex poisoned".to_string()))
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> PersistResult<()> {
        self.entries()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> PersistResult<bool> {
        Ok(self.entries()?.remove(key).is_some())
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> PersistResult<bool> {
        let mut entries = self.entries()?;
        if entries.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                entries.insert(key.to_string(), value.to_vec());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> PersistResult<Vec<(String, Vec<u8>)>> {
        let entries = self.entries()?;
        let mut out: Vec<(String, Vec<u8>)> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
