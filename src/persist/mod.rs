/// In-memory key-value store.
pub mod memory;
/// SQLite-backed key-value store.
pub mod sqlite;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Version number for serialized [`DocEnvelope`] payloads.
pub const DOC_FORMAT_VERSION: u16 = 1;

/// Failures raised by a [`KvStore`] or the document codec.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite driver error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Document encode/decode error.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Any other storage failure.
    #[error("{0}")]
    Message(String),
}

/// Result alias for storage calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Persistent mapping from string keys to byte values.
///
/// Every call is atomic with respect to the single key it touches.
/// Nothing spans keys; callers serialize multi-key work with scoped locks.
pub trait KvStore: Send + Sync {
    /// Reads the value stored at `key`.
    fn get(&self, key: &str) -> PersistResult<Option<Vec<u8>>>;

    /// Unconditionally stores `value` at `key`.
    fn set(&self, key: &str, value: &[u8]) -> PersistResult<()>;

    /// Removes `key`, returning true when it existed.
    fn delete(&self, key: &str) -> PersistResult<bool>;

    /// Replaces the value at `key` with `new` only when the current value is
    /// `expected`. `None` stands for "absent" on either side.
    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> PersistResult<bool>;

    /// Lists `(key, value)` pairs whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> PersistResult<Vec<(String, Vec<u8>)>>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> PersistResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> PersistResult<bool> {
        (**self).delete(key)
    }

    fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> PersistResult<bool> {
        (**self).compare_and_set(key, expected, new)
    }

    fn scan_prefix(&self, prefix: &str) -> PersistResult<Vec<(String, Vec<u8>)>> {
        (**self).scan_prefix(prefix)
    }
}

/// Versioned wrapper for stable on-disk document decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocEnvelope<T> {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped document.
    pub doc: T,
}

/// Encodes `doc` inside a [`DocEnvelope`].
pub fn encode_doc<T: Serialize>(doc: &T) -> PersistResult<Vec<u8>> {
    let env = DocEnvelope {
        format_version: DOC_FORMAT_VERSION,
        doc,
    };
    Ok(serde_json::to_vec(&env)?)
}

/// Decodes a [`DocEnvelope`] payload, rejecting unknown versions.
pub fn decode_doc<T: DeserializeOwned>(payload: &[u8]) -> PersistResult<T> {
    let env: DocEnvelope<T> = serde_json::from_slice(payload)?;
    if env.format_version != DOC_FORMAT_VERSION {
        return Err(PersistError::Message(format!(
            "unsupported document format version: {}",
            env.format_version
        )));
    }
    Ok(env.doc)
}

/// Typed document reads and writes over any [`KvStore`].
pub trait DocExt {
    /// Reads and decodes the document at `key`.
    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> PersistResult<Option<T>>;

    /// Encodes and stores `doc` at `key`.
    fn put_doc<T: Serialize>(&self, key: &str, doc: &T) -> PersistResult<()>;

    /// Increments the counter at `key` with a CAS loop and returns the new value.
    fn next_id(&self, key: &str) -> PersistResult<u64>;
}

impl<S: KvStore + ?Sized> DocExt for S {
    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> PersistResult<Option<T>> {
        self.get(key)?.map(|payload| decode_doc(&payload)).transpose()
    }

    fn put_doc<T: Serialize>(&self, key: &str, doc: &T) -> PersistResult<()> {
        self.set(key, &encode_doc(doc)?)
    }

    fn next_id(&self, key: &str) -> PersistResult<u64> {
        loop {
            let current = self.get(key)?;
            let prev = match &current {
                Some(payload) => decode_doc::<u64>(payload)?,
                None => 0,
            };
            let next = prev + 1;
            if self.compare_and_set(key, current.as_deref(), Some(&encode_doc(&next)?))? {
                return Ok(next);
            }
        }
    }
}
