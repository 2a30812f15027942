use std::{
    sync::Arc,
    time::Instant,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::LockConfig,
    error::{Error, Result},
    persist::{KvStore, decode_doc, encode_doc},
};

const LOCK_PREFIX: &str = "lock/";

/// Stored value of a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Lease {
    token: String,
    expires_at_ms: i64,
}

impl Lease {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Hands out exclusive, non-reentrant locks keyed by scope name.
///
/// A lock is a store key claimed with compare-and-set, holding a random
/// token and a lease deadline. The guard deletes it again on drop, but only
/// while it still holds the same value. A holder that never released (a
/// crashed process) is taken over once its lease has expired.
#[derive(Clone)]
pub struct LockManager {
    kv: Arc<dyn KvStore>,
    config: LockConfig,
}

impl LockManager {
    /// Lock manager over `kv`.
    pub fn new(kv: Arc<dyn KvStore>, config: LockConfig) -> Self {
        Self { kv, config }
    }

    /// Blocks until `scope` is free or its lease has expired, or the acquire
    /// timeout elapses.
    pub fn acquire(&self, scope: &str) -> Result<LockGuard> {
        let key = format!("{LOCK_PREFIX}{scope}");
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.config.acquire_timeout();
        let lease_ms = i64::try_from(self.config.lease_ms).unwrap_or(i64::MAX);

        loop {
            let current = self.kv.get(&key)?;
            let claimable = match &current {
                None => true,
                Some(payload) => match decode_doc::<Lease>(payload) {
                    Ok(lease) if lease.is_expired(now_ms()) => {
                        warn!(scope, expired_at_ms = lease.expires_at_ms, "taking over expired lock");
                        true
                    }
                    Ok(_) => false,
                    Err(err) => {
                        warn!(scope, error = %err, "replacing unreadable lock value");
                        true
                    }
                },
            };

            if claimable {
                let lease = Lease {
                    token: token.clone(),
                    expires_at_ms: now_ms().saturating_add(lease_ms),
                };
                let value = encode_doc(&lease)?;
                if self.kv.compare_and_set(&key, current.as_deref(), Some(value.as_slice()))? {
                    return Ok(LockGuard {
                        kv: Arc::clone(&self.kv),
                        key,
                        value,
                    });
                }
            }

            if Instant::now() >= deadline {
                warn!(scope, "lock acquire timed out");
                return Err(Error::LockTimeout(scope.to_string()));
            }
            std::thread::sleep(self.config.retry_interval());
        }
    }

    /// True when some holder currently owns `scope` under an unexpired lease.
    pub fn is_held(&self, scope: &str) -> Result<bool> {
        let Some(payload) = self.kv.get(&format!("{LOCK_PREFIX}{scope}"))? else {
            return Ok(false);
        };
        Ok(decode_doc::<Lease>(&payload).is_ok_and(|lease| !lease.is_expired(now_ms())))
    }
}

/// Held lock; released when dropped.
pub struct LockGuard {
    kv: Arc<dyn KvStore>,
    key: String,
    value: Vec<u8>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match self.kv.compare_and_set(&self.key, Some(self.value.as_slice()), None) {
            Ok(true) => {}
            Ok(false) => warn!(key = %self.key, "lock lease expired and was taken over before release"),
            Err(err) => warn!(key = %self.key, error = %err, "lock release failed"),
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Scope of the waiting queue.
pub fn queue_scope() -> &'static str {
    "queue"
}

/// Scope of one partnership.
pub fn partnership_scope(id: crate::types::PartnershipId) -> String {
    format!("partnership/{id}")
}

/// Scope of an event's name and attendees.
pub fn event_scope(id: crate::types::EventId) -> String {
    format!("event/{id}")
}

/// Scope of one category ballot of an event.
pub fn ballot_scope(id: crate::types::EventId, category: crate::types::Category) -> String {
    format!("event/{id}/{category}")
}
