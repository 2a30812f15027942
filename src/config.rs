//! Coordinator tunables, loadable from TOML.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scoped-lock acquisition policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Pause between CAS attempts on a held lock.
    pub retry_interval_ms: u64,
    /// Give up and report `LockTimeout` after this long.
    pub acquire_timeout_ms: u64,
    /// A holder that has not released after this long is presumed dead and
    /// may be taken over.
    pub lease_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 2,
            acquire_timeout_ms: 2_000,
            lease_ms: 30_000,
        }
    }
}

impl LockConfig {
    /// Retry pause as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Acquire timeout as a [`Duration`].
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Lock lease as a [`Duration`].
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

/// Async handle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the broadcast event channel.
    pub event_channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1024,
        }
    }
}

/// SQLite store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Enable WAL journaling.
    pub wal: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            wal: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Scoped-lock policy.
    pub lock: LockConfig,
    /// Async handle settings.
    pub runtime: RuntimeConfig,
    /// SQLite settings.
    pub sqlite: SqliteConfig,
}

impl CoordinatorConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
