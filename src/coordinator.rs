//! Service wiring: one pairing engine and one event registry over a shared store.

use std::sync::Arc;

use crate::{
    config::CoordinatorConfig,
    consensus::event::{BallotObserver, EventRegistry},
    core::{
        ledger::StatusLedger,
        lock::LockManager,
        pairing::PairingEngine,
        partnership::PartnershipStore,
    },
    error::Result,
    identity::IdentityResolver,
    persist::{KvStore, sqlite::SqliteKv},
};

/// The coordination services, built once at startup and shared by reference.
#[derive(Clone)]
pub struct Coordinator {
    pairing: PairingEngine,
    events: EventRegistry,
}

impl Coordinator {
    /// Wires the services over `kv`.
    pub fn new(
        kv: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityResolver>,
        config: &CoordinatorConfig,
    ) -> Self {
        let locks = LockManager::new(Arc::clone(&kv), config.lock.clone());
        let pairing = PairingEngine::new(
            StatusLedger::new(Arc::clone(&kv)),
            PartnershipStore::new(Arc::clone(&kv)),
            locks.clone(),
            Arc::clone(&identity),
        );
        let events = EventRegistry::new(kv, locks, identity);
        Self { pairing, events }
    }

    /// Opens the SQLite store named by `config.sqlite` and wires the services over it.
    pub fn open_sqlite(
        identity: Arc<dyn IdentityResolver>,
        config: &CoordinatorConfig,
    ) -> Result<Self> {
        let kv = match &config.sqlite.path {
            Some(path) => SqliteKv::open(path, config.sqlite.wal)?,
            None => SqliteKv::open_in_memory()?,
        };
        Ok(Self::new(Arc::new(kv), identity, config))
    }

    /// Pool, pairing and goal operations.
    pub fn pairing(&self) -> &PairingEngine {
        &self.pairing
    }

    /// Routes every ballot outcome to `observer` while the ballot lock is held.
    pub fn with_ballot_observer(mut self, observer: BallotObserver) -> Self {
        self.events = self.events.with_observer(observer);
        self
    }

    /// Event, attendee and ballot operations.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }
}
