use std::{collections::VecDeque, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    persist::{DocExt, KvStore},
    types::{PairingStatus, ParticipantId},
};

const STATUS_PREFIX: &str = "status/";
const QUEUE_KEY: &str = "queue/waiting";

/// Pairing status of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Participant id.
    pub participant: ParticipantId,
    /// Current status.
    pub status: PairingStatus,
}

/// Oldest-first queue of unpaired participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingQueue {
    /// Waiting participants, head is the longest-waiting.
    pub entries: VecDeque<ParticipantId>,
}

impl WaitingQueue {
    fn remove(&mut self, participant: &str) -> bool {
        match self.entries.iter().position(|p| p == participant) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Per-participant status records plus the waiting queue.
///
/// Mutating calls expect the caller to hold the queue lock; the ledger
/// itself does no locking.
#[derive(Clone)]
pub struct StatusLedger {
    kv: Arc<dyn KvStore>,
}

impl StatusLedger {
    /// Ledger over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Status of `participant`; `None` when not in the pool.
    pub fn status_of(&self, participant: &str) -> Result<Option<PairingStatus>> {
        Ok(self.record(participant)?.map(|r| r.status))
    }

    /// Snapshot of the waiting queue, oldest first.
    pub fn waiting(&self) -> Result<Vec<ParticipantId>> {
        Ok(self.queue()?.entries.into_iter().collect())
    }

    /// Admits `participant` to the pool as `unpaired` at the queue tail.
    pub fn join(&self, participant: &str) -> Result<()> {
        match self.status_of(participant)? {
            Some(PairingStatus::Paired) => return Err(Error::AlreadyPaired(participant.to_string())),
            Some(PairingStatus::Unpaired) => {
                return Err(Error::AlreadyWaiting(participant.to_string()));
            }
            None => {}
        }

        self.put_status(participant, PairingStatus::Unpaired)?;
        let mut queue = self.queue()?;
        queue.remove(participant);
        queue.entries.push_back(participant.to_string());
        self.put_queue(&queue)?;
        debug!(participant, waiting = queue.entries.len(), "joined pool");
        Ok(())
    }

    /// Drops `participant` from the pool entirely.
    pub fn leave(&self, participant: &str) -> Result<()> {
        match self.status_of(participant)? {
            Some(PairingStatus::Paired) => return Err(Error::AlreadyPaired(participant.to_string())),
            Some(PairingStatus::Unpaired) => {}
            None => return Err(Error::ParticipantNotFound(participant.to_string())),
        }

        self.kv.delete(&status_key(participant))?;
        let mut queue = self.queue()?;
        if queue.remove(participant) {
            self.put_queue(&queue)?;
        }
        debug!(participant, "left pool");
        Ok(())
    }

    /// Longest-waiting participant other than `except`, left in the queue.
    pub(crate) fn oldest_other(&self, except: &str) -> Result<Option<ParticipantId>> {
        Ok(self
            .queue()?
            .entries
            .into_iter()
            .find(|p| p != except))
    }

    /// Takes both participants off the queue and flips them to `paired`.
    pub(crate) fn mark_paired(&self, a: &str, b: &str) -> Result<()> {
        let mut queue = self.queue()?;
        queue.remove(a);
        queue.remove(b);
        self.put_queue(&queue)?;
        self.put_status(a, PairingStatus::Paired)?;
        self.put_status(b, PairingStatus::Paired)
    }

    /// Flips both participants back to `unpaired` and re-queues them, `a` first.
    pub(crate) fn mark_unpaired(&self, a: &str, b: &str) -> Result<()> {
        self.put_status(a, PairingStatus::Unpaired)?;
        self.put_status(b, PairingStatus::Unpaired)?;
        let mut queue = self.queue()?;
        for p in [a, b] {
            queue.remove(p);
            queue.entries.push_back(p.to_string());
        }
        self.put_queue(&queue)
    }

    fn record(&self, participant: &str) -> Result<Option<StatusRecord>> {
        Ok(self.kv.get_doc(&status_key(participant))?)
    }

    fn put_status(&self, participant: &str, status: PairingStatus) -> Result<()> {
        let record = StatusRecord {
            participant: participant.to_string(),
            status,
        };
        Ok(self.kv.put_doc(&status_key(participant), &record)?)
    }

    fn queue(&self) -> Result<WaitingQueue> {
        Ok(self.kv.get_doc(QUEUE_KEY)?.unwrap_or_default())
    }

    fn put_queue(&self, queue: &WaitingQueue) -> Result<()> {
        Ok(self.kv.put_doc(QUEUE_KEY, queue)?)
    }
}

fn status_key(participant: &str) -> String {
    format!("{STATUS_PREFIX}{participant}")
}
