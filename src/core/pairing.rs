use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    identity::{IdentityResolver, name_or_id},
    types::{PairingStatus, ParticipantId, PartnershipId},
};

use super::{
    ledger::StatusLedger,
    lock::{LockManager, partnership_scope, queue_scope},
    partnership::{GoalEdit, GoalSet, Partnership, PartnershipStore},
};

/// Result of a pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// Nobody else was waiting; the requester now heads the queue.
    Waiting,
    /// The requester was paired with the longest-waiting participant.
    Paired {
        /// The participant that had been waiting.
        partner: ParticipantId,
        /// Newly created partnership.
        partnership: PartnershipId,
    },
}

/// Read model of a participant's place in the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusView {
    /// No status record.
    NotInPool,
    /// Waiting for a partner.
    Waiting,
    /// Paired with `partner`.
    Paired {
        /// Partner id.
        partner: ParticipantId,
        /// Partner display name, or the id when unresolved.
        partner_name: String,
    },
}

/// Admits participants to the pool and executes pairing transactions.
///
/// The waiting queue lock serializes join, withdraw, pairing and the status
/// half of dissolve. Goal edits take only the partnership's lock; dissolve
/// takes the partnership lock first and the queue lock second.
#[derive(Clone)]
pub struct PairingEngine {
    ledger: StatusLedger,
    partnerships: PartnershipStore,
    locks: LockManager,
    identity: Arc<dyn IdentityResolver>,
}

impl PairingEngine {
    /// Engine over the given stores.
    pub fn new(
        ledger: StatusLedger,
        partnerships: PartnershipStore,
        locks: LockManager,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            ledger,
            partnerships,
            locks,
            identity,
        }
    }

    /// Status records and waiting queue.
    pub fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    /// Partnership records.
    pub fn partnerships(&self) -> &PartnershipStore {
        &self.partnerships
    }

    /// Joins the pool and pairs with the longest-waiting other participant
    /// when one exists.
    pub fn request_pairing(&self, participant: &str) -> Result<PairingOutcome> {
        let _queue = self.locks.acquire(queue_scope())?;

        self.ledger.join(participant)?;
        let Some(partner) = self.ledger.oldest_other(participant)? else {
            info!(participant, "waiting for a partner");
            return Ok(PairingOutcome::Waiting);
        };

        let partnership = self.partnerships.create(&partner, participant)?;
        self.ledger.mark_paired(&partner, participant)?;
        info!(
            partnership = partnership.id,
            side_a = %partner,
            side_b = participant,
            "paired"
        );

        Ok(PairingOutcome::Paired {
            partner,
            partnership: partnership.id,
        })
    }

    /// Leaves the pool without pairing.
    pub fn withdraw(&self, participant: &str) -> Result<()> {
        let _queue = self.locks.acquire(queue_scope())?;
        self.ledger.leave(participant)?;
        info!(participant, "withdrew from pool");
        Ok(())
    }

    /// Deletes the partnership linking `a` and `b` and returns both to the
    /// pool as `unpaired`, `a` queued ahead of `b`. Nobody is paired here, so
    /// the pool can hold more than one waiting participant afterwards.
    pub fn dissolve(&self, a: &str, b: &str) -> Result<()> {
        let not_found = || Error::PartnershipNotFound(a.to_string(), b.to_string());
        let id = self.partnerships.id_of(a)?.ok_or_else(not_found)?;

        let _partnership = self.locks.acquire(&partnership_scope(id))?;
        let partnership = self
            .partnerships
            .get(id)?
            .filter(|p| p.links(a, b))
            .ok_or_else(not_found)?;

        let _queue = self.locks.acquire(queue_scope())?;
        self.partnerships.remove(&partnership)?;
        self.ledger.mark_unpaired(a, b)?;
        info!(partnership = id, a, b, "dissolved");
        Ok(())
    }

    /// Dissolves whatever partnership `participant` is in; returns the former partner.
    pub fn dissolve_current(&self, participant: &str) -> Result<ParticipantId> {
        let partner = self.partner_of(participant)?;
        self.dissolve(participant, &partner)?;
        Ok(partner)
    }

    /// Status of `participant`; `None` when not in the pool.
    pub fn status_of(&self, participant: &str) -> Result<Option<PairingStatus>> {
        self.ledger.status_of(participant)
    }

    /// The partnership `participant` is in, if any.
    pub fn partnership_of(&self, participant: &str) -> Result<Option<Partnership>> {
        self.partnerships.of(participant)
    }

    /// Waiting participants, oldest first.
    pub fn waiting(&self) -> Result<Vec<ParticipantId>> {
        self.ledger.waiting()
    }

    /// Every partnership, oldest first.
    pub fn all_partnerships(&self) -> Result<Vec<Partnership>> {
        self.partnerships.all()
    }

    /// The other side of `participant`'s partnership.
    pub fn partner_of(&self, participant: &str) -> Result<ParticipantId> {
        let partnership = self.require_partnership(participant)?;
        partnership
            .partner_of(participant)
            .cloned()
            .ok_or_else(|| Error::NotPaired(participant.to_string()))
    }

    /// Status with the partner's display name resolved.
    pub fn status_view(&self, participant: &str) -> Result<StatusView> {
        match self.ledger.status_of(participant)? {
            None => Ok(StatusView::NotInPool),
            Some(PairingStatus::Unpaired) => Ok(StatusView::Waiting),
            Some(PairingStatus::Paired) => {
                let partner = self.partner_of(participant)?;
                let names = self.identity.display_names(std::slice::from_ref(&partner))?;
                let partner_name = name_or_id(&names, &partner);
                Ok(StatusView::Paired {
                    partner,
                    partner_name,
                })
            }
        }
    }

    /// The caller's own goals.
    pub fn goals_of(&self, participant: &str) -> Result<GoalSet> {
        let partnership = self.require_partnership(participant)?;
        Ok(partnership.goals_of(participant).cloned().unwrap_or_default())
    }

    /// The partner's goals.
    pub fn partner_goals_of(&self, participant: &str) -> Result<GoalSet> {
        let partnership = self.require_partnership(participant)?;
        let partner = partnership
            .partner_of(participant)
            .ok_or_else(|| Error::NotPaired(participant.to_string()))?;
        Ok(partnership.goals_of(partner).cloned().unwrap_or_default())
    }

    /// Adds `goal` to the caller's side; duplicates are ignored.
    pub fn add_goal(&self, participant: &str, goal: &str) -> Result<GoalSet> {
        if goal.is_empty() {
            return Err(Error::EmptyGoal);
        }
        self.edit_goals(participant, GoalEdit::Add(goal.to_string()))
    }

    /// Replaces `old` with `new`; a missing `old` is a no-op.
    pub fn update_goal(&self, participant: &str, old: &str, new: &str) -> Result<GoalSet> {
        if new.is_empty() {
            return Err(Error::EmptyGoal);
        }
        self.edit_goals(
            participant,
            GoalEdit::Update {
                old: old.to_string(),
                new: new.to_string(),
            },
        )
    }

    /// Removes `goal`; a missing goal is a no-op.
    pub fn remove_goal(&self, participant: &str, goal: &str) -> Result<GoalSet> {
        self.edit_goals(participant, GoalEdit::Remove(goal.to_string()))
    }

    fn edit_goals(&self, participant: &str, edit: GoalEdit) -> Result<GoalSet> {
        let id = self
            .partnerships
            .id_of(participant)?
            .ok_or_else(|| Error::NotPaired(participant.to_string()))?;
        let _partnership = self.locks.acquire(&partnership_scope(id))?;
        let updated = self.partnerships.edit_goals(id, participant, &edit)?;
        debug!(partnership = id, participant, ?edit, "goals edited");
        Ok(updated.goals_of(participant).cloned().unwrap_or_default())
    }

    fn require_partnership(&self, participant: &str) -> Result<Partnership> {
        self.partnerships
            .of(participant)?
            .ok_or_else(|| Error::NotPaired(participant.to_string()))
    }
}
