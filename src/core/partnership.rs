use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    persist::{DocExt, KvStore},
    types::{ParticipantId, PartnershipId},
};

const PARTNERSHIP_PREFIX: &str = "partnership/";
const PARTNER_OF_PREFIX: &str = "partner-of/";
const PARTNERSHIP_SEQ_KEY: &str = "seq/partnership";

/// Insertion-ordered, deduplicated list of goal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSet(Vec<String>);

impl GoalSet {
    /// Appends `goal` unless present. Returns true when added.
    pub fn insert(&mut self, goal: &str) -> bool {
        if self.contains(goal) {
            return false;
        }
        self.0.push(goal.to_string());
        true
    }

    /// Removes `goal` if present. Returns true when removed.
    pub fn remove(&mut self, goal: &str) -> bool {
        match self.0.iter().position(|g| g == goal) {
            Some(pos) => {
                self.0.remove(pos);
                true
            }
            None => false,
        }
    }

    /// True when `goal` is present.
    pub fn contains(&self, goal: &str) -> bool {
        self.0.iter().any(|g| g == goal)
    }

    /// Goals in insertion order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of goals.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no goals.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Confirmed 1:1 pairing with one goal list per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    /// Stable partnership id.
    pub id: PartnershipId,
    /// Participant that was already waiting.
    pub side_a: ParticipantId,
    /// Participant whose request completed the pairing.
    pub side_b: ParticipantId,
    /// Goals shared by side A.
    pub goals_a: GoalSet,
    /// Goals shared by side B.
    pub goals_b: GoalSet,
}

impl Partnership {
    /// True when `participant` is either side.
    pub fn involves(&self, participant: &str) -> bool {
        self.side_a == participant || self.side_b == participant
    }

    /// True when the partnership links exactly `a` and `b`, in either order.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.side_a == a && self.side_b == b) || (self.side_a == b && self.side_b == a)
    }

    /// The other side, when `participant` is one of the sides.
    pub fn partner_of(&self, participant: &str) -> Option<&ParticipantId> {
        if self.side_a == participant {
            Some(&self.side_b)
        } else if self.side_b == participant {
            Some(&self.side_a)
        } else {
            None
        }
    }

    /// Goal list of `participant`'s own side.
    pub fn goals_of(&self, participant: &str) -> Option<&GoalSet> {
        if self.side_a == participant {
            Some(&self.goals_a)
        } else if self.side_b == participant {
            Some(&self.goals_b)
        } else {
            None
        }
    }

    fn goals_of_mut(&mut self, participant: &str) -> Option<&mut GoalSet> {
        if self.side_a == participant {
            Some(&mut self.goals_a)
        } else if self.side_b == participant {
            Some(&mut self.goals_b)
        } else {
            None
        }
    }
}

/// Goal edit applied to the caller's side of a partnership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalEdit {
    /// Add a goal; duplicates are ignored.
    Add(String),
    /// Replace `old` with `new`; a missing `old` leaves the set unchanged.
    Update {
        /// Goal to replace.
        old: String,
        /// Replacement goal.
        new: String,
    },
    /// Remove a goal; missing goals are ignored.
    Remove(String),
}

/// Partnership records plus the participant → partnership index.
///
/// `create` and `remove` run inside the pairing engine's critical sections;
/// goal edits must hold the partnership's lock.
#[derive(Clone)]
pub struct PartnershipStore {
    kv: Arc<dyn KvStore>,
}

impl PartnershipStore {
    /// Store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Partnership `id`, if it exists.
    pub fn get(&self, id: PartnershipId) -> Result<Option<Partnership>> {
        Ok(self.kv.get_doc(&partnership_key(id))?)
    }

    /// Id of the partnership `participant` is in, if any.
    pub fn id_of(&self, participant: &str) -> Result<Option<PartnershipId>> {
        Ok(self.kv.get_doc(&partner_of_key(participant))?)
    }

    /// The partnership `participant` is in, if any.
    pub fn of(&self, participant: &str) -> Result<Option<Partnership>> {
        match self.id_of(participant)? {
            Some(id) => Ok(self.get(id)?.filter(|p| p.involves(participant))),
            None => Ok(None),
        }
    }

    /// All partnerships in creation order.
    pub fn all(&self) -> Result<Vec<Partnership>> {
        let mut out = Vec::new();
        for (_, payload) in self.kv.scan_prefix(PARTNERSHIP_PREFIX)? {
            out.push(crate::persist::decode_doc::<Partnership>(&payload)?);
        }
        out.sort_by_key(|p| p.id);
        Ok(out)
    }

    pub(crate) fn create(&self, side_a: &str, side_b: &str) -> Result<Partnership> {
        let id = self.kv.next_id(PARTNERSHIP_SEQ_KEY)?;
        let partnership = Partnership {
            id,
            side_a: side_a.to_string(),
            side_b: side_b.to_string(),
            goals_a: GoalSet::default(),
            goals_b: GoalSet::default(),
        };
        self.kv.put_doc(&partnership_key(id), &partnership)?;
        self.kv.put_doc(&partner_of_key(side_a), &id)?;
        self.kv.put_doc(&partner_of_key(side_b), &id)?;
        Ok(partnership)
    }

    pub(crate) fn remove(&self, partnership: &Partnership) -> Result<()> {
        self.kv.delete(&partner_of_key(&partnership.side_a))?;
        self.kv.delete(&partner_of_key(&partnership.side_b))?;
        self.kv.delete(&partnership_key(partnership.id))?;
        Ok(())
    }

    /// Applies `edit` to `participant`'s side of partnership `id`.
    pub(crate) fn edit_goals(
        &self,
        id: PartnershipId,
        participant: &str,
        edit: &GoalEdit,
    ) -> Result<Partnership> {
        let mut partnership = self
            .get(id)?
            .filter(|p| p.involves(participant))
            .ok_or_else(|| Error::NotPaired(participant.to_string()))?;
        let goals = partnership
            .goals_of_mut(participant)
            .ok_or_else(|| Error::NotPaired(participant.to_string()))?;

        let changed = match edit {
            GoalEdit::Add(goal) => goals.insert(goal),
            GoalEdit::Update { old, new } => {
                if goals.remove(old) {
                    goals.insert(new);
                    true
                } else {
                    false
                }
            }
            GoalEdit::Remove(goal) => goals.remove(goal),
        };

        if changed {
            self.kv.put_doc(&partnership_key(id), &partnership)?;
        } else {
            debug!(partnership = id, participant, ?edit, "goal edit was a no-op");
        }
        Ok(partnership)
    }
}

fn partnership_key(id: PartnershipId) -> String {
    // Zero-padded so prefix scans come back in id order.
    format!("{PARTNERSHIP_PREFIX}{id:020}")
}

fn partner_of_key(participant: &str) -> String {
    format!("{PARTNER_OF_PREFIX}{participant}")
}
