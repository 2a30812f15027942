//! Shared primitive IDs and coordination enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identity supplied by the identity collaborator.
pub type ParticipantId = String;
/// Identity of a voter; voters are participants of an event.
pub type VoterId = String;
/// Opaque group identifier an event belongs to.
pub type GroupId = String;
/// Monotonic partnership identifier.
pub type PartnershipId = u64;
/// Monotonic event identifier.
pub type EventId = u64;

/// Pairing status held for every participant in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingStatus {
    /// Waiting in the pool for a partner.
    Unpaired,
    /// Bound to exactly one partnership.
    Paired,
}

/// Ballot category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Meeting time.
    Time,
    /// Meeting place.
    Location,
}

impl Category {
    /// Both categories, time first.
    pub const ALL: [Category; 2] = [Category::Time, Category::Location];

    /// Stable key fragment for storage and lock scopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Time => "time",
            Category::Location => "location",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
