//! Crate error type and its coarse classification.

use thiserror::Error;

use crate::{
    persist::PersistError,
    types::{Category, EventId, GroupId, ParticipantId},
};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure class reported to request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A participant, partnership, event or option does not exist.
    NotFound,
    /// The request collides with existing state.
    Conflict,
    /// The request carries a malformed value.
    InvalidInput,
    /// The caller is not in the state the operation requires.
    PreconditionFailed,
    /// A scoped lock could not be acquired in time.
    Busy,
    /// The backing store failed.
    Storage,
}

/// Failures of pairing and consensus operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Participant already holds a partnership.
    #[error("participant {0} is already paired")]
    AlreadyPaired(ParticipantId),
    /// Participant is already in the waiting pool.
    #[error("participant {0} is already waiting in the pool")]
    AlreadyWaiting(ParticipantId),
    /// Participant has no status record.
    #[error("participant {0} is not in the pool")]
    ParticipantNotFound(ParticipantId),
    /// Participant has no active partnership.
    #[error("participant {0} is not paired")]
    NotPaired(ParticipantId),
    /// No partnership links the two participants.
    #[error("no partnership between {0} and {1}")]
    PartnershipNotFound(ParticipantId, ParticipantId),
    /// Goal text is empty.
    #[error("goal cannot be empty")]
    EmptyGoal,
    /// Event does not exist.
    #[error("event {0} does not exist")]
    EventNotFound(EventId),
    /// Group does not exist.
    #[error("group {0} does not exist")]
    GroupNotFound(GroupId),
    /// Value is not a candidate in the category.
    #[error("{option} is not a candidate {category} of event {event}")]
    OptionNotCandidate {
        /// Event id.
        event: EventId,
        /// Ballot category.
        category: Category,
        /// Rendered option.
        option: String,
    },
    /// Value is already a candidate in the category.
    #[error("{option} is already a candidate {category} of event {event}")]
    CandidateExists {
        /// Event id.
        event: EventId,
        /// Ballot category.
        category: Category,
        /// Rendered option.
        option: String,
    },
    /// Time text is not a valid RFC 3339 instant.
    #[error("{0:?} is not a valid time")]
    InvalidTime(String),
    /// Location text is empty.
    #[error("location cannot be empty")]
    EmptyLocation,
    /// Participant already attends the event.
    #[error("{attendee} already attends event {event}")]
    AlreadyAttendee {
        /// Event id.
        event: EventId,
        /// Participant id.
        attendee: ParticipantId,
    },
    /// Participant does not attend the event.
    #[error("{attendee} does not attend event {event}")]
    NotAttendee {
        /// Event id.
        event: EventId,
        /// Participant id.
        attendee: ParticipantId,
    },
    /// Scoped lock stayed held past the acquire timeout.
    #[error("timed out waiting for lock {0}")]
    LockTimeout(String),
    /// Backing store failure.
    #[error("store error: {0}")]
    Persist(#[from] PersistError),
}

impl Error {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ParticipantNotFound(_)
            | Error::PartnershipNotFound(..)
            | Error::EventNotFound(_)
            | Error::GroupNotFound(_)
            | Error::OptionNotCandidate { .. } => ErrorKind::NotFound,
            Error::AlreadyPaired(_)
            | Error::AlreadyWaiting(_)
            | Error::CandidateExists { .. }
            | Error::AlreadyAttendee { .. } => ErrorKind::Conflict,
            Error::InvalidTime(_) | Error::EmptyGoal | Error::EmptyLocation => {
                ErrorKind::InvalidInput
            }
            Error::NotPaired(_) | Error::NotAttendee { .. } => ErrorKind::PreconditionFailed,
            Error::LockTimeout(_) => ErrorKind::Busy,
            Error::Persist(_) => ErrorKind::Storage,
        }
    }
}
