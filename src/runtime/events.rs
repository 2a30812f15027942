//! Runtime event stream payloads.

use crate::types::{Category, EventId, ParticipantId, PartnershipId};

/// Events published after a coordination operation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    /// A participant joined the pool and is waiting.
    Waiting {
        /// Waiting participant.
        participant: ParticipantId,
    },
    /// Two participants were paired.
    Paired {
        /// New partnership id.
        partnership: PartnershipId,
        /// Participant that had been waiting.
        side_a: ParticipantId,
        /// Participant whose request completed the pairing.
        side_b: ParticipantId,
    },
    /// A participant left the pool.
    Withdrawn {
        /// Withdrawn participant.
        participant: ParticipantId,
    },
    /// A partnership was dissolved.
    Dissolved {
        /// First side.
        a: ParticipantId,
        /// Second side.
        b: ParticipantId,
    },
    /// A participant's goal list changed.
    GoalsChanged {
        /// Participant whose side changed.
        participant: ParticipantId,
    },
    /// An event was created.
    EventCreated {
        /// Event id.
        event: EventId,
    },
    /// An event was deleted.
    EventDeleted {
        /// Event id.
        event: EventId,
    },
    /// A participant joined an event.
    AttendeeJoined {
        /// Event id.
        event: EventId,
        /// Attendee id.
        attendee: ParticipantId,
    },
    /// A participant left an event.
    AttendeeLeft {
        /// Event id.
        event: EventId,
        /// Attendee id.
        attendee: ParticipantId,
    },
    /// The confirmed value of a category changed.
    ConsensusChanged {
        /// Event id.
        event: EventId,
        /// Category whose winner moved.
        category: Category,
        /// New confirmed value.
        winner: String,
    },
}
