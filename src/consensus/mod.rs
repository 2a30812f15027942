//! Multi-option voting and deterministic consensus for group events.

/// Insertion-ordered option → voters ballot.
pub mod ballot;
/// Event registry: attendees, candidates and per-category ballots.
pub mod event;
/// Winner selection and confirmed-value sync.
pub mod resolver;
