//! Waiting pool, pairing transactions, partnerships and scoped locks.

/// Participant status records and the waiting queue.
pub mod ledger;
/// Store-backed scoped locks.
pub mod lock;
/// Pairing engine and goal management entry points.
pub mod pairing;
/// Partnership records and goal sets.
pub mod partnership;
