//! Async handle over the coordination services and its event stream.

/// Event stream types emitted by the handle.
pub mod events;
/// Handle implementation.
pub mod handle;
