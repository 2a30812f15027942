//! Pairing-pool matching and group consensus voting over an abstract
//! key-value store.
//!
//! # Examples
//!
//! Pairing two participants:
//! ```
//! use std::sync::Arc;
//!
//! use pairvote::{
//!     config::CoordinatorConfig,
//!     coordinator::Coordinator,
//!     core::pairing::PairingOutcome,
//!     identity::StaticDirectory,
//!     persist::memory::MemoryKv,
//!     types::PairingStatus,
//! };
//!
//! let directory = StaticDirectory::new().with_user("ada", "Ada").with_user("bob", "Bob");
//! let coord = Coordinator::new(
//!     Arc::new(MemoryKv::new()),
//!     Arc::new(directory),
//!     &CoordinatorConfig::default(),
//! );
//!
//! assert_eq!(coord.pairing().request_pairing("ada").expect("join"), PairingOutcome::Waiting);
//! let outcome = coord.pairing().request_pairing("bob").expect("join");
//! assert!(matches!(outcome, PairingOutcome::Paired { ref partner, .. } if partner == "ada"));
//! assert_eq!(coord.pairing().status_of("ada").expect("status"), Some(PairingStatus::Paired));
//! ```
//!
//! Voting on an event time:
//! ```
//! use std::sync::Arc;
//!
//! use pairvote::{
//!     config::CoordinatorConfig,
//!     coordinator::Coordinator,
//!     identity::StaticDirectory,
//!     persist::memory::MemoryKv,
//!     types::Category,
//! };
//!
//! let coord = Coordinator::new(
//!     Arc::new(MemoryKv::new()),
//!     Arc::new(StaticDirectory::new().with_group("book-club")),
//!     &CoordinatorConfig::default(),
//! );
//! let events = coord.events();
//! let event = events
//!     .create_event("ada", "book-club", "Meetup", "2025-03-01T18:00:00Z", "Library")
//!     .expect("create");
//! events.add_candidate_time(event.id(), "2025-03-02T18:00:00Z").expect("candidate");
//! events.add_attendee(event.id(), "bob").expect("attend");
//! events.cast_vote(event.id(), Category::Time, "2025-03-02T18:00:00Z", "bob").expect("vote");
//! assert_eq!(
//!     events.confirmed_time(event.id()).expect("confirmed").to_rfc3339(),
//!     "2025-03-02T18:00:00+00:00"
//! );
//! ```
#![warn(missing_docs)]

/// Coordinator tunables.
pub mod config;
/// Event ballots, consensus resolution and the event registry.
pub mod consensus;
/// Service wiring.
pub mod coordinator;
/// Waiting pool, pairing engine and partnerships.
pub mod core;
/// Error type and classification.
pub mod error;
/// Identity collaborator.
pub mod identity;
/// Key-value store abstraction and implementations.
pub mod persist;
/// Async handle and event stream.
pub mod runtime;
/// Tracing bootstrap.
pub mod telemetry;
/// Shared primitive types and enums.
pub mod types;
