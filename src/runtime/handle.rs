use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    config::RuntimeConfig,
    consensus::event::{BallotOutcome, Event, EventView},
    coordinator::Coordinator,
    core::{
        pairing::{PairingOutcome, StatusView},
        partnership::{GoalSet, Partnership},
    },
    error::Error,
    types::{Category, EventId, ParticipantId},
};

use super::events::CoordinationEvent;

/// Failures surfaced by [`CoordinatorHandle`] calls.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The operation itself failed.
    #[error(transparent)]
    Core(#[from] Error),
    /// The blocking worker panicked or was cancelled.
    #[error("blocking worker failed: {0}")]
    WorkerFailed(String),
}

impl RuntimeError {
    /// The core error, when the operation itself failed.
    pub fn core(&self) -> Option<&Error> {
        match self {
            RuntimeError::Core(err) => Some(err),
            RuntimeError::WorkerFailed(_) => None,
        }
    }
}

/// Async front of a [`Coordinator`].
///
/// Core calls block on store I/O and lock waits, so each one runs on the
/// blocking pool. Concurrent calls proceed in parallel; the core's scoped
/// locks keep them consistent.
#[derive(Clone)]
pub struct CoordinatorHandle {
    services: Arc<Coordinator>,
    events_tx: broadcast::Sender<CoordinationEvent>,
}

/// Wraps `services` in a shareable async handle.
///
/// `ConsensusChanged` events are sent from inside the ballot's critical
/// section, so per `(event, category)` they arrive in commit order.
pub fn spawn_coordinator(services: Coordinator, config: RuntimeConfig) -> CoordinatorHandle {
    let (events_tx, _) = broadcast::channel::<CoordinationEvent>(config.event_channel_capacity.max(1));
    let tx = events_tx.clone();
    let services = services.with_ballot_observer(Arc::new(move |outcome: &BallotOutcome| {
        if let Some(event) = consensus_event(outcome) {
            if tx.send(event).is_err() {
                debug!("no event subscribers");
            }
        }
    }));
    CoordinatorHandle {
        services: Arc::new(services),
        events_tx,
    }
}

fn consensus_event(outcome: &BallotOutcome) -> Option<CoordinationEvent> {
    outcome.changed.then(|| CoordinationEvent::ConsensusChanged {
        event: outcome.event,
        category: outcome.category,
        winner: outcome.confirmed.clone(),
    })
}

impl CoordinatorHandle {
    /// New receiver on the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.events_tx.subscribe()
    }

    /// Direct access to the synchronous services.
    pub fn services(&self) -> &Coordinator {
        &self.services
    }

    /// See [`crate::core::pairing::PairingEngine::request_pairing`].
    pub async fn request_pairing(
        &self,
        participant: impl Into<ParticipantId>,
    ) -> Result<PairingOutcome, RuntimeError> {
        let participant = participant.into();
        let p = participant.clone();
        let outcome = self
            .run(move |svc| svc.pairing().request_pairing(&p))
            .await?;
        match &outcome {
            PairingOutcome::Waiting => self.publish(CoordinationEvent::Waiting { participant }),
            PairingOutcome::Paired {
                partner,
                partnership,
            } => self.publish(CoordinationEvent::Paired {
                partnership: *partnership,
                side_a: partner.clone(),
                side_b: participant,
            }),
        }
        Ok(outcome)
    }

    /// See [`crate::core::pairing::PairingEngine::withdraw`].
    pub async fn withdraw(&self, participant: impl Into<ParticipantId>) -> Result<(), RuntimeError> {
        let participant = participant.into();
        let p = participant.clone();
        self.run(move |svc| svc.pairing().withdraw(&p)).await?;
        self.publish(CoordinationEvent::Withdrawn { participant });
        Ok(())
    }

    /// See [`crate::core::pairing::PairingEngine::dissolve`].
    pub async fn dissolve(
        &self,
        a: impl Into<ParticipantId>,
        b: impl Into<ParticipantId>,
    ) -> Result<(), RuntimeError> {
        let (a, b) = (a.into(), b.into());
        let (a2, b2) = (a.clone(), b.clone());
        self.run(move |svc| svc.pairing().dissolve(&a2, &b2)).await?;
        self.publish(CoordinationEvent::Dissolved { a, b });
        Ok(())
    }

    /// Dissolves the caller's current partnership; returns the former partner.
    pub async fn dissolve_current(
        &self,
        participant: impl Into<ParticipantId>,
    ) -> Result<ParticipantId, RuntimeError> {
        let participant = participant.into();
        let p = participant.clone();
        let partner = self
            .run(move |svc| svc.pairing().dissolve_current(&p))
            .await?;
        self.publish(CoordinationEvent::Dissolved {
            a: participant,
            b: partner.clone(),
        });
        Ok(partner)
    }

    /// Adds a goal to the caller's side and returns that side's goals.
    pub async fn add_goal(
        &self,
        participant: impl Into<ParticipantId>,
        goal: impl Into<String>,
    ) -> Result<GoalSet, RuntimeError> {
        let participant = participant.into();
        let (p, goal) = (participant.clone(), goal.into());
        let goals = self
            .run(move |svc| svc.pairing().add_goal(&p, &goal))
            .await?;
        self.publish(CoordinationEvent::GoalsChanged { participant });
        Ok(goals)
    }

    /// Replaces a goal on the caller's side.
    pub async fn update_goal(
        &self,
        participant: impl Into<ParticipantId>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Result<GoalSet, RuntimeError> {
        let participant = participant.into();
        let (p, old, new) = (participant.clone(), old.into(), new.into());
        let goals = self
            .run(move |svc| svc.pairing().update_goal(&p, &old, &new))
            .await?;
        self.publish(CoordinationEvent::GoalsChanged { participant });
        Ok(goals)
    }

    /// Removes a goal from the caller's side.
    pub async fn remove_goal(
        &self,
        participant: impl Into<ParticipantId>,
        goal: impl Into<String>,
    ) -> Result<GoalSet, RuntimeError> {
        let participant = participant.into();
        let (p, goal) = (participant.clone(), goal.into());
        let goals = self
            .run(move |svc| svc.pairing().remove_goal(&p, &goal))
            .await?;
        self.publish(CoordinationEvent::GoalsChanged { participant });
        Ok(goals)
    }

    /// Pool status with the partner name resolved.
    pub async fn status_view(
        &self,
        participant: impl Into<ParticipantId>,
    ) -> Result<StatusView, RuntimeError> {
        let p = participant.into();
        self.run(move |svc| svc.pairing().status_view(&p)).await
    }

    /// The caller's partnership, if any.
    pub async fn partnership_of(
        &self,
        participant: impl Into<ParticipantId>,
    ) -> Result<Option<Partnership>, RuntimeError> {
        let p = participant.into();
        self.run(move |svc| svc.pairing().partnership_of(&p)).await
    }

    /// Waiting queue, oldest first.
    pub async fn waiting(&self) -> Result<Vec<ParticipantId>, RuntimeError> {
        self.run(|svc| svc.pairing().waiting()).await
    }

    /// See [`crate::consensus::event::EventRegistry::create_event`].
    pub async fn create_event(
        &self,
        creator: impl Into<ParticipantId>,
        group: impl Into<String>,
        name: impl Into<String>,
        time: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Event, RuntimeError> {
        let (creator, group, name) = (creator.into(), group.into(), name.into());
        let (time, location) = (time.into(), location.into());
        let event = self
            .run(move |svc| {
                svc.events()
                    .create_event(&creator, &group, &name, &time, &location)
            })
            .await?;
        self.publish(CoordinationEvent::EventCreated { event: event.id() });
        Ok(event)
    }

    /// Deletes an event with its ballots.
    pub async fn delete_event(&self, event: EventId) -> Result<(), RuntimeError> {
        self.run(move |svc| svc.events().delete_event(event)).await?;
        self.publish(CoordinationEvent::EventDeleted { event });
        Ok(())
    }

    /// Loads an event.
    pub async fn get_event(&self, event: EventId) -> Result<Event, RuntimeError> {
        self.run(move |svc| svc.events().get_event(event)).await
    }

    /// Loads an event with display names resolved.
    pub async fn event_view(&self, event: EventId) -> Result<EventView, RuntimeError> {
        self.run(move |svc| svc.events().event_view(event)).await
    }

    /// Adds an attendee to an event.
    pub async fn add_attendee(
        &self,
        event: EventId,
        attendee: impl Into<ParticipantId>,
    ) -> Result<(), RuntimeError> {
        let attendee = attendee.into();
        let a = attendee.clone();
        self.run(move |svc| svc.events().add_attendee(event, &a))
            .await?;
        self.publish(CoordinationEvent::AttendeeJoined { event, attendee });
        Ok(())
    }

    /// Retracts the attendee's votes, then removes them from the event.
    pub async fn leave_event(
        &self,
        event: EventId,
        attendee: impl Into<ParticipantId>,
    ) -> Result<(), RuntimeError> {
        let attendee = attendee.into();
        let a = attendee.clone();
        self.run(move |svc| svc.events().leave_event(event, &a))
            .await?;
        self.publish(CoordinationEvent::AttendeeLeft { event, attendee });
        Ok(())
    }

    /// Adds a candidate option to `category`.
    pub async fn add_candidate(
        &self,
        event: EventId,
        category: Category,
        option: impl Into<String>,
    ) -> Result<BallotOutcome, RuntimeError> {
        let option = option.into();
        self.run(move |svc| match category {
            Category::Time => svc.events().add_candidate_time(event, &option),
            Category::Location => svc.events().add_candidate_location(event, &option),
        })
        .await
    }

    /// Removes a candidate option and its votes.
    pub async fn remove_candidate(
        &self,
        event: EventId,
        category: Category,
        option: impl Into<String>,
    ) -> Result<BallotOutcome, RuntimeError> {
        let option = option.into();
        self.run(move |svc| match category {
            Category::Time => svc.events().remove_candidate_time(event, &option),
            Category::Location => svc.events().remove_candidate_location(event, &option),
        })
        .await
    }

    /// Adds a candidate and moves the proposer's vote onto it.
    pub async fn propose(
        &self,
        event: EventId,
        category: Category,
        option: impl Into<String>,
        proposer: impl Into<ParticipantId>,
    ) -> Result<BallotOutcome, RuntimeError> {
        let (option, proposer) = (option.into(), proposer.into());
        self.run(move |svc| match category {
            Category::Time => svc.events().propose_time(event, &option, &proposer),
            Category::Location => svc.events().propose_location(event, &option, &proposer),
        })
        .await
    }

    /// See [`crate::consensus::event::EventRegistry::cast_vote`].
    pub async fn cast_vote(
        &self,
        event: EventId,
        category: Category,
        option: impl Into<String>,
        voter: impl Into<ParticipantId>,
    ) -> Result<BallotOutcome, RuntimeError> {
        let (option, voter) = (option.into(), voter.into());
        self.run(move |svc| svc.events().cast_vote(event, category, &option, &voter))
            .await
    }

    /// Withdraws a vote; missing votes are a no-op.
    pub async fn unvote(
        &self,
        event: EventId,
        category: Category,
        option: impl Into<String>,
        voter: impl Into<ParticipantId>,
    ) -> Result<BallotOutcome, RuntimeError> {
        let (option, voter) = (option.into(), voter.into());
        self.run(move |svc| svc.events().unvote(event, category, &option, &voter))
            .await
    }

    /// Vote count per candidate.
    pub async fn tally(
        &self,
        event: EventId,
        category: Category,
    ) -> Result<Vec<(String, usize)>, RuntimeError> {
        self.run(move |svc| svc.events().tally(event, category)).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce(&Coordinator) -> crate::error::Result<T> + Send + 'static,
    {
        let services = Arc::clone(&self.services);
        tokio::task::spawn_blocking(move || f(&services))
            .await
            .map_err(|e| RuntimeError::WorkerFailed(format!("join error: {e}")))?
            .map_err(RuntimeError::from)
    }

    fn publish(&self, event: CoordinationEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}
