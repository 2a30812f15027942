use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};

use crate::{
    core::lock::{LockGuard, LockManager, ballot_scope, event_scope},
    error::{Error, Result},
    identity::{IdentityResolver, name_or_id},
    persist::{DocExt, KvStore, decode_doc},
    types::{Category, EventId, GroupId, ParticipantId},
};

use super::{ballot::OptionBallot, resolver::ConsensusResolver};

const EVENT_PREFIX: &str = "event/";
const BALLOT_PREFIX: &str = "ballot/";
const EVENT_SEQ_KEY: &str = "seq/event";

/// Candidate meeting time.
pub type Time = DateTime<Utc>;
/// Candidate meeting place.
pub type Location = String;

/// Value type voted on in one [`Category`].
pub trait Choice: Clone + PartialEq + Serialize + DeserializeOwned {
    /// Category this value type belongs to.
    const CATEGORY: Category;

    /// Parses caller input, rejecting malformed values.
    fn parse(raw: &str) -> Result<Self>;

    /// Canonical text form used in tallies and errors.
    fn render(&self) -> String;
}

impl Choice for Time {
    const CATEGORY: Category = Category::Time;

    fn parse(raw: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| Error::InvalidTime(raw.to_string()))
    }

    fn render(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl Choice for Location {
    const CATEGORY: Category = Category::Location;

    fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::EmptyLocation);
        }
        Ok(raw.to_string())
    }

    fn render(&self) -> String {
        self.clone()
    }
}

/// Event fields owned by the event lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Stable event id.
    pub id: EventId,
    /// Participant that created the event.
    pub creator: ParticipantId,
    /// Group the event belongs to.
    pub group: GroupId,
    /// Display name.
    pub name: String,
    /// Attendees in join order.
    pub attendees: Vec<ParticipantId>,
}

/// Ballot and confirmed value of one category, owned by that category's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryState<T> {
    /// Candidates and their voters.
    pub ballot: OptionBallot<T>,
    /// Current consensus winner, or the last value set when nobody has voted.
    pub confirmed: T,
}

impl<T: Choice> CategoryState<T> {
    fn seeded(option: T) -> Self {
        Self {
            ballot: OptionBallot::with_candidate(option.clone()),
            confirmed: option,
        }
    }
}

/// Assembled view of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Creator, group, name and attendees.
    pub meta: EventMeta,
    /// Time candidates, ballot and confirmed time.
    pub time: CategoryState<Time>,
    /// Location candidates, ballot and confirmed location.
    pub location: CategoryState<Location>,
}

impl Event {
    /// Event id.
    pub fn id(&self) -> EventId {
        self.meta.id
    }

    /// Confirmed meeting time.
    pub fn confirmed_time(&self) -> Time {
        self.time.confirmed
    }

    /// Confirmed meeting place.
    pub fn confirmed_location(&self) -> &str {
        &self.location.confirmed
    }

    /// Candidate times, oldest first.
    pub fn candidate_times(&self) -> Vec<Time> {
        self.time.ballot.candidates().copied().collect()
    }

    /// Candidate locations, oldest first.
    pub fn candidate_locations(&self) -> Vec<Location> {
        self.location.ballot.candidates().cloned().collect()
    }

    /// True when `participant` attends.
    pub fn is_attendee(&self, participant: &str) -> bool {
        self.meta.attendees.iter().any(|a| a == participant)
    }
}

/// Event with display names resolved through the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventView {
    /// The event itself.
    pub event: Event,
    /// Creator display name.
    pub creator_name: String,
    /// Attendee display names, in attendee order.
    pub attendee_names: Vec<String>,
}

/// Consensus state of a category after a ballot mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotOutcome {
    /// Event id.
    pub event: EventId,
    /// Mutated category.
    pub category: Category,
    /// Current winner; `None` when nobody has voted.
    pub winner: Option<String>,
    /// Confirmed value after recompute.
    pub confirmed: String,
    /// True when the confirmed value changed.
    pub changed: bool,
}

/// Callback run after every ballot recompute, while that ballot's lock is
/// still held, so observers see outcomes in commit order.
pub type BallotObserver = Arc<dyn Fn(&BallotOutcome) + Send + Sync>;

/// Per-event attendees plus one time ballot and one location ballot.
///
/// Every ballot mutation runs under the `(event, category)` lock together
/// with its consensus recompute. Multi-lock operations take the event lock,
/// then the time lock, then the location lock.
#[derive(Clone)]
pub struct EventRegistry {
    kv: Arc<dyn KvStore>,
    locks: LockManager,
    identity: Arc<dyn IdentityResolver>,
    observer: Option<BallotObserver>,
}

impl EventRegistry {
    /// Registry over `kv`, sharing `locks` with the pairing engine.
    pub fn new(kv: Arc<dyn KvStore>, locks: LockManager, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            kv,
            locks,
            identity,
            observer: None,
        }
    }

    /// Installs `observer`, replacing any previous one.
    pub fn with_observer(mut self, observer: BallotObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Creates an event with `time` and `location` as the first candidates and
    /// the creator as sole attendee.
    pub fn create_event(
        &self,
        creator: &str,
        group: &str,
        name: &str,
        time: &str,
        location: &str,
    ) -> Result<Event> {
        let time = Time::parse(time)?;
        let location = Location::parse(location)?;
        let group = group.to_string();
        if !self.identity.group_exists(&group)? {
            return Err(Error::GroupNotFound(group));
        }

        let id = self.kv.next_id(EVENT_SEQ_KEY)?;
        let event = Event {
            meta: EventMeta {
                id,
                creator: creator.to_string(),
                group,
                name: name.to_string(),
                attendees: vec![creator.to_string()],
            },
            time: CategoryState::seeded(time),
            location: CategoryState::seeded(location),
        };

        // Meta goes last: its presence is what makes the event visible.
        self.kv.put_doc(&ballot_key(id, Category::Time), &event.time)?;
        self.kv.put_doc(&ballot_key(id, Category::Location), &event.location)?;
        self.kv.put_doc(&event_key(id), &event.meta)?;
        info!(event = id, creator, "event created");
        Ok(event)
    }

    /// Deletes the event and both ballots.
    pub fn delete_event(&self, id: EventId) -> Result<()> {
        let _guards = self.lock_all(id)?;
        self.require_meta(id)?;
        self.kv.delete(&event_key(id))?;
        for category in Category::ALL {
            self.kv.delete(&ballot_key(id, category))?;
        }
        info!(event = id, "event deleted");
        Ok(())
    }

    /// Changes the display name.
    pub fn rename_event(&self, id: EventId, name: &str) -> Result<()> {
        let _event = self.locks.acquire(&event_scope(id))?;
        let mut meta = self.require_meta(id)?;
        meta.name = name.to_string();
        self.kv.put_doc(&event_key(id), &meta)?;
        Ok(())
    }

    /// Loads the event, failing with `EventNotFound`.
    pub fn get_event(&self, id: EventId) -> Result<Event> {
        let meta = self.require_meta(id)?;
        self.assemble(meta)
    }

    /// Event with creator and attendee names resolved in one batch.
    pub fn event_view(&self, id: EventId) -> Result<EventView> {
        let event = self.get_event(id)?;
        let mut ids = vec![event.meta.creator.clone()];
        ids.extend(event.meta.attendees.iter().cloned());
        let names = self.identity.display_names(&ids)?;

        Ok(EventView {
            creator_name: name_or_id(&names, &event.meta.creator),
            attendee_names: event
                .meta
                .attendees
                .iter()
                .map(|a| name_or_id(&names, a))
                .collect(),
            event,
        })
    }

    /// All events, ordered by confirmed time then id.
    pub fn list_events(&self) -> Result<Vec<Event>> {
        self.collect_events(|_| true)
    }

    /// Events of `group`, ordered by confirmed time then id.
    pub fn events_by_group(&self, group: &str) -> Result<Vec<Event>> {
        self.collect_events(|meta| meta.group == group)
    }

    /// Adds `attendee`; fails with `AlreadyAttendee` when present.
    pub fn add_attendee(&self, id: EventId, attendee: &str) -> Result<()> {
        let _event = self.locks.acquire(&event_scope(id))?;
        let mut meta = self.require_meta(id)?;
        if meta.attendees.iter().any(|a| a == attendee) {
            return Err(Error::AlreadyAttendee {
                event: id,
                attendee: attendee.to_string(),
            });
        }
        meta.attendees.push(attendee.to_string());
        self.kv.put_doc(&event_key(id), &meta)?;
        info!(event = id, attendee, "attendee joined");
        Ok(())
    }

    /// Removes `attendee` without touching their votes; callers retract
    /// votes first or use [`EventRegistry::leave_event`].
    pub fn remove_attendee(&self, id: EventId, attendee: &str) -> Result<()> {
        let _event = self.locks.acquire(&event_scope(id))?;
        let mut meta = self.require_meta(id)?;
        Self::drop_attendee(&mut meta, attendee)?;
        self.kv.put_doc(&event_key(id), &meta)?;
        info!(event = id, attendee, "attendee removed");
        Ok(())
    }

    /// Retracts `attendee`'s votes in both categories, recomputes consensus
    /// and removes them, all under the event's locks.
    pub fn leave_event(&self, id: EventId, attendee: &str) -> Result<Vec<BallotOutcome>> {
        let _guards = self.lock_all(id)?;
        let mut meta = self.require_meta(id)?;
        Self::drop_attendee(&mut meta, attendee)?;

        let mut time: CategoryState<Time> = self.load_state(id)?;
        let mut location: CategoryState<Location> = self.load_state(id)?;
        let outcomes = vec![
            Self::retract_and_recompute(id, &mut time, attendee),
            Self::retract_and_recompute(id, &mut location, attendee),
        ];

        self.kv.put_doc(&ballot_key(id, Category::Time), &time)?;
        self.kv.put_doc(&ballot_key(id, Category::Location), &location)?;
        self.kv.put_doc(&event_key(id), &meta)?;
        for outcome in &outcomes {
            self.notify(outcome);
        }
        info!(event = id, attendee, "attendee left");
        Ok(outcomes)
    }

    /// Adds a candidate time and recomputes time consensus.
    pub fn add_candidate_time(&self, id: EventId, time: &str) -> Result<BallotOutcome> {
        self.add_candidate(id, Time::parse(time)?)
    }

    /// Adds a candidate location and recomputes location consensus.
    pub fn add_candidate_location(&self, id: EventId, location: &str) -> Result<BallotOutcome> {
        self.add_candidate(id, Location::parse(location)?)
    }

    /// Removes a candidate time, discarding its votes.
    pub fn remove_candidate_time(&self, id: EventId, time: &str) -> Result<BallotOutcome> {
        self.remove_candidate(id, Time::parse(time)?)
    }

    /// Removes a candidate location, discarding its votes.
    pub fn remove_candidate_location(&self, id: EventId, location: &str) -> Result<BallotOutcome> {
        self.remove_candidate(id, Location::parse(location)?)
    }

    /// Adds a candidate time and moves the proposer's time vote onto it.
    pub fn propose_time(&self, id: EventId, time: &str, proposer: &str) -> Result<BallotOutcome> {
        self.propose(id, Time::parse(time)?, proposer)
    }

    /// Adds a candidate location and moves the proposer's location vote onto it.
    pub fn propose_location(
        &self,
        id: EventId,
        location: &str,
        proposer: &str,
    ) -> Result<BallotOutcome> {
        self.propose(id, Location::parse(location)?, proposer)
    }

    /// Moves `voter`'s vote in `category` onto `option` and recomputes consensus.
    pub fn cast_vote(
        &self,
        id: EventId,
        category: Category,
        option: &str,
        voter: &str,
    ) -> Result<BallotOutcome> {
        match category {
            Category::Time => self.cast(id, Time::parse(option)?, voter),
            Category::Location => self.cast(id, Location::parse(option)?, voter),
        }
    }

    /// Withdraws `voter`'s vote for `option`; a missing vote is a no-op.
    pub fn unvote(
        &self,
        id: EventId,
        category: Category,
        option: &str,
        voter: &str,
    ) -> Result<BallotOutcome> {
        match category {
            Category::Time => self.retract(id, Time::parse(option)?, voter),
            Category::Location => self.retract(id, Location::parse(option)?, voter),
        }
    }

    /// The option `voter` currently supports in `category`.
    pub fn vote_of(&self, id: EventId, category: Category, voter: &str) -> Result<Option<String>> {
        self.require_meta(id)?;
        match category {
            Category::Time => Ok(self
                .load_state::<Time>(id)?
                .ballot
                .vote_of(voter)
                .map(Choice::render)),
            Category::Location => Ok(self
                .load_state::<Location>(id)?
                .ballot
                .vote_of(voter)
                .map(Choice::render)),
        }
    }

    /// Vote count per candidate, in candidate insertion order.
    pub fn tally(&self, id: EventId, category: Category) -> Result<Vec<(String, usize)>> {
        self.require_meta(id)?;
        match category {
            Category::Time => Ok(render_tally(&self.load_state::<Time>(id)?.ballot)),
            Category::Location => Ok(render_tally(&self.load_state::<Location>(id)?.ballot)),
        }
    }

    /// Current confirmed time of event `id`.
    pub fn confirmed_time(&self, id: EventId) -> Result<Time> {
        self.require_meta(id)?;
        Ok(self.load_state::<Time>(id)?.confirmed)
    }

    /// Current confirmed location of event `id`.
    pub fn confirmed_location(&self, id: EventId) -> Result<Location> {
        self.require_meta(id)?;
        Ok(self.load_state::<Location>(id)?.confirmed)
    }

    fn add_candidate<T: Choice>(&self, id: EventId, option: T) -> Result<BallotOutcome> {
        self.mutate_ballot(id, |_, ballot: &mut OptionBallot<T>| {
            if !ballot.add_candidate(option.clone()) {
                return Err(Error::CandidateExists {
                    event: id,
                    category: T::CATEGORY,
                    option: option.render(),
                });
            }
            Ok(())
        })
    }

    fn remove_candidate<T: Choice>(&self, id: EventId, option: T) -> Result<BallotOutcome> {
        self.mutate_ballot(id, |_, ballot: &mut OptionBallot<T>| {
            let purged = ballot
                .remove_candidate(&option)
                .ok_or_else(|| not_candidate(id, &option))?;
            debug!(event = id, category = %T::CATEGORY, purged = purged.len(), "candidate removed");
            Ok(())
        })
    }

    fn propose<T: Choice>(&self, id: EventId, option: T, proposer: &str) -> Result<BallotOutcome> {
        self.mutate_ballot(id, |meta, ballot: &mut OptionBallot<T>| {
            require_attendee(meta, proposer)?;
            if !ballot.add_candidate(option.clone()) {
                return Err(Error::CandidateExists {
                    event: id,
                    category: T::CATEGORY,
                    option: option.render(),
                });
            }
            move_vote(id, ballot, option, proposer)
        })
    }

    fn cast<T: Choice>(&self, id: EventId, option: T, voter: &str) -> Result<BallotOutcome> {
        self.mutate_ballot(id, |meta, ballot: &mut OptionBallot<T>| {
            require_attendee(meta, voter)?;
            move_vote(id, ballot, option, voter)
        })
    }

    fn retract<T: Choice>(&self, id: EventId, option: T, voter: &str) -> Result<BallotOutcome> {
        self.mutate_ballot(id, |_, ballot: &mut OptionBallot<T>| {
            if !ballot.unvote(&option, voter) {
                debug!(event = id, category = %T::CATEGORY, voter, "unvote was a no-op");
            }
            Ok(())
        })
    }

    /// Runs `f` against the category ballot, recomputes consensus and
    /// notifies the observer, all under the `(event, category)` lock.
    /// Nothing is written when `f` fails.
    fn mutate_ballot<T: Choice>(
        &self,
        id: EventId,
        f: impl FnOnce(&EventMeta, &mut OptionBallot<T>) -> Result<()>,
    ) -> Result<BallotOutcome> {
        let _ballot = self.locks.acquire(&ballot_scope(id, T::CATEGORY))?;
        let meta = self.require_meta(id)?;
        let mut state: CategoryState<T> = self.load_state(id)?;

        f(&meta, &mut state.ballot)?;
        let outcome = recompute(id, &mut state);
        self.kv.put_doc(&ballot_key(id, T::CATEGORY), &state)?;
        self.notify(&outcome);
        Ok(outcome)
    }

    fn notify(&self, outcome: &BallotOutcome) {
        if let Some(observer) = &self.observer {
            observer(outcome);
        }
    }

    fn retract_and_recompute<T: Choice>(
        id: EventId,
        state: &mut CategoryState<T>,
        voter: &str,
    ) -> BallotOutcome {
        while let Some(option) = state.ballot.vote_of(voter).cloned() {
            state.ballot.unvote(&option, voter);
        }
        recompute(id, state)
    }

    fn drop_attendee(meta: &mut EventMeta, attendee: &str) -> Result<()> {
        let pos = meta
            .attendees
            .iter()
            .position(|a| a == attendee)
            .ok_or_else(|| Error::NotAttendee {
                event: meta.id,
                attendee: attendee.to_string(),
            })?;
        meta.attendees.remove(pos);
        Ok(())
    }

    fn lock_all(&self, id: EventId) -> Result<[LockGuard; 3]> {
        let event = self.locks.acquire(&event_scope(id))?;
        let time = self.locks.acquire(&ballot_scope(id, Category::Time))?;
        let location = self.locks.acquire(&ballot_scope(id, Category::Location))?;
        Ok([event, time, location])
    }

    fn require_meta(&self, id: EventId) -> Result<EventMeta> {
        self.kv
            .get_doc(&event_key(id))?
            .ok_or(Error::EventNotFound(id))
    }

    fn load_state<T: Choice>(&self, id: EventId) -> Result<CategoryState<T>> {
        self.kv
            .get_doc(&ballot_key(id, T::CATEGORY))?
            .ok_or(Error::EventNotFound(id))
    }

    fn assemble(&self, meta: EventMeta) -> Result<Event> {
        let id = meta.id;
        Ok(Event {
            meta,
            time: self.load_state(id)?,
            location: self.load_state(id)?,
        })
    }

    fn collect_events(&self, keep: impl Fn(&EventMeta) -> bool) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for (_, payload) in self.kv.scan_prefix(EVENT_PREFIX)? {
            let meta: EventMeta = decode_doc(&payload)?;
            if !keep(&meta) {
                continue;
            }
            match self.assemble(meta) {
                Ok(event) => events.push(event),
                // Deleted between the scan and the ballot read.
                Err(Error::EventNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        events.sort_by(|a, b| {
            a.confirmed_time()
                .cmp(&b.confirmed_time())
                .then(a.id().cmp(&b.id()))
        });
        Ok(events)
    }
}

/// Retracts `voter`'s other votes in the ballot, then records the new one.
fn move_vote<T: Choice>(
    id: EventId,
    ballot: &mut OptionBallot<T>,
    option: T,
    voter: &str,
) -> Result<()> {
    if !ballot.is_candidate(&option) {
        return Err(not_candidate(id, &option));
    }
    let stale: Vec<T> = ballot
        .entries()
        .iter()
        .filter(|e| e.option != option && e.voters.iter().any(|v| v == voter))
        .map(|e| e.option.clone())
        .collect();
    for prev in &stale {
        ballot.unvote(prev, voter);
    }
    ballot
        .vote(&option, voter)
        .map_err(|_| not_candidate(id, &option))?;
    Ok(())
}

fn recompute<T: Choice>(id: EventId, state: &mut CategoryState<T>) -> BallotOutcome {
    let changed = ConsensusResolver::sync(&state.ballot, &mut state.confirmed);
    let winner = ConsensusResolver::resolve(&state.ballot).map(Choice::render);
    let confirmed = state.confirmed.render();
    if changed {
        info!(event = id, category = %T::CATEGORY, confirmed = %confirmed, "consensus changed");
    }
    BallotOutcome {
        event: id,
        category: T::CATEGORY,
        winner,
        confirmed,
        changed,
    }
}

fn require_attendee(meta: &EventMeta, participant: &str) -> Result<()> {
    if meta.attendees.iter().any(|a| a == participant) {
        Ok(())
    } else {
        Err(Error::NotAttendee {
            event: meta.id,
            attendee: participant.to_string(),
        })
    }
}

fn not_candidate<T: Choice>(id: EventId, option: &T) -> Error {
    Error::OptionNotCandidate {
        event: id,
        category: T::CATEGORY,
        option: option.render(),
    }
}

fn render_tally<T: Choice>(ballot: &OptionBallot<T>) -> Vec<(String, usize)> {
    ballot
        .tally()
        .into_iter()
        .map(|(option, count)| (option.render(), count))
        .collect()
}

fn event_key(id: EventId) -> String {
    format!("{EVENT_PREFIX}{id:020}")
}

fn ballot_key(id: EventId, category: Category) -> String {
    format!("{BALLOT_PREFIX}{id:020}/{category}")
}
