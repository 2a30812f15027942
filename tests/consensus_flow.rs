use std::sync::Arc;

use pairvote::{
    config::CoordinatorConfig,
    consensus::event::{Choice, Time},
    coordinator::Coordinator,
    error::{Error, ErrorKind},
    identity::StaticDirectory,
    persist::memory::MemoryKv,
    types::Category,
};

const T1: &str = "2025-03-01T18:00:00Z";
const T2: &str = "2025-03-02T18:00:00Z";
const T3: &str = "2025-03-03T18:00:00Z";

fn coordinator() -> Coordinator {
    let directory = StaticDirectory::new()
        .with_user("u", "Uma")
        .with_user("v", "Vic")
        .with_group("club")
        .with_group("team");
    Coordinator::new(
        Arc::new(MemoryKv::new()),
        Arc::new(directory),
        &CoordinatorConfig::default(),
    )
}

fn time(raw: &str) -> Time {
    Time::parse(raw).expect("valid time")
}

#[test]
fn create_event_seeds_candidates_and_creator() {
    let coord = coordinator();
    let events = coord.events();

    let event = events.create_event("u", "club", "Meetup", T1, "Library").unwrap();
    assert_eq!(event.meta.attendees, vec!["u".to_string()]);
    assert_eq!(event.candidate_times(), vec![time(T1)]);
    assert_eq!(event.candidate_locations(), vec!["Library".to_string()]);
    assert_eq!(event.confirmed_time(), time(T1));
    assert_eq!(event.confirmed_location(), "Library");
    assert_eq!(events.tally(event.id(), Category::Time).unwrap(), vec![(T1.to_string(), 0)]);
    assert_eq!(events.get_event(event.id()).unwrap(), event);
}

#[test]
fn create_event_validates_input() {
    let coord = coordinator();
    let events = coord.events();

    let err = events.create_event("u", "club", "Meetup", "not a date", "Library").unwrap_err();
    assert!(matches!(err, Error::InvalidTime(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = events.create_event("u", "club", "Meetup", T1, "  ").unwrap_err();
    assert!(matches!(err, Error::EmptyLocation));

    let err = events.create_event("u", "nowhere", "Meetup", T1, "Library").unwrap_err();
    assert!(matches!(err, Error::GroupNotFound(_)));
    assert!(events.list_events().unwrap().is_empty());
}

#[test]
fn equal_counts_keep_first_added_candidate() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_candidate_time(id, T2).unwrap();
    events.add_attendee(id, "v").unwrap();

    let outcome = events.cast_vote(id, Category::Time, T1, "u").unwrap();
    assert_eq!(outcome.winner.as_deref(), Some(T1));
    assert!(!outcome.changed);

    let outcome = events.cast_vote(id, Category::Time, T2, "v").unwrap();
    assert_eq!(outcome.winner.as_deref(), Some(T1));
    assert_eq!(events.confirmed_time(id).unwrap(), time(T1));
}

#[test]
fn later_candidate_needs_strictly_more_votes() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_candidate_time(id, T2).unwrap();
    for voter in ["v", "w", "x"] {
        events.add_attendee(id, voter).unwrap();
    }

    events.cast_vote(id, Category::Time, T2, "v").unwrap();
    assert_eq!(events.confirmed_time(id).unwrap(), time(T2));

    events.cast_vote(id, Category::Time, T1, "u").unwrap();
    events.cast_vote(id, Category::Time, T1, "w").unwrap();
    assert_eq!(events.confirmed_time(id).unwrap(), time(T1));

    let outcome = events.cast_vote(id, Category::Time, T2, "x").unwrap();
    assert_eq!(outcome.winner.as_deref(), Some(T1));
    assert!(!outcome.changed);
}

#[test]
fn recasting_moves_the_vote() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_candidate_location(id, "Cafe").unwrap();

    events.cast_vote(id, Category::Location, "Library", "u").unwrap();
    let outcome = events.cast_vote(id, Category::Location, "Cafe", "u").unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.confirmed, "Cafe");
    assert_eq!(
        events.tally(id, Category::Location).unwrap(),
        vec![("Library".to_string(), 0), ("Cafe".to_string(), 1)]
    );
    assert_eq!(
        events.vote_of(id, Category::Location, "u").unwrap().as_deref(),
        Some("Cafe")
    );

    // Casting the same vote twice is idempotent.
    events.cast_vote(id, Category::Location, "Cafe", "u").unwrap();
    assert_eq!(events.tally(id, Category::Location).unwrap()[1].1, 1);
}

#[test]
fn votes_require_attendance_and_candidacy() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();

    let err = events.cast_vote(id, Category::Time, T1, "v").unwrap_err();
    assert!(matches!(err, Error::NotAttendee { .. }));
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    events.cast_vote(id, Category::Time, T1, "u").unwrap();
    let err = events.cast_vote(id, Category::Time, T3, "u").unwrap_err();
    assert!(matches!(err, Error::OptionNotCandidate { category: Category::Time, .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // The failed vote leaves the previous one in place.
    assert_eq!(events.vote_of(id, Category::Time, "u").unwrap().as_deref(), Some(T1));

    let err = events.cast_vote(id, Category::Time, "yesterday", "u").unwrap_err();
    assert!(matches!(err, Error::InvalidTime(_)));

    let err = events.cast_vote(99, Category::Time, T1, "u").unwrap_err();
    assert!(matches!(err, Error::EventNotFound(99)));
}

#[test]
fn equivalent_instants_name_the_same_candidate() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    let err = events.add_candidate_time(id, "2025-03-01T20:00:00+02:00").unwrap_err();
    assert!(matches!(err, Error::CandidateExists { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    events.cast_vote(id, Category::Time, "2025-03-01T19:00:00+01:00", "u").unwrap();
    assert_eq!(events.vote_of(id, Category::Time, "u").unwrap().as_deref(), Some(T1));
}

#[test]
fn removing_a_candidate_purges_only_its_votes() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_candidate_time(id, T2).unwrap();
    events.add_candidate_time(id, T3).unwrap();
    for voter in ["v", "w", "x"] {
        events.add_attendee(id, voter).unwrap();
    }
    events.cast_vote(id, Category::Time, T2, "u").unwrap();
    events.cast_vote(id, Category::Time, T2, "v").unwrap();
    events.cast_vote(id, Category::Time, T3, "w").unwrap();
    assert_eq!(events.confirmed_time(id).unwrap(), time(T2));

    let outcome = events.remove_candidate_time(id, T2).unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.winner.as_deref(), Some(T3));
    assert_eq!(
        events.tally(id, Category::Time).unwrap(),
        vec![(T1.to_string(), 0), (T3.to_string(), 1)]
    );
    assert_eq!(events.vote_of(id, Category::Time, "u").unwrap(), None);

    let err = events.remove_candidate_time(id, T2).unwrap_err();
    assert!(matches!(err, Error::OptionNotCandidate { .. }));
}

#[test]
fn no_votes_leaves_confirmed_value_unchanged() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_candidate_location(id, "Cafe").unwrap();
    events.cast_vote(id, Category::Location, "Cafe", "u").unwrap();
    assert_eq!(events.confirmed_location(id).unwrap(), "Cafe");

    let outcome = events.unvote(id, Category::Location, "Cafe", "u").unwrap();
    assert_eq!(outcome.winner, None);
    assert!(!outcome.changed);
    assert_eq!(events.confirmed_location(id).unwrap(), "Cafe");

    // Unvoting twice is a no-op.
    events.unvote(id, Category::Location, "Cafe", "u").unwrap();

    events.remove_candidate_location(id, "Cafe").unwrap();
    assert_eq!(events.confirmed_location(id).unwrap(), "Cafe");
    assert_eq!(events.get_event(id).unwrap().candidate_locations(), vec!["Library".to_string()]);
}

#[test]
fn propose_adds_candidate_and_moves_vote() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.cast_vote(id, Category::Time, T1, "u").unwrap();

    let outcome = events.propose_time(id, T2, "u").unwrap();
    assert!(outcome.changed);
    assert_eq!(
        events.tally(id, Category::Time).unwrap(),
        vec![(T1.to_string(), 0), (T2.to_string(), 1)]
    );

    let err = events.propose_location(id, "Park", "v").unwrap_err();
    assert!(matches!(err, Error::NotAttendee { .. }));
    assert_eq!(events.get_event(id).unwrap().candidate_locations().len(), 1);
}

#[test]
fn attendee_membership_rules() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    let err = events.add_attendee(id, "u").unwrap_err();
    assert!(matches!(err, Error::AlreadyAttendee { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = events.remove_attendee(id, "v").unwrap_err();
    assert!(matches!(err, Error::NotAttendee { .. }));

    events.add_attendee(id, "v").unwrap();
    events.cast_vote(id, Category::Time, T1, "v").unwrap();
    events.remove_attendee(id, "v").unwrap();
    // Plain removal leaves the vote behind.
    assert_eq!(events.vote_of(id, Category::Time, "v").unwrap().as_deref(), Some(T1));
}

#[test]
fn leave_event_retracts_both_votes() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_attendee(id, "v").unwrap();
    events.propose_time(id, T2, "v").unwrap();
    events.propose_location(id, "Cafe", "v").unwrap();
    assert_eq!(events.confirmed_time(id).unwrap(), time(T2));

    let outcomes = events.leave_event(id, "v").unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.winner.is_none()));
    assert_eq!(events.vote_of(id, Category::Time, "v").unwrap(), None);
    assert_eq!(events.vote_of(id, Category::Location, "v").unwrap(), None);
    assert!(!events.get_event(id).unwrap().is_attendee("v"));

    let err = events.leave_event(id, "v").unwrap_err();
    assert!(matches!(err, Error::NotAttendee { .. }));
}

#[test]
fn listing_orders_by_confirmed_time() {
    let coord = coordinator();
    let events = coord.events();

    let late = events.create_event("u", "club", "Late", T3, "Library").unwrap().id();
    let early = events.create_event("u", "team", "Early", T1, "Gym").unwrap().id();
    let mid = events.create_event("v", "club", "Mid", T2, "Cafe").unwrap().id();

    let ids: Vec<_> = events.list_events().unwrap().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![early, mid, late]);

    let ids: Vec<_> = events.events_by_group("club").unwrap().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![mid, late]);
}

#[test]
fn rename_view_and_delete() {
    let coord = coordinator();
    let events = coord.events();

    let id = events.create_event("u", "club", "Meetup", T1, "Library").unwrap().id();
    events.add_attendee(id, "v").unwrap();
    events.add_attendee(id, "ghost").unwrap();
    events.rename_event(id, "Book swap").unwrap();

    let view = events.event_view(id).unwrap();
    assert_eq!(view.event.meta.name, "Book swap");
    assert_eq!(view.creator_name, "Uma");
    assert_eq!(view.attendee_names, vec!["Uma", "Vic", "ghost"]);

    events.delete_event(id).unwrap();
    assert!(matches!(events.get_event(id).unwrap_err(), Error::EventNotFound(_)));
    assert!(matches!(events.delete_event(id).unwrap_err(), Error::EventNotFound(_)));
    assert!(events.list_events().unwrap().is_empty());
}
