use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::VoterId;

/// The option passed to [`OptionBallot::vote`] is not a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("option is not a candidate")]
pub struct NotCandidate;

/// One candidate option and the voters supporting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotEntry<T> {
    /// Candidate option.
    pub option: T,
    /// Supporting voters in the order their votes arrived.
    pub voters: Vec<VoterId>,
}

/// Candidate options of one category, in insertion order, each mapped to
/// its set of supporting voters.
///
/// The candidate set and the ballot keys are the same list, so removing a
/// candidate discards its votes. The ballot accepts a voter on several
/// options; keeping one vote per voter is up to the caller via
/// [`OptionBallot::vote_of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionBallot<T> {
    entries: Vec<BallotEntry<T>>,
}

impl<T> Default for OptionBallot<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> OptionBallot<T> {
    /// Empty ballot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ballot seeded with a single candidate.
    pub fn with_candidate(option: T) -> Self {
        let mut ballot = Self::new();
        ballot.add_candidate(option);
        ballot
    }

    /// Appends `option` as the newest candidate. Returns false when present.
    pub fn add_candidate(&mut self, option: T) -> bool {
        if self.is_candidate(&option) {
            return false;
        }
        self.entries.push(BallotEntry {
            option,
            voters: Vec::new(),
        });
        true
    }

    /// Removes `option` and returns the voters whose votes were discarded.
    pub fn remove_candidate(&mut self, option: &T) -> Option<Vec<VoterId>> {
        let pos = self.position(option)?;
        Some(self.entries.remove(pos).voters)
    }

    /// True when `option` is a candidate.
    pub fn is_candidate(&self, option: &T) -> bool {
        self.position(option).is_some()
    }

    /// Candidates, oldest first.
    pub fn candidates(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.option)
    }

    /// Candidates with their voters, oldest first.
    pub fn entries(&self) -> &[BallotEntry<T>] {
        &self.entries
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `voter` to `option`. Returns false when the vote already existed.
    pub fn vote(&mut self, option: &T, voter: &str) -> Result<bool, NotCandidate> {
        let pos = self.position(option).ok_or(NotCandidate)?;
        let voters = &mut self.entries[pos].voters;
        if voters.iter().any(|v| v == voter) {
            return Ok(false);
        }
        voters.push(voter.to_string());
        Ok(true)
    }

    /// Removes `voter` from `option`. Returns false when there was nothing to remove.
    pub fn unvote(&mut self, option: &T, voter: &str) -> bool {
        let Some(pos) = self.position(option) else {
            return false;
        };
        let voters = &mut self.entries[pos].voters;
        match voters.iter().position(|v| v == voter) {
            Some(idx) => {
                voters.remove(idx);
                true
            }
            None => false,
        }
    }

    /// The option `voter` supports; the earliest one if the caller let
    /// the voter onto several.
    pub fn vote_of(&self, voter: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| e.voters.iter().any(|v| v == voter))
            .map(|e| &e.option)
    }

    /// Vote count per candidate, in insertion order.
    pub fn tally(&self) -> Vec<(T, usize)> {
        self.entries
            .iter()
            .map(|e| (e.option.clone(), e.voters.len()))
            .collect()
    }

    fn position(&self, option: &T) -> Option<usize> {
        self.entries.iter().position(|e| &e.option == option)
    }
}
