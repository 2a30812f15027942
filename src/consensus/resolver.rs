use super::ballot::OptionBallot;

/// Picks the consensus winner of a ballot and keeps a confirmed value in step.
///
/// The winner is the option with the strictly highest count; among equal
/// counts the earliest-inserted candidate wins. A ballot with no votes has
/// no winner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusResolver;

impl ConsensusResolver {
    /// The current winner, or `None` when nobody has voted.
    pub fn resolve<T: Clone + PartialEq>(ballot: &OptionBallot<T>) -> Option<&T> {
        let mut best: Option<(&T, usize)> = None;
        for entry in ballot.entries() {
            let count = entry.voters.len();
            if count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((&entry.option, count)),
            }
        }
        best.map(|(option, _)| option)
    }

    /// Overwrites `confirmed` with the winner, if any. Returns true when
    /// `confirmed` changed.
    pub fn sync<T: Clone + PartialEq>(ballot: &OptionBallot<T>, confirmed: &mut T) -> bool {
        match Self::resolve(ballot) {
            Some(winner) if *winner != *confirmed => {
                *confirmed = winner.clone();
                true
            }
            _ => false,
        }
    }
}
