//! Vote tallying and tie-breaking.
//!
//! The same plurality rule resolves both the day vote and the werewolves'
//! night kill: highest count wins, ties are broken uniformly at random
//! with the caller's random source.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target name → number of votes received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteTally(BTreeMap<String, u32>);

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tally directly from counts.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self(
            counts
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(name, count)| (name.into(), count))
                .collect(),
        )
    }

    pub fn add(&mut self, target: &str) {
        *self.0.entry(target.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, target: &str) -> u32 {
        self.0.get(target).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    /// Every target holding the highest count, in name order.
    pub fn leaders(&self) -> Vec<&str> {
        let Some(max) = self.0.values().copied().max() else {
            return Vec::new();
        };
        self.0
            .iter()
            .filter(|(_, count)| **count == max)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// The plurality winner, with a uniform random pick among tied leaders.
    pub fn pick_winner<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let leaders = self.leaders();
        match leaders.as_slice() {
            [] => None,
            [only] => Some((*only).to_string()),
            tied => tied.choose(rng).map(|name| (*name).to_string()),
        }
    }
}

/// Result of resolving a round of votes or kill targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub chosen: Option<String>,
    pub tally: VoteTally,
}

/// Tally `ballots` (voter → target) and pick the executed player.
///
/// Ballots from voters outside `alive`, or naming a target outside
/// `alive`, are dropped without error.
pub fn resolve_votes<R: Rng + ?Sized>(
    ballots: &BTreeMap<String, String>,
    alive: &[String],
    rng: &mut R,
) -> Resolution {
    let mut tally = VoteTally::new();
    for (voter, target) in ballots {
        if is_alive(alive, voter) && is_alive(alive, target) {
            tally.add(target);
        }
    }
    let chosen = tally.pick_winner(rng);
    Resolution { chosen, tally }
}

/// Resolve the werewolves' kill from each werewolf's (optional) target.
///
/// Abstentions and targets outside `alive` are ignored; if nothing valid
/// remains, nobody dies.
pub fn resolve_night_kill<'a, I, R>(targets: I, alive: &[String], rng: &mut R) -> Resolution
where
    I: IntoIterator<Item = Option<&'a str>>,
    R: Rng + ?Sized,
{
    let mut tally = VoteTally::new();
    for target in targets.into_iter().flatten() {
        if is_alive(alive, target) {
            tally.add(target);
        }
    }
    let chosen = tally.pick_winner(rng);
    Resolution { chosen, tally }
}

fn is_alive(alive: &[String], name: &str) -> bool {
    alive.iter().any(|a| a == name)
}
