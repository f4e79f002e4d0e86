//! Secret roles and their assignment.
//!
//! Role assignment is a pure function of the roster, the werewolf count
//! and a caller-supplied random source, so seeded games are reproducible.

use crate::GameError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A player's secret role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Werewolf,
    Villager,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Werewolf => "werewolf",
            Role::Villager => "villager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Speaking style injected into a player's system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Aggressive,
    Cautious,
    Analytical,
    Observant,
}

impl Personality {
    /// Pick a personality for the player at `index` in the roster.
    pub fn for_player(role: Role, index: usize) -> Self {
        let pool: &[Personality] = match role {
            Role::Werewolf => &[Personality::Aggressive, Personality::Cautious],
            Role::Villager => &[
                Personality::Analytical,
                Personality::Cautious,
                Personality::Observant,
            ],
        };
        pool[index % pool.len()]
    }

    pub fn traits(&self) -> &'static str {
        match self {
            Personality::Aggressive => {
                "You are aggressive: you accuse early, press hard on weak arguments \
                 and steer the table toward a target."
            }
            Personality::Cautious => {
                "You are cautious: you speak carefully, avoid committing too early \
                 and look for the safest consensus."
            }
            Personality::Analytical => {
                "You are analytical: you reason step by step from votes, deaths and \
                 contradictions before accusing anyone."
            }
            Personality::Observant => {
                "You are observant: you notice small inconsistencies in wording and \
                 who defends whom."
            }
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Personality::Aggressive => "aggressive",
            Personality::Cautious => "cautious",
            Personality::Analytical => "analytical",
            Personality::Observant => "observant",
        };
        f.write_str(name)
    }
}

/// A roster member with their secret role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub role: Role,
}

/// Mapping from player name to role.
pub type RoleMap = BTreeMap<String, Role>;

/// Assign `werewolves` werewolves uniformly at random from `players`.
///
/// Every other player becomes a villager. Fails if the roster is empty or
/// has duplicate names, or if the werewolf count leaves no villager.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &[String],
    werewolves: usize,
    rng: &mut R,
) -> Result<RoleMap, GameError> {
    validate_roster(players)?;
    if werewolves < 1 || werewolves >= players.len() {
        return Err(GameError::InvalidConfiguration(format!(
            "werewolf count must be between 1 and {} for {} players, got {werewolves}",
            players.len().saturating_sub(1),
            players.len()
        )));
    }

    let chosen: HashSet<&String> = players.choose_multiple(rng, werewolves).collect();

    Ok(players
        .iter()
        .map(|name| {
            let role = if chosen.contains(name) {
                Role::Werewolf
            } else {
                Role::Villager
            };
            (name.clone(), role)
        })
        .collect())
}

/// Check the roster is non-empty and free of duplicate names.
pub fn validate_roster(players: &[String]) -> Result<(), GameError> {
    if players.is_empty() {
        return Err(GameError::InvalidConfiguration("roster is empty".into()));
    }
    let mut seen = HashSet::new();
    for name in players {
        if name.trim().is_empty() {
            return Err(GameError::InvalidConfiguration(
                "player names must not be blank".into(),
            ));
        }
        if !seen.insert(name) {
            return Err(GameError::InvalidConfiguration(format!(
                "duplicate player name: {name}"
            )));
        }
    }
    Ok(())
}
