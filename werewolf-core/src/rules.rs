//! Win-condition evaluation.

use crate::roles::{Role, RoleMap};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REASON_ALL_WEREWOLVES_ELIMINATED: &str = "all werewolves eliminated";
pub const REASON_PARITY: &str = "parity or majority reached";
pub const REASON_TOO_FEW_PLAYERS: &str = "too few players remain";

/// The side that won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Werewolves,
    Villagers,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Werewolves => f.write_str("Werewolves"),
            Winner::Villagers => f.write_str("Villagers"),
        }
    }
}

/// A decided game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: Winner,
    pub reason: String,
}

impl Verdict {
    fn new(winner: Winner, reason: &str) -> Self {
        Self {
            winner,
            reason: reason.to_string(),
        }
    }
}

/// Decide whether the game is over for the given alive roster.
///
/// The checks run in a fixed order: no werewolves left, then parity,
/// then the small-roster fallback. A one-werewolf/one-villager table is
/// therefore reported as parity, not as too few players.
pub fn check_win_condition(alive: &[String], roles: &RoleMap) -> Option<Verdict> {
    let count = |role: Role| {
        alive
            .iter()
            .filter(|p| roles.get(p.as_str()) == Some(&role))
            .count()
    };
    let werewolves = count(Role::Werewolf);
    let villagers = count(Role::Villager);

    if werewolves == 0 {
        Some(Verdict::new(
            Winner::Villagers,
            REASON_ALL_WEREWOLVES_ELIMINATED,
        ))
    } else if werewolves >= villagers {
        Some(Verdict::new(Winner::Werewolves, REASON_PARITY))
    } else if alive.len() <= 2 {
        let winner = if werewolves > 0 {
            Winner::Werewolves
        } else {
            Winner::Villagers
        };
        Some(Verdict::new(winner, REASON_TOO_FEW_PLAYERS))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, Role)]) -> (Vec<String>, RoleMap) {
        let alive = entries.iter().map(|(n, _)| n.to_string()).collect();
        let roles = entries.iter().map(|(n, r)| (n.to_string(), *r)).collect();
        (alive, roles)
    }

    #[test]
    fn test_two_player_parity_beats_size_rule() {
        let (alive, roles) = table(&[("A", Role::Werewolf), ("B", Role::Villager)]);
        let verdict = check_win_condition(&alive, &roles).unwrap();
        assert_eq!(verdict.winner, Winner::Werewolves);
        assert_eq!(verdict.reason, REASON_PARITY);
    }

    #[test]
    fn test_lone_villager_wins() {
        let (alive, roles) = table(&[("A", Role::Villager)]);
        let verdict = check_win_condition(&alive, &roles).unwrap();
        assert_eq!(verdict.winner, Winner::Villagers);
        assert_eq!(verdict.reason, REASON_ALL_WEREWOLVES_ELIMINATED);
    }

    #[test]
    fn test_game_continues_with_villager_majority() {
        let (alive, roles) = table(&[
            ("A", Role::Werewolf),
            ("B", Role::Villager),
            ("C", Role::Villager),
        ]);
        assert_eq!(check_win_condition(&alive, &roles), None);
    }

    #[test]
    fn test_werewolf_majority() {
        let (alive, roles) = table(&[
            ("A", Role::Werewolf),
            ("B", Role::Werewolf),
            ("C", Role::Villager),
        ]);
        let verdict = check_win_condition(&alive, &roles).unwrap();
        assert_eq!(verdict.winner, Winner::Werewolves);
        assert_eq!(verdict.reason, REASON_PARITY);
    }

    #[test]
    fn test_dead_players_in_role_map_are_ignored() {
        let (_, roles) = table(&[
            ("A", Role::Werewolf),
            ("B", Role::Villager),
            ("C", Role::Villager),
            ("D", Role::Villager),
        ]);
        let alive = vec!["B".to_string(), "C".to_string()];
        let verdict = check_win_condition(&alive, &roles).unwrap();
        assert_eq!(verdict.winner, Winner::Villagers);
    }
}
