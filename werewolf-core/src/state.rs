//! Authoritative game state: round, phase, alive roster and the
//! append-only history that doubles as the game transcript.

use crate::agent::Speech;
use crate::roles::{Role, RoleMap};
use crate::votes::VoteTally;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five stages of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NightAction,
    DayAnnounce,
    Discussion,
    Voting,
    CheckEnd,
}

impl Phase {
    /// Every round starts here.
    pub const ENTRY: Phase = Phase::NightAction;

    /// The phase after `self`, or `None` once the game is over.
    ///
    /// Only `CheckEnd` looks at `game_over`; every other phase has a single
    /// fixed successor.
    pub fn next(self, game_over: bool) -> Option<Phase> {
        match self {
            Phase::NightAction => Some(Phase::DayAnnounce),
            Phase::DayAnnounce => Some(Phase::Discussion),
            Phase::Discussion => Some(Phase::Voting),
            Phase::Voting => Some(Phase::CheckEnd),
            Phase::CheckEnd if game_over => None,
            Phase::CheckEnd => Some(Phase::NightAction),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::NightAction => "night_action",
            Phase::DayAnnounce => "day_announce",
            Phase::Discussion => "discussion",
            Phase::Voting => "voting",
            Phase::CheckEnd => "check_end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// A werewolf's private kill choice.
    NightAction {
        player: String,
        target: Option<String>,
        reasoning: String,
    },
    /// Dawn announcement; an empty list is a peaceful night.
    Deaths { deaths: Vec<String> },
    Discussion { player: String, speech: Speech },
    Voting {
        votes: BTreeMap<String, String>,
        tally: VoteTally,
    },
    Execution { executed: String },
}

impl HistoryEvent {
    pub fn label(&self) -> &'static str {
        match self {
            HistoryEvent::NightAction { .. } => "night_action",
            HistoryEvent::Deaths { .. } => "day_announce",
            HistoryEvent::Discussion { .. } => "discussion",
            HistoryEvent::Voting { .. } => "voting",
            HistoryEvent::Execution { .. } => "execution",
        }
    }
}

/// One immutable transcript record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round: u32,
    pub phase: Phase,
    pub event: HistoryEvent,
}

/// A public speech as seen by other players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionLine {
    pub round: u32,
    pub player: String,
    pub speech: String,
}

/// Read-only view handed to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub round: u32,
    pub phase: Phase,
    pub alive: Vec<String>,
    pub roles: RoleMap,
    pub last_night_deaths: Vec<String>,
    /// The latest speeches, at most one per alive player.
    pub recent_discussion: Vec<DiscussionLine>,
    pub executions: Vec<String>,
}

impl StateSnapshot {
    pub fn role_of(&self, player: &str) -> Option<Role> {
        self.roles.get(player).copied()
    }

    pub fn is_alive(&self, player: &str) -> bool {
        self.alive.iter().any(|p| p == player)
    }

    /// Alive players other than `player`.
    pub fn others(&self, player: &str) -> Vec<&str> {
        self.alive
            .iter()
            .filter(|p| p.as_str() != player)
            .map(String::as_str)
            .collect()
    }

    /// Alive teammates of `player` if they are a werewolf.
    pub fn werewolf_allies(&self, player: &str) -> Vec<&str> {
        if self.role_of(player) != Some(Role::Werewolf) {
            return Vec::new();
        }
        self.alive
            .iter()
            .filter(|p| p.as_str() != player && self.role_of(p) == Some(Role::Werewolf))
            .map(String::as_str)
            .collect()
    }
}

/// Mutable game state owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    players: Vec<String>,
    roles: RoleMap,
    alive: Vec<String>,
    round: u32,
    phase: Phase,
    last_night_deaths: Vec<String>,
    executions: Vec<String>,
    history: Vec<HistoryEntry>,
}

impl GameState {
    /// Create state for a roster whose roles are already assigned.
    pub fn new(players: Vec<String>, roles: RoleMap) -> Self {
        Self {
            alive: players.clone(),
            players,
            roles,
            round: 0,
            phase: Phase::ENTRY,
            last_night_deaths: Vec::new(),
            executions: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn start_new_round(&mut self) {
        self.round += 1;
        self.phase = Phase::ENTRY;
        self.last_night_deaths.clear();
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn record_night_action(
        &mut self,
        player: &str,
        target: Option<String>,
        reasoning: impl Into<String>,
    ) {
        self.push(
            Phase::NightAction,
            HistoryEvent::NightAction {
                player: player.to_string(),
                target,
                reasoning: reasoning.into(),
            },
        );
    }

    /// Record the dawn deaths and remove them from the alive roster.
    pub fn record_deaths(&mut self, deaths: &[String]) {
        self.last_night_deaths = deaths.to_vec();
        for name in deaths {
            self.remove_alive(name);
        }
        self.push(
            Phase::DayAnnounce,
            HistoryEvent::Deaths {
                deaths: deaths.to_vec(),
            },
        );
    }

    pub fn record_discussion(&mut self, player: &str, speech: Speech) {
        self.push(
            Phase::Discussion,
            HistoryEvent::Discussion {
                player: player.to_string(),
                speech,
            },
        );
    }

    pub fn record_voting(&mut self, votes: BTreeMap<String, String>, tally: VoteTally) {
        self.push(Phase::Voting, HistoryEvent::Voting { votes, tally });
    }

    pub fn record_execution(&mut self, executed: &str) {
        self.remove_alive(executed);
        self.executions.push(executed.to_string());
        self.push(
            Phase::Voting,
            HistoryEvent::Execution {
                executed: executed.to_string(),
            },
        );
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let window = self.alive.len();
        let mut recent: Vec<DiscussionLine> = self
            .history
            .iter()
            .rev()
            .filter_map(|entry| match &entry.event {
                HistoryEvent::Discussion { player, speech } => Some(DiscussionLine {
                    round: entry.round,
                    player: player.clone(),
                    speech: speech.speech.clone(),
                }),
                _ => None,
            })
            .take(window)
            .collect();
        recent.reverse();

        StateSnapshot {
            round: self.round,
            phase: self.phase,
            alive: self.alive.clone(),
            roles: self.roles.clone(),
            last_night_deaths: self.last_night_deaths.clone(),
            recent_discussion: recent,
            executions: self.executions.clone(),
        }
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub fn role_of(&self, player: &str) -> Option<Role> {
        self.roles.get(player).copied()
    }

    pub fn alive(&self) -> &[String] {
        &self.alive
    }

    pub fn is_alive(&self, player: &str) -> bool {
        self.alive.iter().any(|p| p == player)
    }

    /// Alive players holding `role`, in roster order.
    pub fn alive_with_role(&self, role: Role) -> Vec<String> {
        self.alive
            .iter()
            .filter(|p| self.role_of(p) == Some(role))
            .cloned()
            .collect()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_night_deaths(&self) -> &[String] {
        &self.last_night_deaths
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn into_history(self) -> Vec<HistoryEntry> {
        self.history
    }

    fn remove_alive(&mut self, name: &str) {
        self.alive.retain(|p| p != name);
    }

    fn push(&mut self, phase: Phase, event: HistoryEvent) {
        self.history.push(HistoryEntry {
            round: self.round,
            phase,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        let players: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let roles = players
            .iter()
            .map(|p| {
                let role = if p == "A" { Role::Werewolf } else { Role::Villager };
                (p.clone(), role)
            })
            .collect();
        GameState::new(players, roles)
    }

    fn speech(text: &str) -> Speech {
        Speech {
            speech: text.to_string(),
            ..Speech::default()
        }
    }

    #[test]
    fn test_phase_cycle() {
        let mut phase = Phase::ENTRY;
        let mut seen = vec![phase];
        while let Some(next) = phase.next(false) {
            if next == Phase::ENTRY {
                break;
            }
            seen.push(next);
            phase = next;
        }
        assert_eq!(
            seen,
            vec![
                Phase::NightAction,
                Phase::DayAnnounce,
                Phase::Discussion,
                Phase::Voting,
                Phase::CheckEnd
            ]
        );
        assert_eq!(Phase::CheckEnd.next(true), None);
        assert_eq!(Phase::Voting.next(true), Some(Phase::CheckEnd));
    }

    #[test]
    fn test_start_new_round_resets() {
        let mut s = state();
        s.start_new_round();
        s.record_deaths(&["B".to_string()]);
        s.set_phase(Phase::Voting);
        assert_eq!(s.last_night_deaths(), ["B".to_string()]);

        s.start_new_round();
        assert_eq!(s.round(), 2);
        assert_eq!(s.phase(), Phase::NightAction);
        assert!(s.last_night_deaths().is_empty());
    }

    #[test]
    fn test_record_deaths_twice_is_idempotent() {
        let mut s = state();
        s.start_new_round();
        s.record_deaths(&["C".to_string()]);
        s.record_deaths(&["C".to_string()]);
        assert_eq!(s.alive(), ["A", "B", "D"]);
        assert!(!s.is_alive("C"));
    }

    #[test]
    fn test_execution_removes_and_logs() {
        let mut s = state();
        s.start_new_round();
        s.record_execution("A");
        assert!(!s.is_alive("A"));
        assert!(s.alive_with_role(Role::Werewolf).is_empty());
        let last = s.history().last().unwrap();
        assert_eq!(last.event, HistoryEvent::Execution { executed: "A".into() });
        assert_eq!(last.event.label(), "execution");
        assert_eq!(s.snapshot().executions, vec!["A".to_string()]);
    }

    #[test]
    fn test_history_is_prefix_extension() {
        let mut s = state();
        s.start_new_round();
        let mut previous: Vec<HistoryEntry> = Vec::new();
        let ops: Vec<Box<dyn Fn(&mut GameState)>> = vec![
            Box::new(|s: &mut GameState| s.record_night_action("A", Some("B".into()), "quiet one")),
            Box::new(|s: &mut GameState| s.record_deaths(&["B".to_string()])),
            Box::new(|s: &mut GameState| s.record_discussion("C", speech("A is odd"))),
            Box::new(|s: &mut GameState| s.record_voting(BTreeMap::new(), VoteTally::new())),
            Box::new(|s: &mut GameState| s.record_execution("A")),
        ];
        for op in &ops {
            op(&mut s);
            let current = s.history().to_vec();
            assert_eq!(current.len(), previous.len() + 1);
            assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current;
        }
    }

    #[test]
    fn test_snapshot_discussion_window_tracks_alive_count() {
        let mut s = state();
        s.start_new_round();
        for (i, p) in ["A", "B", "C", "D", "A", "B"].iter().enumerate() {
            s.record_discussion(p, speech(&format!("line {i}")));
        }
        let snap = s.snapshot();
        assert_eq!(snap.recent_discussion.len(), 4);
        assert_eq!(snap.recent_discussion[0].speech, "line 2");
        assert_eq!(snap.recent_discussion[3].speech, "line 5");

        s.record_execution("D");
        assert_eq!(s.snapshot().recent_discussion.len(), 3);
    }

    #[test]
    fn test_snapshot_helpers() {
        let mut s = state();
        s.start_new_round();
        let snap = s.snapshot();
        assert_eq!(snap.others("A"), vec!["B", "C", "D"]);
        assert!(snap.werewolf_allies("A").is_empty());
        assert!(snap.werewolf_allies("B").is_empty());
        assert_eq!(snap.role_of("A"), Some(Role::Werewolf));
    }
}
