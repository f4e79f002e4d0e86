//! Moderator announcements.

use crate::rules::Winner;
use crate::votes::VoteTally;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    NightStart,
    DayStart,
    DiscussionStart,
    VotingStart,
    VotingResult,
    GameEnd,
}

/// A public statement made by the moderator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub round: u32,
    pub kind: AnnouncementKind,
    pub text: String,
}

/// Produces announcements and keeps them in order.
#[derive(Debug, Clone, Default)]
pub struct Announcer {
    log: Vec<Announcement>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn night(&mut self, round: u32) -> String {
        self.push(
            round,
            AnnouncementKind::NightStart,
            format!("Night {round} falls. Everyone close your eyes."),
        )
    }

    /// Dawn. An empty `deaths` is announced as a peaceful night.
    pub fn day(&mut self, round: u32, deaths: &[String]) -> String {
        let text = if deaths.is_empty() {
            "Day breaks. It was a peaceful night: nobody died.".to_string()
        } else {
            format!("Day breaks. Killed during the night: {}.", deaths.join(", "))
        };
        self.push(round, AnnouncementKind::DayStart, text)
    }

    pub fn discussion(&mut self, round: u32, order: &[String]) -> String {
        self.push(
            round,
            AnnouncementKind::DiscussionStart,
            format!(
                "Round {round} discussion begins. Speaking order: {}.",
                order.join(", ")
            ),
        )
    }

    pub fn voting(&mut self, round: u32, voters: &[String]) -> String {
        self.push(
            round,
            AnnouncementKind::VotingStart,
            format!("Voting begins. Every living player votes: {}.", voters.join(", ")),
        )
    }

    pub fn voting_result(&mut self, round: u32, tally: &VoteTally, executed: Option<&str>) -> String {
        let counts = if tally.is_empty() {
            "no valid votes".to_string()
        } else {
            tally
                .iter()
                .map(|(name, count)| format!("{name}: {count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let outcome = match executed {
            Some(name) => format!("{name} is executed."),
            None => "Nobody is executed.".to_string(),
        };
        self.push(
            round,
            AnnouncementKind::VotingResult,
            format!("Vote result: {counts}. {outcome}"),
        )
    }

    pub fn game_end(&mut self, round: u32, winner: Winner, reason: &str) -> String {
        self.push(
            round,
            AnnouncementKind::GameEnd,
            format!("Game over! The {winner} win: {reason}."),
        )
    }

    pub fn round_limit(&mut self, round: u32) -> String {
        self.push(
            round,
            AnnouncementKind::GameEnd,
            format!("Game over after {round} rounds with no winner."),
        )
    }

    pub fn log(&self) -> &[Announcement] {
        &self.log
    }

    pub fn into_log(self) -> Vec<Announcement> {
        self.log
    }

    fn push(&mut self, round: u32, kind: AnnouncementKind, text: String) -> String {
        self.log.push(Announcement {
            round,
            kind,
            text: text.clone(),
        });
        text
    }
}
