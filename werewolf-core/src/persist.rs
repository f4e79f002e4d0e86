//! Game transcripts on disk.
//!
//! A finished game is saved as pretty JSON next to a plain-text transcript
//! with the same stem, so `game.json` gets a `game.txt` companion.

use crate::agent::Thought;
use crate::announcer::Announcement;
use crate::flow::{EndReason, GameResult};
use crate::roles::RoleMap;
use crate::rules::Winner;
use crate::state::{HistoryEntry, HistoryEvent};
use crate::usage::UsageSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current record format version.
const RECORD_VERSION: u32 = 1;

/// A saved game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Format version for compatibility checking.
    pub version: u32,

    /// When the record was created.
    pub saved_at: DateTime<Utc>,

    pub winner: Option<Winner>,
    pub reason: String,
    pub rounds: u32,
    pub end: EndReason,
    pub roles: RoleMap,

    /// The full ordered history.
    pub history: Vec<HistoryEntry>,

    pub announcements: Vec<Announcement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSummary>,

    /// Private reasoning per player.
    #[serde(default)]
    pub thoughts: BTreeMap<String, Vec<Thought>>,
}

impl GameRecord {
    pub fn from_result(result: &GameResult) -> Self {
        Self {
            version: RECORD_VERSION,
            saved_at: Utc::now(),
            winner: result.winner,
            reason: result.reason.clone(),
            rounds: result.rounds,
            end: result.end.clone(),
            roles: result.roles.clone(),
            history: result.history.clone(),
            announcements: result.announcements.clone(),
            usage: result.usage.clone(),
            thoughts: result.thoughts.clone(),
        }
    }

    /// File name for a record saved now, e.g. `game_20240101_120000.json`.
    pub fn default_file_name(&self) -> String {
        format!("game_{}.json", self.saved_at.format("%Y%m%d_%H%M%S"))
    }

    /// Write the JSON record and its `.txt` transcript.
    ///
    /// Returns the path of the transcript.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf, PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;

        let transcript_path = path.with_extension("txt");
        fs::write(&transcript_path, self.transcript()).await?;
        Ok(transcript_path)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let record: Self = serde_json::from_str(&content)?;

        if record.version != RECORD_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: RECORD_VERSION,
                found: record.version,
            });
        }

        Ok(record)
    }

    /// Human-readable rendering of the whole record.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Werewolf game, saved {}", self.saved_at.to_rfc3339());
        let _ = writeln!(out, "Roles:");
        for (player, role) in &self.roles {
            let _ = writeln!(out, "  {player}: {role}");
        }
        out.push('\n');
        out.push_str(&format_transcript(&self.history));
        out.push('\n');
        match self.winner {
            Some(winner) => {
                let _ = writeln!(out, "Winner: {winner} ({})", self.reason);
            }
            None if self.reason.is_empty() => {
                let _ = writeln!(out, "No winner.");
            }
            None => {
                let _ = writeln!(out, "No winner ({}).", self.reason);
            }
        }
        if let EndReason::Aborted(error) = &self.end {
            let _ = writeln!(out, "Aborted: {error}");
        }
        let _ = writeln!(out, "Rounds played: {}", self.rounds);
        if let Some(usage) = &self.usage {
            let _ = writeln!(out, "Usage: {usage}");
        }
        out
    }
}

/// One line per history entry, with a header per round.
pub fn format_transcript(history: &[HistoryEntry]) -> String {
    let mut out = String::new();
    let mut current_round = None;

    for entry in history {
        if current_round != Some(entry.round) {
            current_round = Some(entry.round);
            let _ = writeln!(out, "=== Round {} ===", entry.round);
        }
        let line = match &entry.event {
            HistoryEvent::NightAction {
                player, target, ..
            } => match target {
                Some(target) => format!("[night] {player} targets {target}"),
                None => format!("[night] {player} targets nobody"),
            },
            HistoryEvent::Deaths { deaths } if deaths.is_empty() => {
                "[dawn] Peaceful night, nobody died".to_string()
            }
            HistoryEvent::Deaths { deaths } => format!("[dawn] Died: {}", deaths.join(", ")),
            HistoryEvent::Discussion { player, speech } if speech.is_silent() => {
                format!("[discussion] {player} stays silent")
            }
            HistoryEvent::Discussion { player, speech } => {
                format!("[discussion] {player}: {}", speech.speech)
            }
            HistoryEvent::Voting { votes, tally } => {
                let ballots = votes
                    .iter()
                    .map(|(voter, target)| format!("{voter} -> {target}"))
                    .collect::<Vec<_>>();
                let counts = tally
                    .iter()
                    .map(|(target, count)| format!("{target}: {count}"))
                    .collect::<Vec<_>>();
                if ballots.is_empty() {
                    "[voting] No votes cast".to_string()
                } else {
                    format!("[voting] {} ({})", ballots.join(", "), counts.join(", "))
                }
            }
            HistoryEvent::Execution { executed } => format!("[execution] {executed} is executed"),
        };
        out.push_str(&line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Speech;
    use crate::state::Phase;
    use crate::votes::VoteTally;

    fn entry(round: u32, phase: Phase, event: HistoryEvent) -> HistoryEntry {
        HistoryEntry {
            round,
            phase,
            event,
        }
    }

    fn sample_history() -> Vec<HistoryEntry> {
        vec![
            entry(
                1,
                Phase::NightAction,
                HistoryEvent::NightAction {
                    player: "Ann".into(),
                    target: None,
                    reasoning: String::new(),
                },
            ),
            entry(1, Phase::DayAnnounce, HistoryEvent::Deaths { deaths: vec![] }),
            entry(
                1,
                Phase::Discussion,
                HistoryEvent::Discussion {
                    player: "Ben".into(),
                    speech: Speech {
                        speech: "Ann is quiet".into(),
                        ..Speech::default()
                    },
                },
            ),
            entry(
                1,
                Phase::Voting,
                HistoryEvent::Voting {
                    votes: [("Ben".to_string(), "Ann".to_string())].into_iter().collect(),
                    tally: VoteTally::from_counts([("Ann", 1)]),
                },
            ),
            entry(1, Phase::Voting, HistoryEvent::Execution { executed: "Ann".into() }),
            entry(2, Phase::DayAnnounce, HistoryEvent::Deaths { deaths: vec!["Cat".into()] }),
        ]
    }

    fn sample_record() -> GameRecord {
        GameRecord {
            version: RECORD_VERSION,
            saved_at: Utc::now(),
            winner: Some(Winner::Villagers),
            reason: "all werewolves eliminated".into(),
            rounds: 2,
            end: EndReason::Decided,
            roles: [("Ann".to_string(), crate::roles::Role::Werewolf)]
                .into_iter()
                .collect(),
            history: sample_history(),
            announcements: Vec::new(),
            usage: None,
            thoughts: BTreeMap::new(),
        }
    }

    #[test]
    fn test_format_transcript() {
        let text = format_transcript(&sample_history());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "=== Round 1 ===",
                "[night] Ann targets nobody",
                "[dawn] Peaceful night, nobody died",
                "[discussion] Ben: Ann is quiet",
                "[voting] Ben -> Ann (Ann: 1)",
                "[execution] Ann is executed",
                "=== Round 2 ===",
                "[dawn] Died: Cat",
            ]
        );
    }

    #[test]
    fn test_record_transcript_footer() {
        let text = sample_record().transcript();
        assert!(text.contains("  Ann: werewolf"));
        assert!(text.contains("Winner: Villagers (all werewolves eliminated)"));
        assert!(text.ends_with("Rounds played: 2\n"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("game.json");
        let record = sample_record();

        let transcript = record.save(&path).await.unwrap();
        assert_eq!(transcript, dir.path().join("logs").join("game.txt"));
        assert!(fs::read_to_string(&transcript)
            .await
            .unwrap()
            .contains("=== Round 2 ==="));

        let loaded = GameRecord::load(&path).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let mut record = sample_record();
        record.version = 99;
        record.save(&path).await.unwrap();

        let err = GameRecord::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: 1,
                found: 99
            }
        ));
    }
}
