//! Full games with scripted players.
//!
//! These tests drive `GameFlow` through complete rounds without any model
//! calls, so they are deterministic and fast.

use async_trait::async_trait;
use werewolf_core::memory::{MemoryError, MemoryManager, MemoryMetadata, SearchHit, VectorStore};
use werewolf_core::testing::{
    assert_executed_once, assert_history_ordered, assert_survived, assert_winner, TestHarness,
};
use werewolf_core::{EndReason, HistoryEvent, Phase, Role, Winner};

const PLAYERS: [&str; 5] = ["Alice", "Bob", "Charlie", "David", "Eve"];

/// A memory backend that refuses every write.
struct DownStore;

#[async_trait]
impl VectorStore for DownStore {
    async fn add(&mut self, _text: &str, _metadata: MemoryMetadata) -> Result<(), MemoryError> {
        Err(MemoryError::Backend("down".into()))
    }

    async fn search(&self, _q: &str, _k: usize, _t: f32) -> Result<Vec<SearchHit>, MemoryError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_village_votes_out_innocent_and_loses() {
    let mut harness = TestHarness::new(&PLAYERS, 2, 11);
    let villagers = harness.players_with_role(Role::Villager);
    let target = villagers[0].clone();
    harness.everyone_votes(&target);

    let result = harness.run().await.unwrap();

    // Night 1 is peaceful, the vote removes a villager and 2 vs 2 is parity.
    assert_winner(&result, Winner::Werewolves);
    assert_eq!(result.end, EndReason::Decided);
    assert_eq!(result.rounds, 1);
    assert_executed_once(&result, &target, 1);
    assert_history_ordered(&result);
    for villager in &villagers[1..] {
        assert_survived(&result, villager);
    }
}

#[tokio::test]
async fn test_round_one_phase_order() {
    let mut harness = TestHarness::new(&PLAYERS, 2, 11);
    let target = harness.players_with_role(Role::Villager)[0].clone();
    harness.everyone_votes(&target).everyone_says("I am a simple villager");

    let result = harness.run().await.unwrap();

    let mut phases: Vec<Phase> = result.history.iter().map(|e| e.phase).collect();
    phases.dedup();
    assert_eq!(
        phases,
        vec![
            Phase::NightAction,
            Phase::DayAnnounce,
            Phase::Discussion,
            Phase::Voting
        ]
    );

    let speeches = result
        .history
        .iter()
        .filter(|e| matches!(e.event, HistoryEvent::Discussion { .. }))
        .count();
    assert_eq!(speeches, PLAYERS.len());
}

#[tokio::test]
async fn test_single_kill_without_votes_reaches_round_limit() {
    let mut harness = TestHarness::new(&PLAYERS, 1, 4);
    let villagers = harness.players_with_role(Role::Villager);
    harness.werewolves_kill(&villagers[0]);

    let result = harness.run().await.unwrap();

    // Nobody votes, so the werewolf kills the same target once and then
    // keeps naming a dead player: every later night is peaceful.
    assert_eq!(result.end, EndReason::RoundLimit);
    assert_eq!(result.winner, None);
    assert_eq!(result.survivors.len(), PLAYERS.len() - 1);
    assert!(!result.survivors.contains(&villagers[0]));
}

#[tokio::test]
async fn test_announcements_cover_every_phase() {
    let mut harness = TestHarness::new(&PLAYERS, 2, 11);
    let target = harness.players_with_role(Role::Villager)[0].clone();
    harness.everyone_votes(&target);

    let result = harness.run().await.unwrap();
    let texts: Vec<&str> = result.announcements.iter().map(|a| a.text.as_str()).collect();

    assert!(texts[0].starts_with("Night 1 falls"));
    assert!(texts.iter().any(|t| t.contains("peaceful night")));
    assert!(texts
        .iter()
        .any(|t| t.contains(&format!("{target} is executed"))));
    assert!(texts
        .last()
        .is_some_and(|t| t.starts_with("Game over! The Werewolves win")));
}

#[tokio::test]
async fn test_invalid_werewolf_count_is_rejected() {
    let harness = TestHarness::new(&PLAYERS, 5, 1);
    assert!(harness.flow().is_err());
}

#[tokio::test]
async fn test_memory_failure_aborts_with_partial_history() {
    let mut harness = TestHarness::new(&PLAYERS, 1, 4);
    let victim = harness.players_with_role(Role::Villager)[0].clone();
    harness.werewolves_kill(&victim);

    let mut flow = harness.flow_with_memory(MemoryManager::new(DownStore)).unwrap();
    let result = flow.run().await;

    // The first write is the dawn death, so the game stops right there.
    match &result.end {
        EndReason::Aborted(error) => assert!(error.contains("down"), "{error}"),
        other => panic!("expected an abort, got {other:?}"),
    }
    assert_eq!(result.winner, None);
    assert!(result.reason.is_empty());
    assert_eq!(result.rounds, 1);
    assert_eq!(result.history.len(), 2);
    assert!(matches!(result.history[0].event, HistoryEvent::NightAction { .. }));
    assert!(matches!(
        &result.history[1].event,
        HistoryEvent::Deaths { deaths } if deaths == &vec![victim.clone()]
    ));
    assert!(flow.memory().unwrap().is_empty());

    // A finished game does not restart.
    assert_eq!(flow.run().await, result);
}
