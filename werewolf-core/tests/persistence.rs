//! Saving and reloading finished games.

use werewolf_core::persist::GameRecord;
use werewolf_core::testing::TestHarness;
use werewolf_core::{Role, Winner};

#[tokio::test]
async fn test_finished_game_round_trips() {
    let mut harness = TestHarness::new(&["Alice", "Bob", "Charlie", "David", "Eve"], 2, 11);
    let target = harness.players_with_role(Role::Villager)[0].clone();
    harness.everyone_votes(&target).everyone_says("Trust me");
    let result = harness.run().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let record = GameRecord::from_result(&result);
    let path = dir.path().join(record.default_file_name());
    let transcript_path = record.save(&path).await.unwrap();

    let loaded = GameRecord::load(&path).await.unwrap();
    assert_eq!(loaded.winner, Some(Winner::Werewolves));
    assert_eq!(loaded.history, result.history);
    assert_eq!(loaded.roles, result.roles);
    assert_eq!(loaded.thoughts, result.thoughts);

    let transcript = tokio::fs::read_to_string(transcript_path).await.unwrap();
    assert!(transcript.contains(&format!("[execution] {target} is executed")));
    assert!(transcript.contains("Winner: Werewolves (parity or majority reached)"));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GameRecord::load(dir.path().join("nope.json")).await.unwrap_err();
    assert!(matches!(err, werewolf_core::PersistError::Io(_)));
}
