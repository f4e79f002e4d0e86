//! Testing utilities for the Werewolf engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedAgent` for deterministic players without model calls
//! - `ScriptedGenerator` for exercising `LlmAgent` with canned replies
//! - `TestHarness` for scripted game scenarios
//! - Assertion helpers for verifying game results

use crate::agent::{
    Agent, AgentError, Ballot, Generation, GenerationError, Generator, NightDecision, Speech,
    Thought,
};
use crate::config::GameConfig;
use crate::flow::{GameFlow, GameResult};
use crate::memory::MemoryManager;
use crate::roles::{assign_roles, Role, RoleMap};
use crate::rules::Winner;
use crate::state::{HistoryEvent, StateSnapshot};
use crate::GameError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A player with fixed behaviour.
///
/// By default it abstains everywhere and says nothing.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    /// Night target (used only if the agent is a werewolf).
    kill: Option<String>,
    /// Day vote target.
    vote: Option<String>,
    /// What the agent says during discussion.
    speech: Option<String>,
    /// Every call fails with a generation error.
    fail: bool,
    /// Sleep before answering.
    delay: Option<Duration>,
    /// Public events received.
    observed: Vec<String>,
    thoughts: Vec<Thought>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kill: None,
            vote: None,
            speech: None,
            fail: false,
            delay: None,
            observed: Vec::new(),
            thoughts: Vec::new(),
        }
    }

    /// Target `player` every night.
    pub fn with_kill(mut self, player: impl Into<String>) -> Self {
        self.kill = Some(player.into());
        self
    }

    /// Vote for `player` every day.
    pub fn with_vote(mut self, player: impl Into<String>) -> Self {
        self.vote = Some(player.into());
        self
    }

    /// Say `text` every discussion.
    pub fn with_speech(mut self, text: impl Into<String>) -> Self {
        self.speech = Some(text.into());
        self
    }

    /// Fail every call.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Wait `delay` before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Events passed to [`Agent::observe`].
    pub fn observed(&self) -> &[String] {
        &self.observed
    }

    async fn act(&mut self, view: &StateSnapshot, action: String) -> Result<(), AgentError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GenerationError("scripted failure".into()).into());
        }
        self.thoughts.push(Thought {
            round: view.round,
            phase: view.phase,
            action,
            reasoning: "scripted".to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn night_action(&mut self, view: &StateSnapshot) -> Result<NightDecision, AgentError> {
        let target = self.kill.clone();
        self.act(view, format!("kill {}", target.as_deref().unwrap_or("nobody")))
            .await?;
        Ok(NightDecision {
            target,
            reasoning: "scripted".to_string(),
        })
    }

    async fn discuss(
        &mut self,
        view: &StateSnapshot,
        _evidence: Option<&str>,
    ) -> Result<Speech, AgentError> {
        self.act(view, "speak".to_string()).await?;
        Ok(Speech {
            speech: self.speech.clone().unwrap_or_default(),
            suspicion: self.vote.clone(),
            reasoning: "scripted".to_string(),
        })
    }

    async fn vote(&mut self, view: &StateSnapshot) -> Result<Ballot, AgentError> {
        let vote = self.vote.clone();
        self.act(view, format!("vote {}", vote.as_deref().unwrap_or("nobody")))
            .await?;
        Ok(Ballot {
            vote,
            reasoning: "scripted".to_string(),
        })
    }

    fn observe(&mut self, _round: u32, event: &str) {
        self.observed.push(event.to_string());
    }

    fn thoughts(&self) -> Vec<Thought> {
        self.thoughts.clone()
    }
}

#[derive(Debug, Default)]
struct GeneratorScript {
    replies: VecDeque<String>,
    prompts: Vec<String>,
    failure: Option<String>,
}

/// A [`Generator`] that returns canned replies in order.
///
/// Clones share the same script, so a test can keep a handle and inspect
/// the prompts after handing a clone to an agent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<GeneratorScript>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = GeneratorScript {
            replies: replies.into_iter().map(Into::into).collect(),
            ..GeneratorScript::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// A generator whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let script = GeneratorScript {
            failure: Some(message.into()),
            ..GeneratorScript::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn queue(&self, reply: impl Into<String>) {
        self.lock().replies.push_back(reply.into());
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.lock().prompts.len()
    }

    /// User prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GeneratorScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _system: &str, user: &str) -> Result<Generation, GenerationError> {
        let mut script = self.lock();
        script.prompts.push(user.to_string());
        if let Some(message) = &script.failure {
            return Err(GenerationError(message.clone()));
        }
        script
            .replies
            .pop_front()
            .map(Generation::text)
            .ok_or_else(|| GenerationError("no more scripted replies".into()))
    }
}

/// Test harness for running scripted games.
///
/// Every player is a [`ScriptedAgent`] sharing the same script.
pub struct TestHarness {
    /// The game configuration. Always seeded.
    pub config: GameConfig,
    /// Night target for every werewolf.
    kill: Option<String>,
    /// Vote target for every player.
    vote: Option<String>,
    /// Speech for every player.
    speech: Option<String>,
}

impl TestHarness {
    /// Create a harness for `players` with `werewolves` werewolves and a
    /// fixed seed.
    pub fn new(players: &[&str], werewolves: usize, seed: u64) -> Self {
        Self {
            config: GameConfig::new(players.iter().copied())
                .with_werewolves(werewolves)
                .with_seed(seed),
            kill: None,
            vote: None,
            speech: None,
        }
    }

    pub fn max_rounds(&mut self, rounds: u32) -> &mut Self {
        self.config.max_rounds = rounds;
        self
    }

    /// Every werewolf targets `player` at night.
    pub fn werewolves_kill(&mut self, player: &str) -> &mut Self {
        self.kill = Some(player.to_string());
        self
    }

    /// Every player votes for `player`.
    pub fn everyone_votes(&mut self, player: &str) -> &mut Self {
        self.vote = Some(player.to_string());
        self
    }

    /// Every player says `text` during discussion.
    pub fn everyone_says(&mut self, text: &str) -> &mut Self {
        self.speech = Some(text.to_string());
        self
    }

    /// The roles the flow will assign, from the same seed.
    pub fn predicted_roles(&self) -> RoleMap {
        let mut rng = StdRng::seed_from_u64(self.config.seed.unwrap_or_default());
        assign_roles(&self.config.players, self.config.werewolves, &mut rng).unwrap_or_default()
    }

    /// Players predicted to hold `role`, in roster order.
    pub fn players_with_role(&self, role: Role) -> Vec<String> {
        let roles = self.predicted_roles();
        self.config
            .players
            .iter()
            .filter(|p| roles.get(p.as_str()) == Some(&role))
            .cloned()
            .collect()
    }

    /// Build the flow with scripted agents.
    pub fn flow(&self) -> Result<GameFlow, GameError> {
        GameFlow::new(self.config.clone(), |player, _| {
            let mut agent = ScriptedAgent::new(&player.name);
            if let (Role::Werewolf, Some(target)) = (player.role, &self.kill) {
                agent = agent.with_kill(target);
            }
            if let Some(target) = &self.vote {
                agent = agent.with_vote(target);
            }
            if let Some(text) = &self.speech {
                agent = agent.with_speech(text);
            }
            Box::new(agent)
        })
    }

    /// Build the flow with `memory` instead of the default index.
    pub fn flow_with_memory(&self, memory: MemoryManager) -> Result<GameFlow, GameError> {
        Ok(self.flow()?.with_memory(memory))
    }

    /// Build and run the game.
    pub async fn run(&self) -> Result<GameResult, GameError> {
        let mut flow = self.flow()?;
        Ok(flow.run().await)
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Rounds in which `player` was executed.
pub fn executions_of(result: &GameResult, player: &str) -> Vec<u32> {
    result
        .history
        .iter()
        .filter(|e| matches!(&e.event, HistoryEvent::Execution { executed } if executed == player))
        .map(|e| e.round)
        .collect()
}

/// Assert `player` was executed exactly once, in `round`.
#[track_caller]
pub fn assert_executed_once(result: &GameResult, player: &str, round: u32) {
    let rounds = executions_of(result, player);
    assert_eq!(
        rounds,
        vec![round],
        "Expected exactly one execution of '{player}' in round {round}, got {rounds:?}"
    );
}

/// Assert the game was decided for `winner`.
#[track_caller]
pub fn assert_winner(result: &GameResult, winner: Winner) {
    assert_eq!(
        result.winner,
        Some(winner),
        "Expected {winner} to win, got {:?} ({})",
        result.winner,
        result.reason
    );
}

/// Assert `player` is still alive at the end.
#[track_caller]
pub fn assert_survived(result: &GameResult, player: &str) {
    assert!(
        result.survivors.iter().any(|p| p == player),
        "Expected '{player}' to survive, survivors: {:?}",
        result.survivors
    );
}

/// Assert history rounds never go backwards.
#[track_caller]
pub fn assert_history_ordered(result: &GameResult) {
    for pair in result.history.windows(2) {
        assert!(
            pair[0].round <= pair[1].round,
            "History out of order: round {} after round {}",
            pair[1].round,
            pair[0].round
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generator_replays_in_order() {
        let generator = ScriptedGenerator::new(["one", "two"]);
        let handle = generator.clone();
        assert_eq!(generator.generate("s", "a").await.unwrap().text, "one");
        assert_eq!(generator.generate("s", "b").await.unwrap().text, "two");
        assert!(generator.generate("s", "c").await.is_err());
        assert_eq!(handle.calls(), 3);
        assert_eq!(handle.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_harness_predicts_roles() {
        let harness = TestHarness::new(&["A", "B", "C", "D", "E"], 2, 3);
        let flow = harness.flow().unwrap();
        assert_eq!(flow.roles(), &harness.predicted_roles());
        assert_eq!(harness.players_with_role(Role::Werewolf).len(), 2);
    }

    #[tokio::test]
    async fn test_harness_villagers_win_by_voting_out_wolf() {
        let mut harness = TestHarness::new(&["A", "B", "C", "D", "E", "F"], 1, 8);
        let wolf = harness.players_with_role(Role::Werewolf)[0].clone();
        harness.everyone_votes(&wolf).everyone_says("I have a hunch");

        let result = harness.run().await.unwrap();
        assert_winner(&result, Winner::Villagers);
        assert_executed_once(&result, &wolf, 1);
        assert_history_ordered(&result);
    }

    #[tokio::test]
    async fn test_night_kill_removes_target() {
        let mut harness = TestHarness::new(&["A", "B", "C", "D", "E", "F", "G"], 1, 21);
        let villagers = harness.players_with_role(Role::Villager);
        harness.max_rounds(1).werewolves_kill(&villagers[0]);

        let result = harness.run().await.unwrap();
        assert!(!result.survivors.contains(&villagers[0]));
        assert_survived(&result, &villagers[1]);
    }
}
