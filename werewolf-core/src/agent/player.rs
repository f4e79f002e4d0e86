//! Language-model players.

use super::parse::{parse_ballot, parse_night_action, parse_speech};
use super::prompts;
use super::{Agent, AgentError, Ballot, Generation, GenerationError, Generator, NightDecision, Speech, Thought};
use crate::roles::{Personality, Role};
use crate::state::StateSnapshot;
use crate::usage::{CallRecord, UsageLedger};
use async_trait::async_trait;
use claude::{Claude, Prompt};
use std::time::Instant;
use tracing::{debug, warn};

/// How many private memories are shown to the model each turn.
pub const MEMORY_SUMMARY_LEN: usize = 10;

/// [`Generator`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Claude,
    max_tokens: usize,
    temperature: Option<f32>,
    ledger: Option<UsageLedger>,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            max_tokens: 1024,
            temperature: Some(0.8),
            ledger: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Record every call in `ledger`.
    pub fn with_ledger(mut self, ledger: UsageLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }
}

#[async_trait]
impl Generator for ClaudeGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Generation, GenerationError> {
        let prompt = Prompt {
            system: system.to_string(),
            user: user.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let started = Instant::now();
        let reply = self.client.send(&prompt).await?;
        debug!(id = %reply.id, output_tokens = reply.usage.output_tokens, "model replied");
        if reply.truncated() {
            warn!(max_tokens = self.max_tokens, "reply cut off at the token limit");
        }

        if let Some(ledger) = &self.ledger {
            ledger.record(CallRecord::new(
                reply.model.clone(),
                reply.usage.input_tokens as u64,
                reply.usage.output_tokens as u64,
                started.elapsed(),
            ));
        }

        Ok(Generation {
            text: reply.text,
            usage: Some(reply.usage),
        })
    }
}

/// A private memory line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Note {
    round: u32,
    content: String,
}

/// An [`Agent`] that plays by prompting a language model.
pub struct LlmAgent<G> {
    name: String,
    role: Role,
    personality: Personality,
    system_prompt: String,
    generator: G,
    memory: Vec<Note>,
    thoughts: Vec<Thought>,
}

impl<G: Generator> LlmAgent<G> {
    pub fn new(name: impl Into<String>, role: Role, personality: Personality, generator: G) -> Self {
        let name = name.into();
        let system_prompt = prompts::system_prompt(&name, role, personality);
        Self {
            name,
            role,
            personality,
            system_prompt,
            generator,
            memory: Vec::new(),
            thoughts: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// The latest [`MEMORY_SUMMARY_LEN`] memories as a numbered list.
    pub fn memory_summary(&self) -> String {
        if self.memory.is_empty() {
            return "You have no memories yet.".to_string();
        }
        let start = self.memory.len().saturating_sub(MEMORY_SUMMARY_LEN);
        let mut summary = String::from("Your memory:\n");
        for (i, note) in self.memory[start..].iter().enumerate() {
            summary.push_str(&format!("{}. [Round {}] {}\n", i + 1, note.round, note.content));
        }
        summary
    }

    fn remember(&mut self, round: u32, content: impl Into<String>) {
        self.memory.push(Note {
            round,
            content: content.into(),
        });
    }

    fn think(&mut self, view: &StateSnapshot, action: String, reasoning: &str) {
        self.thoughts.push(Thought {
            round: view.round,
            phase: view.phase,
            action,
            reasoning: reasoning.to_string(),
        });
    }

    async fn ask(&self, user: &str) -> Result<String, AgentError> {
        let generation = self.generator.generate(&self.system_prompt, user).await?;
        debug!(player = %self.name, chars = generation.text.len(), "model replied");
        Ok(generation.text)
    }
}

#[async_trait]
impl<G: Generator> Agent for LlmAgent<G> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn night_action(&mut self, view: &StateSnapshot) -> Result<NightDecision, AgentError> {
        if self.role != Role::Werewolf {
            return Ok(NightDecision::default());
        }

        let reply = self.ask(&prompts::night_prompt(view, &self.name)).await?;
        let decision = parse_night_action(&reply);
        let action = match &decision.target {
            Some(target) => format!("kill {target}"),
            None => "kill nobody".to_string(),
        };
        self.think(view, action, &decision.reasoning);
        Ok(decision)
    }

    async fn discuss(
        &mut self,
        view: &StateSnapshot,
        evidence: Option<&str>,
    ) -> Result<Speech, AgentError> {
        let prompt = format!(
            "{}\n{}",
            self.memory_summary(),
            prompts::discussion_prompt(view, self.role, evidence)
        );
        let reply = self.ask(&prompt).await?;
        let speech = parse_speech(&reply);

        if speech.is_silent() {
            self.think(view, "stay silent".to_string(), &speech.reasoning);
        } else {
            self.remember(view.round, format!("I said: {}", speech.speech));
            self.think(view, "speak".to_string(), &speech.reasoning);
        }
        Ok(speech)
    }

    async fn vote(&mut self, view: &StateSnapshot) -> Result<Ballot, AgentError> {
        let prompt = format!(
            "{}\n{}",
            self.memory_summary(),
            prompts::voting_prompt(view, self.role)
        );
        let reply = self.ask(&prompt).await?;
        let ballot = parse_ballot(&reply);
        let action = match &ballot.vote {
            Some(target) => format!("vote {target}"),
            None => "abstain".to_string(),
        };
        self.think(view, action, &ballot.reasoning);
        Ok(ballot)
    }

    fn observe(&mut self, round: u32, event: &str) {
        self.remember(round, event);
    }

    fn thoughts(&self) -> Vec<Thought> {
        self.thoughts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleMap;
    use crate::state::Phase;
    use crate::testing::ScriptedGenerator;

    fn view(phase: Phase) -> StateSnapshot {
        let roles: RoleMap = [("Ann", Role::Werewolf), ("Ben", Role::Villager), ("Cat", Role::Villager)]
            .into_iter()
            .map(|(n, r)| (n.to_string(), r))
            .collect();
        StateSnapshot {
            round: 1,
            phase,
            alive: roles.keys().cloned().collect(),
            roles,
            last_night_deaths: Vec::new(),
            recent_discussion: Vec::new(),
            executions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_villager_sleeps_without_calling_model() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let mut agent = LlmAgent::new("Ben", Role::Villager, Personality::Analytical, generator.clone());
        let decision = agent.night_action(&view(Phase::NightAction)).await.unwrap();
        assert_eq!(decision, NightDecision::default());
        assert_eq!(generator.calls(), 0);
        assert!(agent.thoughts().is_empty());
    }

    #[tokio::test]
    async fn test_werewolf_night_action_parses_target() {
        let generator = ScriptedGenerator::new([r#"{"target": "Ben", "reasoning": "too sharp"}"#]);
        let mut agent = LlmAgent::new("Ann", Role::Werewolf, Personality::Aggressive, generator);
        let decision = agent.night_action(&view(Phase::NightAction)).await.unwrap();
        assert_eq!(decision.target.as_deref(), Some("Ben"));
        let thoughts = agent.thoughts();
        assert_eq!(thoughts.len(), 1);
        assert_eq!(thoughts[0].action, "kill Ben");
        assert_eq!(thoughts[0].phase, Phase::NightAction);
    }

    #[tokio::test]
    async fn test_speech_is_remembered() {
        let generator = ScriptedGenerator::new([
            r#"{"speech": "Cat is hiding something", "suspicion": "Cat", "reasoning": "gut"}"#,
        ]);
        let mut agent = LlmAgent::new("Ben", Role::Villager, Personality::Observant, generator);
        let speech = agent.discuss(&view(Phase::Discussion), None).await.unwrap();
        assert_eq!(speech.suspicion.as_deref(), Some("Cat"));
        assert_eq!(agent.memory_len(), 1);
        assert!(agent.memory_summary().contains("I said: Cat is hiding something"));
    }

    #[tokio::test]
    async fn test_free_form_vote_abstains() {
        let generator = ScriptedGenerator::new(["I honestly cannot decide."]);
        let mut agent = LlmAgent::new("Cat", Role::Villager, Personality::Cautious, generator);
        let ballot = agent.vote(&view(Phase::Voting)).await.unwrap();
        assert_eq!(ballot.vote, None);
        assert_eq!(ballot.reasoning, "I honestly cannot decide.");
        assert_eq!(agent.thoughts()[0].action, "abstain");
    }

    #[tokio::test]
    async fn test_generation_error_propagates() {
        let generator = ScriptedGenerator::failing("rate limited");
        let mut agent = LlmAgent::new("Cat", Role::Villager, Personality::Cautious, generator);
        let err = agent.vote(&view(Phase::Voting)).await.unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));
    }

    #[test]
    fn test_memory_summary_keeps_latest() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let mut agent = LlmAgent::new("Ben", Role::Villager, Personality::Analytical, generator);
        assert_eq!(agent.memory_summary(), "You have no memories yet.");
        for i in 0..15 {
            agent.observe(1, &format!("event {i}"));
        }
        let summary = agent.memory_summary();
        assert!(summary.starts_with("Your memory:\n1. [Round 1] event 5\n"));
        assert!(summary.contains("10. [Round 1] event 14"));
        assert!(!summary.contains("event 4\n"));
    }
}
