//! The round loop.
//!
//! [`GameFlow`] owns the state, the agents and the memory for one game and
//! walks the phase cycle until the win check decides the game or the round
//! limit is hit. Agent failures never stop the loop: a failed or timed-out
//! call counts as an abstention (no target, silence, no vote). Anything
//! else that fails mid-round ends the run early, but the caller still gets
//! the history recorded so far.

use crate::agent::{Agent, AgentError, Ballot, NightDecision, Speech, Thought};
use crate::announcer::{Announcement, Announcer};
use crate::config::GameConfig;
use crate::memory::{FlatIndex, HashingEmbedder, MemoryEvent, MemoryManager};
use crate::rag::RetrievalEngine;
use crate::roles::{assign_roles, Personality, Player, Role, RoleMap};
use crate::rules::{check_win_condition, Verdict, Winner};
use crate::state::{DiscussionLine, GameState, HistoryEntry, Phase, StateSnapshot};
use crate::usage::{UsageLedger, UsageSummary};
use crate::votes::{resolve_night_kill, resolve_votes};
use crate::GameError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reason reported when the round limit ends the game.
pub const REASON_ROUND_LIMIT: &str = "inconclusive: round limit reached";

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum EndReason {
    /// The win check picked a side.
    Decided,
    /// `max_rounds` were played without a winner.
    RoundLimit,
    /// A non-agent failure stopped the run.
    Aborted(String),
}

/// Everything a finished (or aborted) game leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Option<Winner>,
    /// Empty when the run aborted before a decision.
    pub reason: String,
    pub rounds: u32,
    pub end: EndReason,
    pub roles: RoleMap,
    pub survivors: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub announcements: Vec<Announcement>,
    pub usage: Option<UsageSummary>,
    pub thoughts: BTreeMap<String, Vec<Thought>>,
}

impl GameResult {
    pub fn is_decided(&self) -> bool {
        self.end == EndReason::Decided
    }
}

/// Orchestrates one game.
pub struct GameFlow {
    config: GameConfig,
    state: GameState,
    agents: BTreeMap<String, Box<dyn Agent>>,
    memory: Option<MemoryManager>,
    retrieval: RetrievalEngine,
    announcer: Announcer,
    usage: Option<UsageLedger>,
    rng: StdRng,
    pending_kill: Option<String>,
    verdict: Option<Verdict>,
    end: Option<EndReason>,
}

impl GameFlow {
    /// Validate `config`, assign roles and build one agent per player.
    ///
    /// Role assignment is the first use of the seeded random source, so
    /// `assign_roles` with a `StdRng` of the same seed predicts the roles.
    /// When memory is enabled an offline [`HashingEmbedder`] index is used
    /// until [`GameFlow::with_memory`] replaces it.
    pub fn new<F>(config: GameConfig, mut make_agent: F) -> Result<Self, GameError>
    where
        F: FnMut(&Player, Personality) -> Box<dyn Agent>,
    {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let roles = assign_roles(&config.players, config.werewolves, &mut rng)?;

        let mut agents = BTreeMap::new();
        for (index, name) in config.players.iter().enumerate() {
            let role = roles.get(name).copied().unwrap_or(Role::Villager);
            let player = Player {
                name: name.clone(),
                role,
            };
            let agent = make_agent(&player, Personality::for_player(role, index));
            if agent.name() != name {
                return Err(GameError::InvalidConfiguration(format!(
                    "agent for {name} reports the name {}",
                    agent.name()
                )));
            }
            agents.insert(name.clone(), agent);
        }

        let memory = config.use_memory.then(|| {
            configured_threshold(
                MemoryManager::new(FlatIndex::new(HashingEmbedder::default())),
                config.similarity_threshold,
            )
        });

        Ok(Self {
            state: GameState::new(config.players.clone(), roles),
            retrieval: RetrievalEngine::new(config.rag_top_k),
            config,
            agents,
            memory,
            announcer: Announcer::new(),
            usage: None,
            rng,
            pending_kill: None,
            verdict: None,
            end: None,
        })
    }

    /// Use `memory` instead of the default index. Ignored when memory is
    /// disabled in the config.
    pub fn with_memory(mut self, memory: MemoryManager) -> Self {
        if self.config.use_memory {
            self.memory = Some(configured_threshold(memory, self.config.similarity_threshold));
        } else {
            debug!("memory disabled, ignoring supplied memory manager");
        }
        self
    }

    /// Report this ledger's summary in the result.
    pub fn with_usage(mut self, ledger: UsageLedger) -> Self {
        self.usage = Some(ledger);
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn roles(&self) -> &RoleMap {
        self.state.roles()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn memory(&self) -> Option<&MemoryManager> {
        self.memory.as_ref()
    }

    pub fn announcements(&self) -> &[Announcement] {
        self.announcer.log()
    }

    /// Play the game to the end.
    ///
    /// Calling this again after the game ended returns the same result.
    pub async fn run(&mut self) -> GameResult {
        if let Some(end) = self.end.clone() {
            return self.result(end);
        }

        info!(
            players = self.config.players.len(),
            werewolves = self.config.werewolves,
            max_rounds = self.config.max_rounds,
            "game starting"
        );

        let end = match self.play().await {
            Ok(end) => end,
            Err(e) => {
                error!(round = self.state.round(), error = %e, "game aborted");
                EndReason::Aborted(e.to_string())
            }
        };
        self.end = Some(end.clone());
        self.result(end)
    }

    async fn play(&mut self) -> Result<EndReason, GameError> {
        while self.state.round() < self.config.max_rounds {
            self.state.start_new_round();
            info!(round = self.state.round(), "round started");

            let mut phase = Some(Phase::ENTRY);
            while let Some(current) = phase {
                self.state.set_phase(current);
                let game_over = self.run_phase(current).await?;
                phase = current.next(game_over).filter(|next| *next != Phase::ENTRY);
            }

            if self.verdict.is_some() {
                return Ok(EndReason::Decided);
            }
        }

        let round = self.state.round();
        let text = self.announcer.round_limit(round);
        self.broadcast(round, &text);
        info!(rounds = round, "round limit reached without a winner");
        Ok(EndReason::RoundLimit)
    }

    /// Run one phase; `true` means the game is over.
    async fn run_phase(&mut self, phase: Phase) -> Result<bool, GameError> {
        match phase {
            Phase::NightAction => self.night().await.map(|_| false),
            Phase::DayAnnounce => self.dawn().await.map(|_| false),
            Phase::Discussion => self.discussion().await.map(|_| false),
            Phase::Voting => self.voting().await.map(|_| false),
            Phase::CheckEnd => Ok(self.check_end()),
        }
    }

    async fn night(&mut self) -> Result<(), GameError> {
        let round = self.state.round();
        let text = self.announcer.night(round);
        self.broadcast(round, &text);

        let view = self.state.snapshot();
        let timeout = self.config.agent_timeout();
        let mut decisions = Vec::new();
        for name in self.state.alive_with_role(Role::Werewolf) {
            let Some(agent) = self.agents.get_mut(&name) else {
                continue;
            };
            let decision = match guarded(timeout, agent.night_action(&view)).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(player = %name, error = %e, "night action failed, abstaining");
                    NightDecision::default()
                }
            };
            debug!(player = %name, target = ?decision.target, "night action");
            decisions.push((name, decision));
        }

        for (name, decision) in &decisions {
            self.state
                .record_night_action(name, decision.target.clone(), decision.reasoning.clone());
        }
        let resolution = resolve_night_kill(
            decisions.iter().map(|(_, d)| d.target.as_deref()),
            self.state.alive(),
            &mut self.rng,
        );
        debug!(victim = ?resolution.chosen, "night resolved");
        self.pending_kill = resolution.chosen;
        Ok(())
    }

    async fn dawn(&mut self) -> Result<(), GameError> {
        let round = self.state.round();
        let deaths: Vec<String> = self.pending_kill.take().into_iter().collect();
        self.state.record_deaths(&deaths);

        let text = self.announcer.day(round, &deaths);
        info!(round, "{text}");
        self.broadcast(round, &text);

        if let Some(memory) = self.memory.as_mut() {
            for victim in &deaths {
                memory.add_episodic(MemoryEvent::death(round, victim)).await?;
            }
        }
        Ok(())
    }

    async fn discussion(&mut self) -> Result<(), GameError> {
        let round = self.state.round();
        let order = self.state.alive().to_vec();
        let text = self.announcer.discussion(round, &order);
        self.broadcast(round, &text);

        let timeout = self.config.agent_timeout();
        let retrieve = self.config.retrieval_enabled();
        let top_k = self.config.rag_top_k;
        let mut spoken: Vec<(String, Speech)> = Vec::new();

        for name in &order {
            let evidence = match (&self.memory, retrieve) {
                (Some(memory), true) => {
                    let query = RetrievalEngine::discussion_query(round);
                    Some(
                        self.retrieval
                            .retrieve_relevant_speeches(memory, &query, name, round, top_k)
                            .await?,
                    )
                }
                _ => None,
            };

            let view = self.discussion_view(&spoken);
            let Some(agent) = self.agents.get_mut(name) else {
                continue;
            };
            let speech = match guarded(timeout, agent.discuss(&view, evidence.as_deref())).await {
                Ok(speech) => speech,
                Err(e) => {
                    warn!(player = %name, error = %e, "discussion failed, staying silent");
                    Speech::default()
                }
            };
            info!(player = %name, "{}", speech.speech);
            spoken.push((name.clone(), speech));
        }

        for (name, speech) in &spoken {
            self.state.record_discussion(name, speech.clone());
        }
        if let Some(memory) = self.memory.as_mut() {
            for (name, speech) in spoken.iter().filter(|(_, s)| !s.is_silent()) {
                memory
                    .add_episodic(MemoryEvent::speech(round, name, speech.speech.clone()))
                    .await?;
            }
        }
        Ok(())
    }

    /// The committed snapshot plus speeches given earlier in this phase.
    fn discussion_view(&self, spoken: &[(String, Speech)]) -> StateSnapshot {
        let mut view = self.state.snapshot();
        let round = view.round;
        view.recent_discussion
            .extend(spoken.iter().map(|(player, speech)| DiscussionLine {
                round,
                player: player.clone(),
                speech: speech.speech.clone(),
            }));
        let excess = view.recent_discussion.len().saturating_sub(view.alive.len());
        view.recent_discussion.drain(..excess);
        view
    }

    async fn voting(&mut self) -> Result<(), GameError> {
        let round = self.state.round();
        let voters = self.state.alive().to_vec();
        let text = self.announcer.voting(round, &voters);
        self.broadcast(round, &text);

        let view = self.state.snapshot();
        let timeout = self.config.agent_timeout();
        let mut ballots = BTreeMap::new();
        for name in &voters {
            let Some(agent) = self.agents.get_mut(name) else {
                continue;
            };
            let ballot = match guarded(timeout, agent.vote(&view)).await {
                Ok(ballot) => ballot,
                Err(e) => {
                    warn!(player = %name, error = %e, "vote failed, abstaining");
                    Ballot::default()
                }
            };
            debug!(player = %name, vote = ?ballot.vote, "vote cast");
            if let Some(target) = ballot.vote {
                ballots.insert(name.clone(), target);
            }
        }

        let resolution = resolve_votes(&ballots, self.state.alive(), &mut self.rng);
        let valid: Vec<(String, String)> = ballots
            .iter()
            .filter(|(voter, target)| self.state.is_alive(voter) && self.state.is_alive(target))
            .map(|(voter, target)| (voter.clone(), target.clone()))
            .collect();

        self.state.record_voting(ballots, resolution.tally.clone());
        if let Some(executed) = &resolution.chosen {
            self.state.record_execution(executed);
        }

        let text = self
            .announcer
            .voting_result(round, &resolution.tally, resolution.chosen.as_deref());
        info!(round, "{text}");
        self.broadcast(round, &text);

        if let Some(memory) = self.memory.as_mut() {
            for (voter, target) in valid {
                memory.add_episodic(MemoryEvent::vote(round, voter, target)).await?;
            }
            if let Some(executed) = &resolution.chosen {
                memory
                    .add_episodic(MemoryEvent::execution(round, executed))
                    .await?;
            }
        }
        Ok(())
    }

    fn check_end(&mut self) -> bool {
        let Some(verdict) = check_win_condition(self.state.alive(), self.state.roles()) else {
            debug!(alive = self.state.alive().len(), "no winner yet");
            return false;
        };

        let round = self.state.round();
        let text = self.announcer.game_end(round, verdict.winner, &verdict.reason);
        info!(round, winner = %verdict.winner, reason = %verdict.reason, "game decided");
        self.broadcast(round, &text);
        self.verdict = Some(verdict);
        true
    }

    fn broadcast(&mut self, round: u32, text: &str) {
        for agent in self.agents.values_mut() {
            agent.observe(round, text);
        }
    }

    fn result(&self, end: EndReason) -> GameResult {
        let (winner, reason) = match (&self.verdict, &end) {
            (Some(verdict), _) => (Some(verdict.winner), verdict.reason.clone()),
            (None, EndReason::RoundLimit) => (None, REASON_ROUND_LIMIT.to_string()),
            (None, _) => (None, String::new()),
        };

        GameResult {
            winner,
            reason,
            rounds: self.state.round(),
            end,
            roles: self.state.roles().clone(),
            survivors: self.state.alive().to_vec(),
            history: self.state.history().to_vec(),
            announcements: self.announcer.log().to_vec(),
            usage: self.usage.as_ref().map(UsageLedger::summary),
            thoughts: self
                .agents
                .iter()
                .map(|(name, agent)| (name.clone(), agent.thoughts()))
                .filter(|(_, thoughts)| !thoughts.is_empty())
                .collect(),
        }
    }
}

/// Await an agent call, mapping an elapsed timeout to [`AgentError::Timeout`].
async fn guarded<T, F>(timeout: Option<Duration>, call: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(AgentError::Timeout(limit))),
        None => call.await,
    }
}

fn configured_threshold(memory: MemoryManager, threshold: Option<f32>) -> MemoryManager {
    match threshold {
        Some(threshold) => memory.with_threshold(threshold),
        None => memory,
    }
}
