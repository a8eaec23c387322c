use std::collections::BTreeMap;

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;

pub use catalog::{Catalog, CatalogError};

pub type Codename = String;
pub type PlayerName = String;

pub const MISSIONS_PER_AGENT: usize = 5;
pub const MAX_NAME_LEN: usize = 40;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl MissionStatus {
    /// pending -> completed -> failed -> pending
    pub fn next(self) -> Self {
        match self {
            MissionStatus::Pending => MissionStatus::Completed,
            MissionStatus::Completed => MissionStatus::Failed,
            MissionStatus::Failed => MissionStatus::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Pending => "pending",
            MissionStatus::Completed => "completed",
            MissionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mission {
    pub text: String,
    pub status: MissionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub player: Option<PlayerName>,
    #[serde(default)]
    pub joined_at: Option<u64>,
    pub missions: Vec<Mission>,
}

/// The single round record shared by every request. `agents` is the roster
/// with its assignments, `players` the reverse player -> codename index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Round {
    pub active: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub agents: BTreeMap<Codename, Agent>,
    #[serde(default)]
    pub players: BTreeMap<PlayerName, Codename>,
}

impl Round {
    pub fn is_idle(&self) -> bool {
        *self == Round::default()
    }

    pub fn free_agents(&self) -> usize {
        self.agents.values().filter(|a| a.player.is_none()).count()
    }

    /// Verifies the invariants a round must hold. Used on state loaded from
    /// disk, which may have been edited by hand.
    pub fn check(&self) -> Result<(), StateError> {
        if !self.active {
            if !self.is_idle() {
                return Err(StateError::InactiveNotEmpty);
            }
            return Ok(());
        }
        if self.id.is_none() {
            return Err(StateError::MissingRoundId);
        }

        for (codename, agent) in &self.agents {
            if agent.missions.len() != MISSIONS_PER_AGENT {
                return Err(StateError::WrongMissionCount {
                    agent: codename.clone(),
                    count: agent.missions.len(),
                });
            }
            if let Some(player) = &agent.player {
                if self.players.get(player) != Some(codename) {
                    return Err(StateError::UnindexedClaim {
                        agent: codename.clone(),
                    });
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (player, codename) in &self.players {
            if !seen.insert(player.to_lowercase()) {
                return Err(StateError::DuplicatePlayer {
                    player: player.clone(),
                });
            }
            let claimed_by = self
                .agents
                .get(codename)
                .and_then(|a| a.player.as_ref());
            if claimed_by != Some(player) {
                return Err(StateError::DanglingRegistration {
                    player: player.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("inactive round still carries agents or registrations")]
    InactiveNotEmpty,
    #[error("agent {agent} has {count} missions")]
    WrongMissionCount { agent: Codename, count: usize },
    #[error("agent {agent} is claimed but missing from the registrations")]
    UnindexedClaim { agent: Codename },
    #[error("registration for {player} does not match any claimed agent")]
    DanglingRegistration { player: PlayerName },
    #[error("active round has no id")]
    MissingRoundId,
    #[error("player {player} is registered twice")]
    DuplicatePlayer { player: PlayerName },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("name required")]
    BlankName,
    #[error("name longer than 40 characters")]
    NameTooLong,
    #[error("no round in progress")]
    NoActiveRound,
    #[error("a round is already in progress")]
    RoundAlreadyActive,
    #[error("unknown agent")]
    UnknownAgent,
    #[error("agent not found")]
    AgentNotFound,
    #[error("mission not found")]
    MissionNotFound,
    #[error("all agents are taken")]
    NoCapacity,
    #[error("name already registered")]
    DuplicateName,
}

/// Coarse grouping of [`GameError`] used by callers that only care how to
/// surface the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidAgent,
    NoCapacity,
    DuplicateName,
    NotFound,
    Conflict,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::BlankName | GameError::NameTooLong => ErrorKind::Validation,
            GameError::NoActiveRound | GameError::UnknownAgent => ErrorKind::InvalidAgent,
            GameError::AgentNotFound | GameError::MissionNotFound => ErrorKind::NotFound,
            GameError::NoCapacity => ErrorKind::NoCapacity,
            GameError::DuplicateName => ErrorKind::DuplicateName,
            GameError::RoundAlreadyActive => ErrorKind::Conflict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Identity {
    Admin,
    Agent { agent: Codename },
}

#[derive(Debug, Clone, Default)]
pub struct RoundOptions {
    pub id: String,
    pub started_at: u64,
    /// Number of codenames drawn from the catalog; `None` uses all of them.
    pub roster_size: Option<usize>,
}

pub fn start_round<R: Rng + ?Sized>(
    round: &mut Round,
    catalog: &Catalog,
    options: RoundOptions,
    rng: &mut R,
) -> Result<Vec<Codename>, GameError> {
    if round.active {
        return Err(GameError::RoundAlreadyActive);
    }

    let all = catalog.codenames();
    let roster: Vec<&String> = match options.roster_size {
        Some(n) if n < all.len() => all.choose_multiple(rng, n).collect(),
        _ => all.iter().collect(),
    };

    let mut agents = BTreeMap::new();
    for codename in roster {
        // Drawn with replacement: the same prompt may appear twice for one agent.
        let missions = (0..MISSIONS_PER_AGENT)
            .filter_map(|_| catalog.missions().choose(rng))
            .map(|text| Mission {
                text: text.clone(),
                status: MissionStatus::Pending,
            })
            .collect();
        agents.insert(
            codename.clone(),
            Agent {
                player: None,
                joined_at: None,
                missions,
            },
        );
    }

    *round = Round {
        active: true,
        id: Some(options.id),
        started_at: Some(options.started_at),
        agents,
        players: BTreeMap::new(),
    };

    Ok(round.agents.keys().cloned().collect())
}

pub fn end_round(round: &mut Round) {
    *round = Round::default();
}

/// Binds a random free codename to `name` and returns it. Nothing changes
/// when an error is returned.
pub fn register<R: Rng + ?Sized>(
    round: &mut Round,
    name: &str,
    now: u64,
    rng: &mut R,
) -> Result<Codename, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::BlankName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::NameTooLong);
    }
    if !round.active {
        return Err(GameError::NoActiveRound);
    }

    let lowered = name.to_lowercase();
    if round.players.keys().any(|p| p.to_lowercase() == lowered) {
        return Err(GameError::DuplicateName);
    }

    let codename = round
        .agents
        .iter()
        .filter(|(_, agent)| agent.player.is_none())
        .map(|(codename, _)| codename.clone())
        .choose(rng)
        .ok_or(GameError::NoCapacity)?;

    // Join stamps are strictly increasing, even within one clock tick.
    let joined_at = round
        .agents
        .values()
        .filter_map(|a| a.joined_at)
        .max()
        .map_or(now, |last| now.max(last + 1));

    let agent = round
        .agents
        .get_mut(&codename)
        .ok_or(GameError::AgentNotFound)?;
    agent.player = Some(name.to_string());
    agent.joined_at = Some(joined_at);
    round.players.insert(name.to_string(), codename.clone());

    Ok(codename)
}

/// Case-insensitive match against the administrator identifier.
pub fn is_admin(admin_agent: &str, input: &str) -> bool {
    let admin_agent = admin_agent.trim();
    !admin_agent.is_empty() && admin_agent.to_lowercase() == input.trim().to_lowercase()
}

/// Maps free-text login input to an identity. The admin identifier is
/// checked first and resolves even when no round is running.
pub fn resolve_login(round: &Round, admin_agent: &str, input: &str) -> Result<Identity, GameError> {
    let input = input.trim();
    if is_admin(admin_agent, input) {
        return Ok(Identity::Admin);
    }
    if !round.active {
        return Err(GameError::NoActiveRound);
    }

    let lowered = input.to_lowercase();
    round
        .agents
        .keys()
        .find(|codename| codename.to_lowercase() == lowered)
        .map(|codename| Identity::Agent {
            agent: codename.clone(),
        })
        .ok_or(GameError::UnknownAgent)
}

/// Advances one mission through the status cycle. `codename` must be the
/// canonical key as returned by [`resolve_login`].
pub fn toggle_mission(
    round: &mut Round,
    codename: &str,
    index: usize,
) -> Result<MissionStatus, GameError> {
    if !round.active {
        return Err(GameError::NoActiveRound);
    }
    let agent = round
        .agents
        .get_mut(codename)
        .ok_or(GameError::AgentNotFound)?;
    let mission = agent
        .missions
        .get_mut(index)
        .ok_or(GameError::MissionNotFound)?;

    mission.status = mission.status.next();
    Ok(mission.status)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentView {
    pub agent: Codename,
    pub player: Option<PlayerName>,
    pub joined_at: Option<u64>,
    pub missions: Vec<Mission>,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl AgentView {
    fn new(codename: &str, agent: &Agent) -> Self {
        let count = |status: MissionStatus| agent.missions.iter().filter(|m| m.status == status).count();
        Self {
            agent: codename.to_string(),
            player: agent.player.clone(),
            joined_at: agent.joined_at,
            missions: agent.missions.clone(),
            completed: count(MissionStatus::Completed),
            failed: count(MissionStatus::Failed),
            pending: count(MissionStatus::Pending),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoundView {
    pub active: bool,
    pub id: Option<String>,
    pub started_at: Option<u64>,
    pub roster_size: usize,
    pub free_agents: usize,
    pub agents: Vec<AgentView>,
}

/// Admin projection: claimed agents only, in registration order.
pub fn view_round(round: &Round) -> RoundView {
    if !round.active {
        return RoundView::default();
    }

    let mut agents: Vec<AgentView> = round
        .agents
        .iter()
        .filter(|(_, agent)| agent.player.is_some())
        .map(|(codename, agent)| AgentView::new(codename, agent))
        .collect();
    agents.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.agent.cmp(&b.agent)));

    RoundView {
        active: true,
        id: round.id.clone(),
        started_at: round.started_at,
        roster_size: round.agents.len(),
        free_agents: round.free_agents(),
        agents,
    }
}

/// One agent's mission sheet, as shown on the player's own page.
pub fn agent_sheet(round: &Round, codename: &str) -> Result<AgentView, GameError> {
    if !round.active {
        return Err(GameError::NoActiveRound);
    }
    round
        .agents
        .get(codename)
        .map(|agent| AgentView::new(codename, agent))
        .ok_or(GameError::AgentNotFound)
}
