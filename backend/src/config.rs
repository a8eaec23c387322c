use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use missions_core::Catalog;

use crate::GameSettings;

pub const DEFAULT_ADMIN_AGENT: &str = "itadmin";

#[derive(Parser, Debug, Clone)]
#[command(name = "side-missions", version, about = "Side Missions party game server", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// JSON file holding the current round
    #[arg(long, env = "STATE_FILE", default_value = "game_state.json")]
    pub state_file: PathBuf,

    /// Codename that logs in as the administrator (case-insensitive)
    #[arg(long, env = "ADMIN_AGENT", default_value = DEFAULT_ADMIN_AGENT)]
    pub admin_agent: String,

    /// Codenames drawn per round; defaults to the whole catalog
    #[arg(long, env = "ROSTER_SIZE")]
    pub roster_size: Option<usize>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("admin agent must not be blank")]
    BlankAdminAgent,
    #[error("admin agent {0:?} collides with a catalog codename")]
    AdminShadowsCodename(String),
    #[error("roster size must be at least 1")]
    EmptyRoster,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn settings(&self, catalog: Catalog) -> Result<GameSettings, ConfigError> {
        let admin_agent = self.admin_agent.trim();
        if admin_agent.is_empty() {
            return Err(ConfigError::BlankAdminAgent);
        }
        if catalog.contains_codename(admin_agent) {
            return Err(ConfigError::AdminShadowsCodename(admin_agent.to_string()));
        }
        if self.roster_size == Some(0) {
            return Err(ConfigError::EmptyRoster);
        }

        Ok(GameSettings {
            catalog,
            admin_agent: admin_agent.to_string(),
            roster_size: self.roster_size,
        })
    }
}
