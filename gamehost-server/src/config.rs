use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use gamehost_core::RoomSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "gamehost-server")]
#[command(about = "Multi-game room server")]
#[command(long_about = "HTTP server hosting rooms for any number of registered game types.

Game types are bound to builtin engines or plugin libraries once at startup;
clients create rooms, send player updates and read game state over HTTP.")]
pub struct Cli {
    /// Path to a TOML config file; built-in defaults apply when omitted
    #[arg(long, env = "GAMEHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(long, env = "GAMEHOST_BIND")]
    pub bind: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "GAMEHOST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Read the config file if one was given, then apply CLI overrides
    pub fn load_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        config.validate()?;
        Ok(config)
    }
}

/// One `[[games]]` entry: a game type bound to its engine source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntry {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub max_simultaneous_players: u32,
    pub rng_seed: Option<u64>,
    /// Bearer tokens accepted on `/game` routes; empty allows every caller
    pub auth_tokens: Vec<String>,
    pub games: Vec<GameEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_simultaneous_players: 2,
            rng_seed: None,
            auth_tokens: Vec::new(),
            games: vec![GameEntry {
                name: "tic-tac-toe".to_string(),
                source: "builtin:tictactoe".to_string(),
            }],
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_simultaneous_players == 0 || self.max_simultaneous_players > u32::from(u8::MAX) {
            return Err(anyhow!(
                "max_simultaneous_players must be between 1 and {}",
                u8::MAX
            ));
        }

        if self.games.is_empty() {
            return Err(anyhow!("at least one [[games]] entry is required"));
        }

        let mut seen = HashSet::new();
        for game in &self.games {
            if game.name.is_empty() {
                return Err(anyhow!("game name cannot be empty"));
            }
            if game.source.is_empty() {
                return Err(anyhow!("source for game '{}' cannot be empty", game.name));
            }
            if !seen.insert(game.name.as_str()) {
                return Err(anyhow!("game '{}' is configured more than once", game.name));
            }
        }

        if self.auth_tokens.iter().any(String::is_empty) {
            return Err(anyhow!("auth_tokens cannot contain an empty token"));
        }

        Ok(())
    }

    /// Room settings derived from this config; call after `validate`
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            max_players: u8::try_from(self.max_simultaneous_players).unwrap_or(u8::MAX),
            rng_seed: self.rng_seed,
        }
    }

    /// `(game_type, source_ref)` pairs in config order
    pub fn game_sources(&self) -> impl Iterator<Item = (&str, &str)> {
        self.games.iter().map(|g| (g.name.as_str(), g.source.as_str()))
    }
}
