//! Server configuration files.
//!
//! Each server reads one JSON file at startup and never again. Missing
//! optional fields take the defaults below; anything that would leave the
//! server unable to do its job is rejected by `validate`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parlor_protocol::RuleSet;
use parlor_session::Account;
use serde::Deserialize;

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_read_timeout() -> u64 {
    30
}

fn default_identify_timeout() -> u64 {
    10
}

fn default_server_timeout() -> u64 {
    5
}

fn default_owner_join_timeout() -> u64 {
    300
}

fn positive(name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be positive")));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// One game server the lobby may place rooms on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameServerEntry {
    pub name: String,
    /// Where players and the lobby reach it.
    pub addr: SocketAddr,
}

/// Configuration of the lobby server.
///
/// ```json
/// {
///   "bind": "0.0.0.0:4000",
///   "game_servers": [{ "name": "east", "addr": "10.0.0.2:4100" }],
///   "accounts": [{ "username": "ann", "password": "pw" }]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LobbyConfig {
    pub bind: SocketAddr,
    pub game_servers: Vec<GameServerEntry>,
    /// How long a client may stay silent before its read times out.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// How long a new socket has to send its connection type.
    #[serde(default = "default_identify_timeout")]
    pub identify_timeout_secs: u64,
    /// Bound on each inter-server exchange (probe, open room).
    #[serde(default = "default_server_timeout")]
    pub server_timeout_secs: u64,
    /// The rules every new room starts from.
    #[serde(default)]
    pub default_rules: RuleSet,
    /// Seed accounts for the in-memory user store.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl LobbyConfig {
    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_servers.is_empty() {
            return Err(ConfigError::Invalid("no game servers configured".into()));
        }
        positive("read_timeout_secs", self.read_timeout_secs)?;
        positive("identify_timeout_secs", self.identify_timeout_secs)?;
        positive("server_timeout_secs", self.server_timeout_secs)?;
        self.default_rules
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("default_rules: {e}")))?;

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate account {}",
                    account.username
                )));
            }
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn identify_timeout(&self) -> Duration {
        Duration::from_secs(self.identify_timeout_secs)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Game server
// ---------------------------------------------------------------------------

/// Configuration of a game server.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub bind: SocketAddr,
    /// Where room status reports go. The lobby relies on them to forget
    /// rooms that have started or closed.
    pub lobby: SocketAddr,
    /// How long a new room waits for its owner.
    #[serde(default = "default_owner_join_timeout")]
    pub owner_join_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_identify_timeout")]
    pub identify_timeout_secs: u64,
    /// Bound on connecting to the lobby.
    #[serde(default = "default_server_timeout")]
    pub server_timeout_secs: u64,
}

impl GameConfig {
    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("owner_join_timeout_secs", self.owner_join_timeout_secs)?;
        positive("read_timeout_secs", self.read_timeout_secs)?;
        positive("identify_timeout_secs", self.identify_timeout_secs)?;
        positive("server_timeout_secs", self.server_timeout_secs)
    }

    pub fn owner_join_timeout(&self) -> Duration {
        Duration::from_secs(self.owner_join_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn identify_timeout(&self) -> Duration {
        Duration::from_secs(self.identify_timeout_secs)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }
}
