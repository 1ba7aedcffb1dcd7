//! Configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use std::path::{Path, PathBuf};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Proxy configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub shards: Vec<Shard>,

    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub key_ranges: Vec<KeyRangeConfig>,

    #[serde(default)]
    pub local_tables: Vec<String>,
}

impl Config {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Config, Error> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&data)?;

        info!(
            "loaded config: {} shard(s), {} rule(s), {} key range(s) [{}]",
            config.shards.len(),
            config.rules.len(),
            config.key_ranges.len(),
            path.display(),
        );

        Ok(config)
    }

    pub fn data_shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards
            .iter()
            .filter(|shard| shard.role == ShardRole::Data)
    }

    pub fn world_shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards
            .iter()
            .filter(|shard| shard.role == ShardRole::World)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct General {
    #[serde(default = "General::default_host")]
    pub host: String,

    #[serde(default = "General::default_port")]
    pub port: u16,

    /// Fall back to a world shard when routing matches nothing.
    #[serde(default)]
    pub world_shard_fallback: bool,

    /// Tokio worker threads; 0 means current-thread runtime.
    #[serde(default)]
    pub workers: usize,

    /// Key-range store snapshot path. In-memory store when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl General {
    fn default_host() -> String {
        "0.0.0.0".into()
    }

    fn default_port() -> u16 {
        6432
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            world_shard_fallback: false,
            workers: 0,
            store_path: None,
        }
    }
}

/// Backend shard role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShardRole {
    #[default]
    Data,
    World,
}

/// Backend shard endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shard {
    pub name: String,
    pub host: String,

    #[serde(default = "Shard::default_port")]
    pub port: u16,

    #[serde(default = "Shard::default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "Shard::default_database")]
    pub database: String,

    #[serde(default)]
    pub role: ShardRole,
}

impl Shard {
    fn default_port() -> u16 {
        5432
    }

    fn default_user() -> String {
        "postgres".into()
    }

    fn default_database() -> String {
        "postgres".into()
    }
}

/// Sharding rule: the column the sharding key lives in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub columns: Vec<String>,
}

/// Key range seeded from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRangeConfig {
    pub id: String,

    #[serde(default)]
    pub lower: String,

    #[serde(default)]
    pub upper: String,

    pub shard: String,
}
