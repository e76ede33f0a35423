//! Daemon configuration loaded from `~/.tally/config.toml`.
//!
//! A missing file yields defaults (nothing monitored, default store path).
//! A file that exists but does not parse is a startup error: silently
//! monitoring the wrong guilds would be worse than refusing to start.

use std::path::PathBuf;

use serde::Deserialize;
use tally_core::{GuildId, StorageConfig};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Guild ids whose presence transitions are tracked. Events for any
    /// other guild are dropped before the state machine.
    #[serde(default)]
    pub monitored_guilds: Vec<u64>,

    /// Override for the durations file; defaults to `<root>/durations.json`.
    #[serde(default)]
    pub durations_file: Option<PathBuf>,
}

impl TallyConfig {
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.monitored_guilds.iter().copied().map(GuildId).collect()
    }

    pub fn durations_path(&self, storage: &StorageConfig) -> PathBuf {
        self.durations_file
            .clone()
            .unwrap_or_else(|| storage.durations_file())
    }
}

pub fn load_config(path: Option<PathBuf>, storage: &StorageConfig) -> Result<TallyConfig, String> {
    let config_path = match path {
        Some(path) => path,
        None => storage.config_file(),
    };

    if !config_path.exists() {
        return Ok(TallyConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<TallyConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            err
        )
    })
}
