//! Storage configuration and path management for Tally.
//!
//! Centralizes every file path the daemon and bridge touch, so path
//! decisions live in one place and tests can inject temp roots.

use std::path::{Path, PathBuf};

/// Central configuration for all Tally storage paths.
///
/// Production code uses `StorageConfig::default()` which points to `~/.tally/`.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all Tally data (default: ~/.tally)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().expect("Could not find home directory");
        Self {
            root: home.join(".tally"),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory for Tally data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to durations.json (the durable accumulation store).
    pub fn durations_file(&self) -> PathBuf {
        self.root.join("durations.json")
    }

    /// Path to config.toml (daemon configuration).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the daemon's Unix domain socket.
    pub fn socket_file(&self) -> PathBuf {
        self.root.join("daemon.sock")
    }

    /// Directory for bridge log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_derives_all_paths() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/tally-test"));
        assert_eq!(
            config.durations_file(),
            PathBuf::from("/tmp/tally-test/durations.json")
        );
        assert_eq!(
            config.socket_file(),
            PathBuf::from("/tmp/tally-test/daemon.sock")
        );
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/tally-test/logs"));
    }
}
