//! Configuration management for crawlterm.
//!
//! Settings are read from `~/.crawlterm/config.toml`. Every section is
//! optional and every key falls back to its default, so a partial file works:
//!
//! ```toml
//! [game]
//! binary = "/opt/crawl/bin/crawl"
//! working_dir = "/opt/crawl/bin"
//! character_name = "Bot"
//!
//! [timing]
//! read_timeout_ms = 100
//! long_running_timeout_ms = 5000
//!
//! [log]
//! level = "debug"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub terminal: TerminalConfig,
    pub timing: TimingConfig,
    pub log: LogConfig,
}

/// How to launch the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Game executable
    pub binary: PathBuf,
    /// Directory the game runs in; saves land under `<working_dir>/saves`
    pub working_dir: Option<PathBuf>,
    pub rc_file: PathBuf,
    pub character_name: String,
    pub species: String,
    pub background: String,
    /// Answer to the starting weapon menu
    pub weapon_key: String,
    /// `TERM` handed to the game
    pub term: String,
    pub extra_args: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("crawl"),
            working_dir: None,
            rc_file: PathBuf::from("./crawlrc"),
            character_name: "Bot".to_string(),
            species: "Minotaur".to_string(),
            background: "Berserker".to_string(),
            weapon_key: "c".to_string(),
            term: "xterm".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Emulated screen size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Read loop timing and episode limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait for a single output chunk
    pub poll_interval_ms: u64,
    /// Give up on a frame after this long
    pub read_timeout_ms: u64,
    /// Frame timeout for long-running actions
    pub long_running_timeout_ms: u64,
    /// Hard ceiling on one frame, even while output keeps arriving
    pub frame_limit_ms: u64,
    /// Frames read while waiting for the dungeon before giving up
    pub start_attempts: u32,
    /// Steps without in-game time passing before the episode is abandoned
    pub stuck_step_limit: u32,
    /// Keys whose effect can take seconds to draw (explore, rest)
    pub long_running_actions: String,
    pub quit_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            read_timeout_ms: 100,
            long_running_timeout_ms: 5000,
            frame_limit_ms: 30_000,
            start_attempts: 30,
            stuck_step_limit: 1000,
            long_running_actions: "o5".to_string(),
            quit_grace_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn long_running_timeout(&self) -> Duration {
        Duration::from_millis(self.long_running_timeout_ms)
    }

    pub fn frame_limit(&self) -> Duration {
        Duration::from_millis(self.frame_limit_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }

    /// Whether `action` is one of the long-running keys
    pub fn is_long_running(&self, action: &[u8]) -> bool {
        match std::str::from_utf8(action) {
            Ok(keys) => !keys.is_empty() && self.long_running_actions.contains(keys),
            Err(_) => false,
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `crawlterm::game=debug`
    pub level: String,
    /// Log file; `~/.crawlterm/crawlterm.log` when unset
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    /// Resolved log file location
    pub fn path(&self) -> PathBuf {
        self.file
            .clone()
            .or_else(|| config_dir().map(|dir| dir.join("crawlterm.log")))
            .unwrap_or_else(|| PathBuf::from("crawlterm.log"))
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when it is missing or broken
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(config) = Self::load_from(&path) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Load configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get config file path
    pub fn get_config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }
}

fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".crawlterm"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.terminal.rows, 24);
        assert_eq!(config.terminal.cols, 80);
        assert_eq!(config.game.weapon_key, "c");
        assert_eq!(config.timing.stuck_step_limit, 1000);
        assert_eq!(config.timing.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[game]\ncharacter_name = \"Tester\"\n\n[timing]\nread_timeout_ms = 250\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.game.character_name, "Tester");
        assert_eq!(config.game.species, "Minotaur");
        assert_eq!(config.timing.read_timeout_ms, 250);
        assert_eq!(config.timing.poll_interval_ms, 10);
        assert_eq!(config.terminal, TerminalConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.game.working_dir = Some(PathBuf::from("/opt/crawl"));
        config.game.extra_args = vec!["-seed".to_string(), "42".to_string()];
        config.log.file = Some(dir.path().join("run.log"));
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load_from(&missing), Err(ConfigError::Read { .. })));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[timing]\nread_timeout_ms = \"soon\"\n").unwrap();
        assert!(matches!(Config::load_from(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_long_running_actions() {
        let timing = TimingConfig::default();
        assert!(timing.is_long_running(b"o"));
        assert!(timing.is_long_running(b"5"));
        assert!(!timing.is_long_running(b"x"));
        assert!(!timing.is_long_running(b""));
    }

    #[test]
    fn test_log_path_override() {
        let log = LogConfig {
            file: Some(PathBuf::from("/tmp/run.log")),
            ..Default::default()
        };
        assert_eq!(log.path(), PathBuf::from("/tmp/run.log"));
    }
}
