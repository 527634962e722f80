use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration loaded from `~/.taiga/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub lessons: LessonsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load config from `~/.taiga/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taiga")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

/// Action router knobs: process timeouts and bead-filing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Timeout for `run_command` invocations, seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Timeout for build and test invocations, seconds.
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,
    /// Timeout for linter invocations, seconds.
    #[serde(default = "default_linter_timeout_secs")]
    pub linter_timeout_secs: u64,
    /// File beads as P0 by default (incident mode).
    #[serde(default)]
    pub default_p0: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            build_timeout_secs: default_build_timeout_secs(),
            linter_timeout_secs: default_linter_timeout_secs(),
            default_p0: false,
        }
    }
}

impl RouterConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn linter_timeout(&self) -> Duration {
        Duration::from_secs(self.linter_timeout_secs)
    }
}

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_build_timeout_secs() -> u64 {
    120
}

fn default_linter_timeout_secs() -> u64 {
    60
}

/// Shared-context store knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Bounded activity ring per bead; oldest entries drop beyond this.
    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,
    /// Per-subscriber event buffer; a subscriber lagging past this loses
    /// events rather than stalling writers.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// SSE comment keepalive period, seconds.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            activity_capacity: default_activity_capacity(),
            subscriber_buffer: default_subscriber_buffer(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

fn default_activity_capacity() -> usize {
    256
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_keepalive_secs() -> u64 {
    30
}

/// Lessons-file knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonsConfig {
    /// Read-back byte cap; longer files are truncated with a marker.
    #[serde(default = "default_lessons_max_read_bytes")]
    pub max_read_bytes: usize,
}

impl Default for LessonsConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: default_lessons_max_read_bytes(),
        }
    }
}

fn default_lessons_max_read_bytes() -> usize {
    16 * 1024
}

/// Daemon bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:7420".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
