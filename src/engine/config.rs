//! Engine settings loaded from TOML at runtime.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::error::ConfigError;

/// Timings and limits for client sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// How long a roll with no legal move stays on screen before the turn passes.
    pub skip_delay_ms: u64,
    /// Delay before the only legal move is played automatically.
    pub auto_move_delay_ms: u64,
    pub auto_move: bool,
    /// Retry budget for joins and restarts.
    pub join_attempts: u32,
    pub cheat_passphrase: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            skip_delay_ms: 1500,
            auto_move_delay_ms: 800,
            auto_move: true,
            join_attempts: 8,
            cheat_passphrase: "BJ".into(),
        }
    }
}

impl SessionSettings {
    pub fn skip_delay(&self) -> Duration {
        Duration::from_millis(self.skip_delay_ms)
    }

    pub fn auto_move_delay(&self) -> Duration {
        Duration::from_millis(self.auto_move_delay_ms)
    }

    /// Passphrase check is trimmed and case-insensitive.
    pub fn unlocks_cheat(&self, attempt: &str) -> bool {
        attempt.trim().eq_ignore_ascii_case(self.cheat_passphrase.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub write_latency_ms: u64,
}

impl StoreSettings {
    pub fn write_latency(&self) -> Duration {
        Duration::from_millis(self.write_latency_ms)
    }
}

/// Top-level TOML file structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub session: SessionSettings,
    pub store: StoreSettings,
}

impl EngineConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.session.join_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "session.join_attempts",
                message: "must be at least 1".into(),
            });
        }
        if self.session.cheat_passphrase.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "session.cheat_passphrase",
                message: "must not be blank".into(),
            });
        }
        Ok(self)
    }
}

/// Load settings from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()
}

/// Try well-known paths, falling back to built-in defaults.
pub fn load_default_config() -> EngineConfig {
    let candidates = ["ludo.toml", "../ludo.toml", "/etc/ludo/ludo.toml"];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), "loaded engine config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load engine config");
                }
            }
        }
    }
    tracing::info!("no ludo.toml found, using built-in defaults");
    EngineConfig::default()
}
