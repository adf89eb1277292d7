use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use thiserror::Error;

pub const CONFIG_ENV: &str = "GLOBCHESS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "globchess.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub lock: LockConfig,
    pub fairness: FairnessConfig,
    pub evaluator: EvaluatorConfig,
    pub tokens: TokensConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub duration_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { duration_ms: 60_000 }
    }
}

/// Moves by others a user must wait for before locking again; 0 disables the gate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FairnessConfig {
    pub min_moves_between_turns: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            url: "https://chess-api.com/v1".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    pub credit_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Attempts per request when a transaction conflicts
    pub max_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

impl Config {
    /// Load from `$GLOBCHESS_CONFIG`, else `./globchess.toml`, else defaults; then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = explicit.or_else(|| {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        });

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_env(&mut self) {
        if let Ok(bind) = env::var("GLOBCHESS_BIND") {
            self.server.bind = bind;
        }
        if let Ok(url) = env::var("GLOBCHESS_EVALUATOR_URL") {
            self.evaluator.url = url;
        }
        if let Ok(secret) = env::var("GLOBCHESS_CREDIT_SECRET") {
            self.tokens.credit_secret = Some(secret);
        }
        if self.transport.max_attempts == 0 {
            warn!("transport.max_attempts must be at least 1; using 1");
            self.transport.max_attempts = 1;
        }
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock.duration_ms)
    }

    pub fn evaluator_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluator.timeout_ms)
    }

    /// `None` when the fairness gate is disabled
    pub fn min_moves_between_turns(&self) -> Option<u32> {
        match self.fairness.min_moves_between_turns {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_game_rules() {
        let config = Config::default();
        assert_eq!(config.lock_duration(), Duration::from_secs(60));
        assert_eq!(config.min_moves_between_turns(), None);
        assert_eq!(config.transport.max_attempts, 1);
        assert!(config.tokens.credit_secret.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [lock]
            duration_ms = 30000

            [fairness]
            min_moves_between_turns = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.lock_duration(), Duration::from_secs(30));
        assert_eq!(config.min_moves_between_turns(), Some(5));
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.evaluator.timeout_ms, 5_000);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::from_toml("[lock]\nduration_ms = \"soon\"").is_err());
    }
}
