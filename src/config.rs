//! Configuration management for SealChain

use crate::amount::{parse_amount, Amount};
use crate::blockchain::chain::check_parameters;
use crate::blockchain::DEFAULT_DIFFICULTY;
use crate::error::ChainError;
use crate::logging::LogFormat;
use crate::mempool::DEFAULT_MAX_PENDING;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_mining_reward", deserialize_with = "deserialize_amount")]
    pub mining_reward: Amount,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            max_pending: default_max_pending(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        check_parameters(self.difficulty, self.mining_reward).map_err(ChainError::InvalidConfig)?;
        if self.max_pending == 0 {
            return Err(ChainError::InvalidConfig(
                "ledger.max_pending must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            backend: StorageBackend::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let config: Config = match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        self.ledger.validate()?;
        if self.storage.path.as_os_str().is_empty() {
            return Err(ChainError::InvalidConfig(
                "storage.path must be set".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config, ChainError> {
    Config::load(Path::new(DEFAULT_CONFIG_FILE))
}

/// Accepts `"0.5"`, `1` or `0.5`; strings parse exactly.
fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    match RawAmount::deserialize(deserializer)? {
        RawAmount::Text(text) => parse_amount(&text).map_err(D::Error::custom),
        RawAmount::Integer(n) => Amount::checked_from_num(n)
            .ok_or_else(|| D::Error::custom(format!("amount {} out of range", n))),
        RawAmount::Float(f) => Amount::checked_from_num(f)
            .ok_or_else(|| D::Error::custom(format!("amount {} out of range", f))),
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_mining_reward() -> Amount {
    Amount::from_num(1)
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

fn default_storage_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".sealchain"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("ledger.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ledger.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.ledger.mining_reward, Amount::from_num(1));
        assert_eq!(config.ledger.max_pending, DEFAULT_MAX_PENDING);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[ledger]\ndifficulty = 3\nmining_reward = \"0.5\"\n\n[storage]\npath = \"chain.db\"\nbackend = \"sqlite\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.ledger.difficulty, 3);
        assert_eq!(config.ledger.mining_reward, Amount::from_num(0.5));
        assert_eq!(config.ledger.max_pending, DEFAULT_MAX_PENDING);
        assert_eq!(config.storage.path, PathBuf::from("chain.db"));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Human);
    }

    #[test]
    fn test_numeric_reward_accepted() {
        let config: Config = toml::from_str("[ledger]\nmining_reward = 2").unwrap();
        assert_eq!(config.ledger.mining_reward, Amount::from_num(2));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let too_hard: Config = toml::from_str("[ledger]\ndifficulty = 65").unwrap();
        assert!(matches!(too_hard.validate(), Err(ChainError::InvalidConfig(_))));

        let negative: Config = toml::from_str("[ledger]\nmining_reward = \"-1\"").unwrap();
        assert!(negative.validate().is_err());

        let no_room: Config = toml::from_str("[ledger]\nmax_pending = 0").unwrap();
        assert!(no_room.validate().is_err());

        let no_path: Config = toml::from_str("[storage]\npath = \"\"").unwrap();
        assert!(no_path.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger\ndifficulty = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ChainError::InvalidConfig(_))
        ));
    }
}
