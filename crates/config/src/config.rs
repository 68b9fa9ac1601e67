//! Main configuration module for DPoS Core
//!
//! This module implements the single-config philosophy where all scheduler
//! settings are defined in one `dposcore.toml` file.

use crate::error::{ConfigError, ConfigResult};
use dposcore_types::MinerPublicKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct containing all DPoS Core settings.
///
/// Loaded from a single `dposcore.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chain identity configuration
    pub chain: ChainConfig,

    /// Scheduler parameters
    pub consensus: ConsensusConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Genesis configuration (initial miners)
    pub genesis: GenesisConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use dposcore_config::Config;
    /// use std::path::Path;
    ///
    /// let config = Config::load(Path::new("dposcore.toml"))?;
    /// ```
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("Loading configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)?;

        debug!("Configuration parsed successfully, validating...");
        config.validate()?;

        info!(
            "Configuration loaded: chain_id={}, chain_name={}",
            config.chain.chain_id, config.chain.chain_name
        );

        Ok(config)
    }

    /// Load configuration from a TOML string.
    ///
    /// Useful for testing or when configuration is provided as a string.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that all values are within acceptable ranges and that the
    /// configuration is internally consistent.
    pub fn validate(&self) -> ConfigResult<()> {
        self.chain.validate()?;
        self.consensus.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.genesis.validate()?;
        Ok(())
    }
}

/// Chain identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain identifier
    pub chain_id: u64,

    /// Human-readable chain name
    pub chain_name: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 9992,
            chain_name: String::from("dposcore-devnet"),
        }
    }
}

impl ChainConfig {
    /// Validate the chain configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        if self.chain_name.is_empty() {
            return Err(ConfigError::MissingField("chain.chain_name"));
        }
        Ok(())
    }
}

/// Scheduler parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Length of one mining time slot in milliseconds
    pub mining_interval_ms: u64,

    /// Maximum filler (tiny) blocks a miner may produce inside one slot
    pub tiny_blocks_per_slot: u64,

    /// Rounds per term; a term boundary is declared when the round count
    /// inside the current term reaches this value
    pub rounds_per_term: u64,

    /// Upper bound on the elected miner set size
    pub maximum_miners_count: u32,

    /// Tolerance when checking equal slot spacing of a proposed round, in
    /// milliseconds
    #[serde(default = "default_slot_tolerance")]
    pub time_slot_tolerance_ms: u64,
}

fn default_slot_tolerance() -> u64 {
    500
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            mining_interval_ms: 4_000,
            tiny_blocks_per_slot: 8,
            rounds_per_term: 100,
            maximum_miners_count: 21,
            time_slot_tolerance_ms: default_slot_tolerance(),
        }
    }
}

impl ConsensusConfig {
    /// Validate the scheduler parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mining_interval_ms < 100 {
            return Err(ConfigError::InvalidMiningInterval(self.mining_interval_ms));
        }
        if self.time_slot_tolerance_ms >= self.mining_interval_ms {
            return Err(ConfigError::InvalidSlotTolerance {
                tolerance: self.time_slot_tolerance_ms,
                interval: self.mining_interval_ms,
            });
        }
        if self.tiny_blocks_per_slot == 0 {
            return Err(ConfigError::InvalidTinyBlockCap);
        }
        if self.rounds_per_term == 0 {
            return Err(ConfigError::InvalidTermLength);
        }
        if self.maximum_miners_count == 0 {
            return Err(ConfigError::TooFewMiners(self.maximum_miners_count));
        }
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory path
    pub data_dir: String,

    /// Cache size in megabytes
    #[serde(default = "default_cache_size")]
    pub cache_size_mb: u64,
}

fn default_cache_size() -> u64 {
    128
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::from("./data/dposcore"),
            cache_size_mb: default_cache_size(),
        }
    }
}

impl StorageConfig {
    /// Validate the storage configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.is_empty() {
            return Err(ConfigError::MissingField("storage.data_dir"));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, or error
    pub level: String,

    /// Emit JSON-formatted logs instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Validate the logging configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// Genesis configuration: the miner set the chain starts with.
///
/// After genesis the miner set is replaced wholesale at term boundaries by
/// the election collaborator's output; this section only seeds the first
/// term.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenesisConfig {
    /// Initial miner public keys, in election order
    #[serde(default)]
    pub miners: Vec<MinerPublicKey>,

    /// Chain start time as Unix milliseconds (0 = derive from first block)
    #[serde(default)]
    pub chain_start_time_ms: u64,
}

impl GenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.miners.is_empty() {
            return Err(ConfigError::MissingField("genesis.miners"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [chain]
        chain_id = 77
        chain_name = "testnet"

        [consensus]
        mining_interval_ms = 4000
        tiny_blocks_per_slot = 8
        rounds_per_term = 50
        maximum_miners_count = 17

        [storage]
        data_dir = "/tmp/dposcore-test"

        [logging]
        level = "debug"

        [genesis]
        miners = [
            "0x020000000000000000000000000000000000000000000000000000000000000001",
            "0x020000000000000000000000000000000000000000000000000000000000000002",
        ]
        chain_start_time_ms = 1700000000000
    "#;

    #[test]
    fn parse_sample_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.chain.chain_id, 77);
        assert_eq!(config.consensus.rounds_per_term, 50);
        assert_eq!(config.genesis.miners.len(), 2);
    }

    #[test]
    fn zero_chain_id_is_rejected() {
        let bad = SAMPLE.replace("chain_id = 77", "chain_id = 0");
        assert!(matches!(
            Config::from_toml_str(&bad),
            Err(ConfigError::InvalidChainId)
        ));
    }

    #[test]
    fn tolerance_must_fit_in_slot() {
        let bad = SAMPLE.replace(
            "maximum_miners_count = 17",
            "maximum_miners_count = 17\n        time_slot_tolerance_ms = 4000",
        );
        assert!(matches!(
            Config::from_toml_str(&bad),
            Err(ConfigError::InvalidSlotTolerance { .. })
        ));
    }

    #[test]
    fn empty_miner_set_is_rejected() {
        let bad = SAMPLE.replace(
            "miners = [\n            \"0x020000000000000000000000000000000000000000000000000000000000000001\",\n            \"0x020000000000000000000000000000000000000000000000000000000000000002\",\n        ]",
            "miners = []",
        );
        assert!(matches!(
            Config::from_toml_str(&bad),
            Err(ConfigError::MissingField("genesis.miners"))
        ));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.consensus.time_slot_tolerance_ms, 500);
        assert_eq!(config.storage.cache_size_mb, 128);
        assert!(!config.logging.json);
    }
}
