//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Invalid chain ID (must be non-zero)
    #[error("Invalid chain ID: chain_id must be non-zero")]
    InvalidChainId,

    /// Mining interval too short
    #[error("Invalid mining interval: must be at least 100ms, got {0}ms")]
    InvalidMiningInterval(u64),

    /// Slot tolerance must leave room inside the slot
    #[error("Invalid slot tolerance: {tolerance}ms must be below the mining interval {interval}ms")]
    InvalidSlotTolerance {
        /// Configured tolerance
        tolerance: u64,
        /// Configured mining interval
        interval: u64,
    },

    /// Tiny block cap cannot be zero
    #[error("Invalid tiny block cap: tiny_blocks_per_slot must be at least 1")]
    InvalidTinyBlockCap,

    /// Term length cannot be zero
    #[error("Invalid term length: rounds_per_term must be at least 1")]
    InvalidTermLength,

    /// Too few miners configured
    #[error("Too few miners: maximum_miners_count must be at least 1, got {0}")]
    TooFewMiners(u32),

    /// A required field is missing or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid logging level
    #[error("Invalid log level: {0} (expected trace, debug, info, warn, or error)")]
    InvalidLogLevel(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
