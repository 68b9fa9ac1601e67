//! # DPoS Core Configuration
//!
//! This crate provides configuration parsing for the DPoS Core scheduler.
//!
//! DPoS Core uses a single-config philosophy where all scheduler settings are
//! defined in one `dposcore.toml` file, making deployment and configuration
//! management straightforward.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dposcore_config::Config;
//! use std::path::Path;
//!
//! // Load configuration from TOML file
//! let config = Config::load(Path::new("dposcore.toml"))?;
//!
//! // Access nested configurations
//! println!("Chain ID: {}", config.chain.chain_id);
//! println!("Mining interval: {}ms", config.consensus.mining_interval_ms);
//! ```
//!
//! ## Configuration Sections
//!
//! - `[chain]` - Chain identity (chain_id, chain_name)
//! - `[consensus]` - Scheduler parameters (mining interval, tiny block cap,
//!   rounds per term, slot tolerance)
//! - `[storage]` - Storage settings (data directory, cache size)
//! - `[logging]` - Logging settings (level, format)
//! - `[genesis]` - Initial miner set and chain start time

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

mod config;
mod error;

pub use config::*;
pub use error::*;
