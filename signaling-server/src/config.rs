use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;

use log::{LevelFilter, ParseLevelError};
use thiserror::Error;

pub const ADDRESS_VAR: &str = "PEER_CALL_ADDRESS";
pub const LOG_LEVEL_VAR: &str = "PEER_CALL_LOG";
const DEFAULT_ADDRESS: &str = "127.0.0.1:9000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid listen address {0:?}: {1}")]
    InvalidAddress(String, #[source] AddrParseError),
    #[error("invalid log level {0:?}: {1}")]
    InvalidLogLevel(String, #[source] ParseLevelError),
}

/// Runtime settings of the relay binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub address: SocketAddr,
    pub log_level: LevelFilter,
}

impl Config {
    /// Listen address comes from the first CLI argument, then [ADDRESS_VAR],
    /// log level from [LOG_LEVEL_VAR].
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_parts(
            env::args().nth(1),
            env::var(ADDRESS_VAR).ok(),
            env::var(LOG_LEVEL_VAR).ok(),
        )
    }

    pub fn from_parts(
        address_arg: Option<String>,
        address_var: Option<String>,
        log_level_var: Option<String>,
    ) -> Result<Self, ConfigError> {
        let address = address_arg
            .or(address_var)
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let address = SocketAddr::from_str(&address)
            .map_err(|e| ConfigError::InvalidAddress(address.clone(), e))?;

        let log_level = match log_level_var {
            Some(level) => LevelFilter::from_str(&level)
                .map_err(|e| ConfigError::InvalidLogLevel(level.clone(), e))?,
            None => LevelFilter::Debug,
        };
        Ok(Config { address, log_level })
    }
}
