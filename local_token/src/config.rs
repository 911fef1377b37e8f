//! Deployment configuration for a ledger

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::state::DEFAULT_HAMT_BIT_WIDTH;
use crate::token::types::ConstructorParams;
use crate::token::scale_whole_units;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters a ledger is deployed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token name
    pub name: String,

    /// Ticker symbol
    pub symbol: String,

    /// Decimal places of a whole token
    pub decimals: u8,

    /// Supply minted to the deployer, in whole tokens
    pub initial_supply: u64,

    /// Bit width of the state HAMTs
    #[serde(default = "default_hamt_bit_width")]
    pub hamt_bit_width: u32,
}

fn default_hamt_bit_width() -> u32 {
    DEFAULT_HAMT_BIT_WIDTH
}

impl TokenConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TokenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        if !(1..=8).contains(&self.hamt_bit_width) {
            return Err(ConfigError::Invalid(format!(
                "hamt_bit_width must be between 1 and 8, got {}",
                self.hamt_bit_width
            )));
        }
        scale_whole_units(self.initial_supply, self.decimals)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn constructor_params(&self) -> ConstructorParams {
        ConstructorParams {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            initial_supply: self.initial_supply,
        }
    }
}

impl From<TokenConfig> for ConstructorParams {
    fn from(config: TokenConfig) -> Self {
        ConstructorParams {
            name: config.name,
            symbol: config.symbol,
            decimals: config.decimals,
            initial_supply: config.initial_supply,
        }
    }
}
