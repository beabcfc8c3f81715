//! Configuration management for the CoVault workflow.
//!
//! Settings are stored in TOML format with a strongly-typed structure,
//! validation and reasonable defaults.
//!
//! ## Security Considerations
//!
//! - No security-critical information is stored here
//! - All values are validated before use in the workflow (`validate`)
//! - Configuration files must be protected from unauthorized modification

use crate::types::MultisigError;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure for the workflow
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,
}

/// Wallet-facing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Network name: "bitcoin", "testnet", "signet" or "regtest"
    #[serde(default = "default_network")]
    pub network: String,

    /// Fee rate in satoshis per vbyte used when assembling drafts
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f32,

    /// Confirmations required before a coin counts toward a funding set
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            fee_rate: default_fee_rate(),
            min_confirmations: default_min_confirmations(),
        }
    }
}

/// File exchange boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Directory where exported draft files are written
    #[serde(default = "default_draft_dir")]
    pub draft_dir: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            draft_dir: default_draft_dir(),
        }
    }
}

fn default_network() -> String {
    "bitcoin".to_string()
}

fn default_fee_rate() -> f32 {
    1.0
}

fn default_min_confirmations() -> u32 {
    1
}

fn default_draft_dir() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: &Path) -> Result<Self, MultisigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| MultisigError::ConfigError(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| MultisigError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), MultisigError> {
        let content = toml::to_string(self)
            .map_err(|e| MultisigError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| MultisigError::ConfigError(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    /// Validate every field that feeds a workflow operation
    pub fn validate(&self) -> Result<(), MultisigError> {
        self.parsed_network()?;

        if !self.wallet.fee_rate.is_finite() || self.wallet.fee_rate <= 0.0 {
            return Err(MultisigError::ConfigError(format!(
                "Fee rate must be positive, got {}",
                self.wallet.fee_rate
            )));
        }

        Ok(())
    }

    /// The configured network as a `bitcoin::Network`
    pub fn parsed_network(&self) -> Result<Network, MultisigError> {
        Network::from_str(&self.wallet.network).map_err(|_| {
            MultisigError::ConfigError(format!("Unknown network: {}", self.wallet.network))
        })
    }
}
