//! Configuration module for the MicroGig client
//!
//! Loads TOML configuration with environment overrides and provides
//! structured configuration types for the network endpoints, the registry
//! contract, the local wallet, and confirmation polling.

use crate::tx::SubmissionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network endpoints and transaction parameters
    #[serde(default)]
    pub network: NetworkConfig,

    /// Gig registry contract
    #[serde(default)]
    pub contract: ContractConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Confirmation polling
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Local task cache
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Soroban RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Horizon endpoint (account reads)
    #[serde(default = "default_horizon_url")]
    pub horizon_url: String,

    /// Friendbot endpoint (testnet funding)
    #[serde(default = "default_friendbot_url")]
    pub friendbot_url: String,

    /// Network passphrase the signer binds signatures to
    #[serde(default = "default_network_passphrase")]
    pub network_passphrase: String,

    /// Base fee in stroops
    #[serde(default = "default_base_fee")]
    pub base_fee: u32,

    /// Transaction validity window in seconds
    #[serde(default = "default_tx_timeout")]
    pub tx_timeout_secs: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Deployed gig registry contract id (`C...`)
    #[serde(default = "default_contract_id")]
    pub contract_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to the keypair file (strkey seed or JSON byte array)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Delay between status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of status polls per submission
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// How many ledgers back the activity feed looks
    #[serde(default = "default_event_lookback")]
    pub event_lookback_ledgers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for the sled-backed task cache
    #[serde(default = "default_cache_path")]
    pub path: String,
}

// Default value functions
fn default_rpc_url() -> String {
    "https://soroban-testnet.stellar.org".to_string()
}
fn default_horizon_url() -> String {
    "https://horizon-testnet.stellar.org".to_string()
}
fn default_friendbot_url() -> String {
    "https://friendbot.stellar.org".to_string()
}
fn default_network_passphrase() -> String {
    "Test SDF Network ; September 2015".to_string()
}
fn default_base_fee() -> u32 {
    100
}
fn default_tx_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    30
}
fn default_contract_id() -> String {
    "CCIMNZ2TTDBRAONQE56XAQUGCNM7IBKNWKDTK42DYRMQUABJ45IOOSQV".to_string()
}
fn default_keypair_path() -> String {
    "microgig.key".to_string()
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_max_poll_attempts() -> u32 {
    20
}
fn default_event_lookback() -> u32 {
    10_000
}
fn default_cache_path() -> String {
    ".microgig-cache".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            horizon_url: default_horizon_url(),
            friendbot_url: default_friendbot_url(),
            network_passphrase: default_network_passphrase(),
            base_fee: default_base_fee(),
            tx_timeout_secs: default_tx_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            contract_id: default_contract_id(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            event_lookback_ledgers: default_event_lookback(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            contract: ContractConfig::default(),
            wallet: WalletConfig::default(),
            confirmation: ConfirmationConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration with `.env` loaded first
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Environment variables beat the file for a couple of deploy-sensitive
    /// values.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("MICROGIG_CONTRACT_ID") {
            self.contract.contract_id = id;
        }
        if let Ok(url) = std::env::var("MICROGIG_RPC_URL") {
            self.network.rpc_url = url;
        }
    }

    /// Poll settings in the form the pipeline consumes.
    pub fn submission_config(&self) -> SubmissionConfig {
        SubmissionConfig {
            poll_interval: Duration::from_millis(self.confirmation.poll_interval_ms),
            max_poll_attempts: self.confirmation.max_poll_attempts,
        }
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_testnet() {
        let config = Config::default();
        assert!(config.network.rpc_url.contains("soroban-testnet"));
        assert_eq!(config.network.base_fee, 100);
        assert_eq!(config.confirmation.max_poll_attempts, 20);
        assert!(config.contract.contract_id.starts_with('C'));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [confirmation]
            poll_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(parsed.confirmation.poll_interval_ms, 500);
        assert_eq!(parsed.confirmation.max_poll_attempts, 20);
        assert_eq!(parsed.network.base_fee, 100);
    }

    #[test]
    fn submission_config_converts_units() {
        let config = Config::default();
        let submission = config.submission_config();
        assert_eq!(submission.poll_interval, Duration::from_millis(2_000));
        assert_eq!(submission.max_poll_attempts, 20);
    }
}
