//! # Activator Configuration
//!
//! Every option is available as a command-line flag and as an environment
//! variable, and every option has a default.
//!
//! | Flag | Environment | Default |
//! |------|-------------|---------|
//! | `--node-url` | `NIMIQ_NODE_URL` | `http://node:8648` |
//! | `--metrics-port` | `METRICS_PORT` | `8000` |
//! | `--faucet-url` | `FAUCET_URL` | testnet faucet |
//! | `--network` | `NIMIQ_NETWORK` | `testnet` |
//! | `--signing-key-file` | `SIGNING_KEY_FILE` | `/keys/signing_key.txt` |
//! | `--vote-key-file` | `VOTE_KEY_FILE` | `/keys/vote_key.txt` |
//! | `--address-key-file` | `ADDRESS_KEY_FILE` | `/keys/address.txt` |
//! | `--poll-interval-secs` | `POLL_INTERVAL_SECS` | `15` |
//! | `--funding-interval-secs` | `FUNDING_INTERVAL_SECS` | `10` |
//! | `--rpc-timeout-secs` | `RPC_TIMEOUT_SECS` | `10` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::consensus_gate::CHECK_SPACING;

pub const DEFAULT_NODE_URL: &str = "http://node:8648";
pub const DEFAULT_FAUCET_URL: &str = "https://faucet.pos.nimiq-testnet.com/tapit";
pub const DEFAULT_METRICS_PORT: u16 = 8000;

/// Network the validator runs on. Only non-production networks have a faucet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetworkMode {
    #[value(alias = "main", alias = "production")]
    Mainnet,
    #[value(alias = "test", alias = "devnet")]
    Testnet,
}

impl NetworkMode {
    pub fn is_production(self) -> bool {
        matches!(self, NetworkMode::Mainnet)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkMode::Mainnet => "mainnet",
            NetworkMode::Testnet => "testnet",
        }
    }
}

/// Nimiq validator activator
#[derive(Parser, Debug, Clone)]
#[command(name = "validator-activator")]
#[command(author, version, about, long_about = None)]
pub struct ActivatorArgs {
    /// JSON-RPC endpoint of the Nimiq node
    #[arg(long, env = "NIMIQ_NODE_URL", default_value = DEFAULT_NODE_URL)]
    pub node_url: String,

    /// Port of the Prometheus metrics server
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Faucet endpoint used on non-production networks
    #[arg(long, env = "FAUCET_URL", default_value = DEFAULT_FAUCET_URL)]
    pub faucet_url: String,

    /// Network mode; funding is only requested outside mainnet
    #[arg(long, env = "NIMIQ_NETWORK", value_enum, default_value_t = NetworkMode::Testnet)]
    pub network: NetworkMode,

    /// File holding the signing key (`Private Key:` line)
    #[arg(long, env = "SIGNING_KEY_FILE", default_value = "/keys/signing_key.txt")]
    pub signing_key_file: PathBuf,

    /// File holding the BLS voting key (`Secret Key:` block)
    #[arg(long, env = "VOTE_KEY_FILE", default_value = "/keys/vote_key.txt")]
    pub vote_key_file: PathBuf,

    /// File holding the validator account key (`Private Key:` line)
    #[arg(long, env = "ADDRESS_KEY_FILE", default_value = "/keys/address.txt")]
    pub address_key_file: PathBuf,

    /// Seconds between lifecycle evaluations
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 15)]
    pub poll_interval_secs: u64,

    /// Seconds between balance checks while waiting for funds
    #[arg(long, env = "FUNDING_INTERVAL_SECS", default_value_t = 10)]
    pub funding_interval_secs: u64,

    /// Timeout for a single RPC or faucet request
    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 10)]
    pub rpc_timeout_secs: u64,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ActivatorConfig {
    pub node_url: String,
    pub metrics_addr: SocketAddr,
    pub faucet_url: String,
    pub network: NetworkMode,
    pub keys: KeyFiles,
    pub poll_interval: Duration,
    pub funding_interval: Duration,
    pub rpc_timeout: Duration,
    /// Pause between consensus checks at start-up. Not exposed on the command line.
    pub consensus_check_spacing: Duration,
}

/// Locations of the key files.
#[derive(Debug, Clone)]
pub struct KeyFiles {
    pub signing_key: PathBuf,
    pub vote_key: PathBuf,
    pub address_key: PathBuf,
}

impl Default for KeyFiles {
    fn default() -> Self {
        Self {
            signing_key: PathBuf::from("/keys/signing_key.txt"),
            vote_key: PathBuf::from("/keys/vote_key.txt"),
            address_key: PathBuf::from("/keys/address.txt"),
        }
    }
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_PORT)),
            faucet_url: DEFAULT_FAUCET_URL.to_string(),
            network: NetworkMode::Testnet,
            keys: KeyFiles::default(),
            poll_interval: Duration::from_secs(15),
            funding_interval: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(10),
            consensus_check_spacing: CHECK_SPACING,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {field} URL '{value}': {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl TryFrom<ActivatorArgs> for ActivatorConfig {
    type Error = ConfigError;

    fn try_from(args: ActivatorArgs) -> Result<Self, Self::Error> {
        let config = Self {
            node_url: args.node_url,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], args.metrics_port)),
            faucet_url: args.faucet_url,
            network: args.network,
            keys: KeyFiles {
                signing_key: args.signing_key_file,
                vote_key: args.vote_key_file,
                address_key: args.address_key_file,
            },
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            funding_interval: Duration::from_secs(args.funding_interval_secs),
            rpc_timeout: Duration::from_secs(args.rpc_timeout_secs),
            consensus_check_spacing: CHECK_SPACING,
        };
        config.validate()?;
        Ok(config)
    }
}

impl ActivatorConfig {
    /// Reject values the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("node", &self.node_url)?;
        if !self.network.is_production() {
            check_url("faucet", &self.faucet_url)?;
        }

        for (name, value) in [
            ("poll interval", self.poll_interval),
            ("funding interval", self.funding_interval),
            ("RPC timeout", self.rpc_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}
