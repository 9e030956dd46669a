//! # Validator Activator Runtime
//!
//! Brings a Nimiq validator from "unfunded and unregistered" to "actively
//! validating" and keeps supervising it. The `validator-activator` binary in
//! `main.rs` is a thin shell around [`ActivatorRuntime`].
//!
//! ## Modules
//!
//! - `config` - command-line and environment configuration
//! - `keys` - key file parsing behind [`KeyProvider`]
//! - `funding` - faucet client behind [`FundingProvider`]
//! - `consensus_gate` - start-up consensus stability check
//! - `lifecycle` - situation classifier and lifecycle controller
//! - `supervisor` - main poll loop and balance-accumulation loop
//! - `metrics_server` - `/metrics` and `/health` over HTTP
//!
//! ## Startup Sequence
//!
//! 1. Consensus gate (fatal on failure)
//! 2. Epoch gauge
//! 3. Address discovery via `getAddress` (fatal on failure)
//! 4. Gauge reset, then the lifecycle loop until shutdown

pub mod config;
pub mod consensus_gate;
pub mod funding;
pub mod keys;
pub mod lifecycle;
pub mod metrics_server;
pub mod supervisor;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use node_gateway::{GatewayError, NimiqRpcClient, NodeGateway, ValidatorAddress};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::{ActivatorArgs, ActivatorConfig, ConfigError, KeyFiles, NetworkMode};
pub use consensus_gate::ConsensusGate;
pub use funding::{FaucetClient, FundingError, FundingProvider};
pub use keys::{FileKeyProvider, KeyError, KeyProvider};
pub use lifecycle::{LifecycleController, LifecycleDependencies, LifecyclePolicy};
pub use metrics_server::{metrics_router, spawn_metrics_server};
pub use supervisor::Supervisor;

/// Fatal start-up errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Consensus not established")]
    ConsensusNotEstablished,

    #[error("Failed to discover validator address: {0}")]
    AddressDiscovery(#[source] GatewayError),

    #[error("Failed to create node client: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to create faucet client: {0}")]
    Funding(#[from] FundingError),
}

/// The activator wired to a real node, key files and faucet.
pub struct ActivatorRuntime {
    config: ActivatorConfig,
    gateway: Arc<NimiqRpcClient>,
    keys: Arc<FileKeyProvider>,
    funding: Option<Arc<FaucetClient>>,
}

impl ActivatorRuntime {
    pub fn new(config: ActivatorConfig) -> Result<Self, RuntimeError> {
        let gateway = Arc::new(NimiqRpcClient::with_timeout(
            config.node_url.clone(),
            config.rpc_timeout,
        )?);
        let keys = Arc::new(FileKeyProvider::new(config.keys.clone()));
        let funding = if config.network.is_production() {
            None
        } else {
            Some(Arc::new(FaucetClient::new(
                config.faucet_url.clone(),
                config.rpc_timeout,
            )?))
        };

        Ok(Self {
            config,
            gateway,
            keys,
            funding,
        })
    }

    pub fn config(&self) -> &ActivatorConfig {
        &self.config
    }

    /// Run the start-up sequence, then supervise until `shutdown` flips.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), RuntimeError> {
        info!(
            node_url = %self.config.node_url,
            network = self.config.network.as_str(),
            "Starting validator activator"
        );

        let gate = ConsensusGate::new(Arc::clone(&self.gateway))
            .with_spacing(self.config.consensus_check_spacing);
        if !gate.await_consensus().await {
            return Err(RuntimeError::ConsensusNotEstablished);
        }

        let address = discover_address(self.gateway.as_ref()).await?;

        let controller = LifecycleController::new(
            LifecycleDependencies {
                gateway: Arc::clone(&self.gateway),
                keys: Arc::clone(&self.keys),
                funding: self.funding.clone(),
            },
            LifecyclePolicy::for_network(self.config.network),
            address,
        );

        Supervisor::new(
            controller,
            self.config.poll_interval,
            self.config.funding_interval,
        )
        .run(shutdown)
        .await;

        Ok(())
    }
}

/// Publish the epoch gauge and look up the address the node validates with.
async fn discover_address<G: NodeGateway>(gateway: &G) -> Result<ValidatorAddress, RuntimeError> {
    match gateway.get_epoch_number().await {
        Ok(epoch) => validator_telemetry::set_epoch_number(epoch),
        Err(e) => warn!(error = %e, "Failed to fetch epoch number"),
    }

    let address = gateway
        .get_address()
        .await
        .map_err(RuntimeError::AddressDiscovery)?;
    info!(%address, "Validator address");
    Ok(address)
}
