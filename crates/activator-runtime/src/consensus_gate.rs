//! # Consensus Gate
//!
//! Start-up precondition: the node must report consensus on several
//! consecutive checks before the lifecycle loop may begin.

use std::sync::Arc;
use std::time::Duration;

use node_gateway::NodeGateway;
use tracing::{info, warn};

/// Consecutive positive checks required.
pub const CONSENSUS_CHECKS: u32 = 3;

/// Pause between two checks.
pub const CHECK_SPACING: Duration = Duration::from_secs(5);

pub struct ConsensusGate<G> {
    gateway: Arc<G>,
    checks: u32,
    spacing: Duration,
}

impl<G: NodeGateway> ConsensusGate<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            checks: CONSENSUS_CHECKS,
            spacing: CHECK_SPACING,
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Returns true only if every check reports consensus.
    ///
    /// A negative answer or a query error ends the gate immediately.
    pub async fn await_consensus(&self) -> bool {
        for attempt in 1..=self.checks {
            match self.gateway.is_consensus_established().await {
                Ok(true) => {
                    if attempt == 1 {
                        info!("Consensus established, verifying stability");
                    }
                }
                Ok(false) => {
                    warn!(attempt, "Consensus not established");
                    return false;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Error checking consensus");
                    validator_telemetry::record_error("consensus");
                    return false;
                }
            }

            if attempt < self.checks {
                tokio::time::sleep(self.spacing).await;
            }
        }

        info!("Consensus stability verified");
        true
    }
}
