//! Validator lifecycle controller.

use std::sync::Arc;

use node_gateway::{
    luna_to_nim, GatewayError, NewValidatorTransaction, NodeGateway,
    ReactivateValidatorTransaction, ValidatorAddress,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use validator_telemetry::{record_error, set_epoch_number, FundingOutcome, ValidatorMetrics};

use crate::funding::{FundingError, FundingProvider};
use crate::keys::{KeyBundle, KeyError, KeyProvider, KeyPurpose};

use super::situation::{
    LifecycleAction, LifecyclePolicy, LifecycleSituation, Observation, VALIDITY_START_NOW,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Node query failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("Key material unavailable: {0}")]
    Keys(#[from] KeyError),

    #[error("Voting key is required for activation")]
    MissingVotingKey,

    #[error("Funding request failed: {0}")]
    Funding(#[from] FundingError),

    #[error("No funding provider configured")]
    NoFundingProvider,
}

fn step(step: &'static str) -> impl FnOnce(GatewayError) -> LifecycleError {
    move |source| LifecycleError::Step { step, source }
}

/// Result of the corrective action of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// `tx_hash` is set for submitted transactions.
    Completed {
        action: LifecycleAction,
        tx_hash: Option<String>,
    },
    Failed {
        action: LifecycleAction,
        reason: String,
    },
}

impl ActionOutcome {
    pub fn action(&self) -> LifecycleAction {
        match self {
            ActionOutcome::Completed { action, .. } | ActionOutcome::Failed { action, .. } => {
                *action
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ActionOutcome::Completed { .. })
    }
}

/// What one evaluation saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub situation: LifecycleSituation,
    pub action: Option<ActionOutcome>,
}

impl TickReport {
    pub fn is_healthy(&self) -> bool {
        self.situation == LifecycleSituation::Active
    }
}

/// Balance check used while waiting for funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingStatus {
    Registered,
    Sufficient { balance: u64 },
    Missing { balance: u64, missing: u64 },
}

/// Ports the controller drives.
pub struct LifecycleDependencies<G, K, F> {
    pub gateway: Arc<G>,
    pub keys: Arc<K>,
    /// `None` disables funding requests.
    pub funding: Option<Arc<F>>,
}

/// Observes the node, classifies, publishes, and takes at most one action.
///
/// Holds no lifecycle state of its own: every evaluation starts from a fresh
/// node query.
pub struct LifecycleController<G, K, F> {
    gateway: Arc<G>,
    keys: Arc<K>,
    funding: Option<Arc<F>>,
    policy: LifecyclePolicy,
    address: ValidatorAddress,
    metrics: ValidatorMetrics,
}

impl<G, K, F> LifecycleController<G, K, F>
where
    G: NodeGateway,
    K: KeyProvider,
    F: FundingProvider,
{
    pub fn new(
        deps: LifecycleDependencies<G, K, F>,
        policy: LifecyclePolicy,
        address: ValidatorAddress,
    ) -> Self {
        let metrics = ValidatorMetrics::new(address.as_str());
        Self {
            gateway: deps.gateway,
            keys: deps.keys,
            funding: deps.funding,
            policy,
            address,
            metrics,
        }
    }

    pub fn address(&self) -> &ValidatorAddress {
        &self.address
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &ValidatorMetrics {
        &self.metrics
    }

    /// Start-up gauge state for this address.
    pub fn reset_metrics(&self) {
        self.metrics.reset_lifecycle();
    }

    pub async fn publish_epoch(&self) -> Result<u64, LifecycleError> {
        let epoch = self.gateway.get_epoch_number().await.map_err(|e| {
            record_error("epoch");
            e
        })?;
        set_epoch_number(epoch);
        Ok(epoch)
    }

    pub async fn publish_total_stake(&self) -> Result<u64, LifecycleError> {
        let total = self
            .gateway
            .get_total_stake(&self.address)
            .await
            .map_err(|e| {
                record_error("stake");
                e
            })?;
        self.metrics.set_total_stake(total);
        Ok(total)
    }

    /// One full lifecycle evaluation.
    #[instrument(skip(self), fields(address = %self.address))]
    pub async fn evaluate(&self) -> Result<TickReport, LifecycleError> {
        let observation = self.observe().await.map_err(|e| {
            record_error("evaluate");
            e
        })?;
        let situation = self.policy.classify(&observation);
        self.publish(&observation);
        if let Observation::Registered { .. } = observation {
            self.refresh_account_balance().await;
        }
        self.log_situation(&situation);

        let action = match self.policy.action_for(&situation) {
            Some(action) => Some(self.perform(action).await),
            None => None,
        };

        Ok(TickReport { situation, action })
    }

    async fn observe(&self) -> Result<Observation, GatewayError> {
        match self.gateway.get_validator(&self.address).await? {
            None => {
                let balance = self.gateway.get_account_balance(&self.address).await?;
                Ok(Observation::Unregistered { balance })
            }
            Some(record) => {
                let current_block = match record.jailed_from {
                    Some(_) => Some(self.gateway.get_block_number().await?),
                    None => None,
                };
                Ok(Observation::Registered {
                    record,
                    current_block,
                })
            }
        }
    }

    fn publish(&self, observation: &Observation) {
        match observation {
            Observation::Unregistered { balance } => {
                self.metrics.set_account_balance(*balance);
            }
            Observation::Registered {
                record,
                current_block,
            } => {
                self.metrics.set_validator_balance(record.balance);
                self.metrics.set_num_stakers(record.num_stakers);
                self.metrics.set_inactivity_flag(record.inactivity_flag);
                self.metrics.set_retired(record.retired);
                self.metrics.set_jailed(
                    self.policy
                        .active_jail(record, *current_block)
                        .map(|(jailed_from, _)| jailed_from),
                );
                self.metrics.set_activated(true);
                debug!("Validator metrics updated");
            }
        }
    }

    /// Registered validators still get the account balance gauge each tick.
    async fn refresh_account_balance(&self) {
        match self.gateway.get_account_balance(&self.address).await {
            Ok(balance) => self.metrics.set_account_balance(balance),
            Err(e) => {
                warn!(error = %e, "Failed to update account balance");
                record_error("balance");
            }
        }
    }

    fn log_situation(&self, situation: &LifecycleSituation) {
        match situation {
            LifecycleSituation::Unregistered => {
                info!("Validator not registered, balance sufficient for activation")
            }
            LifecycleSituation::InsufficientBalance { missing } => info!(
                missing_nim = luna_to_nim(*missing),
                "Validator not registered, insufficient balance"
            ),
            LifecycleSituation::Active => info!("Validator is active and in good standing"),
            LifecycleSituation::Retired => warn!("Validator is retired, needs reactivation"),
            LifecycleSituation::Jailed {
                jailed_from,
                release_block,
            } => warn!(jailed_from, release_block, "Validator is jailed"),
        }
    }

    async fn perform(&self, action: LifecycleAction) -> ActionOutcome {
        let result = match action {
            LifecycleAction::Activate => self.activate().await.map(Some),
            LifecycleAction::Reactivate => self.reactivate().await.map(Some),
            LifecycleAction::RequestFunding => self.request_funding().await.map(|_| None),
        };

        match result {
            Ok(tx_hash) => ActionOutcome::Completed { action, tx_hash },
            Err(e) => {
                warn!(action = action.as_str(), error = %e, "Lifecycle action failed");
                record_error(action.as_str());
                ActionOutcome::Failed {
                    action,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn unlock_account(&self, keys: &KeyBundle) -> Result<(), LifecycleError> {
        debug!("Importing account key");
        self.gateway
            .import_raw_key(keys.account.expose(), "")
            .await
            .map_err(step("importRawKey"))?;

        debug!("Unlocking account");
        self.gateway
            .unlock_account(&self.address, "", 0)
            .await
            .map_err(step("unlockAccount"))
    }

    /// Register the address as a new validator.
    ///
    /// Returns the hash of the submitted transaction.
    pub async fn activate(&self) -> Result<String, LifecycleError> {
        let keys = self.keys.resolve(KeyPurpose::Activation)?;
        let voting = keys.voting.as_ref().ok_or(LifecycleError::MissingVotingKey)?;

        self.unlock_account(&keys).await?;

        info!("Activating validator");
        let tx = NewValidatorTransaction {
            sender: &self.address,
            validator: &self.address,
            signing_secret_key: keys.signing.expose(),
            voting_secret_key: voting.expose(),
            reward_address: &self.address,
            signal_data: "",
            fee_luna: self.policy.fee_luna,
            validity_start_height: VALIDITY_START_NOW,
        };
        let raw_tx = self
            .gateway
            .create_new_validator_transaction(&tx)
            .await
            .map_err(step("sendNewValidatorTransaction"))?;
        let tx_hash = self
            .gateway
            .send_raw_transaction(&raw_tx)
            .await
            .map_err(step("sendRawTransaction"))?;

        self.metrics.record_activation();
        info!(%tx_hash, "Activation transaction sent");
        Ok(tx_hash)
    }

    /// Bring a retired validator back.
    pub async fn reactivate(&self) -> Result<String, LifecycleError> {
        let keys = self.keys.resolve(KeyPurpose::Reactivation)?;

        self.unlock_account(&keys).await?;

        info!("Reactivating validator");
        let tx = ReactivateValidatorTransaction {
            sender: &self.address,
            validator: &self.address,
            signing_secret_key: keys.signing.expose(),
            fee_luna: self.policy.fee_luna,
            validity_start_height: VALIDITY_START_NOW,
        };
        let tx_hash = self
            .gateway
            .send_reactivate_validator_transaction(&tx)
            .await
            .map_err(step("sendReactivateValidatorTransaction"))?;

        self.metrics.record_reactivation();
        info!(%tx_hash, "Reactivation transaction sent");
        Ok(tx_hash)
    }

    /// Ask the faucet for funds. Never called on production networks.
    pub async fn request_funding(&self) -> Result<(), LifecycleError> {
        let funding = self
            .funding
            .as_ref()
            .ok_or(LifecycleError::NoFundingProvider)?;

        match funding.request_funds(&self.address).await {
            Ok(()) => {
                self.metrics.record_funding(FundingOutcome::Success);
                info!("Funding requested");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_funding(FundingOutcome::Failure);
                Err(e.into())
            }
        }
    }

    /// Registration and balance check used by the balance-accumulation loop.
    pub async fn funding_status(&self) -> Result<FundingStatus, LifecycleError> {
        if self.gateway.get_validator(&self.address).await?.is_some() {
            return Ok(FundingStatus::Registered);
        }

        let balance = self.gateway.get_account_balance(&self.address).await?;
        self.metrics.set_account_balance(balance);

        Ok(match self.policy.missing_balance(balance) {
            0 => FundingStatus::Sufficient { balance },
            missing => FundingStatus::Missing { balance, missing },
        })
    }
}
