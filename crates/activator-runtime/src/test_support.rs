//! In-memory ports for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use node_gateway::{
    GatewayError, NewValidatorTransaction, NodeGateway, ReactivateValidatorTransaction,
    ValidatorAddress, ValidatorRecord,
};

use crate::funding::{FundingError, FundingProvider};
use crate::keys::{KeyBundle, KeyError, KeyProvider, KeyPurpose, SecretKey};
use crate::lifecycle::{LifecycleController, LifecycleDependencies, LifecyclePolicy};

pub const SIGNING_KEY: &str = "signing-secret";
pub const VOTING_KEY: &str = "voting-secret";
pub const ACCOUNT_KEY: &str = "account-secret";

pub fn record(address: &str) -> ValidatorRecord {
    ValidatorRecord {
        address: address.to_string(),
        balance: 10_000_000_000,
        num_stakers: 3,
        inactivity_flag: None,
        retired: false,
        jailed_from: None,
    }
}

#[derive(Default)]
struct GatewayState {
    consensus: VecDeque<Result<bool, &'static str>>,
    /// The last entry stays in place once reached.
    balances: VecDeque<u64>,
    validator: Option<ValidatorRecord>,
    block_number: u64,
    epoch: u64,
    total_stake: u64,
    failing: Vec<&'static str>,
    register_on_activation: bool,
    calls: Vec<&'static str>,
    new_validator_txs: Vec<Vec<String>>,
    reactivate_txs: Vec<Vec<String>>,
}

/// Scripted node. Methods named in `fail` answer with a connection error.
pub struct MockGateway {
    address: ValidatorAddress,
    state: Mutex<GatewayState>,
}

impl MockGateway {
    pub fn new(address: &str) -> Self {
        Self {
            address: ValidatorAddress::new(address),
            state: Mutex::new(GatewayState {
                epoch: 1,
                ..Default::default()
            }),
        }
    }

    pub fn address(&self) -> ValidatorAddress {
        self.address.clone()
    }

    pub fn push_consensus(&self, answers: impl IntoIterator<Item = Result<bool, &'static str>>) {
        self.state.lock().unwrap().consensus.extend(answers);
    }

    pub fn set_balance(&self, balance: u64) {
        let mut state = self.state.lock().unwrap();
        state.balances.clear();
        state.balances.push_back(balance);
    }

    pub fn push_balances(&self, balances: impl IntoIterator<Item = u64>) {
        self.state.lock().unwrap().balances.extend(balances);
    }

    pub fn set_validator(&self, record: Option<ValidatorRecord>) {
        self.state.lock().unwrap().validator = record;
    }

    pub fn set_block_number(&self, block: u64) {
        self.state.lock().unwrap().block_number = block;
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.state.lock().unwrap().epoch = epoch;
    }

    pub fn set_total_stake(&self, stake: u64) {
        self.state.lock().unwrap().total_stake = stake;
    }

    pub fn fail(&self, method: &'static str) {
        self.state.lock().unwrap().failing.push(method);
    }

    /// A successful activation makes the validator appear on chain.
    pub fn register_on_activation(&self) {
        self.state.lock().unwrap().register_on_activation = true;
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|m| **m == method)
            .count()
    }

    pub fn call_log(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn new_validator_txs(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().new_validator_txs.clone()
    }

    pub fn reactivate_txs(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().reactivate_txs.clone()
    }

    fn enter(&self, method: &'static str) -> Result<std::sync::MutexGuard<'_, GatewayState>, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method);
        if state.failing.contains(&method) {
            return Err(GatewayError::Connection(format!("{method} unavailable")));
        }
        Ok(state)
    }
}

#[async_trait]
impl NodeGateway for MockGateway {
    async fn is_consensus_established(&self) -> Result<bool, GatewayError> {
        let mut state = self.enter("isConsensusEstablished")?;
        match state.consensus.pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(reason)) => Err(GatewayError::Connection(reason.to_string())),
            None => Ok(true),
        }
    }

    async fn get_epoch_number(&self) -> Result<u64, GatewayError> {
        Ok(self.enter("getEpochNumber")?.epoch)
    }

    async fn get_address(&self) -> Result<ValidatorAddress, GatewayError> {
        self.enter("getAddress")?;
        Ok(self.address.clone())
    }

    async fn get_account_balance(&self, _address: &ValidatorAddress) -> Result<u64, GatewayError> {
        let mut state = self.enter("getAccountByAddress")?;
        let balance = if state.balances.len() > 1 {
            state.balances.pop_front()
        } else {
            state.balances.front().copied()
        };
        Ok(balance.unwrap_or(0))
    }

    async fn get_validator(
        &self,
        _address: &ValidatorAddress,
    ) -> Result<Option<ValidatorRecord>, GatewayError> {
        Ok(self.enter("getValidatorByAddress")?.validator.clone())
    }

    async fn get_total_stake(&self, _address: &ValidatorAddress) -> Result<u64, GatewayError> {
        Ok(self.enter("getStakersByValidatorAddress")?.total_stake)
    }

    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        Ok(self.enter("getBlockNumber")?.block_number)
    }

    async fn import_raw_key(
        &self,
        private_key: &str,
        _passphrase: &str,
    ) -> Result<String, GatewayError> {
        self.enter("importRawKey")?;
        assert_eq!(private_key, ACCOUNT_KEY);
        Ok(self.address.to_string())
    }

    async fn unlock_account(
        &self,
        _address: &ValidatorAddress,
        passphrase: &str,
        duration: u64,
    ) -> Result<(), GatewayError> {
        self.enter("unlockAccount")?;
        assert_eq!((passphrase, duration), ("", 0));
        Ok(())
    }

    async fn create_new_validator_transaction(
        &self,
        tx: &NewValidatorTransaction<'_>,
    ) -> Result<String, GatewayError> {
        let mut state = self.enter("sendNewValidatorTransaction")?;
        state.new_validator_txs.push(vec![
            tx.sender.to_string(),
            tx.validator.to_string(),
            tx.signing_secret_key.to_string(),
            tx.voting_secret_key.to_string(),
            tx.reward_address.to_string(),
            tx.signal_data.to_string(),
            tx.fee_luna.to_string(),
            tx.validity_start_height.to_string(),
        ]);
        Ok("raw-new-validator".to_string())
    }

    async fn send_reactivate_validator_transaction(
        &self,
        tx: &ReactivateValidatorTransaction<'_>,
    ) -> Result<String, GatewayError> {
        let mut state = self.enter("sendReactivateValidatorTransaction")?;
        state.reactivate_txs.push(vec![
            tx.sender.to_string(),
            tx.validator.to_string(),
            tx.signing_secret_key.to_string(),
            tx.fee_luna.to_string(),
            tx.validity_start_height.to_string(),
        ]);
        Ok("reactivate-hash".to_string())
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, GatewayError> {
        let mut state = self.enter("sendRawTransaction")?;
        assert_eq!(raw_tx, "raw-new-validator");
        if state.register_on_activation {
            state.validator = Some(record(self.address.as_str()));
        }
        Ok("activation-hash".to_string())
    }
}

/// Fixed key bundle; `missing` simulates an unreadable key file.
#[derive(Default)]
pub struct MockKeys {
    missing: bool,
    resolved: AtomicU64,
}

impl MockKeys {
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Default::default()
        }
    }

    pub fn resolved(&self) -> u64 {
        self.resolved.load(Ordering::SeqCst)
    }
}

impl KeyProvider for MockKeys {
    fn resolve(&self, purpose: KeyPurpose) -> Result<KeyBundle, KeyError> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        if self.missing {
            return Err(KeyError::MissingPattern {
                path: "/keys/signing_key.txt".into(),
                pattern: "Private Key:",
            });
        }
        Ok(KeyBundle {
            signing: SecretKey::new(SIGNING_KEY),
            voting: (purpose == KeyPurpose::Activation).then(|| SecretKey::new(VOTING_KEY)),
            account: SecretKey::new(ACCOUNT_KEY),
        })
    }
}

/// Counts funding requests; optionally tops up the mock node's balance.
#[derive(Default)]
pub struct MockFaucet {
    requests: AtomicU64,
    failing: bool,
    top_up: Option<(Arc<MockGateway>, u64)>,
}

impl MockFaucet {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Each request sets the node balance to `balance`.
    pub fn topping_up(gateway: Arc<MockGateway>, balance: u64) -> Self {
        Self {
            top_up: Some((gateway, balance)),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundingProvider for MockFaucet {
    async fn request_funds(&self, _address: &ValidatorAddress) -> Result<(), FundingError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(FundingError::Status(503));
        }
        if let Some((gateway, balance)) = &self.top_up {
            gateway.set_balance(*balance);
        }
        Ok(())
    }
}

pub type MockController = LifecycleController<MockGateway, MockKeys, MockFaucet>;

pub fn controller(
    gateway: &Arc<MockGateway>,
    keys: &Arc<MockKeys>,
    faucet: &Arc<MockFaucet>,
    policy: LifecyclePolicy,
) -> MockController {
    LifecycleController::new(
        LifecycleDependencies {
            gateway: Arc::clone(gateway),
            keys: Arc::clone(keys),
            funding: Some(Arc::clone(faucet)),
        },
        policy,
        gateway.address(),
    )
}
