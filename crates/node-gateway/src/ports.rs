//! Driven port used by the lifecycle controller.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{
    NewValidatorTransaction, ReactivateValidatorTransaction, ValidatorAddress, ValidatorRecord,
};

/// Query and submission interface of a Nimiq node.
#[async_trait]
pub trait NodeGateway: Send + Sync {
    /// `isConsensusEstablished`
    async fn is_consensus_established(&self) -> Result<bool, GatewayError>;

    /// `getEpochNumber`
    async fn get_epoch_number(&self) -> Result<u64, GatewayError>;

    /// `getAddress` - the address the node validates with.
    async fn get_address(&self) -> Result<ValidatorAddress, GatewayError>;

    /// `getAccountByAddress`, balance in Luna.
    async fn get_account_balance(&self, address: &ValidatorAddress) -> Result<u64, GatewayError>;

    /// `getValidatorByAddress`.
    ///
    /// `Ok(None)` means the address is not a registered validator.
    async fn get_validator(
        &self,
        address: &ValidatorAddress,
    ) -> Result<Option<ValidatorRecord>, GatewayError>;

    /// Sum of `getStakersByValidatorAddress` balances, in Luna.
    async fn get_total_stake(&self, address: &ValidatorAddress) -> Result<u64, GatewayError>;

    /// `getBlockNumber`
    async fn get_block_number(&self) -> Result<u64, GatewayError>;

    /// `importRawKey`, returns the imported address.
    async fn import_raw_key(
        &self,
        private_key: &str,
        passphrase: &str,
    ) -> Result<String, GatewayError>;

    /// `unlockAccount`. A duration of 0 keeps the account unlocked for the call only.
    async fn unlock_account(
        &self,
        address: &ValidatorAddress,
        passphrase: &str,
        duration: u64,
    ) -> Result<(), GatewayError>;

    /// `sendNewValidatorTransaction`, returns the signed raw transaction.
    async fn create_new_validator_transaction(
        &self,
        tx: &NewValidatorTransaction<'_>,
    ) -> Result<String, GatewayError>;

    /// `sendReactivateValidatorTransaction`, returns the transaction hash.
    async fn send_reactivate_validator_transaction(
        &self,
        tx: &ReactivateValidatorTransaction<'_>,
    ) -> Result<String, GatewayError>;

    /// `sendRawTransaction`, returns the transaction hash.
    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, GatewayError>;
}
