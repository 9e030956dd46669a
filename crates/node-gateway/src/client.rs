//! JSON-RPC client for a Nimiq node.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::GatewayError;
use crate::ports::NodeGateway;
use crate::types::{
    AccountInfo, JsonRpcRequest, JsonRpcResponse, NewValidatorTransaction,
    ReactivateValidatorTransaction, RpcData, StakerInfo, ValidatorAddress, ValidatorRecord,
};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// RPC client for one node endpoint.
pub struct NimiqRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl NimiqRpcClient {
    /// Create a new RPC client with the default timeout.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_timeout(rpc_url, DEFAULT_TIMEOUT)
    }

    /// Create a new RPC client with a custom request timeout.
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Make a JSON-RPC call and return the raw `result` payload.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, GatewayError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());

        tracing::trace!(method, "Sending RPC request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GatewayError::Connection(format!("Cannot connect to {}", self.rpc_url))
                } else {
                    GatewayError::Http(e)
                }
            })?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(format!("{}: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(GatewayError::Rpc(error));
        }

        rpc_response
            .result
            .ok_or_else(|| GatewayError::Parse(format!("{}: missing result", method)))
    }

    /// Call a method whose result is wrapped in the `{"data": ...}` envelope.
    async fn call_data<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, GatewayError> {
        let envelope: RpcData<R> = self.call(method, params).await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl NodeGateway for NimiqRpcClient {
    async fn is_consensus_established(&self) -> Result<bool, GatewayError> {
        self.call_data("isConsensusEstablished", [(); 0]).await
    }

    async fn get_epoch_number(&self) -> Result<u64, GatewayError> {
        self.call_data("getEpochNumber", [(); 0]).await
    }

    async fn get_address(&self) -> Result<ValidatorAddress, GatewayError> {
        let address: String = self.call_data("getAddress", [(); 0]).await?;
        if address.trim().is_empty() {
            return Err(GatewayError::Rejected {
                method: "getAddress",
                reason: "node returned an empty address".to_string(),
            });
        }
        Ok(ValidatorAddress::new(address))
    }

    async fn get_account_balance(&self, address: &ValidatorAddress) -> Result<u64, GatewayError> {
        let account: AccountInfo = self
            .call_data("getAccountByAddress", [address.as_str()])
            .await?;
        Ok(account.balance)
    }

    async fn get_validator(
        &self,
        address: &ValidatorAddress,
    ) -> Result<Option<ValidatorRecord>, GatewayError> {
        match self
            .call_data::<_, Option<ValidatorRecord>>("getValidatorByAddress", [address.as_str()])
            .await
        {
            Ok(record) => Ok(record),
            // The node reports unknown validators with an error payload.
            Err(GatewayError::Rpc(error)) if error.is_not_found() => {
                tracing::debug!(%address, %error, "Validator not found on chain");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_total_stake(&self, address: &ValidatorAddress) -> Result<u64, GatewayError> {
        let stakers: Vec<StakerInfo> = self
            .call_data("getStakersByValidatorAddress", [address.as_str()])
            .await?;
        Ok(stakers
            .iter()
            .fold(0u64, |total, staker| total.saturating_add(staker.balance)))
    }

    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        self.call_data("getBlockNumber", [(); 0]).await
    }

    async fn import_raw_key(
        &self,
        private_key: &str,
        passphrase: &str,
    ) -> Result<String, GatewayError> {
        let address: String = self
            .call_data("importRawKey", (private_key, passphrase))
            .await?;
        if address.is_empty() {
            return Err(GatewayError::Rejected {
                method: "importRawKey",
                reason: "no address returned".to_string(),
            });
        }
        Ok(address)
    }

    async fn unlock_account(
        &self,
        address: &ValidatorAddress,
        passphrase: &str,
        duration: u64,
    ) -> Result<(), GatewayError> {
        let unlocked: bool = self
            .call_data("unlockAccount", (address.as_str(), passphrase, duration))
            .await?;
        if !unlocked {
            return Err(GatewayError::Rejected {
                method: "unlockAccount",
                reason: "account is still locked".to_string(),
            });
        }
        Ok(())
    }

    async fn create_new_validator_transaction(
        &self,
        tx: &NewValidatorTransaction<'_>,
    ) -> Result<String, GatewayError> {
        let params = (
            tx.sender.as_str(),
            tx.validator.as_str(),
            tx.signing_secret_key,
            tx.voting_secret_key,
            tx.reward_address.as_str(),
            tx.signal_data,
            tx.fee_luna,
            tx.validity_start_height,
        );
        self.call_data("sendNewValidatorTransaction", params).await
    }

    async fn send_reactivate_validator_transaction(
        &self,
        tx: &ReactivateValidatorTransaction<'_>,
    ) -> Result<String, GatewayError> {
        let params = (
            tx.sender.as_str(),
            tx.validator.as_str(),
            tx.signing_secret_key,
            tx.fee_luna,
            tx.validity_start_height,
        );
        self.call_data("sendReactivateValidatorTransaction", params)
            .await
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, GatewayError> {
        self.call_data("sendRawTransaction", [raw_tx]).await
    }
}
