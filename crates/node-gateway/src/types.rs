//! Wire and domain types for the Nimiq JSON-RPC interface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest units (Luna) per whole NIM.
pub const LUNA_PER_NIM: u64 = 100_000;

/// Convert a Luna amount to whole NIM, for display only.
pub fn luna_to_nim(luna: u64) -> f64 {
    luna as f64 / LUNA_PER_NIM as f64
}

/// Account identifier of the supervised validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorAddress(String);

impl ValidatorAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValidatorAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for ValidatorAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// On-chain validator entry as returned by `getValidatorByAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecord {
    #[serde(default)]
    pub address: String,
    /// Validator deposit in Luna
    pub balance: u64,
    #[serde(default)]
    pub num_stakers: u64,
    #[serde(default)]
    pub inactivity_flag: Option<u64>,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub jailed_from: Option<u64>,
}

/// Account entry from `getAccountByAddress`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub balance: u64,
}

/// Staker entry from `getStakersByValidatorAddress`.
#[derive(Debug, Clone, Deserialize)]
pub struct StakerInfo {
    #[serde(default)]
    pub balance: u64,
}

/// Parameters of `sendNewValidatorTransaction`.
pub struct NewValidatorTransaction<'a> {
    pub sender: &'a ValidatorAddress,
    pub validator: &'a ValidatorAddress,
    pub signing_secret_key: &'a str,
    pub voting_secret_key: &'a str,
    pub reward_address: &'a ValidatorAddress,
    pub signal_data: &'a str,
    pub fee_luna: u64,
    pub validity_start_height: &'a str,
}

impl fmt::Debug for NewValidatorTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewValidatorTransaction")
            .field("sender", self.sender)
            .field("validator", self.validator)
            .field("signing_secret_key", &"***")
            .field("voting_secret_key", &"***")
            .field("reward_address", self.reward_address)
            .field("fee_luna", &self.fee_luna)
            .field("validity_start_height", &self.validity_start_height)
            .finish()
    }
}

/// Parameters of `sendReactivateValidatorTransaction`.
pub struct ReactivateValidatorTransaction<'a> {
    pub sender: &'a ValidatorAddress,
    pub validator: &'a ValidatorAddress,
    pub signing_secret_key: &'a str,
    pub fee_luna: u64,
    pub validity_start_height: &'a str,
}

impl fmt::Debug for ReactivateValidatorTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactivateValidatorTransaction")
            .field("sender", self.sender)
            .field("validator", self.validator)
            .field("signing_secret_key", &"***")
            .field("fee_luna", &self.fee_luna)
            .field("validity_start_height", &self.validity_start_height)
            .finish()
    }
}

// =============================================================================
// JSON-RPC envelope
// =============================================================================

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a, T> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: T,
    pub id: u64,
}

impl<'a, T> JsonRpcRequest<'a, T> {
    pub fn new(method: &'a str, params: T, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
            id,
        }
    }
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error payload
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Whether the node reports the requested object as unknown.
    pub fn is_not_found(&self) -> bool {
        self.message.to_ascii_lowercase().contains("not found")
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

/// Nimiq wraps every result as `{"data": ..., "metadata": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcData<T> {
    pub data: T,
}
