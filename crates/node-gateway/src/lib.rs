//! # node-gateway
//!
//! Request/response access to a Nimiq node over JSON-RPC 2.0.
//!
//! The [`NodeGateway`] trait is the seam the validator lifecycle controller
//! depends on; [`NimiqRpcClient`] is the HTTP implementation. Every call is
//! stateless apart from the endpoint address.
//!
//! ```rust,ignore
//! use node_gateway::{NimiqRpcClient, NodeGateway};
//!
//! let client = NimiqRpcClient::new("http://node:8648")?;
//! let address = client.get_address().await?;
//! let balance = client.get_account_balance(&address).await?;
//! ```

mod client;
mod error;
mod ports;
mod types;

pub use client::{NimiqRpcClient, DEFAULT_TIMEOUT};
pub use error::GatewayError;
pub use ports::NodeGateway;
pub use types::{
    luna_to_nim, AccountInfo, JsonRpcError, NewValidatorTransaction,
    ReactivateValidatorTransaction, StakerInfo, ValidatorAddress, ValidatorRecord, LUNA_PER_NIM,
};
