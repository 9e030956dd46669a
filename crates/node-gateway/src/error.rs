//! Gateway error type.

use thiserror::Error;

use crate::types::JsonRpcError;

/// Errors that can occur when talking to the node.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    /// The node answered with an `error` payload.
    #[error("{0}")]
    Rpc(JsonRpcError),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The node answered, but with a value that means the call did not take effect.
    #[error("{method} rejected: {reason}")]
    Rejected {
        method: &'static str,
        reason: String,
    },
}

impl GatewayError {
    /// Whether the node itself answered with an error payload.
    pub fn is_rpc(&self) -> bool {
        matches!(self, GatewayError::Rpc(_))
    }
}
