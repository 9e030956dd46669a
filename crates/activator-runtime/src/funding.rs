//! Faucet access for non-production networks.

use std::time::Duration;

use async_trait::async_trait;
use node_gateway::ValidatorAddress;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FundingError {
    #[error("Faucet request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Faucet answered with status {0}")]
    Status(u16),
}

/// External source of test funds.
#[async_trait]
pub trait FundingProvider: Send + Sync {
    async fn request_funds(&self, address: &ValidatorAddress) -> Result<(), FundingError>;
}

/// HTTP faucet taking a form-encoded `address` field.
pub struct FaucetClient {
    http_client: reqwest::Client,
    url: String,
}

impl FaucetClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FundingError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FundingProvider for FaucetClient {
    async fn request_funds(&self, address: &ValidatorAddress) -> Result<(), FundingError> {
        let response = self
            .http_client
            .post(&self.url)
            .form(&[("address", address.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FundingError::Status(status.as_u16()));
        }

        tracing::debug!(%address, "Faucet accepted funding request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Form, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeFaucet {
        status: Mutex<Option<StatusCode>>,
        received: Mutex<Vec<String>>,
    }

    async fn tap(
        State(faucet): State<Arc<FakeFaucet>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> StatusCode {
        if let Some(address) = form.get("address") {
            faucet.received.lock().unwrap().push(address.clone());
        }
        faucet.status.lock().unwrap().unwrap_or(StatusCode::OK)
    }

    async fn start_faucet(status: Option<StatusCode>) -> (Arc<FakeFaucet>, FaucetClient) {
        let faucet = Arc::new(FakeFaucet {
            status: Mutex::new(status),
            ..Default::default()
        });
        let app = Router::new()
            .route("/tapit", post(tap))
            .with_state(Arc::clone(&faucet));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client =
            FaucetClient::new(format!("http://{}/tapit", addr), Duration::from_secs(5)).unwrap();
        (faucet, client)
    }

    #[tokio::test]
    async fn test_request_funds_posts_address() {
        let (faucet, client) = start_faucet(None).await;

        client
            .request_funds(&ValidatorAddress::new("NQ07 0000"))
            .await
            .unwrap();
        assert_eq!(*faucet.received.lock().unwrap(), vec!["NQ07 0000".to_string()]);
    }

    #[tokio::test]
    async fn test_non_ok_status_is_failure() {
        let (_faucet, client) = start_faucet(Some(StatusCode::TOO_MANY_REQUESTS)).await;

        let err = client
            .request_funds(&ValidatorAddress::new("NQ07"))
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::Status(429)));
    }

    #[tokio::test]
    async fn test_other_success_codes_are_failure() {
        let (_faucet, client) = start_faucet(Some(StatusCode::ACCEPTED)).await;

        let err = client
            .request_funds(&ValidatorAddress::new("NQ07"))
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::Status(202)));
    }
}
