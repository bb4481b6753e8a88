//! Async HTTP client for the transaction store's REST API.

use common::{NewTransaction, Transaction, TransactionId, TransactionPatch};
use serde::Deserialize;
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (connection refused, DNS failure, etc.), or the
    /// response body could not be read or decoded.
    #[error("could not reach the transaction store: {0}")]
    Network(#[from] reqwest::Error),

    /// The store answered with a failure status. `message` carries the body's `message` field
    /// when the store provided one.
    #[error("the transaction store rejected the request ({status})")]
    Rejected { status: u16, message: Option<String> },
}

impl StoreError {
    /// The store's failure message, when one was returned.
    pub fn into_message(self) -> Option<String> {
        match self {
            StoreError::Rejected { message, .. } => message,
            StoreError::Network(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionEnvelope {
    transaction: Transaction,
}

#[derive(Debug, Deserialize)]
struct TransactionListEnvelope {
    transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// A client for the transaction store's REST API.
///
/// Holds the base URL and the bearer token of the signed-in user; every request carries the
/// token in the `Authorization` header. The client applies no timeouts and never retries,
/// callers decide whether to dispatch an operation again.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl StoreClient {
    /// Create a client for the store at `base_url` (e.g. `http://localhost:5000`),
    /// authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        }
    }

    /// Create a client from credentials previously stored with [crate::auth::save_auth].
    ///
    /// Returns None when no credentials are saved.
    pub fn from_saved_auth() -> Option<Self> {
        let credentials = crate::auth::load_auth()?;

        Some(Self::new(credentials.api_base, credentials.token))
    }

    /// Ask the store to create `draft`, returning the stored transaction with its assigned ID.
    pub async fn create_transaction(
        &self,
        draft: &NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let response = self
            .http
            .post(self.url("/api/transactions"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope = response.json::<TransactionEnvelope>().await?;
        Ok(envelope.transaction)
    }

    /// Fetch the full collection for the signed-in user, in store order.
    pub async fn get_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let response = self
            .http
            .get(self.url("/api/transactions"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope = response.json::<TransactionListEnvelope>().await?;
        Ok(envelope.transactions)
    }

    /// Apply `patch` to the transaction with `id`, returning the updated transaction.
    pub async fn update_transaction(
        &self,
        id: &TransactionId,
        patch: &TransactionPatch,
    ) -> Result<Transaction, StoreError> {
        let response = self
            .http
            .put(self.url(&format!("/api/transactions/{id}")))
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let envelope = response.json::<TransactionEnvelope>().await?;
        Ok(envelope.transaction)
    }

    /// Delete the transaction with `id`. A success status implies deletion, any response body is
    /// ignored.
    pub async fn delete_transaction(&self, id: &TransactionId) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/transactions/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pass successful responses through; turn failure statuses into [StoreError::Rejected],
    /// salvaging the body's `message` field when there is one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);

        Err(StoreError::Rejected { status, message })
    }
}

#[cfg(test)]
mod store_client_tests {
    use super::StoreClient;

    #[test]
    fn new_strips_trailing_slashes_from_base_url() {
        let client = StoreClient::new("http://localhost:5000///", "token");

        assert_eq!(client.url("/api/transactions"), "http://localhost:5000/api/transactions");
    }
}
