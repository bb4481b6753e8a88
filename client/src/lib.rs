//! Client-side library for the personal finance tracker.
//!
//! The centrepiece is the [Ledger]: a session-scoped cache of the signed-in user's transactions
//! with running income and expense totals, kept in sync with the REST API through four
//! asynchronous operations. The server remains the source of truth; the ledger trusts its
//! responses for identifiers and final field values.

pub use export::transactions_to_csv;
pub use ledger::{LedgerEvent, LedgerState};
pub use store_client::{StoreClient, StoreError};

use common::{NewTransaction, TransactionId, TransactionPatch};

pub mod auth;
mod export;
mod ledger;
mod store_client;

/// A [LedgerState] wired to a [StoreClient].
///
/// Each operation marks the state pending, performs one HTTP call, and applies the outcome.
/// Failures are recovered into [LedgerState::error] rather than returned, the cached data is
/// left untouched and the caller may simply dispatch the operation again.
pub struct Ledger {
    state: LedgerState,
    store: StoreClient,
}

impl Ledger {
    /// Create an empty ledger backed by `store`.
    pub fn new(store: StoreClient) -> Self {
        Self {
            state: LedgerState::new(),
            store,
        }
    }

    /// The current state, for rendering and inspection.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Create `draft` in the store and append the stored transaction to the cache.
    pub async fn create(&mut self, draft: NewTransaction) {
        self.state.apply(LedgerEvent::Pending);

        match self.store.create_transaction(&draft).await {
            Ok(transaction) => self.state.apply(LedgerEvent::CreateFulfilled(transaction)),
            Err(error) => self.reject(error, "Error adding transaction"),
        }
    }

    /// Fetch the full collection and rebuild the cache and totals from it.
    pub async fn list(&mut self) {
        self.state.apply(LedgerEvent::Pending);

        match self.store.get_transactions().await {
            Ok(transactions) => self.state.apply(LedgerEvent::ListFulfilled(transactions)),
            Err(error) => self.reject(error, "Error retrieving transactions"),
        }
    }

    /// Apply `patch` to the transaction with `id` and replace the cached entry in place.
    pub async fn update(&mut self, id: TransactionId, patch: TransactionPatch) {
        self.state.apply(LedgerEvent::Pending);

        match self.store.update_transaction(&id, &patch).await {
            Ok(transaction) => self.state.apply(LedgerEvent::UpdateFulfilled(transaction)),
            Err(error) => self.reject(error, "Error editing transaction"),
        }
    }

    /// Delete the transaction with `id` from the store and drop it from the cache.
    pub async fn delete(&mut self, id: TransactionId) {
        self.state.apply(LedgerEvent::Pending);

        match self.store.delete_transaction(&id).await {
            Ok(()) => self.state.apply(LedgerEvent::DeleteFulfilled(id)),
            Err(error) => self.reject(error, "Error deleting transaction"),
        }
    }

    /// Record a failed operation: the store's message verbatim when it sent one, otherwise the
    /// operation's fallback message.
    fn reject(&mut self, error: StoreError, fallback: &str) {
        tracing::error!("store operation failed: {error}");

        let message = error
            .into_message()
            .unwrap_or_else(|| fallback.to_string());
        self.state.apply(LedgerEvent::Rejected(message));
    }
}
