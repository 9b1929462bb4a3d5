//! Seams between the reconciler core and its collaborators.
//! Implementations live in `chapa` (provider) and `adapters` (catalog, ledger).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    CatalogItem, CheckoutRequest, Customer, ProviderTransaction, PurchaseRecord, RecordOutcome,
    TransactionReference,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("could not reach payment provider: {0}")]
    Network(String),
    #[error("payment provider unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },
    #[error("payment provider rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response from payment provider: {0}")]
    InvalidResponse(String),
    #[error("payment provider circuit breaker is open")]
    CircuitOpen,
}

impl ProviderError {
    /// Network-level failures and server-side outages may be retried; a
    /// well-formed rejection may not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Unavailable { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("catalog lookup failed: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger rejected the write: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// The write is idempotent, so anything short of an outright rejection
    /// may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Opens a hosted checkout and returns its URL. Must not be retried with
    /// the same reference after an ambiguous failure.
    async fn initialize(&self, request: &CheckoutRequest) -> Result<String, ProviderError>;

    /// Authoritative, read-only status lookup.
    async fn verify(
        &self,
        reference: &TransactionReference,
    ) -> Result<ProviderTransaction, ProviderError>;

    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_item(&self, item_id: &str) -> Result<CatalogItem, CatalogError>;
    async fn get_user(&self, user_id: &str) -> Result<Customer, CatalogError>;
}

#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Inserts the record unless one already exists for its (user, item) pair.
    /// Must be atomic at the storage layer; callers never read before writing.
    async fn record_if_absent(&self, record: &PurchaseRecord) -> Result<RecordOutcome, LedgerError>;
}
