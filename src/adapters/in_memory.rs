//! In-process implementations of the collaborator ports.
//!
//! The ledger enforces the same (user id, item id) uniqueness rule as the
//! real table, atomically, so concurrency properties of the reconciler can be
//! exercised without a database. Used by tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::{
    CatalogItem, CheckoutRequest, Customer, ProviderTransaction, PurchaseRecord, RecordOutcome,
    TransactionReference,
};
use crate::ports::{
    Catalog, CatalogError, LedgerError, PaymentProvider, ProviderError, PurchaseLedger,
};

#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    items: Arc<RwLock<HashMap<String, CatalogItem>>>,
    users: Arc<RwLock<HashMap<String, Customer>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_item(&self, item: CatalogItem) {
        self.items.write().await.insert(item.id.clone(), item);
    }

    pub async fn add_user(&self, user: Customer) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_item(&self, item_id: &str) -> Result<CatalogItem, CatalogError> {
        self.items
            .read()
            .await
            .get(item_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound("Item".to_string()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Customer, CatalogError> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound("User".to_string()))
    }
}

/// Ledger keyed on (user id, item id). `fail_next` injects transient write failures.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    records: Arc<RwLock<HashMap<(String, String), PurchaseRecord>>>,
    failures_remaining: Arc<AtomicU32>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail before touching storage.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<PurchaseRecord> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PurchaseLedger for InMemoryLedger {
    async fn record_if_absent(&self, record: &PurchaseRecord) -> Result<RecordOutcome, LedgerError> {
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(LedgerError::Unavailable("injected write failure".to_string()));
        }

        let key = (record.user_id.clone(), record.item_id.clone());
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Ok(RecordOutcome::AlreadyRecorded);
        }
        records.insert(key, record.clone());
        Ok(RecordOutcome::Inserted)
    }
}

/// Provider double: verify answers come from registered transactions, and
/// initialize calls are captured for inspection.
#[derive(Default, Clone)]
pub struct InMemoryProvider {
    transactions: Arc<RwLock<HashMap<TransactionReference, ProviderTransaction>>>,
    initialized: Arc<RwLock<Vec<CheckoutRequest>>>,
    verify_calls: Arc<AtomicU32>,
    unreachable: Arc<AtomicBool>,
    verify_delay_ms: Arc<AtomicU64>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the provider's authoritative view of a transaction.
    pub async fn settle(&self, transaction: ProviderTransaction) {
        self.transactions
            .write()
            .await
            .insert(transaction.reference.clone(), transaction);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Holds every verify answer back by `delay`, standing in for a slow provider.
    pub fn set_verify_delay(&self, delay: Duration) {
        self.verify_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn initialized(&self) -> Vec<CheckoutRequest> {
        self.initialized.read().await.clone()
    }

    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for InMemoryProvider {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<String, ProviderError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".to_string()));
        }
        self.initialized.write().await.push(request.clone());
        Ok(format!("https://checkout.test/pay/{}", request.reference))
    }

    async fn verify(
        &self,
        reference: &TransactionReference,
    ) -> Result<ProviderTransaction, ProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.verify_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("connection refused".to_string()));
        }
        self.transactions
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected {
                status: 404,
                message: "Invalid transaction or Transaction not found".to_string(),
            })
    }
}
