//! Purchase ledger and catalog entities.

use bigdecimal::BigDecimal;
use serde::Serialize;

use super::transaction::TransactionReference;

/// A confirmed purchase. At most one exists per (user id, item id).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub user_id: String,
    pub item_id: String,
    pub reference: TransactionReference,
    pub amount: BigDecimal,
    pub currency: String,
}

/// Result of an idempotent ledger write. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    AlreadyRecorded,
}

#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// Everything the provider needs to open a hosted checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub reference: TransactionReference,
    pub amount: BigDecimal,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub callback_url: String,
    pub return_url: String,
    pub title: String,
    pub description: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
