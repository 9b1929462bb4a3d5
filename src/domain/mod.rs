pub mod purchase;
pub mod transaction;

pub use purchase::{CatalogItem, CheckoutRequest, Customer, PurchaseRecord, RecordOutcome};
pub use transaction::{
    amount_from_value, CorrelationMetadata, PendingTransaction, ProviderTransaction,
    TransactionReference,
};
