//! Payment status reconciliation.
//!
//! Two channels report the outcome of a checkout. The push notification is
//! signature-authenticated, so its body is trusted. The browser redirect is not
//! authenticated at all, so only its reference is used and the status is
//! fetched from the provider. Both end in the same idempotent ledger write.

use std::fmt;
use std::sync::Arc;

use crate::domain::{
    CorrelationMetadata, ProviderTransaction, PurchaseRecord, RecordOutcome, TransactionReference,
};
use crate::error::AppError;
use crate::ports::{LedgerError, PaymentProvider, PurchaseLedger};
use crate::utils::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Push,
    Redirect,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Push => f.write_str("push"),
            Channel::Redirect => f.write_str("redirect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Confirmed {
        record: PurchaseRecord,
        outcome: RecordOutcome,
    },
    Failed {
        reference: TransactionReference,
        status: String,
        item_id: Option<String>,
    },
}

impl ReconcileOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ReconcileOutcome::Confirmed { .. })
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            ReconcileOutcome::Confirmed { record, .. } => Some(&record.item_id),
            ReconcileOutcome::Failed { item_id, .. } => item_id.as_deref(),
        }
    }
}

pub struct StatusReconciler {
    provider: Arc<dyn PaymentProvider>,
    ledger: Arc<dyn PurchaseLedger>,
    ledger_retry: RetryPolicy,
    push_reverify: bool,
}

impl StatusReconciler {
    pub fn new(provider: Arc<dyn PaymentProvider>, ledger: Arc<dyn PurchaseLedger>) -> Self {
        Self {
            provider,
            ledger,
            ledger_retry: RetryPolicy::default(),
            push_reverify: false,
        }
    }

    pub fn with_ledger_retry(mut self, policy: RetryPolicy) -> Self {
        self.ledger_retry = policy;
        self
    }

    /// When set, push notifications are only used for their reference and the
    /// status is re-fetched from the provider.
    pub fn with_push_reverify(mut self, push_reverify: bool) -> Self {
        self.push_reverify = push_reverify;
        self
    }

    /// Reconciles a signature-verified push notification.
    pub async fn reconcile_push(
        &self,
        notification: ProviderTransaction,
    ) -> Result<ReconcileOutcome, AppError> {
        if self.push_reverify {
            return self
                .verify_and_settle(&notification.reference, Channel::Push)
                .await;
        }
        self.settle(notification, Channel::Push).await
    }

    /// Reconciles a browser redirect. Nothing but the reference is taken from
    /// the caller.
    pub async fn reconcile_redirect(
        &self,
        reference: &TransactionReference,
    ) -> Result<ReconcileOutcome, AppError> {
        self.verify_and_settle(reference, Channel::Redirect).await
    }

    async fn verify_and_settle(
        &self,
        reference: &TransactionReference,
        channel: Channel,
    ) -> Result<ReconcileOutcome, AppError> {
        let transaction = self.provider.verify(reference).await.map_err(|e| {
            tracing::warn!(
                tx_ref = %reference,
                channel = %channel,
                error = %e,
                "Payment verification failed"
            );
            AppError::from(e)
        })?;
        self.settle(transaction, channel).await
    }

    async fn settle(
        &self,
        transaction: ProviderTransaction,
        channel: Channel,
    ) -> Result<ReconcileOutcome, AppError> {
        if !transaction.is_success() {
            tracing::info!(
                tx_ref = %transaction.reference,
                channel = %channel,
                status = %transaction.status,
                "Payment not successful, nothing recorded"
            );
            return Ok(ReconcileOutcome::Failed {
                item_id: transaction.item_hint(),
                reference: transaction.reference,
                status: transaction.status,
            });
        }

        let metadata = CorrelationMetadata::from_map(transaction.metadata.as_ref()).map_err(
            |reason| {
                tracing::error!(
                    tx_ref = %transaction.reference,
                    channel = %channel,
                    amount = %transaction.amount,
                    currency = %transaction.currency,
                    reason = %reason,
                    "Successful payment carries unusable metadata; manual reconciliation required"
                );
                AppError::Metadata {
                    reference: transaction.reference.to_string(),
                    reason,
                }
            },
        )?;

        let record = PurchaseRecord {
            user_id: metadata.user_id,
            item_id: metadata.item_id,
            reference: transaction.reference,
            amount: transaction.amount,
            currency: transaction.currency,
        };

        let outcome = self
            .ledger_retry
            .run(
                "ledger.record_if_absent",
                || self.ledger.record_if_absent(&record),
                LedgerError::is_transient,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    tx_ref = %record.reference,
                    user_id = %record.user_id,
                    item_id = %record.item_id,
                    channel = %channel,
                    error = %e,
                    "Could not record purchase; manual reconciliation required"
                );
                AppError::Persistence {
                    reference: record.reference.to_string(),
                    user_id: record.user_id.clone(),
                    item_id: record.item_id.clone(),
                    reason: e.to_string(),
                }
            })?;

        match outcome {
            RecordOutcome::Inserted => tracing::info!(
                tx_ref = %record.reference,
                user_id = %record.user_id,
                item_id = %record.item_id,
                channel = %channel,
                "Purchase recorded"
            ),
            RecordOutcome::AlreadyRecorded => tracing::info!(
                tx_ref = %record.reference,
                user_id = %record.user_id,
                item_id = %record.item_id,
                channel = %channel,
                "Purchase already recorded"
            ),
        }

        Ok(ReconcileOutcome::Confirmed { record, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryLedger, InMemoryProvider};
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::str::FromStr;

    fn transaction(reference: &str, status: &str, meta: serde_json::Value) -> ProviderTransaction {
        ProviderTransaction {
            reference: TransactionReference::parse(reference).unwrap(),
            status: status.to_string(),
            amount: BigDecimal::from_str("45.00").unwrap(),
            currency: "ETB".to_string(),
            metadata: meta.as_object().cloned(),
        }
    }

    fn paid(reference: &str) -> ProviderTransaction {
        transaction(reference, "success", json!({"user_id": "U1", "item_id": "R1"}))
    }

    fn reconciler(provider: &InMemoryProvider, ledger: &InMemoryLedger) -> StatusReconciler {
        StatusReconciler::new(Arc::new(provider.clone()), Arc::new(ledger.clone()))
            .with_ledger_retry(RetryPolicy::default().no_delay())
    }

    #[tokio::test]
    async fn test_push_success_records_purchase() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();

        let outcome = reconciler(&provider, &ledger)
            .reconcile_push(paid("tx-1"))
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        let records = ledger.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "U1");
        assert_eq!(records[0].item_id, "R1");
        assert_eq!(records[0].reference.as_str(), "tx-1");
        assert_eq!(records[0].amount, BigDecimal::from_str("45").unwrap());
        assert_eq!(provider.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_reconciles_record_once() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        let reconciler = reconciler(&provider, &ledger);

        let first = reconciler.reconcile_push(paid("tx-1")).await.unwrap();
        for _ in 0..4 {
            let again = reconciler.reconcile_push(paid("tx-1")).await.unwrap();
            assert!(matches!(
                again,
                ReconcileOutcome::Confirmed {
                    outcome: RecordOutcome::AlreadyRecorded,
                    ..
                }
            ));
        }

        assert!(matches!(
            first,
            ReconcileOutcome::Confirmed {
                outcome: RecordOutcome::Inserted,
                ..
            }
        ));
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_status_writes_nothing() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();

        let outcome = reconciler(&provider, &ledger)
            .reconcile_push(transaction(
                "tx-1",
                "failed",
                json!({"user_id": "U1", "item_id": "R1"}),
            ))
            .await
            .unwrap();

        assert_eq!(outcome.item_id(), Some("R1"));
        assert!(!outcome.is_confirmed());
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_redirect_trusts_provider_not_caller() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        provider
            .settle(transaction(
                "tx-1",
                "failed",
                json!({"user_id": "U1", "item_id": "R1"}),
            ))
            .await;

        let outcome = reconciler(&provider, &ledger)
            .reconcile_redirect(&TransactionReference::parse("tx-1").unwrap())
            .await
            .unwrap();

        assert!(!outcome.is_confirmed());
        assert_eq!(provider.verify_calls(), 1);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_redirect_for_unknown_reference_is_rejected() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();

        let err = reconciler(&provider, &ledger)
            .reconcile_redirect(&TransactionReference::parse("tx-made-up").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProviderRejected(_)));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_metadata_is_metadata_error() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        let reconciler = reconciler(&provider, &ledger);

        let no_item = reconciler
            .reconcile_push(transaction("tx-1", "success", json!({"user_id": "U1"})))
            .await
            .unwrap_err();
        let no_meta = reconciler
            .reconcile_push(transaction("tx-2", "success", json!(null)))
            .await
            .unwrap_err();

        assert!(matches!(no_item, AppError::Metadata { .. }));
        assert!(matches!(no_meta, AppError::Metadata { .. }));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_transient_ledger_failure_is_retried() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        ledger.fail_next(2);

        let outcome = reconciler(&provider, &ledger)
            .reconcile_push(paid("tx-1"))
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_ledger_retries_is_persistence_error() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        ledger.fail_next(5);

        let err = reconciler(&provider, &ledger)
            .reconcile_push(paid("tx-1"))
            .await
            .unwrap_err();

        match err {
            AppError::Persistence {
                reference,
                user_id,
                item_id,
                ..
            } => {
                assert_eq!(reference, "tx-1");
                assert_eq!(user_id, "U1");
                assert_eq!(item_id, "R1");
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_push_reverify_ignores_payload_status() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        provider
            .settle(transaction(
                "tx-1",
                "failed",
                json!({"user_id": "U1", "item_id": "R1"}),
            ))
            .await;

        let outcome = reconciler(&provider, &ledger)
            .with_push_reverify(true)
            .reconcile_push(paid("tx-1"))
            .await
            .unwrap();

        assert!(!outcome.is_confirmed());
        assert_eq!(provider.verify_calls(), 1);
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_push_and_redirect_converge() {
        let provider = InMemoryProvider::new();
        let ledger = InMemoryLedger::new();
        provider.settle(paid("tx-1")).await;
        let reconciler = Arc::new(reconciler(&provider, &ledger));
        let reference = TransactionReference::parse("tx-1").unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let reconciler = reconciler.clone();
            let reference = reference.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    reconciler.reconcile_push(paid("tx-1")).await
                } else {
                    reconciler.reconcile_redirect(&reference).await
                }
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_confirmed());
        }
        assert_eq!(ledger.len().await, 1);
    }
}
