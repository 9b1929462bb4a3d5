//! Purchase ledger backed by a Hasura insert with on-conflict-do-nothing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::{PurchaseRecord, RecordOutcome};
use crate::graphql::GraphqlExecutor;
use crate::ports::{LedgerError, PurchaseLedger};

/// The unique constraint on (user_id, recipe_id) is what makes concurrent
/// confirmations converge; `update_columns: []` turns a conflict into a no-op.
const RECORD_PURCHASE_MUTATION: &str = r#"
mutation RecordPurchase($user_id: uuid!, $recipe_id: uuid!, $chapa_transaction_ref: String!, $amount: numeric!, $currency: String!) {
  insert_user_purchased_recipes_one(
    object: {
      user_id: $user_id, recipe_id: $recipe_id, chapa_transaction_ref: $chapa_transaction_ref,
      amount_paid: $amount, currency: $currency
    },
    on_conflict: { constraint: user_purchased_recipes_user_id_recipe_id_key, update_columns: [] }
  ) { id }
}"#;

#[derive(Clone)]
pub struct HasuraLedger {
    executor: Arc<dyn GraphqlExecutor>,
}

impl HasuraLedger {
    pub fn new(executor: Arc<dyn GraphqlExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl PurchaseLedger for HasuraLedger {
    async fn record_if_absent(&self, record: &PurchaseRecord) -> Result<RecordOutcome, LedgerError> {
        let variables = json!({
            "user_id": record.user_id,
            "recipe_id": record.item_id,
            "chapa_transaction_ref": record.reference.as_str(),
            "amount": record.amount.to_string(),
            "currency": record.currency,
        });

        let data = self
            .executor
            .execute(RECORD_PURCHASE_MUTATION, variables)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    LedgerError::Unavailable(e.to_string())
                } else {
                    LedgerError::Rejected(e.to_string())
                }
            })?;

        match data.get("insert_user_purchased_recipes_one") {
            Some(Value::Null) => Ok(RecordOutcome::AlreadyRecorded),
            Some(Value::Object(_)) => Ok(RecordOutcome::Inserted),
            _ => Err(LedgerError::Rejected(
                "mutation response is missing insert_user_purchased_recipes_one".to_string(),
            )),
        }
    }
}
