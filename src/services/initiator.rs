use bigdecimal::{BigDecimal, Zero};
use std::sync::Arc;
use url::Url;

use crate::config::Config;
use crate::domain::{CheckoutRequest, PendingTransaction};
use crate::error::AppError;
use crate::ports::{Catalog, PaymentProvider};

const LAST_NAME_FALLBACK: &str = "User";

#[derive(Debug, Clone)]
pub struct InitiatorSettings {
    pub currency: String,
    /// Provider push target.
    pub callback_url: Url,
    /// Browser return target; the reference is appended as `tx_ref`.
    pub return_url: Url,
    pub checkout_title: String,
}

impl InitiatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            currency: config.payment_currency.clone(),
            callback_url: config.webhook_url(),
            return_url: config.webhook_url(),
            checkout_title: config.checkout_title.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub checkout_url: String,
    pub transaction: PendingTransaction,
}

/// Opens a provider checkout for one (user, item) pair.
pub struct TransactionInitiator {
    catalog: Arc<dyn Catalog>,
    provider: Arc<dyn PaymentProvider>,
    settings: InitiatorSettings,
}

impl TransactionInitiator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        provider: Arc<dyn PaymentProvider>,
        settings: InitiatorSettings,
    ) -> Self {
        Self {
            catalog,
            provider,
            settings,
        }
    }

    pub async fn initiate(
        &self,
        user_id: Option<&str>,
        item_id: Option<&str>,
    ) -> Result<Checkout, AppError> {
        let user_id = non_empty(user_id)
            .ok_or_else(|| AppError::AuthenticationRequired("Authentication required.".to_string()))?;
        let item_id =
            non_empty(item_id).ok_or_else(|| AppError::Validation("Item id is required.".to_string()))?;

        tracing::info!(user_id = %user_id, item_id = %item_id, "Initiating payment");

        let (item, customer) = tokio::try_join!(
            self.catalog.get_item(item_id),
            self.catalog.get_user(user_id)
        )?;

        if item.price <= BigDecimal::zero() {
            return Err(AppError::Validation("Item is not for sale.".to_string()));
        }

        let transaction = PendingTransaction::new(
            user_id.to_string(),
            item_id.to_string(),
            item.price.clone(),
            self.settings.currency.clone(),
        );

        let mut return_url = self.settings.return_url.clone();
        return_url
            .query_pairs_mut()
            .append_pair("tx_ref", transaction.reference.as_str());

        let request = CheckoutRequest {
            reference: transaction.reference.clone(),
            amount: transaction.amount.clone(),
            currency: transaction.currency.clone(),
            email: customer.email,
            first_name: customer.display_name,
            last_name: LAST_NAME_FALLBACK.to_string(),
            callback_url: self.settings.callback_url.to_string(),
            return_url: return_url.to_string(),
            title: self.settings.checkout_title.clone(),
            description: format!("Payment for: {}", item.title),
            metadata: transaction.metadata().to_map(),
        };

        let checkout_url = self.provider.initialize(&request).await.map_err(|e| {
            tracing::error!(
                tx_ref = %transaction.reference,
                user_id = %transaction.user_id,
                item_id = %transaction.item_id,
                error = %e,
                "Payment initialization failed"
            );
            AppError::from(e)
        })?;

        tracing::info!(
            tx_ref = %transaction.reference,
            user_id = %transaction.user_id,
            item_id = %transaction.item_id,
            "Checkout URL generated"
        );

        Ok(Checkout {
            checkout_url,
            transaction,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
