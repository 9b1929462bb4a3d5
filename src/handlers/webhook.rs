use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::chapa::WebhookNotification;
use crate::domain::TransactionReference;
use crate::error::AppError;
use crate::AppState;

/// Provider push notification. The signature layer has already authenticated
/// the raw body. Once past it, the provider always gets a 200 so it stops
/// retrying; reconciliation failures are logged for manual follow-up.
pub async fn push(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let notification: WebhookNotification = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Notification body is not valid JSON");
        AppError::Validation("Invalid notification payload.".to_string())
    })?;

    if !notification.is_charge_event() {
        tracing::info!(event = ?notification.event, "Ignoring non-charge notification");
        return Ok(Json(json!({ "status": "ignored" })).into_response());
    }

    let transaction = notification.into_transaction().map_err(|reason| {
        tracing::warn!(reason = %reason, "Notification is missing required fields");
        AppError::Validation(format!("Invalid notification payload: {}.", reason))
    })?;
    let reference = transaction.reference.clone();

    let reconciler = state.reconciler.clone();
    let result = tokio::spawn(async move { reconciler.reconcile_push(transaction).await })
        .await
        .map_err(|e| AppError::Internal(format!("reconcile task failed: {}", e)))?;

    let status = match result {
        Ok(outcome) if outcome.is_confirmed() => "confirmed",
        Ok(_) => "failed",
        Err(AppError::Metadata { .. } | AppError::Persistence { .. }) => "accepted",
        Err(e) => {
            tracing::error!(tx_ref = %reference, error = %e, "Notification could not be reconciled");
            "accepted"
        }
    };

    Ok(Json(json!({ "status": status })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub tx_ref: Option<String>,
    /// Alias some provider return URLs use.
    pub trx_ref: Option<String>,
}

impl RedirectQuery {
    /// First of the two parameters that holds a well-formed reference.
    pub fn reference(&self) -> Option<TransactionReference> {
        [self.tx_ref.as_deref(), self.trx_ref.as_deref()]
            .into_iter()
            .flatten()
            .find_map(TransactionReference::parse)
    }
}

/// Browser return after checkout. Nothing in the query is trusted beyond the
/// reference; the status page is told what the provider says.
pub async fn redirect(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    let Some(reference) = query.reference() else {
        tracing::warn!(
            tx_ref = ?query.tx_ref,
            trx_ref = ?query.trx_ref,
            "Redirect without a usable reference"
        );
        return status_redirect(&state.status_page_url, false, None);
    };

    // Detached so a closed browser tab does not cancel the ledger write.
    let reconciler = state.reconciler.clone();
    let task_reference = reference.clone();
    let result =
        tokio::spawn(async move { reconciler.reconcile_redirect(&task_reference).await }).await;

    match result {
        Ok(Ok(outcome)) => status_redirect(
            &state.status_page_url,
            outcome.is_confirmed(),
            outcome.item_id(),
        ),
        Ok(Err(AppError::Persistence { item_id, .. })) => {
            status_redirect(&state.status_page_url, false, Some(&item_id))
        }
        Ok(Err(e)) => {
            tracing::warn!(tx_ref = %reference, error = %e, "Redirect could not be reconciled");
            status_redirect(&state.status_page_url, false, None)
        }
        Err(e) => {
            tracing::error!(tx_ref = %reference, error = %e, "Reconcile task failed");
            status_redirect(&state.status_page_url, false, None)
        }
    }
}

fn status_redirect(status_page: &Url, success: bool, item_id: Option<&str>) -> Response {
    let mut location = status_page.clone();
    {
        let mut query = location.query_pairs_mut();
        query.append_pair("status", if success { "success" } else { "failed" });
        if let Some(item_id) = item_id {
            query.append_pair("item_id", item_id);
        }
    }

    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_redirect_location() {
        let page = Url::parse("https://shop.example.com/payment/status").unwrap();

        let ok = status_redirect(&page, true, Some("R1"));
        let failed = status_redirect(&page, false, None);

        assert_eq!(ok.status(), StatusCode::FOUND);
        assert_eq!(
            ok.headers()[header::LOCATION],
            "https://shop.example.com/payment/status?status=success&item_id=R1"
        );
        assert_eq!(
            failed.headers()[header::LOCATION],
            "https://shop.example.com/payment/status?status=failed"
        );
    }

    #[test]
    fn test_redirect_query_takes_first_usable_reference() {
        let query = |tx: Option<&str>, trx: Option<&str>| RedirectQuery {
            tx_ref: tx.map(str::to_string),
            trx_ref: trx.map(str::to_string),
        };

        let masked = query(Some("<bad>"), Some("tx-1")).reference();
        let both = query(Some("tx-1"), Some("tx-2")).reference();
        let neither = query(Some("<bad>"), Some("")).reference();

        assert_eq!(masked.unwrap().as_str(), "tx-1");
        assert_eq!(both.unwrap().as_str(), "tx-1");
        assert!(neither.is_none());
    }
}
