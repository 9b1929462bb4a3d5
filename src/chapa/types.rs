//! Wire types for the Chapa REST API and its webhook payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{amount_from_value, CheckoutRequest, ProviderTransaction, TransactionReference};

#[derive(Debug, Serialize)]
pub struct InitializeBody {
    pub amount: String,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
    #[serde(rename = "customization[title]")]
    pub custom_title: String,
    #[serde(rename = "customization[description]")]
    pub custom_description: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl From<&CheckoutRequest> for InitializeBody {
    fn from(req: &CheckoutRequest) -> Self {
        Self {
            amount: req.amount.round(2).with_scale(2).to_string(),
            currency: req.currency.clone(),
            email: req.email.clone(),
            first_name: req.first_name.clone(),
            last_name: req.last_name.clone(),
            tx_ref: req.reference.to_string(),
            callback_url: req.callback_url.clone(),
            return_url: req.return_url.clone(),
            custom_title: req.title.clone(),
            custom_description: req.description.clone(),
            meta: req.metadata.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InitializeResponse {
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub status: String,
    pub data: Option<CheckoutData>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutData {
    #[serde(default)]
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub status: String,
    pub data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub tx_ref: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub meta: Value,
}

impl VerifyData {
    pub fn into_transaction(
        self,
        requested: &TransactionReference,
    ) -> Result<ProviderTransaction, String> {
        let reference = match self.tx_ref.as_deref() {
            None => requested.clone(),
            Some(echoed) if echoed == requested.as_str() => requested.clone(),
            Some(echoed) => {
                return Err(format!(
                    "verify for {} answered for a different reference {}",
                    requested, echoed
                ))
            }
        };
        if self.status.trim().is_empty() {
            return Err("verify response carries no status".to_string());
        }
        let amount = amount_from_value(&self.amount)
            .ok_or_else(|| format!("unparseable amount {}", self.amount))?;

        Ok(ProviderTransaction {
            reference,
            status: self.status,
            amount,
            currency: self.currency,
            metadata: meta_map(self.meta),
        })
    }
}

/// Push notification body. Only the fields the reconciler relies on are typed.
#[derive(Debug, Deserialize)]
pub struct WebhookNotification {
    pub event: Option<String>,
    pub tx_ref: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Value,
    pub currency: Option<String>,
    #[serde(default)]
    pub meta: Value,
}

impl WebhookNotification {
    /// Charge events drive purchases; anything else (payouts, refunds) is
    /// acknowledged and ignored.
    pub fn is_charge_event(&self) -> bool {
        match self.event.as_deref() {
            None => true,
            Some(event) => event.starts_with("charge."),
        }
    }

    pub fn into_transaction(self) -> Result<ProviderTransaction, String> {
        let reference = self
            .tx_ref
            .as_deref()
            .and_then(TransactionReference::parse)
            .ok_or_else(|| "missing or malformed tx_ref".to_string())?;
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "missing status".to_string())?;
        let amount =
            amount_from_value(&self.amount).ok_or_else(|| "missing or malformed amount".to_string())?;
        let currency = self
            .currency
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "missing currency".to_string())?;

        Ok(ProviderTransaction {
            reference,
            status,
            amount,
            currency,
            metadata: meta_map(self.meta),
        })
    }
}

fn meta_map(meta: Value) -> Option<Map<String, Value>> {
    match meta {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Chapa error body. `message` is either a string or a map of field name to
/// a list of validation messages.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub remarks: Option<String>,
}

pub const UNKNOWN_PROVIDER_ERROR: &str = "An unknown payment provider error occurred";

impl ApiErrorBody {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    pub fn describe(&self) -> String {
        if let Some(remarks) = self.remarks.as_deref().filter(|r| !r.is_empty()) {
            return remarks.to_string();
        }
        describe_message(&self.message).unwrap_or_else(|| UNKNOWN_PROVIDER_ERROR.to_string())
    }
}

/// Flattens a provider `message` field to a single human-readable line.
pub fn describe_message(message: &Value) -> Option<String> {
    match message {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(fields) => fields.values().find_map(|errors| match errors {
            Value::Array(list) => list.iter().find_map(|e| e.as_str().map(str::to_string)),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_error_body_with_string_message() {
        let body = ApiErrorBody::parse(r#"{"message":"Invalid API Key","status":"failed"}"#);
        assert_eq!(body.describe(), "Invalid API Key");
    }

    #[test]
    fn test_error_body_with_validation_map_takes_first_message() {
        let body = ApiErrorBody::parse(
            r#"{"message":{"email":["The email must be a valid email address."]},"status":"failed"}"#,
        );
        assert_eq!(body.describe(), "The email must be a valid email address.");
    }

    #[test]
    fn test_error_body_prefers_remarks() {
        let body = ApiErrorBody::parse(r#"{"message":"x","remarks":"Duplicate tx_ref"}"#);
        assert_eq!(body.describe(), "Duplicate tx_ref");
    }

    #[test]
    fn test_error_body_garbage_falls_back() {
        assert_eq!(ApiErrorBody::parse("<html>502</html>").describe(), UNKNOWN_PROVIDER_ERROR);
        assert_eq!(ApiErrorBody::parse(r#"{"message":42}"#).describe(), UNKNOWN_PROVIDER_ERROR);
    }

    #[test]
    fn test_initialize_body_wire_format() {
        let mut meta = Map::new();
        meta.insert("user_id".into(), json!("U1"));
        let request = CheckoutRequest {
            reference: TransactionReference::parse("tx-abc").unwrap(),
            amount: BigDecimal::from_str("45").unwrap(),
            currency: "ETB".into(),
            email: "u1@example.com".into(),
            first_name: "u1".into(),
            last_name: "User".into(),
            callback_url: "https://api.example.com/payments/webhook".into(),
            return_url: "https://api.example.com/payments/webhook?tx_ref=tx-abc".into(),
            title: "Purchase".into(),
            description: "Payment for: Doro Wat".into(),
            metadata: meta,
        };

        let wire = serde_json::to_value(InitializeBody::from(&request)).unwrap();

        assert_eq!(wire["amount"], "45.00");
        assert_eq!(wire["tx_ref"], "tx-abc");
        assert_eq!(wire["customization[title]"], "Purchase");
        assert_eq!(wire["meta"]["user_id"], "U1");
    }

    #[test]
    fn test_initialize_amount_is_rounded_to_cents() {
        let mut request = CheckoutRequest {
            reference: TransactionReference::parse("tx-abc").unwrap(),
            amount: BigDecimal::from_str("45.006").unwrap(),
            currency: "ETB".into(),
            email: "u1@example.com".into(),
            first_name: "u1".into(),
            last_name: "User".into(),
            callback_url: "https://api.example.com/payments/webhook".into(),
            return_url: "https://api.example.com/payments/webhook?tx_ref=tx-abc".into(),
            title: "Purchase".into(),
            description: "Payment for: Doro Wat".into(),
            metadata: Map::new(),
        };
        assert_eq!(InitializeBody::from(&request).amount, "45.01");

        request.amount = BigDecimal::from_str("45.004").unwrap();
        assert_eq!(InitializeBody::from(&request).amount, "45.00");
    }

    #[test]
    fn test_webhook_notification_requires_reference_and_status() {
        let missing_ref: WebhookNotification =
            serde_json::from_value(json!({"status":"success","amount":"1","currency":"ETB"}))
                .unwrap();
        assert!(missing_ref.into_transaction().is_err());

        let missing_status: WebhookNotification =
            serde_json::from_value(json!({"tx_ref":"tx-1","amount":"1","currency":"ETB"}))
                .unwrap();
        assert!(missing_status.into_transaction().is_err());
    }

    #[test]
    fn test_webhook_event_filter() {
        let payout: WebhookNotification =
            serde_json::from_value(json!({"event":"payout.success"})).unwrap();
        let charge: WebhookNotification =
            serde_json::from_value(json!({"event":"charge.success"})).unwrap();
        assert!(!payout.is_charge_event());
        assert!(charge.is_charge_event());
    }

    #[test]
    fn test_verify_data_rejects_foreign_reference() {
        let data: VerifyData = serde_json::from_value(json!({
            "tx_ref": "tx-other", "status": "success", "amount": 10, "currency": "ETB"
        }))
        .unwrap();
        let requested = TransactionReference::parse("tx-mine").unwrap();
        assert!(data.into_transaction(&requested).is_err());
    }
}
