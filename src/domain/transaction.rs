//! Payment transaction domain types.
//! Framework-agnostic representation of one payment attempt and of the
//! provider's view of it.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const REFERENCE_PREFIX: &str = "tx-";
pub const REFERENCE_MAX_LEN: usize = 100;

pub const META_USER_ID: &str = "user_id";
pub const META_ITEM_ID: &str = "item_id";
/// Key used by transactions initiated before items were generalized.
pub const META_LEGACY_ITEM_ID: &str = "recipe_id";

/// Opaque, unguessable token identifying one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Issues a fresh reference from 122 bits of OS randomness.
    pub fn generate() -> Self {
        Self(format!("{}{}", REFERENCE_PREFIX, Uuid::new_v4().simple()))
    }

    /// Accepts a reference coming from an untrusted channel. Only the shape is
    /// checked; the token is never interpreted.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > REFERENCE_MAX_LEN {
            return None;
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transaction handed to the provider. Never mutated after creation; the
/// terminal status lives with the provider and in the purchase ledger.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub reference: TransactionReference,
    pub user_id: String,
    pub item_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(user_id: String, item_id: String, amount: BigDecimal, currency: String) -> Self {
        Self {
            reference: TransactionReference::generate(),
            user_id,
            item_id,
            amount,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn metadata(&self) -> CorrelationMetadata {
        CorrelationMetadata {
            user_id: self.user_id.clone(),
            item_id: self.item_id.clone(),
        }
    }
}

/// Data attached at initiation and echoed back verbatim by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationMetadata {
    pub user_id: String,
    pub item_id: String,
}

impl CorrelationMetadata {
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(META_USER_ID.to_string(), Value::String(self.user_id.clone()));
        map.insert(META_ITEM_ID.to_string(), Value::String(self.item_id.clone()));
        map
    }

    /// Extracts the user/item pair from a provider-supplied map. Both ids must
    /// be non-empty strings.
    pub fn from_map(map: Option<&Map<String, Value>>) -> Result<Self, String> {
        let map = map.ok_or_else(|| "transaction carries no metadata".to_string())?;

        let user_id = string_field(map, META_USER_ID)
            .ok_or_else(|| format!("metadata is missing a string '{}'", META_USER_ID))?;
        // The legacy key only counts when the current one is absent altogether.
        let item_key = if map.contains_key(META_ITEM_ID) {
            META_ITEM_ID
        } else {
            META_LEGACY_ITEM_ID
        };
        let item_id = string_field(map, item_key)
            .ok_or_else(|| format!("metadata is missing a string '{}'", META_ITEM_ID))?;

        Ok(Self { user_id, item_id })
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// The provider's account of a transaction: either a signature-authenticated
/// push notification or the response to a server-to-server verify call.
#[derive(Debug, Clone)]
pub struct ProviderTransaction {
    pub reference: TransactionReference,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub metadata: Option<Map<String, Value>>,
}

impl ProviderTransaction {
    pub fn is_success(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("success")
    }

    /// Best-effort item id, used only to route the browser back to the item page.
    pub fn item_hint(&self) -> Option<String> {
        CorrelationMetadata::from_map(self.metadata.as_ref())
            .ok()
            .map(|m| m.item_id)
    }
}

/// Parses an amount the provider may send either as a JSON number or as a
/// decimal string.
pub fn amount_from_value(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_references_are_opaque_and_unique() {
        let a = TransactionReference::generate();
        let b = TransactionReference::generate();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("tx-"));
        assert_eq!(a.as_str().len(), 3 + 32);
        assert!(TransactionReference::parse(a.as_str()).is_some());
    }

    #[test]
    fn test_reference_does_not_embed_ids() {
        let tx = PendingTransaction::new(
            "user-42".to_string(),
            "item-7".to_string(),
            BigDecimal::from(10),
            "ETB".to_string(),
        );
        assert!(!tx.reference.as_str().contains("user-42"));
        assert!(!tx.reference.as_str().contains("item-7"));
    }

    #[test]
    fn test_parse_rejects_hostile_references() {
        assert!(TransactionReference::parse("").is_none());
        assert!(TransactionReference::parse("   ").is_none());
        assert!(TransactionReference::parse("tx-1&status=success").is_none());
        assert!(TransactionReference::parse("../../etc").is_none());
        assert!(TransactionReference::parse(&"a".repeat(REFERENCE_MAX_LEN + 1)).is_none());
        assert!(TransactionReference::parse(" tx-abc_1.2 ").is_some());
    }

    #[test]
    fn test_metadata_round_trips_through_map() {
        let meta = CorrelationMetadata {
            user_id: "U1".to_string(),
            item_id: "R1".to_string(),
        };
        assert_eq!(CorrelationMetadata::from_map(Some(&meta.to_map())), Ok(meta));
    }

    #[test]
    fn test_metadata_requires_string_ids() {
        let missing_item = json!({ "user_id": "U1" });
        let numeric_user = json!({ "user_id": 5, "item_id": "R1" });
        let blank_user = json!({ "user_id": "  ", "item_id": "R1" });

        assert!(CorrelationMetadata::from_map(None).is_err());
        assert!(CorrelationMetadata::from_map(missing_item.as_object()).is_err());
        assert!(CorrelationMetadata::from_map(numeric_user.as_object()).is_err());
        assert!(CorrelationMetadata::from_map(blank_user.as_object()).is_err());
    }

    #[test]
    fn test_metadata_accepts_legacy_item_key() {
        let legacy = json!({ "user_id": "U1", "recipe_id": "R9" });
        let meta = CorrelationMetadata::from_map(legacy.as_object()).unwrap();
        assert_eq!(meta.item_id, "R9");
    }

    #[test]
    fn test_malformed_item_id_does_not_fall_back_to_legacy_key() {
        let numeric = json!({ "user_id": "U1", "item_id": 5, "recipe_id": "R9" });
        let blank = json!({ "user_id": "U1", "item_id": " ", "recipe_id": "R9" });
        let both = json!({ "user_id": "U1", "item_id": "R1", "recipe_id": "R9" });

        assert!(CorrelationMetadata::from_map(numeric.as_object()).is_err());
        assert!(CorrelationMetadata::from_map(blank.as_object()).is_err());
        assert_eq!(
            CorrelationMetadata::from_map(both.as_object()).unwrap().item_id,
            "R1"
        );
    }

    #[test]
    fn test_amount_from_number_or_string() {
        assert_eq!(
            amount_from_value(&json!(45.0)),
            Some(BigDecimal::from_str("45.00").unwrap())
        );
        assert_eq!(
            amount_from_value(&json!("45.00")),
            Some(BigDecimal::from_str("45").unwrap())
        );
        assert_eq!(amount_from_value(&json!(null)), None);
        assert_eq!(amount_from_value(&json!("abc")), None);
    }
}
