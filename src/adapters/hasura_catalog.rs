//! Catalog lookups against the Hasura GraphQL engine.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CatalogItem, Customer};
use crate::graphql::GraphqlExecutor;
use crate::ports::{Catalog, CatalogError};

const ITEM_QUERY: &str = r#"
query GetItemForPayment($id: uuid!) {
  recipes_by_pk(id: $id) { title price }
}"#;

const USER_QUERY: &str = r#"
query GetUserForPayment($id: uuid!) {
  users_by_pk(id: $id) { email username }
}"#;

#[derive(Clone)]
pub struct HasuraCatalog {
    executor: Arc<dyn GraphqlExecutor>,
}

impl HasuraCatalog {
    pub fn new(executor: Arc<dyn GraphqlExecutor>) -> Self {
        Self { executor }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        root: &str,
        id: &str,
        what: &str,
    ) -> Result<T, CatalogError> {
        // Primary keys are uuids; anything else cannot name a row.
        if Uuid::parse_str(id).is_err() {
            tracing::debug!(id = %id, root = %root, "Catalog lookup with non-uuid id");
            return Err(CatalogError::NotFound(what.to_string()));
        }

        let data = self
            .executor
            .execute(query, json!({ "id": id }))
            .await
            .map_err(|e| CatalogError::Backend(e.to_string()))?;

        match data.get(root) {
            None | Some(Value::Null) => Err(CatalogError::NotFound(what.to_string())),
            Some(row) => serde_json::from_value(row.clone())
                .map_err(|e| CatalogError::Backend(format!("malformed {} row: {}", root, e))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    title: String,
    price: BigDecimal,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    email: String,
    username: String,
}

#[async_trait]
impl Catalog for HasuraCatalog {
    async fn get_item(&self, item_id: &str) -> Result<CatalogItem, CatalogError> {
        let row: ItemRow = self.fetch(ITEM_QUERY, "recipes_by_pk", item_id, "Item").await?;
        Ok(CatalogItem {
            id: item_id.to_string(),
            title: row.title,
            price: row.price,
        })
    }

    async fn get_user(&self, user_id: &str) -> Result<Customer, CatalogError> {
        let row: UserRow = self.fetch(USER_QUERY, "users_by_pk", user_id, "User").await?;
        Ok(Customer {
            id: user_id.to_string(),
            email: row.email,
            display_name: row.username,
        })
    }
}
