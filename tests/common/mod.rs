#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use bigdecimal::BigDecimal;
use bitesized_payments::adapters::{InMemoryCatalog, InMemoryLedger, InMemoryProvider};
use bitesized_payments::config::Config;
use bitesized_payments::domain::{CatalogItem, Customer, ProviderTransaction, TransactionReference};
use bitesized_payments::services::SignatureVerifier;
use bitesized_payments::{create_app, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test_secret_key";
pub const ACTION_SECRET: &str = "action-secret";

pub struct TestApp {
    pub router: Router,
    pub provider: InMemoryProvider,
    pub ledger: InMemoryLedger,
    pub catalog: InMemoryCatalog,
}

pub fn config(overrides: &[(&'static str, &'static str)]) -> Config {
    let mut env: HashMap<&str, &str> = HashMap::from([
        ("HASURA_GRAPHQL_ENDPOINT", "http://hasura.test/v1/graphql"),
        ("HASURA_ADMIN_SECRET", "hasura-admin-secret"),
        ("CHAPA_SECRET_KEY", "CHASECK_TEST-1234567890"),
        ("CHAPA_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("BACKEND_PUBLIC_URL", "https://api.example.com"),
        ("FRONTEND_URL", "https://shop.example.com"),
        ("LEDGER_MAX_ATTEMPTS", "1"),
    ]);
    env.extend(overrides.iter().copied());
    Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

/// App over in-memory collaborators, seeded with item R1 (45.00) and user U1.
pub async fn spawn_app(overrides: &[(&'static str, &'static str)]) -> TestApp {
    let provider = InMemoryProvider::new();
    let ledger = InMemoryLedger::new();
    let catalog = InMemoryCatalog::new();
    catalog
        .add_item(CatalogItem {
            id: "R1".into(),
            title: "Doro Wat".into(),
            price: BigDecimal::from_str("45.00").unwrap(),
        })
        .await;
    catalog
        .add_user(Customer {
            id: "U1".into(),
            email: "u1@example.com".into(),
            display_name: "abebe".into(),
        })
        .await;

    let state = AppState::build(
        &config(overrides),
        Arc::new(provider.clone()),
        Arc::new(catalog.clone()),
        Arc::new(ledger.clone()),
    );

    TestApp {
        router: create_app(state),
        provider,
        ledger,
        catalog,
    }
}

pub fn sign(body: &[u8]) -> String {
    SignatureVerifier::new(WEBHOOK_SECRET).sign(body)
}

pub fn signed_push(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("content-type", "application/json")
        .header("X-Signature", sign(body.as_bytes()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn success_notification(tx_ref: &str) -> String {
    serde_json::json!({
        "event": "charge.success",
        "tx_ref": tx_ref,
        "status": "success",
        "amount": "45.00",
        "currency": "ETB",
        "meta": { "user_id": "U1", "item_id": "R1" }
    })
    .to_string()
}

pub fn provider_view(tx_ref: &str, status: &str) -> ProviderTransaction {
    ProviderTransaction {
        reference: TransactionReference::parse(tx_ref).unwrap(),
        status: status.to_string(),
        amount: BigDecimal::from_str("45.00").unwrap(),
        currency: "ETB".to_string(),
        metadata: serde_json::json!({ "user_id": "U1", "item_id": "R1" })
            .as_object()
            .cloned(),
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()["location"].to_str().unwrap().to_string()
}
