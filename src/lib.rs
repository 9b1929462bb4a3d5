pub mod adapters;
pub mod chapa;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod graphql;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod utils;

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use url::Url;

use crate::adapters::{HasuraCatalog, HasuraLedger};
use crate::chapa::ChapaClient;
use crate::config::Config;
use crate::graphql::{GraphqlExecutor, HasuraClient};
use crate::middleware::{
    request_logger_middleware, require_action_secret, verify_signature, ActionSecret,
    RequestLogging,
};
use crate::ports::{Catalog, PaymentProvider, PurchaseLedger};
use crate::services::{InitiatorSettings, SignatureVerifier, StatusReconciler, TransactionInitiator};
use crate::utils::RetryPolicy;

#[derive(Clone)]
pub struct AppState {
    pub initiator: Arc<TransactionInitiator>,
    pub reconciler: Arc<StatusReconciler>,
    pub provider: Arc<dyn PaymentProvider>,
    pub signature_verifier: SignatureVerifier,
    pub status_page_url: Url,
    pub action_secret: ActionSecret,
    pub request_logging: RequestLogging,
}

impl AppState {
    /// Production wiring: Chapa for payments, Hasura for catalog and ledger.
    pub fn from_config(config: &Config) -> Self {
        let provider = ChapaClient::new(
            config.chapa_base_url.clone(),
            config.chapa_secret_key.clone(),
            config.http_timeout(),
        )
        .with_verify_retry(RetryPolicy::default().with_max_attempts(config.verify_max_attempts));
        let graphql: Arc<dyn GraphqlExecutor> = Arc::new(HasuraClient::new(
            config.hasura_graphql_endpoint.clone(),
            config.hasura_admin_secret.clone(),
            config.http_timeout(),
        ));

        Self::build(
            config,
            Arc::new(provider),
            Arc::new(HasuraCatalog::new(graphql.clone())),
            Arc::new(HasuraLedger::new(graphql)),
        )
    }

    /// Wires the services over the given collaborators.
    pub fn build(
        config: &Config,
        provider: Arc<dyn PaymentProvider>,
        catalog: Arc<dyn Catalog>,
        ledger: Arc<dyn PurchaseLedger>,
    ) -> Self {
        let initiator =
            TransactionInitiator::new(catalog, provider.clone(), InitiatorSettings::from_config(config));
        let reconciler = StatusReconciler::new(provider.clone(), ledger)
            .with_ledger_retry(RetryPolicy::default().with_max_attempts(config.ledger_max_attempts))
            .with_push_reverify(config.push_reverify);

        Self {
            initiator: Arc::new(initiator),
            reconciler: Arc::new(reconciler),
            provider,
            signature_verifier: SignatureVerifier::new(&config.chapa_webhook_secret),
            status_page_url: config.status_page_url(),
            action_secret: ActionSecret::new(config.action_secret.clone()),
            request_logging: RequestLogging {
                log_body: config.log_request_body,
            },
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let initiate = post(handlers::payments::initiate).route_layer(from_fn_with_state(
        state.action_secret.clone(),
        require_action_secret,
    ));
    let webhook = get(handlers::webhook::redirect).merge(post(handlers::webhook::push).route_layer(
        from_fn_with_state(state.signature_verifier.clone(), verify_signature),
    ));

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if let Ok(origin) = HeaderValue::from_str(&state.status_page_url.origin().ascii_serialization()) {
        cors = cors.allow_origin(origin);
    }

    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/initiate", initiate)
        .route("/payments/webhook", webhook)
        .layer(from_fn_with_state(
            state.request_logging,
            request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
