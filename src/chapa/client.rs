use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::types::{describe_message, ApiErrorBody, InitializeBody, InitializeResponse, VerifyResponse};
use crate::domain::{CheckoutRequest, ProviderTransaction, TransactionReference};
use crate::ports::{PaymentProvider, ProviderError};
use crate::utils::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.chapa.co/v1";

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the Chapa hosted-checkout API.
#[derive(Clone)]
pub struct ChapaClient {
    client: Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: Breaker,
    verify_retry: RetryPolicy,
}

impl ChapaClient {
    /// Creates a client with the default breaker (3 consecutive failures, 60-120s cool-down).
    pub fn new(base_url: String, secret_key: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, secret_key, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        secret_key: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        ChapaClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            circuit_breaker,
            verify_retry: RetryPolicy::default(),
        }
    }

    pub fn with_verify_retry(mut self, policy: RetryPolicy) -> Self {
        self.verify_retry = policy;
        self
    }

    /// Only transport trouble and garbled answers count against the breaker;
    /// a provider saying "no" means the provider is up.
    fn trips_breaker(err: &ProviderError) -> bool {
        !matches!(err, ProviderError::Rejected { .. })
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>>,
    {
        match self
            .circuit_breaker
            .call_with(Self::trips_breaker, call)
            .await
        {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(ProviderError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    async fn initialize_once(&self, request: &CheckoutRequest) -> Result<String, ProviderError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let body = InitializeBody::from(request);

        tracing::debug!(tx_ref = %request.reference, amount = %body.amount, "Initializing Chapa payment");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            let err = error_for_status(status, &text);
            tracing::error!(
                tx_ref = %request.reference,
                http_status = status.as_u16(),
                error = %err,
                "Chapa rejected payment initialization"
            );
            return Err(err);
        }

        let parsed: InitializeResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let checkout_url = parsed
            .data
            .map(|d| d.checkout_url)
            .filter(|u| !u.is_empty());

        match checkout_url {
            Some(url) if parsed.status == "success" => Ok(url),
            _ => {
                let message = describe_message(&parsed.message)
                    .unwrap_or_else(|| "initialization was not successful".to_string());
                tracing::warn!(
                    tx_ref = %request.reference,
                    status = %parsed.status,
                    message = %message,
                    "Chapa initialization was not successful"
                );
                Err(ProviderError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn verify_once(
        &self,
        reference: &TransactionReference,
    ) -> Result<ProviderTransaction, ProviderError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            let err = error_for_status(status, &text);
            tracing::warn!(
                tx_ref = %reference,
                http_status = status.as_u16(),
                error = %err,
                "Chapa verification returned an error"
            );
            return Err(err);
        }

        let parsed: VerifyResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let data = parsed.data.ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "verify response without data (status '{}')",
                parsed.status
            ))
        })?;
        let transaction = data
            .into_transaction(reference)
            .map_err(ProviderError::InvalidResponse)?;

        tracing::info!(tx_ref = %reference, status = %transaction.status, "Chapa verification answered");
        Ok(transaction)
    }
}

/// 5xx and 429 mean the provider could not answer; anything else non-2xx is
/// its decision.
fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    let message = ApiErrorBody::parse(body).describe();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network(err.to_string())
}

#[async_trait]
impl PaymentProvider for ChapaClient {
    /// Single attempt: a failed initialize is never replayed with the same reference.
    async fn initialize(&self, request: &CheckoutRequest) -> Result<String, ProviderError> {
        self.guarded(self.initialize_once(request)).await
    }

    async fn verify(
        &self,
        reference: &TransactionReference,
    ) -> Result<ProviderTransaction, ProviderError> {
        self.verify_retry
            .run(
                "chapa.verify",
                move || self.guarded(self.verify_once(reference)),
                ProviderError::is_retryable,
            )
            .await
    }

    fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}
