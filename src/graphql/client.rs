use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphqlError {
    #[error("GraphQL transport failure: {0}")]
    Transport(String),
    #[error("GraphQL request failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("GraphQL API returned error: {0}")]
    Remote(String),
    /// The engine answered but its database or internals failed.
    #[error("GraphQL engine failure ({code}): {message}")]
    RemoteUnavailable { code: String, message: String },
    #[error("Invalid GraphQL response: {0}")]
    InvalidResponse(String),
}

impl GraphqlError {
    pub fn is_transient(&self) -> bool {
        match self {
            GraphqlError::Transport(_) | GraphqlError::RemoteUnavailable { .. } => true,
            GraphqlError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// `execute(query, variables) -> data | error`, the only contract the catalog
/// and ledger adapters rely on.
#[async_trait]
pub trait GraphqlExecutor: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GraphqlError>;
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

/// Hasura error codes that describe the engine's own trouble rather than a
/// bad request.
const ENGINE_FAILURE_CODES: &[&str] = &["postgres-error", "unexpected"];

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl GraphqlErrorEntry {
    fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }

    fn into_error(self) -> GraphqlError {
        match self.code().map(str::to_string) {
            Some(code) if ENGINE_FAILURE_CODES.contains(&code.as_str()) => {
                GraphqlError::RemoteUnavailable {
                    code,
                    message: self.message,
                }
            }
            _ => GraphqlError::Remote(self.message),
        }
    }
}

/// Hasura GraphQL engine client authenticated with the admin secret.
#[derive(Clone)]
pub struct HasuraClient {
    client: Client,
    endpoint: String,
    admin_secret: String,
}

impl HasuraClient {
    pub fn new(endpoint: String, admin_secret: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            admin_secret,
        }
    }
}

#[async_trait]
impl GraphqlExecutor for HasuraClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GraphqlError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-hasura-admin-secret", &self.admin_secret)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(GraphqlError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphqlResponse = serde_json::from_str(&body)
            .map_err(|e| GraphqlError::InvalidResponse(e.to_string()))?;

        if let Some(first) = parsed.errors.into_iter().next() {
            return Err(first.into_error());
        }

        parsed
            .data
            .ok_or_else(|| GraphqlError::InvalidResponse("response carries no data".to_string()))
    }
}
