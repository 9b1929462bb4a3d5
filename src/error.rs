use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::{CatalogError, ProviderError};

/// Message returned to clients for any failure whose details must stay server-side.
pub const GENERIC_FAILURE: &str = "Could not process payment at this time.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider rejected: {0}")]
    ProviderRejected(String),

    #[error("Metadata error for {reference}: {reason}")]
    Metadata { reference: String, reason: String },

    #[error("Persistence error for {reference} (user {user_id}, item {item_id}): {reason}")]
    Persistence {
        reference: String,
        user_id: String,
        item_id: String,
        reason: String,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired(_) | AppError::Signature(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider(_)
            | AppError::ProviderRejected(_)
            | AppError::Metadata { .. }
            | AppError::Persistence { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Provider and storage internals are never echoed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::AuthenticationRequired(msg)
            | AppError::NotFound(msg)
            | AppError::Signature(msg) => msg.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Provider(_) | AppError::Persistence { .. })
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { .. } => AppError::ProviderRejected(err.to_string()),
            other => AppError::Provider(other.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => AppError::NotFound(format!("{} not found.", what)),
            CatalogError::Backend(reason) => AppError::Internal(reason),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(json!({ "message": self.public_message() }));

        (status, body).into_response()
    }
}
