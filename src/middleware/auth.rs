use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub const ACTION_SECRET_HEADER: &str = "x-action-secret";

/// Shared secret the GraphQL gateway forwards with action calls. `None`
/// disables the check.
#[derive(Clone, Default)]
pub struct ActionSecret(pub Option<Arc<str>>);

impl ActionSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.map(Arc::from))
    }
}

pub async fn require_action_secret(
    State(ActionSecret(expected)): State<ActionSecret>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = expected else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ACTION_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(next.run(req).await)
    } else {
        tracing::warn!(uri = %req.uri(), "Action call with missing or wrong secret");
        Err(AppError::AuthenticationRequired(
            "Invalid action secret.".to_string(),
        ))
    }
}
