use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::services::{SignatureVerifier, PROVIDER_SIGNATURE_HEADER, SIGNATURE_HEADER};

/// Largest body accepted on the notification route.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Authenticates a push notification over its raw bytes before any handler
/// parses it, then hands the same bytes on.
pub async fn verify_signature(
    State(verifier): State<SignatureVerifier>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::Validation("Request body too large.".to_string()))?;

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .or_else(|| parts.headers.get(PROVIDER_SIGNATURE_HEADER))
        .and_then(|h| h.to_str().ok());

    if let Err(e) = verifier.verify(&bytes, signature) {
        tracing::warn!(
            uri = %parts.uri,
            body_size = bytes.len(),
            error = %e,
            "Rejected unsigned or tampered notification"
        );
        return Err(e);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
