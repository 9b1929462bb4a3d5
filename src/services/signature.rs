//! Push-notification authentication.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
/// Header name the provider uses natively.
pub const PROVIDER_SIGNATURE_HEADER: &str = "x-chapa-signature";

/// Verifies `hex(HMAC-SHA256(raw_body, secret))` over the exact bytes received.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Arc<[u8]>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// The comparison runs in constant time (`verify_slice`).
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), AppError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Signature("Signature header is required".to_string()))?;

        let provided = hex::decode(signature)
            .map_err(|_| AppError::Signature("Invalid signature".to_string()))?;

        let mut mac = self.mac();
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| AppError::Signature("Invalid signature".to_string()))
    }
}
