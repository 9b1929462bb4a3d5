pub mod auth;
pub mod request_logger;
pub mod signature;

pub use auth::{require_action_secret, ActionSecret, ACTION_SECRET_HEADER};
pub use request_logger::{request_logger_middleware, RequestLogging};
pub use signature::{verify_signature, MAX_BODY_BYTES};
