pub mod client;
pub mod types;

pub use client::{ChapaClient, DEFAULT_BASE_URL};
pub use types::WebhookNotification;
