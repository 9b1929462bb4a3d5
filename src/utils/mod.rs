pub mod retry;
pub mod sanitize;

pub use retry::RetryPolicy;
