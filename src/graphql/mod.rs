pub mod client;

pub use client::{GraphqlError, GraphqlExecutor, HasuraClient};
