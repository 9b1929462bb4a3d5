pub mod hasura_catalog;
pub mod hasura_ledger;
pub mod in_memory;

pub use hasura_catalog::HasuraCatalog;
pub use hasura_ledger::HasuraLedger;
pub use in_memory::{InMemoryCatalog, InMemoryLedger, InMemoryProvider};
