pub mod initiator;
pub mod reconciler;
pub mod signature;

pub use initiator::{Checkout, InitiatorSettings, TransactionInitiator};
pub use reconciler::{Channel, ReconcileOutcome, StatusReconciler};
pub use signature::{SignatureVerifier, PROVIDER_SIGNATURE_HEADER, SIGNATURE_HEADER};
