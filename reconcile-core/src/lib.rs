//! reconcile-core: Shared infrastructure for the reconciliation matching engine.
pub mod error;
pub mod money;
pub mod observability;

pub use anyhow;
pub use tracing;
