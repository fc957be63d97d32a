//! Ledger-commit collaborator.

use crate::models::{PostedReconciliation, ReconcileEntry};
use async_trait::async_trait;
use reconcile_core::error::AppError;
use uuid::Uuid;

/// Posts the actual reconciliation of one statement line. Each call is
/// one atomic unit: on failure no accounting line may be left behind.
///
/// The engine prevents double allocation of ledger entries only within
/// a single batch. Reuse across concurrent batch runs is caught here,
/// by the implementation's own consistency checks, not earlier.
#[async_trait]
pub trait ReconcileGateway: Send + Sync {
    async fn reconcile(
        &self,
        statement_line_id: Uuid,
        entries: &[ReconcileEntry],
    ) -> Result<PostedReconciliation, AppError>;
}
