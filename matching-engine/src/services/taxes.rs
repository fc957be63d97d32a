//! Tax computation collaborator.

use async_trait::async_trait;
use reconcile_core::error::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;

/// One computed tax line for a write-off base line.
#[derive(Debug, Clone)]
pub struct TaxLineResult {
    pub tax_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    /// Account the tax posts to; falls back to the base line's account
    /// when unset.
    pub account_id: Option<Uuid>,
    pub tax_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
}

/// Result of computing a tax set over a base balance.
#[derive(Debug, Clone)]
pub struct TaxComputation {
    /// Base balance, adjusted when a price-included tax applies.
    pub base: Decimal,
    pub base_tag_ids: Vec<Uuid>,
    pub taxes: Vec<TaxLineResult>,
}

/// Computes tax line drafts for a tax set and a base balance. Tax
/// computation internals live outside the engine.
#[async_trait]
pub trait TaxComputer: Send + Sync {
    async fn compute_all(
        &self,
        tax_ids: &[Uuid],
        force_price_include: bool,
        balance: Decimal,
    ) -> Result<TaxComputation, AppError>;
}
