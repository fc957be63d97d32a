use thiserror::Error;

/// Error taxonomy for the matching engine and its collaborators.
///
/// Configuration problems are rejected when a rule is saved and never
/// reach the matching loop. Contract violations signal a caller bug
/// and abort the batch for that rule. Ledger and commit errors
/// propagate from the external collaborators untouched.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(anyhow::Error),

    #[error("Contract violation: {0}")]
    ContractViolation(anyhow::Error),

    #[error("Ledger error: {0}")]
    LedgerError(anyhow::Error),

    #[error("Commit error: {0}")]
    CommitError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors a reviewer can fix by editing rule
    /// configuration rather than code.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::ValidationError(_))
    }
}
