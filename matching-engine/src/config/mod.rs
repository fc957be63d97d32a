//! Configuration module for the matching engine.
//!
//! Rule sets are plain data: they can be deserialized from a file (or
//! `RECONCILE`-prefixed environment overrides) and validated into a
//! [`RuleBook`]. A malformed rule is rejected at load time, never
//! inside the matching loop.

use crate::models::ReconcileRule;
use crate::services::rules::RuleBook;
use config::{Config as Cfg, File};
use reconcile_core::error::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub rules: Vec<ReconcileRule>,
}

impl RuleSetConfig {
    /// Load a rule set from a configuration file (any format the
    /// `config` crate understands), with environment overrides.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let cfg = Cfg::builder()
            .add_source(File::with_name(path))
            .add_source(config::Environment::with_prefix("RECONCILE").separator("__"))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        cfg.try_deserialize()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))
    }

    /// Validate every rule and build the rule book.
    pub fn into_rule_book(self) -> Result<RuleBook, AppError> {
        RuleBook::from_rules(self.rules)
    }
}
