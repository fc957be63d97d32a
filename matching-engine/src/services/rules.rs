//! Matching-rule repository.

use crate::models::{ReconcileRule, RuleType};
use reconcile_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Holds the configured reconciliation rules. Rules are validated on
/// insert so configuration errors never reach the matching loop.
#[derive(Debug, Default)]
pub struct RuleBook {
    rules: Vec<Arc<ReconcileRule>>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<ReconcileRule>) -> Result<Self, AppError> {
        let mut book = Self::new();
        for rule in rules {
            book.add(rule)?;
        }
        Ok(book)
    }

    /// Validate and store a rule. Rejects invalid configuration
    /// (invalid amounts, inverted ranges, bad tax setup).
    pub fn add(&mut self, rule: ReconcileRule) -> Result<(), AppError> {
        rule.validate()?;
        tracing::debug!(rule = %rule.name, rule_type = rule.rule_type.as_str(), "Rule registered");
        self.rules.push(Arc::new(rule));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, rule_id: Uuid) -> Option<Arc<ReconcileRule>> {
        self.rules.iter().find(|r| r.rule_id == rule_id).cloned()
    }

    /// Rules eligible for automatic batch matching, in (sequence, id)
    /// order. Manual write-off rules only ever run from the review
    /// screen and are excluded here.
    pub fn automatic_rules(&self) -> Vec<Arc<ReconcileRule>> {
        let mut rules: Vec<Arc<ReconcileRule>> = self
            .rules
            .iter()
            .filter(|r| r.rule_type != RuleType::ManualWriteoff)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.sort_key());
        rules
    }
}
