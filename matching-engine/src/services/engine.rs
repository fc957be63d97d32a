//! Batch orchestrator.
//!
//! Walks a batch of statement lines through the configured rules in
//! (sequence, id) order, first match wins. Batch-wide consumption
//! state lives in a [`BatchContext`]: entries posted for one line are
//! never reused by a later line of the same run, entries merely
//! suggested are demoted to contested tiers. The loop is deliberately
//! sequential: correctness depends on in-order traversal of the shared
//! context.

use crate::models::{
    BatchContext, MatchCandidate, MatchResult, MatchStatus, ReconcileEntry, ReconcileRule,
    RuleType, StatementLine,
};
use crate::services::commit::ReconcileGateway;
use crate::services::ledger::LedgerStore;
use crate::services::rules::RuleBook;
use crate::services::taxes::TaxComputer;
use crate::services::{query, ranking, writeoff};
use reconcile_core::error::AppError;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// The reconciliation matching engine, wired to its external
/// collaborators.
pub struct MatchingEngine {
    rules: RuleBook,
    ledger: Arc<dyn LedgerStore>,
    taxes: Arc<dyn TaxComputer>,
    gateway: Arc<dyn ReconcileGateway>,
}

impl MatchingEngine {
    pub fn new(
        rules: RuleBook,
        ledger: Arc<dyn LedgerStore>,
        taxes: Arc<dyn TaxComputer>,
        gateway: Arc<dyn ReconcileGateway>,
    ) -> Self {
        Self {
            rules,
            ledger,
            taxes,
            gateway,
        }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Match a batch of statement lines against the automatic rules.
    ///
    /// Returns one [`MatchResult`] per line; lines no rule accepted
    /// keep an empty candidate list and no status. `excluded_ids` are
    /// ledger entries the caller wants kept out of every candidate
    /// pool; `partner_overrides` shadows statement-line partners for
    /// the duration of the batch.
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub async fn apply_rules(
        &self,
        lines: &[StatementLine],
        excluded_ids: &HashSet<Uuid>,
        partner_overrides: Option<&HashMap<Uuid, Uuid>>,
    ) -> Result<HashMap<Uuid, MatchResult>, AppError> {
        let mut results: HashMap<Uuid, MatchResult> = lines
            .iter()
            .map(|line| (line.line_id, MatchResult::default()))
            .collect();

        let rules = self.rules.automatic_rules();
        let mut ctx = BatchContext::default();

        for line in lines {
            for rule in &rules {
                let outcome = self
                    .rule_result(rule, line, excluded_ids, partner_overrides, &ctx)
                    .await?;
                if let Some((result, reconciled, consumed)) = outcome {
                    info!(
                        line_id = %line.line_id,
                        rule = %rule.name,
                        status = result.status.map(|s| s.as_str()).unwrap_or("none"),
                        entries = result.entry_ids.len(),
                        "Statement line matched"
                    );
                    results.insert(line.line_id, result);
                    ctx.absorb(consumed, reconciled);
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Evaluate one rule against one line. `None` means the rule
    /// produced no accepted result and the next rule should be tried.
    async fn rule_result(
        &self,
        rule: &Arc<ReconcileRule>,
        line: &StatementLine,
        excluded_ids: &HashSet<Uuid>,
        partner_overrides: Option<&HashMap<Uuid, Uuid>>,
        ctx: &BatchContext,
    ) -> Result<Option<(MatchResult, HashSet<Uuid>, HashSet<Uuid>)>, AppError> {
        match rule.rule_type {
            RuleType::InvoiceMatching => {
                let candidates = query::invoice_matching_candidates(
                    rule,
                    std::slice::from_ref(line),
                    &*self.ledger,
                    excluded_ids,
                    partner_overrides,
                )
                .await?;
                if candidates.is_empty() {
                    return Ok(None);
                }
                self.invoice_matching_result(rule, line, candidates, partner_overrides, ctx)
                    .await
            }
            RuleType::WriteoffSuggestion => {
                let partner_id = query::effective_partner(line, partner_overrides);
                if !query::writeoff_suggestion_applies(rule, line, partner_id, &*self.ledger)
                    .await?
                {
                    return Ok(None);
                }
                let result = self
                    .writeoff_suggestion_result(rule, line, partner_id)
                    .await?;
                Ok(Some((result, HashSet::new(), HashSet::new())))
            }
            // Filtered out of automatic_rules(); nothing to do.
            RuleType::ManualWriteoff => Ok(None),
        }
    }

    async fn invoice_matching_result(
        &self,
        rule: &Arc<ReconcileRule>,
        line: &StatementLine,
        candidates: Vec<MatchCandidate>,
        partner_overrides: Option<&HashMap<Uuid, Uuid>>,
        ctx: &BatchContext,
    ) -> Result<Option<(MatchResult, HashSet<Uuid>, HashSet<Uuid>)>, AppError> {
        let (mut candidates, mut tiers) = ranking::filter_candidates(candidates, ctx);

        // An exact residual match is decisive: discard everything else
        // and re-rank that single candidate alone.
        let line_currency = line.currency().clone();
        let line_residual = line.residual();
        if let Some(exact) = candidates
            .iter()
            .find(|c| line_currency.is_zero(c.entry.residual() - line_residual))
            .cloned()
        {
            let (filtered, buckets) = ranking::filter_candidates(vec![exact], ctx);
            candidates = filtered;
            tiers = buckets;
        }

        if !(tiers.has_strong_match() || ranking::total_amount_coverage(rule, line, &candidates)) {
            return Ok(None);
        }

        let entry_ids: Vec<Uuid> = candidates.iter().map(|c| c.entry.entry_id).collect();
        let consumed: HashSet<Uuid> = entry_ids.iter().copied().collect();
        let mut reconciled: HashSet<Uuid> = HashSet::new();

        let partner_id = query::effective_partner(line, partner_overrides);
        let payload = self
            .prepare_reconciliation(rule, line, &candidates, partner_id)
            .await?;

        let mut result = MatchResult {
            rule_id: Some(rule.rule_id),
            entry_ids,
            status: Some(MatchStatus::WriteOff),
            reconciled_line_ids: Vec::new(),
            to_check: rule.to_check,
        };

        // Weak or ambiguous matches are never auto-posted, regardless
        // of the rule's auto-reconcile flag.
        if !payload.is_empty() && tiers.has_strong_match() && rule.auto_reconcile {
            let posted = self.gateway.reconcile(line.line_id, &payload).await?;
            result.status = Some(MatchStatus::Reconciled);
            result.reconciled_line_ids = posted.reconciled_line_ids;
            reconciled = consumed.clone();
        }

        Ok(Some((result, reconciled, consumed)))
    }

    async fn writeoff_suggestion_result(
        &self,
        rule: &Arc<ReconcileRule>,
        line: &StatementLine,
        partner_id: Option<Uuid>,
    ) -> Result<MatchResult, AppError> {
        let mut result = MatchResult {
            rule_id: Some(rule.rule_id),
            entry_ids: Vec::new(),
            status: Some(MatchStatus::WriteOff),
            reconciled_line_ids: Vec::new(),
            to_check: rule.to_check,
        };

        let payload = self
            .prepare_reconciliation(rule, line, &[], partner_id)
            .await?;

        if !payload.is_empty() && rule.auto_reconcile {
            let posted = self.gateway.reconcile(line.line_id, &payload).await?;
            result.status = Some(MatchStatus::Reconciled);
            result.reconciled_line_ids = posted.reconciled_line_ids;
        }

        Ok(result)
    }

    /// Soft reconciliation: assemble the existing matched entries and
    /// the write-off drafts closing the residual. When an open balance
    /// would remain that the partner cannot carry (no
    /// receivable/payable account), return an empty payload instead of
    /// attempting a doomed commit.
    async fn prepare_reconciliation(
        &self,
        rule: &ReconcileRule,
        line: &StatementLine,
        candidates: &[MatchCandidate],
        partner_id: Option<Uuid>,
    ) -> Result<Vec<ReconcileEntry>, AppError> {
        let mut payload: Vec<ReconcileEntry> = candidates
            .iter()
            .map(|c| ReconcileEntry::Existing {
                entry_id: c.entry.entry_id,
            })
            .collect();

        let matched_total: Decimal = candidates.iter().map(|c| c.entry.amount_residual).sum();
        let residual_balance = line.company_currency.round(line.amount - matched_total);
        if line.company_currency.is_zero(residual_balance) {
            return Ok(payload);
        }

        let drafts =
            writeoff::write_off_line_drafts(rule, line, residual_balance, &*self.taxes).await?;

        let mut remaining = residual_balance;
        for draft in &drafts {
            remaining -= line.company_currency.round(draft.balance);
        }

        if !line.company_currency.is_zero(remaining) {
            let partner = match partner_id {
                Some(id) => self.ledger.partner(id).await?,
                None => None,
            };
            let open_balance_account = partner.as_ref().and_then(|p| {
                if line.amount > Decimal::ZERO {
                    p.receivable_account_id
                } else {
                    p.payable_account_id
                }
            });
            if open_balance_account.is_none() {
                return Ok(Vec::new());
            }
        }

        payload.extend(drafts.into_iter().map(ReconcileEntry::NewLine));
        Ok(payload)
    }
}
