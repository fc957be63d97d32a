//! Candidate query engine.
//!
//! Fetches unreconciled ledger entries compatible with a statement
//! line under one rule's conditions. Conditions are composed as ANDed
//! in-memory predicates over the pool supplied by the [`LedgerStore`];
//! every condition is optional, absent means no restriction.

use crate::models::{LedgerEntry, MatchCandidate, ReconcileRule, RuleType, StatementLine};
use crate::services::ledger::LedgerStore;
use once_cell::sync::Lazy;
use reconcile_core::error::AppError;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::instrument;
use uuid::Uuid;

/// Everything that is neither a digit nor whitespace is stripped
/// before token comparison, so "INV/2026/0001" and "0001 2026" can
/// still overlap.
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9\s]").unwrap());

/// Fetch candidates for an invoice-matching rule over a set of
/// statement lines.
///
/// Eligibility per entry: same company, posted, unreconciled, balance
/// sign compatible with the line amount, same currency when the rule
/// requires it, and either the entry's partner equals the (possibly
/// overridden) line partner, or no partner is set and the statement
/// payment reference matches the entry by exact payment reference or
/// by numeric-token overlap. Rows come back oldest maturity first,
/// then by entry id.
#[instrument(skip_all, fields(rule = %rule.name, lines = lines.len()))]
pub async fn invoice_matching_candidates(
    rule: &ReconcileRule,
    lines: &[StatementLine],
    ledger: &dyn LedgerStore,
    excluded_ids: &HashSet<Uuid>,
    partner_overrides: Option<&HashMap<Uuid, Uuid>>,
) -> Result<Vec<MatchCandidate>, AppError> {
    if rule.rule_type != RuleType::InvoiceMatching {
        return Err(AppError::ContractViolation(anyhow::anyhow!(
            "invoice_matching_candidates called for a '{}' rule",
            rule.rule_type.as_str()
        )));
    }

    let mut candidates = Vec::new();
    for line in lines {
        let partner_id = effective_partner(line, partner_overrides);
        if !rule_applies_to_line(rule, line, partner_id, ledger).await? {
            continue;
        }

        let pool = ledger
            .unreconciled_entries(line.company_id, excluded_ids)
            .await?;
        for entry in pool {
            if !entry.posted || entry.reconciled {
                continue;
            }
            if entry.company_id != line.company_id {
                continue;
            }
            if !sign_compatible(line.amount, entry.balance) {
                continue;
            }
            if rule.match_same_currency && !same_currency(line, &entry) {
                continue;
            }

            let payment_reference_match = payment_reference_matches(line, &entry);
            let communication_match = communication_matches(line, &entry);
            let eligible = match partner_id {
                Some(pid) => entry.partner_id == Some(pid),
                None => payment_reference_match || communication_match,
            };
            if !eligible {
                continue;
            }

            candidates.push(MatchCandidate {
                sequence: rule.sequence,
                rule_id: rule.rule_id,
                line_id: line.line_id,
                entry,
                payment_reference_match,
                communication_match,
            });
        }
    }

    // Oldest due dates come first; entry id breaks ties so batches are
    // deterministic.
    candidates.sort_by(|a, b| {
        (a.entry.date_maturity, a.entry.entry_id).cmp(&(b.entry.date_maturity, b.entry.entry_id))
    });
    Ok(candidates)
}

/// True when a write-off-suggestion rule applies to the line. There is
/// no candidate search phase for these rules, only the line-level
/// conditions.
pub async fn writeoff_suggestion_applies(
    rule: &ReconcileRule,
    line: &StatementLine,
    partner_id: Option<Uuid>,
    ledger: &dyn LedgerStore,
) -> Result<bool, AppError> {
    if rule.rule_type != RuleType::WriteoffSuggestion {
        return Err(AppError::ContractViolation(anyhow::anyhow!(
            "writeoff_suggestion_applies called for a '{}' rule",
            rule.rule_type.as_str()
        )));
    }
    rule_applies_to_line(rule, line, partner_id, ledger).await
}

/// The partner the line is matched under: the per-line override when
/// present, else the line's own partner.
pub fn effective_partner(
    line: &StatementLine,
    partner_overrides: Option<&HashMap<Uuid, Uuid>>,
) -> Option<Uuid> {
    partner_overrides
        .and_then(|m| m.get(&line.line_id).copied())
        .or(line.partner_id)
}

/// ANDed line-level conditions of a rule: journal set, amount nature,
/// amount predicate, text predicates and partner constraints.
async fn rule_applies_to_line(
    rule: &ReconcileRule,
    line: &StatementLine,
    partner_id: Option<Uuid>,
    ledger: &dyn LedgerStore,
) -> Result<bool, AppError> {
    if !rule.match_journal_ids.is_empty() && !rule.match_journal_ids.contains(&line.journal_id) {
        return Ok(false);
    }
    if !rule.match_nature.matches(line.amount) {
        return Ok(false);
    }
    if let Some(predicate) = &rule.match_amount {
        let amount_abs = line.currency().round(line.amount.abs());
        if !predicate.matches(amount_abs) {
            return Ok(false);
        }
    }
    if let Some(predicate) = &rule.match_label {
        if !predicate.matches(Some(&line.payment_ref)) {
            return Ok(false);
        }
    }
    if let Some(predicate) = &rule.match_note {
        if !predicate.matches(line.narration.as_deref()) {
            return Ok(false);
        }
    }
    if let Some(predicate) = &rule.match_transaction_type {
        if !predicate.matches(line.transaction_type.as_deref()) {
            return Ok(false);
        }
    }
    if rule.match_partner {
        let Some(pid) = partner_id else {
            return Ok(false);
        };
        if !rule.match_partner_ids.is_empty() && !rule.match_partner_ids.contains(&pid) {
            return Ok(false);
        }
        if !rule.match_partner_category_ids.is_empty() {
            let in_category = ledger
                .partner(pid)
                .await?
                .map(|p| {
                    p.category_ids
                        .iter()
                        .any(|c| rule.match_partner_category_ids.contains(c))
                })
                .unwrap_or(false);
            if !in_category {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Positive statement amounts only match positive entry balances, and
/// vice versa.
fn sign_compatible(line_amount: Decimal, entry_balance: Decimal) -> bool {
    if line_amount > Decimal::ZERO {
        entry_balance > Decimal::ZERO
    } else {
        entry_balance < Decimal::ZERO
    }
}

fn same_currency(line: &StatementLine, entry: &LedgerEntry) -> bool {
    let line_currency = line
        .foreign_currency
        .as_ref()
        .or(line.journal_currency.as_ref())
        .unwrap_or(&line.company_currency);
    let entry_currency = entry.currency.as_ref().unwrap_or(&line.company_currency);
    line_currency.code == entry_currency.code
}

/// Exact, whitespace-normalized equality between the entry's parent
/// invoice payment reference and the statement payment reference.
fn payment_reference_matches(line: &StatementLine, entry: &LedgerEntry) -> bool {
    let Some(payment_reference) = entry.payment_reference.as_deref() else {
        return false;
    };
    let left: String = payment_reference.chars().filter(|c| !c.is_whitespace()).collect();
    let right: String = line.payment_ref.chars().filter(|c| !c.is_whitespace()).collect();
    !left.is_empty() && left == right
}

/// Fuzzy match between the statement communication and the entry's
/// own label, its parent document name or its parent document
/// reference.
fn communication_matches(line: &StatementLine, entry: &LedgerEntry) -> bool {
    tokens_overlap(&line.payment_ref, entry.name.as_deref().unwrap_or(""))
        || tokens_overlap(&line.payment_ref, &entry.move_name)
        || tokens_overlap(&line.payment_ref, entry.move_ref.as_deref().unwrap_or(""))
}

fn numeric_tokens(text: &str) -> HashSet<String> {
    NON_NUMERIC
        .replace_all(text, "")
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}

/// Token overlap after stripping every non-numeric, non-whitespace
/// character. Empty token sets never overlap.
pub(crate) fn tokens_overlap(reference: &str, text: &str) -> bool {
    let left = numeric_tokens(reference);
    if left.is_empty() {
        return false;
    }
    let right = numeric_tokens(text);
    !left.is_disjoint(&right)
}
