//! Write-off line builder.
//!
//! Turns a rule's ordered write-off specs into accounting line drafts
//! closing a residual balance, expanding tax lines through the
//! external tax computation collaborator.

use crate::models::{LineDraft, ReconcileRule, RuleType, StatementLine, WriteoffAmount};
use crate::services::taxes::TaxComputer;
use regex::Regex;
use reconcile_core::error::AppError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Build the write-off line drafts for one statement line and a
/// residual balance to close.
///
/// Returns an empty list when the rule is invoice-matching with full
/// amount matching required (no write-off tolerated), and soft-aborts
/// to an empty list when a spec lacks a target account or the running
/// residual reaches zero; a partial write-off is never proposed.
pub async fn write_off_line_drafts(
    rule: &ReconcileRule,
    line: &StatementLine,
    mut residual_balance: Decimal,
    taxes: &dyn TaxComputer,
) -> Result<Vec<LineDraft>, AppError> {
    if rule.rule_type == RuleType::InvoiceMatching
        && (!rule.match_total_amount || rule.match_total_amount_param == Decimal::ONE_HUNDRED)
    {
        return Ok(Vec::new());
    }

    let mut drafts: Vec<LineDraft> = Vec::new();

    for spec in &rule.line_specs {
        let Some(account_id) = spec.account_id else {
            return Ok(Vec::new());
        };
        if line.company_currency.is_zero(residual_balance) {
            return Ok(Vec::new());
        }

        let sign = if residual_balance > Decimal::ZERO {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let balance = match &spec.amount {
            WriteoffAmount::Fixed(amount) => *amount * sign,
            WriteoffAmount::PercentageOfResidual(pct) => {
                residual_balance * (*pct / Decimal::ONE_HUNDRED)
            }
            WriteoffAmount::FromLabel(pattern) => {
                extracted_amount(pattern, &line.payment_ref, rule.decimal_separator).abs() * sign
            }
        };

        let mut draft = LineDraft {
            name: spec
                .label
                .clone()
                .unwrap_or_else(|| line.payment_ref.clone()),
            account_id,
            partner_id: None,
            balance,
            tax_ids: Vec::new(),
            tag_ids: Vec::new(),
            rule_id: Some(rule.rule_id),
        };

        // Sequential and order-dependent: each emitted line shrinks
        // the residual the next spec sees.
        residual_balance -= balance;

        if spec.tax_ids.is_empty() {
            drafts.push(draft);
        } else {
            draft.tax_ids = spec.tax_ids.clone();
            let force_price_include = spec.force_tax_included && spec.tax_ids.len() == 1;
            let computation = taxes
                .compute_all(&spec.tax_ids, force_price_include, draft.balance)
                .await?;
            // Price-included taxes shrink the base; the tax lines make
            // up the difference.
            draft.balance = computation.base;
            draft.tag_ids = computation.base_tag_ids;
            drafts.push(draft);

            for tax_line in computation.taxes {
                drafts.push(LineDraft {
                    name: tax_line.name,
                    account_id: tax_line.account_id.unwrap_or(account_id),
                    partner_id: None,
                    balance: tax_line.amount,
                    tax_ids: tax_line.tax_ids,
                    tag_ids: tax_line.tag_ids,
                    rule_id: Some(rule.rule_id),
                });
            }
        }
    }

    Ok(drafts)
}

/// Amount extracted from the statement payment reference by the
/// pattern's first capture group; zero when the pattern does not
/// match. Every character that is neither a digit nor the configured
/// decimal separator is stripped, then the separator is normalized to
/// `.`.
fn extracted_amount(pattern: &Regex, payment_ref: &str, decimal_separator: char) -> Decimal {
    let Some(captures) = pattern.captures(payment_ref) else {
        return Decimal::ZERO;
    };
    let Some(group) = captures.get(1) else {
        return Decimal::ZERO;
    };

    let cleaned: String = group
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == decimal_separator)
        .map(|c| if c == decimal_separator { '.' } else { c })
        .collect();
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}
