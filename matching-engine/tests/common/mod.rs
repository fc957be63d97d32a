//! Common test fixtures for the matching engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use matching_engine::models::{
    AccountKind, AmountNature, LedgerEntry, MatchCandidate, PostedReconciliation, ReconcileEntry,
    ReconcileRule, RuleType, StatementLine, WriteoffAmount, WriteoffLineSpec,
};
use matching_engine::services::{
    InMemoryLedger, MatchingEngine, ReconcileGateway, RuleBook, TaxComputation, TaxComputer,
    TaxLineResult,
};
use reconcile_core::error::AppError;
use reconcile_core::money::Currency;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn eur() -> Currency {
    Currency::new("EUR", 2)
}

pub fn usd() -> Currency {
    Currency::new("USD", 2)
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A statement line in EUR with no partner and no foreign currency.
pub fn statement_line(company_id: Uuid, amount: &str, payment_ref: &str) -> StatementLine {
    StatementLine {
        line_id: Uuid::new_v4(),
        journal_id: Uuid::new_v4(),
        company_id,
        partner_id: None,
        amount: dec(amount),
        foreign_amount: None,
        foreign_currency: None,
        journal_currency: None,
        company_currency: eur(),
        payment_ref: payment_ref.to_string(),
        narration: None,
        transaction_type: None,
    }
}

/// A posted, unreconciled receivable entry whose label and parent
/// document name both carry `move_name`.
pub fn receivable_entry(company_id: Uuid, residual: &str, move_name: &str) -> LedgerEntry {
    let amount = dec(residual);
    LedgerEntry {
        entry_id: Uuid::new_v4(),
        company_id,
        partner_id: None,
        account_kind: AccountKind::Receivable,
        posted: true,
        reconciled: false,
        name: Some(move_name.to_string()),
        move_name: move_name.to_string(),
        move_ref: None,
        payment_reference: None,
        date_maturity: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        balance: amount,
        amount_residual: amount,
        currency: None,
        amount_currency: None,
        amount_residual_currency: None,
    }
}

/// An invoice-matching rule with the default conditions: same
/// currency, total-amount matching at 100%, no partner restriction.
pub fn invoice_matching_rule(company_id: Uuid, name: &str) -> ReconcileRule {
    ReconcileRule {
        rule_id: Uuid::new_v4(),
        name: name.to_string(),
        sequence: 10,
        company_id,
        rule_type: RuleType::InvoiceMatching,
        auto_reconcile: false,
        to_check: false,
        match_journal_ids: Vec::new(),
        match_nature: AmountNature::Both,
        match_amount: None,
        match_label: None,
        match_note: None,
        match_transaction_type: None,
        match_same_currency: true,
        match_total_amount: true,
        match_total_amount_param: dec("100"),
        match_partner: false,
        match_partner_ids: Vec::new(),
        match_partner_category_ids: Vec::new(),
        decimal_separator: '.',
        line_specs: Vec::new(),
    }
}

pub fn writeoff_suggestion_rule(company_id: Uuid, name: &str, account_id: Uuid) -> ReconcileRule {
    ReconcileRule {
        rule_type: RuleType::WriteoffSuggestion,
        line_specs: vec![percentage_spec(account_id, "100")],
        ..invoice_matching_rule(company_id, name)
    }
}

pub fn percentage_spec(account_id: Uuid, pct: &str) -> WriteoffLineSpec {
    WriteoffLineSpec {
        sequence: 10,
        label: Some("Write-off".to_string()),
        account_id: Some(account_id),
        amount: WriteoffAmount::PercentageOfResidual(dec(pct)),
        tax_ids: Vec::new(),
        force_tax_included: false,
    }
}

pub fn candidate(
    entry: LedgerEntry,
    line_id: Uuid,
    payment_reference_match: bool,
    communication_match: bool,
) -> MatchCandidate {
    MatchCandidate {
        sequence: 10,
        rule_id: Uuid::new_v4(),
        line_id,
        entry,
        payment_reference_match,
        communication_match,
    }
}

// ============================================================================
// Collaborator fakes
// ============================================================================

/// Gateway recording every commit; always succeeds and invents one
/// posted line id per call.
#[derive(Default)]
pub struct RecordingGateway {
    pub calls: Mutex<Vec<(Uuid, Vec<ReconcileEntry>)>>,
}

impl RecordingGateway {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReconcileGateway for RecordingGateway {
    async fn reconcile(
        &self,
        statement_line_id: Uuid,
        entries: &[ReconcileEntry],
    ) -> Result<PostedReconciliation, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((statement_line_id, entries.to_vec()));
        Ok(PostedReconciliation {
            statement_line_id,
            reconciled_line_ids: vec![Uuid::new_v4()],
        })
    }
}

/// Tax computer that never produces tax lines.
pub struct NoTaxes;

#[async_trait]
impl TaxComputer for NoTaxes {
    async fn compute_all(
        &self,
        _tax_ids: &[Uuid],
        _force_price_include: bool,
        balance: Decimal,
    ) -> Result<TaxComputation, AppError> {
        Ok(TaxComputation {
            base: balance,
            base_tag_ids: Vec::new(),
            taxes: Vec::new(),
        })
    }
}

/// Single flat-rate tax. Exclusive by default; price-included when
/// forced, shrinking the base so base + tax equals the original
/// balance.
pub struct FlatTax {
    pub rate: Decimal,
    pub account_id: Uuid,
    pub tag_id: Uuid,
}

#[async_trait]
impl TaxComputer for FlatTax {
    async fn compute_all(
        &self,
        tax_ids: &[Uuid],
        force_price_include: bool,
        balance: Decimal,
    ) -> Result<TaxComputation, AppError> {
        let hundred = Decimal::ONE_HUNDRED;
        let (base, tax_amount) = if force_price_include {
            let base = (balance / (Decimal::ONE + self.rate / hundred)).round_dp(2);
            (base, balance - base)
        } else {
            (balance, (balance * self.rate / hundred).round_dp(2))
        };
        Ok(TaxComputation {
            base,
            base_tag_ids: vec![self.tag_id],
            taxes: vec![TaxLineResult {
                tax_id: tax_ids[0],
                name: "Tax".to_string(),
                amount: tax_amount,
                account_id: Some(self.account_id),
                tax_ids: Vec::new(),
                tag_ids: vec![self.tag_id],
            }],
        })
    }
}

/// Wire an engine over an in-memory ledger with a recording gateway
/// and no taxes.
pub fn engine_with(
    rules: Vec<ReconcileRule>,
    ledger: Arc<InMemoryLedger>,
) -> (MatchingEngine, Arc<RecordingGateway>) {
    let book = RuleBook::from_rules(rules).expect("fixture rules must validate");
    let gateway = Arc::new(RecordingGateway::default());
    let engine = MatchingEngine::new(book, ledger, Arc::new(NoTaxes), gateway.clone());
    (engine, gateway)
}
