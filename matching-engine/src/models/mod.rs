//! Domain models for the matching engine.

use chrono::NaiveDate;
use reconcile_core::error::AppError;
use reconcile_core::money::Currency;
use regex::RegexBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// Rule Models
// ============================================================================

/// How a reconciliation rule participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Manual write-off from the review screen; never evaluated by the
    /// batch orchestrator.
    ManualWriteoff,
    /// Suggest counterpart values without searching for candidates.
    WriteoffSuggestion,
    /// Match existing invoices/bills against the statement line.
    InvoiceMatching,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualWriteoff => "manual_writeoff",
            Self::WriteoffSuggestion => "writeoff_suggestion",
            Self::InvoiceMatching => "invoice_matching",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountNature {
    Received,
    Paid,
    Both,
}

impl AmountNature {
    pub fn matches(&self, amount: Decimal) -> bool {
        match self {
            Self::Received => amount >= Decimal::ZERO,
            Self::Paid => amount <= Decimal::ZERO,
            Self::Both => true,
        }
    }
}

/// Restriction on the statement line's absolute amount, rounded at the
/// line currency's precision before comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPredicate {
    Lower { max: Decimal },
    Greater { min: Decimal },
    Between { min: Decimal, max: Decimal },
}

impl AmountPredicate {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Self::Between { min, max } = self {
            if min > max {
                return Err(AppError::ValidationError(anyhow::anyhow!(
                    "Amount range is inverted: min {} > max {}",
                    min,
                    max
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, amount_abs: Decimal) -> bool {
        match self {
            Self::Lower { max } => amount_abs < *max,
            Self::Greater { min } => amount_abs > *min,
            Self::Between { min, max } => *min <= amount_abs && amount_abs <= *max,
        }
    }
}

/// Restriction on a free-text field of the statement line. An absent
/// field never matches, mirroring SQL NULL semantics of the condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPredicate {
    Contains(String),
    NotContains(String),
    Regex(#[serde(with = "serde_regex")] regex::Regex),
}

impl TextPredicate {
    /// Compile a case-insensitive regex predicate. Invalid patterns
    /// are a rule-save error.
    pub fn regex(pattern: &str) -> Result<Self, AppError> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                AppError::ValidationError(anyhow::anyhow!("The regex is not valid: {}", e))
            })?;
        Ok(Self::Regex(compiled))
    }

    pub fn matches(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };
        match self {
            Self::Contains(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
            Self::NotContains(needle) => !text.to_lowercase().contains(&needle.to_lowercase()),
            Self::Regex(re) => re.is_match(text),
        }
    }
}

/// How a write-off line computes its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteoffAmount {
    /// Fixed value, signed by the residual being closed.
    Fixed(Decimal),
    /// Percentage of the running residual, in (0, 100].
    PercentageOfResidual(Decimal),
    /// Amount extracted from the statement payment reference via the
    /// pattern's first capture group.
    FromLabel(#[serde(with = "serde_regex")] regex::Regex),
}

/// One write-off line of a reconciliation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteoffLineSpec {
    #[serde(default = "default_sequence")]
    pub sequence: i32,
    /// Journal item label; falls back to the statement payment
    /// reference when unset.
    #[serde(default)]
    pub label: Option<String>,
    pub account_id: Option<Uuid>,
    pub amount: WriteoffAmount,
    #[serde(default)]
    pub tax_ids: Vec<Uuid>,
    /// Force the tax to be managed as a price included tax. Only valid
    /// with exactly one tax selected.
    #[serde(default)]
    pub force_tax_included: bool,
}

impl WriteoffLineSpec {
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.amount {
            WriteoffAmount::Fixed(amount) => {
                if amount.is_zero() {
                    return Err(AppError::ValidationError(anyhow::anyhow!(
                        "The fixed write-off amount must not be zero"
                    )));
                }
            }
            WriteoffAmount::PercentageOfResidual(pct) => {
                if *pct <= Decimal::ZERO || *pct > Decimal::from(100) {
                    return Err(AppError::ValidationError(anyhow::anyhow!(
                        "The write-off percentage must be in (0, 100], got {}",
                        pct
                    )));
                }
            }
            // Compiled at construction; nothing left to check.
            WriteoffAmount::FromLabel(_) => {}
        }
        if self.force_tax_included && self.tax_ids.len() != 1 {
            // Multiple taxes with force_tax_included results in wrong
            // computation, so the flag requires exactly one tax.
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "force_tax_included requires exactly one tax, got {}",
                self.tax_ids.len()
            )));
        }
        Ok(())
    }
}

/// A configured reconciliation rule: identity, matching conditions and
/// the ordered write-off lines it may generate. Read-only during
/// matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRule {
    pub rule_id: Uuid,
    pub name: String,
    #[serde(default = "default_sequence")]
    pub sequence: i32,
    pub company_id: Uuid,
    pub rule_type: RuleType,
    #[serde(default)]
    pub auto_reconcile: bool,
    /// Marks results produced from uncertain configuration for review.
    #[serde(default)]
    pub to_check: bool,

    // ===== Conditions =====
    #[serde(default)]
    pub match_journal_ids: Vec<Uuid>,
    #[serde(default = "default_nature")]
    pub match_nature: AmountNature,
    #[serde(default)]
    pub match_amount: Option<AmountPredicate>,
    #[serde(default)]
    pub match_label: Option<TextPredicate>,
    #[serde(default)]
    pub match_note: Option<TextPredicate>,
    #[serde(default)]
    pub match_transaction_type: Option<TextPredicate>,
    #[serde(default = "default_true")]
    pub match_same_currency: bool,
    #[serde(default = "default_true")]
    pub match_total_amount: bool,
    #[serde(default = "default_total_amount_param")]
    pub match_total_amount_param: Decimal,
    #[serde(default)]
    pub match_partner: bool,
    #[serde(default)]
    pub match_partner_ids: Vec<Uuid>,
    #[serde(default)]
    pub match_partner_category_ids: Vec<Uuid>,

    /// Every character that is neither a digit nor this separator is
    /// removed from a `FromLabel` capture before parsing.
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    #[serde(default)]
    pub line_specs: Vec<WriteoffLineSpec>,
}

fn default_sequence() -> i32 {
    10
}

fn default_nature() -> AmountNature {
    AmountNature::Both
}

fn default_true() -> bool {
    true
}

fn default_total_amount_param() -> Decimal {
    Decimal::from(100)
}

fn default_decimal_separator() -> char {
    '.'
}

impl ReconcileRule {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Rule name must not be empty"
            )));
        }
        if let Some(predicate) = &self.match_amount {
            predicate.validate()?;
        }
        if self.match_total_amount_param <= Decimal::ZERO
            || self.match_total_amount_param > Decimal::from(100)
        {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "The amount matching percentage must be in (0, 100], got {}",
                self.match_total_amount_param
            )));
        }
        for spec in &self.line_specs {
            spec.validate()?;
        }
        Ok(())
    }

    /// Rules are evaluated in (sequence, id) order.
    pub fn sort_key(&self) -> (i32, Uuid) {
        (self.sequence, self.rule_id)
    }
}

// ============================================================================
// Statement Line & Ledger Entry Models
// ============================================================================

/// One row of an imported bank/cash statement awaiting reconciliation.
/// Immutable for the duration of matching.
#[derive(Debug, Clone)]
pub struct StatementLine {
    pub line_id: Uuid,
    pub journal_id: Uuid,
    pub company_id: Uuid,
    pub partner_id: Option<Uuid>,
    /// Signed amount in the journal/company currency. Positive means
    /// money received.
    pub amount: Decimal,
    pub foreign_amount: Option<Decimal>,
    pub foreign_currency: Option<Currency>,
    pub journal_currency: Option<Currency>,
    pub company_currency: Currency,
    pub payment_ref: String,
    pub narration: Option<String>,
    pub transaction_type: Option<String>,
}

impl StatementLine {
    /// Foreign currency when set, else the journal's, else the
    /// company's.
    pub fn currency(&self) -> &Currency {
        self.foreign_currency
            .as_ref()
            .or(self.journal_currency.as_ref())
            .unwrap_or(&self.company_currency)
    }

    /// The residual the candidates must cover, expressed in the line's
    /// own currency.
    pub fn residual(&self) -> Decimal {
        if self.foreign_currency.is_some() {
            self.foreign_amount.unwrap_or(self.amount)
        } else {
            self.amount
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Liquidity,
    Receivable,
    Payable,
    Other,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liquidity => "liquidity",
            Self::Receivable => "receivable",
            Self::Payable => "payable",
            Self::Other => "other",
        }
    }
}

/// A posted accounting journal line with a non-zero residual, eligible
/// to be matched against a statement line. Read-only during matching.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub company_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub account_kind: AccountKind,
    pub posted: bool,
    pub reconciled: bool,
    /// Journal item label.
    pub name: Option<String>,
    /// Parent document name, e.g. "INV/2026/0001".
    pub move_name: String,
    /// Parent document reference.
    pub move_ref: Option<String>,
    /// Parent invoice payment reference.
    pub payment_reference: Option<String>,
    pub date_maturity: NaiveDate,
    /// Signed balance in company currency.
    pub balance: Decimal,
    /// Unsettled portion of the balance, company currency.
    pub amount_residual: Decimal,
    pub currency: Option<Currency>,
    pub amount_currency: Option<Decimal>,
    pub amount_residual_currency: Option<Decimal>,
}

impl LedgerEntry {
    /// Residual in the entry's own currency preference, as compared
    /// against the statement line residual.
    pub fn residual(&self) -> Decimal {
        if self.currency.is_some() {
            self.amount_residual_currency
                .unwrap_or(self.amount_residual)
        } else {
            self.amount_residual
        }
    }

    /// Residual used by the total-amount coverage check: liquidity
    /// entries use their raw balance, others their residual.
    pub fn matching_residual(&self) -> Decimal {
        match self.account_kind {
            AccountKind::Liquidity => {
                if self.currency.is_some() {
                    self.amount_currency.unwrap_or(self.balance)
                } else {
                    self.balance
                }
            }
            _ => self.residual(),
        }
    }
}

/// A customer/vendor known to the ledger system.
#[derive(Debug, Clone)]
pub struct Partner {
    pub partner_id: Uuid,
    pub category_ids: Vec<Uuid>,
    pub receivable_account_id: Option<Uuid>,
    pub payable_account_id: Option<Uuid>,
}

// ============================================================================
// Match Models
// ============================================================================

/// One candidate ledger entry fetched for a statement line, carrying
/// the text-match signals computed by the candidate query engine.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub sequence: i32,
    pub rule_id: Uuid,
    pub line_id: Uuid,
    pub entry: LedgerEntry,
    /// Exact, whitespace-normalized equality between the parent
    /// invoice payment reference and the statement payment reference.
    pub payment_reference_match: bool,
    /// Numeric-token overlap between the statement payment reference
    /// and the entry name / parent document name / reference.
    pub communication_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    WriteOff,
    Reconciled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteOff => "write_off",
            Self::Reconciled => "reconciled",
        }
    }
}

/// Outcome of matching one statement line. Transient, one per line per
/// batch run.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub rule_id: Option<Uuid>,
    pub entry_ids: Vec<Uuid>,
    pub status: Option<MatchStatus>,
    pub reconciled_line_ids: Vec<Uuid>,
    pub to_check: bool,
}

/// Batch-wide state threaded through every per-line evaluation step.
/// A ledger entry consumed by one statement line is never proposed
/// as a clean candidate to a later line of the same batch.
#[derive(Debug, Default)]
pub struct BatchContext {
    /// Entries already assigned to some statement line in this run.
    pub consumed_entry_ids: HashSet<Uuid>,
    /// Subset that has actually been posted; fully excluded from later
    /// candidate pools.
    pub reconciled_entry_ids: HashSet<Uuid>,
}

impl BatchContext {
    pub fn absorb(&mut self, consumed: HashSet<Uuid>, reconciled: HashSet<Uuid>) {
        self.consumed_entry_ids.extend(consumed);
        self.reconciled_entry_ids.extend(reconciled);
    }
}

// ============================================================================
// Reconciliation Payload Models
// ============================================================================

/// Draft of an accounting line to be created by the commit
/// collaborator (write-off or tax line).
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraft {
    pub name: String,
    pub account_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub balance: Decimal,
    pub tax_ids: Vec<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub rule_id: Option<Uuid>,
}

/// One element of the ordered payload handed to the commit
/// collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileEntry {
    Existing { entry_id: Uuid },
    NewLine(LineDraft),
}

impl ReconcileEntry {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::NewLine(_))
    }
}

/// What the commit collaborator posted for one statement line.
#[derive(Debug, Clone)]
pub struct PostedReconciliation {
    pub statement_line_id: Uuid,
    pub reconciled_line_ids: Vec<Uuid>,
}
