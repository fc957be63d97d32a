mod common;

use common::{dec, invoice_matching_rule, percentage_spec, statement_line, FlatTax, NoTaxes};
use matching_engine::models::{RuleType, WriteoffAmount, WriteoffLineSpec};
use matching_engine::services::writeoff::write_off_line_drafts;
use regex::Regex;
use rust_decimal::Decimal;
use uuid::Uuid;

fn writeoff_rule(company_id: Uuid, specs: Vec<WriteoffLineSpec>) -> matching_engine::models::ReconcileRule {
    let mut rule = invoice_matching_rule(company_id, "Write-off");
    rule.rule_type = RuleType::WriteoffSuggestion;
    rule.line_specs = specs;
    rule
}

fn fixed_spec(account_id: Uuid, amount: &str) -> WriteoffLineSpec {
    WriteoffLineSpec {
        sequence: 10,
        label: Some("Fee".to_string()),
        account_id: Some(account_id),
        amount: WriteoffAmount::Fixed(dec(amount)),
        tax_ids: Vec::new(),
        force_tax_included: false,
    }
}

#[tokio::test]
async fn percentage_takes_its_share_of_the_residual() {
    let company_id = Uuid::new_v4();
    let rule = writeoff_rule(company_id, vec![percentage_spec(Uuid::new_v4(), "50")]);
    let line = statement_line(company_id, "-100", "fee");

    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].balance, dec("-50"));
    assert_eq!(drafts[0].name, "Write-off");
    assert_eq!(drafts[0].rule_id, Some(rule.rule_id));
}

#[tokio::test]
async fn later_specs_see_the_shrunken_residual() {
    let company_id = Uuid::new_v4();
    // 50% of -100 is -50, then 100% of the remaining -50 closes it.
    let rule = writeoff_rule(
        company_id,
        vec![
            percentage_spec(Uuid::new_v4(), "50"),
            percentage_spec(Uuid::new_v4(), "100"),
        ],
    );
    let line = statement_line(company_id, "-100", "fee");

    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].balance, dec("-50"));
    assert_eq!(drafts[1].balance, dec("-50"));
    let total: Decimal = drafts.iter().map(|d| d.balance).sum();
    assert_eq!(total, dec("-100"));
}

#[tokio::test]
async fn fixed_amounts_are_signed_by_the_residual() {
    let company_id = Uuid::new_v4();
    let rule = writeoff_rule(company_id, vec![fixed_spec(Uuid::new_v4(), "20")]);
    let line = statement_line(company_id, "-80", "fee");

    let drafts = write_off_line_drafts(&rule, &line, dec("-80"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts[0].balance, dec("-20"));

    let inflow = statement_line(company_id, "80", "refund");
    let drafts = write_off_line_drafts(&rule, &inflow, dec("80"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts[0].balance, dec("20"));
}

#[tokio::test]
async fn label_extraction_reads_the_payment_reference() {
    let company_id = Uuid::new_v4();
    let spec = WriteoffLineSpec {
        sequence: 10,
        label: None,
        account_id: Some(Uuid::new_v4()),
        amount: WriteoffAmount::FromLabel(Regex::new(r"BRT: ([\d,]+)").unwrap()),
        tax_ids: Vec::new(),
        force_tax_included: false,
    };
    let mut rule = writeoff_rule(company_id, vec![spec]);
    rule.decimal_separator = ',';

    let line = statement_line(
        company_id,
        "-3400",
        "R:9672938 10/07 AX 9415126318 T:5L:NA BRT: 3358,07 C:",
    );
    let drafts = write_off_line_drafts(&rule, &line, dec("-3400"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].balance, dec("-3358.07"));
    // No explicit label: the statement reference names the line.
    assert_eq!(drafts[0].name, line.payment_ref);
}

#[tokio::test]
async fn unmatched_label_pattern_yields_a_zero_line() {
    let company_id = Uuid::new_v4();
    let spec = WriteoffLineSpec {
        sequence: 10,
        label: Some("Carrier fee".to_string()),
        account_id: Some(Uuid::new_v4()),
        amount: WriteoffAmount::FromLabel(Regex::new(r"BRT: ([\d,]+)").unwrap()),
        tax_ids: Vec::new(),
        force_tax_included: false,
    };
    let rule = writeoff_rule(company_id, vec![spec]);
    let line = statement_line(company_id, "-100", "no carrier marker here");

    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].balance, Decimal::ZERO);
}

#[tokio::test]
async fn missing_account_aborts_the_whole_suggestion() {
    let company_id = Uuid::new_v4();
    let mut incomplete = fixed_spec(Uuid::new_v4(), "20");
    incomplete.account_id = None;
    let rule = writeoff_rule(
        company_id,
        vec![fixed_spec(Uuid::new_v4(), "30"), incomplete],
    );
    let line = statement_line(company_id, "-100", "fee");

    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &NoTaxes)
        .await
        .unwrap();
    assert!(drafts.is_empty(), "partial write-offs are never proposed");
}

#[tokio::test]
async fn exhausted_residual_aborts_remaining_specs() {
    let company_id = Uuid::new_v4();
    let rule = writeoff_rule(
        company_id,
        vec![
            percentage_spec(Uuid::new_v4(), "100"),
            fixed_spec(Uuid::new_v4(), "5"),
        ],
    );
    let line = statement_line(company_id, "-100", "fee");

    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &NoTaxes)
        .await
        .unwrap();
    assert!(drafts.is_empty());
}

#[tokio::test]
async fn zero_residual_produces_nothing() {
    let company_id = Uuid::new_v4();
    let rule = writeoff_rule(company_id, vec![percentage_spec(Uuid::new_v4(), "50")]);
    let line = statement_line(company_id, "0", "fee");

    let drafts = write_off_line_drafts(&rule, &line, Decimal::ZERO, &NoTaxes)
        .await
        .unwrap();
    assert!(drafts.is_empty());
}

#[tokio::test]
async fn full_invoice_matching_tolerates_no_write_off() {
    let company_id = Uuid::new_v4();
    let mut rule = invoice_matching_rule(company_id, "Invoices");
    rule.line_specs = vec![percentage_spec(Uuid::new_v4(), "100")];

    // 100% threshold: no write-off allowed.
    let line = statement_line(company_id, "280", "INV/1");
    let drafts = write_off_line_drafts(&rule, &line, dec("-20"), &NoTaxes)
        .await
        .unwrap();
    assert!(drafts.is_empty());

    // No total-amount matching at all: same outcome.
    rule.match_total_amount = false;
    let drafts = write_off_line_drafts(&rule, &line, dec("-20"), &NoTaxes)
        .await
        .unwrap();
    assert!(drafts.is_empty());

    // A lower threshold opens the door.
    rule.match_total_amount = true;
    rule.match_total_amount_param = dec("90");
    let drafts = write_off_line_drafts(&rule, &line, dec("-20"), &NoTaxes)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].balance, dec("-20"));
}

#[tokio::test]
async fn taxes_expand_into_their_own_lines() {
    let company_id = Uuid::new_v4();
    let tax_id = Uuid::new_v4();
    let tax_account = Uuid::new_v4();
    let tag_id = Uuid::new_v4();

    let mut spec = percentage_spec(Uuid::new_v4(), "100");
    spec.tax_ids = vec![tax_id];
    let rule = writeoff_rule(company_id, vec![spec]);
    let line = statement_line(company_id, "-100", "fee");

    let taxes = FlatTax {
        rate: dec("25"),
        account_id: tax_account,
        tag_id,
    };
    let drafts = write_off_line_drafts(&rule, &line, dec("-100"), &taxes)
        .await
        .unwrap();

    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].balance, dec("-100"));
    assert_eq!(drafts[0].tax_ids, vec![tax_id]);
    assert_eq!(drafts[0].tag_ids, vec![tag_id]);
    assert_eq!(drafts[1].balance, dec("-25"));
    assert_eq!(drafts[1].account_id, tax_account);
}

#[tokio::test]
async fn price_included_tax_shrinks_the_base() {
    let company_id = Uuid::new_v4();
    let tax_id = Uuid::new_v4();

    let mut spec = percentage_spec(Uuid::new_v4(), "100");
    spec.tax_ids = vec![tax_id];
    spec.force_tax_included = true;
    let rule = writeoff_rule(company_id, vec![spec]);
    let line = statement_line(company_id, "-125", "fee");

    let taxes = FlatTax {
        rate: dec("25"),
        account_id: Uuid::new_v4(),
        tag_id: Uuid::new_v4(),
    };
    let drafts = write_off_line_drafts(&rule, &line, dec("-125"), &taxes)
        .await
        .unwrap();

    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].balance, dec("-100.00"));
    assert_eq!(drafts[1].balance, dec("-25.00"));
    let total: Decimal = drafts.iter().map(|d| d.balance).sum();
    assert_eq!(total, dec("-125"));
}
