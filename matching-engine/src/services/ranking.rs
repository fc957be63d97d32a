//! Candidate ranking and conflict resolution.
//!
//! Candidates are bucketed into six priority tiers. Tier 1 is an
//! exact payment-reference match, tier 3 a fuzzy communication match,
//! tier 5 a partner-only match. Each is bumped one tier down when an
//! earlier statement line of the batch already proposed the same
//! entry, making it a contested candidate.

use crate::models::{BatchContext, MatchCandidate, ReconcileRule, StatementLine};
use rust_decimal::Decimal;

const TIER_COUNT: usize = 6;

/// Candidates partitioned over the six known priority tiers.
#[derive(Debug, Default)]
pub struct TierBuckets {
    buckets: [Vec<MatchCandidate>; TIER_COUNT],
}

impl TierBuckets {
    /// Candidates of one tier, 1-based.
    pub fn tier(&self, tier: usize) -> &[MatchCandidate] {
        &self.buckets[tier - 1]
    }

    fn push(&mut self, tier: usize, candidate: MatchCandidate) {
        self.buckets[tier - 1].push(candidate);
    }

    fn clear(&mut self, tier: usize) {
        self.buckets[tier - 1].clear();
    }

    /// Tiers 1 and 2: payment-reference matches, contested or not.
    /// Only these may be auto-reconciled.
    pub fn has_strong_match(&self) -> bool {
        !self.buckets[0].is_empty() || !self.buckets[1].is_empty()
    }

    /// All surviving candidates, tier order 1 to 6.
    pub fn flatten(&self) -> Vec<MatchCandidate> {
        self.buckets.iter().flatten().cloned().collect()
    }
}

/// Bucket candidates by priority tier, dropping entries the batch has
/// already reconciled. When tier 1 candidates exist, tiers 5 and 6 are
/// dropped outright: strong signals dominate weak ones.
pub fn bucket_candidates(candidates: Vec<MatchCandidate>, ctx: &BatchContext) -> TierBuckets {
    let mut buckets = TierBuckets::default();

    for candidate in candidates {
        if ctx.reconciled_entry_ids.contains(&candidate.entry.entry_id) {
            continue;
        }

        let mut tier = if candidate.payment_reference_match {
            1
        } else if candidate.communication_match {
            3
        } else {
            5
        };
        if ctx.consumed_entry_ids.contains(&candidate.entry.entry_id) {
            tier += 1;
        }
        buckets.push(tier, candidate);
    }

    if !buckets.tier(1).is_empty() {
        buckets.clear(5);
        buckets.clear(6);
    }

    buckets
}

/// Rank and flatten in one step. Re-running on an already filtered
/// list with the same context returns the same set.
pub fn filter_candidates(
    candidates: Vec<MatchCandidate>,
    ctx: &BatchContext,
) -> (Vec<MatchCandidate>, TierBuckets) {
    let buckets = bucket_candidates(candidates, ctx);
    (buckets.flatten(), buckets)
}

/// Total-amount coverage check. Only meaningful for invoice-matching
/// rules with the total-amount flag set; without the flag the
/// candidate set is accepted as-is.
///
/// The candidate residuals are summed (liquidity entries contribute
/// their raw balance) and compared against the statement line's
/// residual at the line currency's precision; failing exact equality,
/// the smaller-over-larger percentage must reach the rule's threshold.
pub fn total_amount_coverage(
    rule: &ReconcileRule,
    line: &StatementLine,
    candidates: &[MatchCandidate],
) -> bool {
    if !rule.match_total_amount {
        return true;
    }
    if candidates.is_empty() {
        return false;
    }

    let total_residual: Decimal = candidates.iter().map(|c| c.entry.matching_residual()).sum();
    let line_residual = line.residual();
    let line_currency = line.currency();

    if line_currency.is_zero(total_residual - line_residual) {
        return true;
    }

    // Orient both magnitudes by the line residual's sign before
    // taking the smaller-over-larger percentage.
    let (line_cmp, total_cmp) = if line_residual > Decimal::ZERO {
        (line_residual, total_residual)
    } else {
        (-line_residual, -total_residual)
    };

    let amount_percentage = if line_cmp > total_cmp {
        if line_cmp.is_zero() {
            // Zero line residual with a non-zero total: the zero-check
            // above did not accept, so there is nothing to divide by.
            return false;
        }
        total_cmp / line_cmp * Decimal::ONE_HUNDRED
    } else if !total_residual.is_zero() {
        if total_cmp.is_zero() {
            Decimal::ZERO
        } else {
            line_cmp / total_cmp * Decimal::ONE_HUNDRED
        }
    } else {
        // Zero candidate total against a non-zero line residual never
        // covers, matching the original engine's behavior.
        return false;
    };

    amount_percentage >= rule.match_total_amount_param
}
