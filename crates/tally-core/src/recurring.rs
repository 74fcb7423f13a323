//! Recurring charge detection
//!
//! Expense transactions are grouped by normalized merchant. A group is a
//! recurring charge when it spans at least three distinct months and every
//! amount sits within 15% of the group's median.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::aggregate::month_key;
use crate::anomaly::FlagChange;
use crate::classify::{Classifier, Flow};
use crate::models::Transaction;

/// Distinct months a merchant must appear in
pub const MIN_MONTHS: usize = 3;

/// Allowed relative deviation from the median amount
pub const AMOUNT_TOLERANCE: f64 = 0.15;

/// A detected recurring charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringGroup {
    pub merchant: String,
    pub median_amount: f64,
    pub months: usize,
    pub transaction_ids: Vec<i64>,
}

/// Simple merchant name normalization
pub fn normalize_merchant(description: &str) -> String {
    description
        .to_uppercase()
        .replace(['*', '#'], " ")
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

fn merchant_key(tx: &Transaction) -> String {
    let source = tx
        .merchant_name
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&tx.name);
    normalize_merchant(source)
}

/// Median of a slice, zero when empty
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Recurring groups in the given transactions, largest charge first
pub fn find_recurring(txs: &[Transaction], classifier: &Classifier) -> Vec<RecurringGroup> {
    let mut groups: HashMap<String, Vec<&Transaction>> = HashMap::new();
    for tx in txs {
        if classifier.flow(tx.amount, &tx.name) != Flow::Expense {
            continue;
        }
        let key = merchant_key(tx);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(tx);
    }

    let mut found: Vec<RecurringGroup> = groups
        .into_iter()
        .filter_map(|(merchant, members)| {
            let months: BTreeSet<String> = members.iter().map(|t| month_key(t.date)).collect();
            if months.len() < MIN_MONTHS {
                return None;
            }

            let amounts: Vec<f64> = members.iter().map(|t| t.amount.abs()).collect();
            let median_amount = median(&amounts);
            if median_amount < 0.01 {
                return None;
            }

            let consistent = amounts
                .iter()
                .all(|a| (a - median_amount).abs() / median_amount <= AMOUNT_TOLERANCE);
            if !consistent {
                return None;
            }

            Some(RecurringGroup {
                merchant,
                median_amount,
                months: months.len(),
                transaction_ids: members.iter().map(|t| t.id).collect(),
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.median_amount
            .total_cmp(&a.median_amount)
            .then_with(|| a.merchant.cmp(&b.merchant))
    });
    found
}

/// Expected monthly spend across recurring groups
pub fn monthly_total(groups: &[RecurringGroup]) -> f64 {
    groups.iter().map(|g| g.median_amount).sum()
}

/// Recurring flags whose stored value differs from the computed one
pub fn compute_flag_changes(txs: &[Transaction], classifier: &Classifier) -> Vec<FlagChange> {
    let recurring: HashSet<i64> = find_recurring(txs, classifier)
        .into_iter()
        .flat_map(|g| g.transaction_ids)
        .collect();

    txs.iter()
        .filter_map(|tx| {
            let flag = recurring.contains(&tx.id);
            (flag != tx.is_recurring).then_some(FlagChange {
                transaction_id: tx.id,
                flag,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{date, tx_on};

    fn monthly(name: &str, amounts: &[f64]) -> Vec<Transaction> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, a)| tx_on(date(2024, i as u32 + 1, 3), *a, name, &[]))
            .collect()
    }

    #[test]
    fn test_normalize_merchant() {
        assert_eq!(normalize_merchant("NETFLIX.COM*12345"), "NETFLIX.COM 12345");
        assert_eq!(normalize_merchant("spotify usa #99 stockholm"), "SPOTIFY USA 99");
        assert_eq!(normalize_merchant("   "), "");
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn test_monthly_subscription_detected() {
        let txs = monthly("NETFLIX.COM", &[-15.49, -15.49, -15.49, -16.99]);
        let groups = find_recurring(&txs, &Classifier::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merchant, "NETFLIX.COM");
        assert_eq!(groups[0].months, 4);
        assert_eq!(groups[0].transaction_ids.len(), 4);
    }

    #[test]
    fn test_two_months_not_enough() {
        let txs = monthly("GYM", &[-40.0, -40.0]);
        assert!(find_recurring(&txs, &Classifier::default()).is_empty());
    }

    #[test]
    fn test_same_month_repeats_not_recurring() {
        let txs: Vec<Transaction> = (1..=5)
            .map(|d| tx_on(date(2024, 2, d), -4.0, "Cafe", &[]))
            .collect();
        assert!(find_recurring(&txs, &Classifier::default()).is_empty());
    }

    #[test]
    fn test_variable_amounts_not_recurring() {
        let txs = monthly("GROCER", &[-40.0, -120.0, -65.0]);
        assert!(find_recurring(&txs, &Classifier::default()).is_empty());
    }

    #[test]
    fn test_income_is_ignored() {
        let txs = monthly("ACME PAYROLL", &[2000.0, 2000.0, 2000.0]);
        assert!(find_recurring(&txs, &Classifier::default()).is_empty());
    }

    #[test]
    fn test_merchant_name_groups_varied_descriptions() {
        let mut txs = monthly("SPOTIFY P1234", &[-9.99, -9.99, -9.99]);
        for (i, t) in txs.iter_mut().enumerate() {
            t.name = format!("SPOTIFY P{}", i);
            t.merchant_name = Some("Spotify".to_string());
        }
        let groups = find_recurring(&txs, &Classifier::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merchant, "SPOTIFY");
        assert!((monthly_total(&groups) - 9.99).abs() < 1e-9);
    }

    #[test]
    fn test_flag_changes_idempotent() {
        let mut txs = monthly("NETFLIX", &[-15.0, -15.0, -15.0]);
        let classifier = Classifier::default();
        let changes = compute_flag_changes(&txs, &classifier);
        assert_eq!(changes.len(), 3);
        for t in &mut txs {
            t.is_recurring = true;
        }
        assert!(compute_flag_changes(&txs, &classifier).is_empty());
    }
}
