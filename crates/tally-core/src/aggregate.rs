//! Aggregation of transactions into month and category buckets
//!
//! Shared by the cashflow chart, the category breakdown, insights and the
//! chat assistant's financial context.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::classify::{Classifier, Flow};
use crate::error::{Error, Result};
use crate::models::{CategoryTotal, MonthlyCashflow, Transaction};

/// Month bucket key for a date (YYYY-MM)
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Sum inflow/outflow per calendar month, ascending by month
pub fn aggregate_by_month(txs: &[Transaction], classifier: &Classifier) -> Vec<MonthlyCashflow> {
    let mut buckets: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for tx in txs {
        let entry = buckets.entry(month_key(tx.date)).or_insert((0.0, 0.0));
        match classifier.flow(tx.amount, &tx.name) {
            Flow::Income => entry.0 += tx.amount,
            Flow::Expense => entry.1 += tx.amount.abs(),
        }
    }

    buckets
        .into_iter()
        .map(|(month, (inflow, outflow))| MonthlyCashflow {
            month,
            inflow,
            outflow,
            net: inflow - outflow,
        })
        .collect()
}

/// Top `top_n` spending categories over expense transactions, largest first
pub fn aggregate_by_category<'a>(
    txs: impl IntoIterator<Item = &'a Transaction>,
    top_n: usize,
    classifier: &Classifier,
) -> Vec<CategoryTotal> {
    let mut totals: HashMap<String, f64> = HashMap::new();

    for tx in txs {
        let classification = classifier.classify(tx);
        if classification.flow != Flow::Expense {
            continue;
        }
        *totals.entry(classification.category).or_insert(0.0) += tx.amount.abs();
    }

    let mut result: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, amount)| CategoryTotal { category, amount })
        .collect();

    result.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    result.truncate(top_n);
    result
}

/// Transactions falling in the given YYYY-MM month
pub fn in_month<'a>(txs: &'a [Transaction], month: &str) -> Vec<&'a Transaction> {
    txs.iter().filter(|t| month_key(t.date) == month).collect()
}

/// Totals of (income, spending) for a set of transactions
pub fn totals<'a>(
    txs: impl IntoIterator<Item = &'a Transaction>,
    classifier: &Classifier,
) -> (f64, f64) {
    txs.into_iter()
        .fold((0.0, 0.0), |(income, spending), tx| {
            match classifier.flow(tx.amount, &tx.name) {
                Flow::Income => (income + tx.amount, spending),
                Flow::Expense => (income, spending + tx.amount.abs()),
            }
        })
}

/// Month key shifted back by `months` months
pub fn previous_month_key(date: NaiveDate, months: u32) -> String {
    let total = date.year() * 12 + date.month0() as i32 - months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) + 1;
    format!("{:04}-{:02}", year, month)
}

/// Validate a YYYY-MM key, returning the first day of that month
pub fn parse_month_key(month: &str) -> Result<NaiveDate> {
    let valid_shape = month.len() == 7 && month.as_bytes()[4] == b'-';
    valid_shape
        .then(|| NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").ok())
        .flatten()
        .ok_or_else(|| Error::InvalidData(format!("Invalid month '{}', expected YYYY-MM", month)))
}

/// Cashflow buckets for the `months` calendar months ending with `today`'s
pub fn recent_cashflow(
    txs: &[Transaction],
    today: NaiveDate,
    months: u32,
    classifier: &Classifier,
) -> Vec<MonthlyCashflow> {
    let current = month_key(today);
    let earliest = previous_month_key(today, months.saturating_sub(1));

    aggregate_by_month(txs, classifier)
        .into_iter()
        .filter(|m| m.month >= earliest && m.month <= current)
        .collect()
}
