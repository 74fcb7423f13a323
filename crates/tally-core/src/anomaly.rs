//! Spending anomaly detection
//!
//! A transaction is anomalous when its absolute amount exceeds three times
//! the mean absolute amount of its category. The mean is taken over the
//! whole supplied set, including the transaction under test.
//!
//! This module only computes flags. Persisting them is
//! [`Database::detect_anomalies`](crate::db::Database::detect_anomalies).

use std::collections::HashMap;

use crate::models::Transaction;

/// Multiple of the category mean above which an amount is anomalous
pub const ANOMALY_MULTIPLIER: f64 = 3.0;

/// Grouping key for transactions without a primary category
pub const FALLBACK_KEY: &str = "Other";

/// A flag that needs to be written back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagChange {
    pub transaction_id: i64,
    pub flag: bool,
}

/// Grouping key: the primary category label, else "Other"
pub fn anomaly_key(tx: &Transaction) -> &str {
    tx.primary_category().unwrap_or(FALLBACK_KEY)
}

/// Mean absolute amount per category key
#[derive(Debug, Clone, Default)]
pub struct CategoryStats {
    means: HashMap<String, f64>,
}

impl CategoryStats {
    pub fn from_transactions(txs: &[Transaction]) -> Self {
        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        for tx in txs {
            let entry = sums.entry(anomaly_key(tx).to_string()).or_insert((0.0, 0));
            entry.0 += tx.amount.abs();
            entry.1 += 1;
        }

        let means = sums
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect();

        Self { means }
    }

    pub fn mean(&self, key: &str) -> Option<f64> {
        self.means.get(key).copied()
    }

    /// |amount| > 3 × mean of the transaction's category
    pub fn is_anomalous(&self, tx: &Transaction) -> bool {
        match self.mean(anomaly_key(tx)) {
            Some(mean) => tx.amount.abs() > ANOMALY_MULTIPLIER * mean,
            None => false,
        }
    }
}

/// Flags whose stored value differs from the computed one
pub fn compute_flag_changes(txs: &[Transaction]) -> Vec<FlagChange> {
    let stats = CategoryStats::from_transactions(txs);
    txs.iter()
        .filter_map(|tx| {
            let flag = stats.is_anomalous(tx);
            (flag != tx.is_anomaly).then_some(FlagChange {
                transaction_id: tx.id,
                flag,
            })
        })
        .collect()
}
