//! Bank aggregator sync payloads
//!
//! These mirror the aggregator's output contract: accounts with balances and
//! incremental transaction changes (added, modified, removed). Records are
//! normalized here before they reach the database.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::AccountType;

/// One incremental sync from the aggregator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub institution_name: Option<String>,
    #[serde(default)]
    pub accounts: Vec<SyncAccount>,
    #[serde(default)]
    pub added: Vec<SyncTransaction>,
    #[serde(default)]
    pub modified: Vec<SyncTransaction>,
    /// Aggregator transaction ids to delete
    #[serde(default)]
    pub removed: Vec<String>,
}

/// Account record as reported by the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub current_balance: Option<f64>,
    #[serde(default)]
    pub available_balance: Option<f64>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

impl SyncAccount {
    pub fn parsed_type(&self) -> AccountType {
        self.account_type.parse().unwrap_or_default()
    }
}

/// Transaction record as reported by the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub pending: bool,
}

/// Counts of what a sync changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub accounts: usize,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    /// Anomaly flags changed by the post-sync detection run
    #[serde(default)]
    pub anomalies_changed: usize,
    /// Recurring flags changed by the post-sync detection run
    #[serde(default)]
    pub recurring_changed: usize,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SyncPayload {
    /// Parse a payload from JSON text
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Reject records the database cannot store and tidy optional strings
    pub fn normalize(mut self) -> Result<Self> {
        for account in &mut self.accounts {
            if account.account_id.trim().is_empty() {
                return Err(Error::InvalidData("Account without account_id".into()));
            }
            account.official_name = blank_to_none(account.official_name.take());
            account.subtype = blank_to_none(account.subtype.take());
            account.current_balance = account.current_balance.filter(|b| b.is_finite());
            account.available_balance = account.available_balance.filter(|b| b.is_finite());
        }

        for tx in self.added.iter_mut().chain(self.modified.iter_mut()) {
            if tx.transaction_id.trim().is_empty() {
                return Err(Error::InvalidData(
                    "Transaction without transaction_id".into(),
                ));
            }
            if !tx.amount.is_finite() {
                return Err(Error::InvalidData(format!(
                    "Transaction {} has a non-finite amount",
                    tx.transaction_id
                )));
            }
            tx.merchant_name = blank_to_none(tx.merchant_name.take());
        }

        self.institution_name = blank_to_none(self.institution_name.take());
        self.removed.retain(|id| !id.trim().is_empty());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_payload() {
        let payload = SyncPayload::from_json(
            r#"{
                "accounts": [{"account_id": "a1", "name": "Checking", "type": "depository",
                              "current_balance": 120.5}],
                "added": [{"transaction_id": "t1", "account_id": "a1", "amount": -4.5,
                           "date": "2024-02-03", "name": "Coffee"}]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.accounts.len(), 1);
        assert_eq!(payload.accounts[0].parsed_type(), AccountType::Depository);
        assert_eq!(payload.added[0].date.to_string(), "2024-02-03");
        assert!(payload.added[0].category.is_empty());
        assert!(payload.modified.is_empty());
        assert!(payload.removed.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result = SyncPayload::from_json(
            r#"{"added": [{"transaction_id": "t1", "account_id": "a1", "date": "2024-02-03", "name": "x"}]}"#,
        );
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_unknown_account_type_defaults_to_other() {
        let mut account = crate::test_utils::sync_account("a1", 1.0);
        account.account_type = "crypto".to_string();
        assert_eq!(account.parsed_type(), AccountType::Other);
    }

    #[test]
    fn test_normalize_cleans_optional_strings() {
        let mut tx = crate::test_utils::sync_tx(
            "t1",
            "a1",
            -3.0,
            crate::test_utils::date(2024, 1, 1),
            "Cafe",
            &["", "Food"],
        );
        tx.merchant_name = Some("   ".to_string());
        let payload = SyncPayload {
            institution_name: Some(" ".to_string()),
            added: vec![tx],
            removed: vec!["".to_string(), "t9".to_string()],
            ..Default::default()
        }
        .normalize()
        .unwrap();

        assert_eq!(payload.institution_name, None);
        assert_eq!(payload.added[0].merchant_name, None);
        // A blank primary label is kept so classification falls through to the merchant
        assert_eq!(payload.added[0].category.len(), 2);
        assert_eq!(payload.removed, vec!["t9".to_string()]);
    }

    #[test]
    fn test_normalize_rejects_non_finite_amount() {
        let tx = crate::test_utils::sync_tx(
            "t1",
            "a1",
            f64::INFINITY,
            crate::test_utils::date(2024, 1, 1),
            "Cafe",
            &[],
        );
        let payload = SyncPayload {
            added: vec![tx],
            ..Default::default()
        };
        assert!(matches!(payload.normalize(), Err(Error::InvalidData(_))));
    }
}
