//! Test fixtures shared by unit tests and downstream crates
//!
//! Enabled for this crate's tests and for other crates via the `test-utils`
//! feature.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{NaiveDate, Utc};

use crate::models::{Account, AccountType, Goal, GoalStatus, Transaction};
use crate::sync::{SyncAccount, SyncTransaction};

static COUNTER: AtomicI64 = AtomicI64::new(1);

fn next_id() -> i64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Shorthand for a calendar date
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// Transaction dated 2024-01-15
pub fn tx(amount: f64, name: &str, merchant: Option<&str>, category: &[&str]) -> Transaction {
    let mut t = tx_on(date(2024, 1, 15), amount, name, category);
    t.merchant_name = merchant.map(str::to_string);
    t
}

/// Transaction on a specific date, without merchant
pub fn tx_on(on: NaiveDate, amount: f64, name: &str, category: &[&str]) -> Transaction {
    let id = next_id();
    Transaction {
        id,
        user_id: 1,
        plaid_transaction_id: format!("tx_{}", id),
        plaid_account_id: "acc_checking".to_string(),
        amount,
        date: on,
        name: name.to_string(),
        merchant_name: None,
        category: category.iter().map(|c| c.to_string()).collect(),
        pending: false,
        is_anomaly: false,
        is_recurring: false,
        tags: vec![],
        created_at: Utc::now(),
    }
}

/// Account with a current balance
pub fn account(plaid_id: &str, balance: f64) -> Account {
    Account {
        id: next_id(),
        user_id: 1,
        plaid_account_id: plaid_id.to_string(),
        name: plaid_id.to_string(),
        official_name: None,
        account_type: if balance < 0.0 {
            AccountType::Credit
        } else {
            AccountType::Depository
        },
        subtype: None,
        current_balance: Some(balance),
        available_balance: None,
        currency_code: "USD".to_string(),
        institution_name: None,
        updated_at: Utc::now(),
    }
}

/// Active goal
pub fn goal(
    target: f64,
    current: f64,
    monthly_contribution: Option<f64>,
    deadline: Option<NaiveDate>,
) -> Goal {
    Goal {
        id: next_id(),
        user_id: 1,
        name: "Emergency fund".to_string(),
        target_amount: target,
        current_amount: current,
        deadline,
        monthly_contribution,
        status: GoalStatus::Active,
        completed_at: None,
        created_at: Utc::now(),
    }
}

/// Aggregator account record
pub fn sync_account(plaid_id: &str, balance: f64) -> SyncAccount {
    SyncAccount {
        account_id: plaid_id.to_string(),
        name: plaid_id.to_string(),
        official_name: None,
        account_type: "depository".to_string(),
        subtype: Some("checking".to_string()),
        current_balance: Some(balance),
        available_balance: None,
        iso_currency_code: Some("USD".to_string()),
    }
}

/// Aggregator transaction record
pub fn sync_tx(
    transaction_id: &str,
    account_id: &str,
    amount: f64,
    on: NaiveDate,
    name: &str,
    category: &[&str],
) -> SyncTransaction {
    SyncTransaction {
        transaction_id: transaction_id.to_string(),
        account_id: account_id.to_string(),
        amount,
        date: on,
        name: name.to_string(),
        merchant_name: None,
        category: category.iter().map(|c| c.to_string()).collect(),
        pending: false,
    }
}
