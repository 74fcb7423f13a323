//! Net-worth history reconstruction
//!
//! Only today's balances are known, so history is rebuilt by walking months
//! backwards from the present and undoing each month's cashflow against the
//! asset total. Liabilities are held at their present value throughout;
//! the result is an approximation for trend charts, not a ledger.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aggregate::month_key;
use crate::classify::{Classifier, Flow};
use crate::models::{Account, NetWorthReport, NetWorthSnapshot, Transaction};

/// Present-day (assets, liabilities) from account balances
pub fn current_totals(accounts: &[Account]) -> (f64, f64) {
    accounts.iter().fold((0.0, 0.0), |(assets, liabilities), acct| {
        let balance = acct.effective_balance();
        if balance < 0.0 {
            (assets, liabilities + balance.abs())
        } else {
            (assets + balance, liabilities)
        }
    })
}

fn snapshot(month: String, assets: f64, liabilities: f64) -> NetWorthSnapshot {
    NetWorthSnapshot {
        month,
        assets,
        liabilities,
        net_worth: assets - liabilities,
    }
}

/// Rebuild month-end snapshots, ascending by month
///
/// Each month's snapshot is recorded before that month's transactions are
/// reversed, so it reflects every later month's reversal but not its own.
/// The snapshot for `today`'s month always carries live balances.
/// Transactions dated in a later month are ignored.
pub fn reconstruct_net_worth(
    accounts: &[Account],
    txs: &[Transaction],
    today: NaiveDate,
    classifier: &Classifier,
) -> NetWorthReport {
    let (assets, liabilities) = current_totals(accounts);

    let current_month = month_key(today);

    let mut by_month: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in txs.iter().filter(|tx| month_key(tx.date) <= current_month) {
        by_month.entry(month_key(tx.date)).or_default().push(tx);
    }

    let mut history: BTreeMap<String, NetWorthSnapshot> = BTreeMap::new();
    let mut running_assets = assets;

    for (month, month_txs) in by_month.iter().rev() {
        history.insert(
            month.clone(),
            snapshot(month.clone(), running_assets, liabilities),
        );

        for tx in month_txs {
            match classifier.flow(tx.amount, &tx.name) {
                Flow::Income => running_assets -= tx.amount,
                Flow::Expense => running_assets += tx.amount.abs(),
            }
        }
    }

    let current = snapshot(current_month, assets, liabilities);
    history.insert(current.month.clone(), current.clone());

    NetWorthReport {
        history: history.into_values().collect(),
        current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{account, date, tx_on};

    fn classifier() -> Classifier {
        Classifier::default()
    }

    #[test]
    fn test_current_totals_split_assets_and_liabilities() {
        let accounts = vec![
            account("checking", 1500.0),
            account("savings", 500.0),
            account("card", -300.0),
        ];
        assert_eq!(current_totals(&accounts), (2000.0, 300.0));
    }

    #[test]
    fn test_effective_balance_falls_back_to_available() {
        let mut acct = account("checking", 0.0);
        acct.current_balance = None;
        acct.available_balance = Some(42.0);
        let mut empty = account("empty", 0.0);
        empty.current_balance = None;
        assert_eq!(current_totals(&[acct, empty]), (42.0, 0.0));
    }

    #[test]
    fn test_no_transactions_yields_current_month_only() {
        let report = reconstruct_net_worth(
            &[account("checking", 1000.0)],
            &[],
            date(2024, 6, 10),
            &classifier(),
        );
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.history[0].month, "2024-06");
        assert_eq!(report.history[0].net_worth, 1000.0);
        assert_eq!(report.current, report.history[0]);
    }

    #[test]
    fn test_walks_back_through_months() {
        let accounts = vec![account("checking", 1000.0), account("card", -200.0)];
        let txs = vec![
            tx_on(date(2024, 4, 1), 3000.0, "Payroll", &[]),
            tx_on(date(2024, 4, 20), -400.0, "Rent", &[]),
            tx_on(date(2024, 5, 1), 3000.0, "Payroll", &[]),
            tx_on(date(2024, 5, 15), -100.0, "Groceries", &[]),
        ];
        let report = reconstruct_net_worth(&accounts, &txs, date(2024, 6, 3), &classifier());

        let months: Vec<&str> = report.history.iter().map(|s| s.month.as_str()).collect();
        assert_eq!(months, vec!["2024-04", "2024-05", "2024-06"]);

        // May recorded from live balances, then May reversed: 1000 - 3000 + 100
        assert_eq!(report.history[1].assets, 1000.0);
        assert_eq!(report.history[0].assets, -1900.0);
        assert!(report.history.iter().all(|s| s.liabilities == 200.0));
        assert_eq!(report.history[0].net_worth, -2100.0);
        assert_eq!(report.history[2].net_worth, 800.0);
    }

    #[test]
    fn test_current_month_overwritten_with_live_balances() {
        let accounts = vec![account("checking", 500.0)];
        let txs = vec![
            tx_on(date(2024, 5, 2), -50.0, "Coffee", &[]),
            tx_on(date(2024, 6, 2), -70.0, "Coffee", &[]),
        ];
        let report = reconstruct_net_worth(&accounts, &txs, date(2024, 6, 30), &classifier());

        assert_eq!(report.history.len(), 2);
        assert_eq!(report.history[1].month, "2024-06");
        assert_eq!(report.history[1].assets, 500.0);
        // June's spending added back before recording May
        assert_eq!(report.history[0].assets, 570.0);
    }

    #[test]
    fn test_future_dated_transactions_are_ignored() {
        let accounts = vec![account("checking", 500.0)];
        let past = tx_on(date(2024, 5, 2), -50.0, "Coffee", &[]);
        let scheduled = tx_on(date(2024, 8, 1), -900.0, "Rent", &[]);
        let today = date(2024, 6, 15);

        let without = reconstruct_net_worth(&accounts, &[past.clone()], today, &classifier());
        let with = reconstruct_net_worth(&accounts, &[past, scheduled], today, &classifier());

        assert_eq!(with.history, without.history);
        assert_eq!(with.history.last().map(|s| s.month.as_str()), Some("2024-06"));
        assert_eq!(with.history[0].assets, 500.0);
    }

    #[test]
    fn test_unsorted_input_gives_same_result() {
        let accounts = vec![account("checking", 100.0)];
        let a = tx_on(date(2024, 1, 5), -10.0, "x", &[]);
        let b = tx_on(date(2024, 2, 5), -20.0, "y", &[]);
        let sorted = reconstruct_net_worth(
            &accounts,
            &[a.clone(), b.clone()],
            date(2024, 3, 1),
            &classifier(),
        );
        let shuffled = reconstruct_net_worth(&accounts, &[b, a], date(2024, 3, 1), &classifier());
        assert_eq!(sorted.history, shuffled.history);
    }
}
