//! Financial context handed to the assistant
//!
//! Built from the same aggregation used by the reports so the assistant
//! sees the numbers the user sees.

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{aggregate_by_category, in_month, month_key, totals};
use crate::classify::Classifier;
use crate::goals::progress_percent;
use crate::models::{Account, CategoryTotal, Goal, GoalStatus, Transaction};
use crate::net_worth::current_totals;

/// Number of spending categories included
const TOP_CATEGORIES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct AccountLine {
    pub name: String,
    pub account_type: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalLine {
    pub name: String,
    pub current_amount: f64,
    pub target_amount: f64,
    pub progress_percent: f64,
}

/// Compact summary of a user's finances
#[derive(Debug, Clone, Serialize)]
pub struct FinancialContext {
    pub month: String,
    pub accounts: Vec<AccountLine>,
    pub assets: f64,
    pub liabilities: f64,
    pub month_income: f64,
    pub month_spending: f64,
    pub top_categories: Vec<CategoryTotal>,
    pub goals: Vec<GoalLine>,
}

impl FinancialContext {
    pub fn build(
        accounts: &[Account],
        txs: &[Transaction],
        goals: &[Goal],
        today: NaiveDate,
        classifier: &Classifier,
    ) -> Self {
        let month = month_key(today);
        let this_month = in_month(txs, &month);
        let (month_income, month_spending) = totals(this_month.iter().copied(), classifier);
        let (assets, liabilities) = current_totals(accounts);

        Self {
            accounts: accounts
                .iter()
                .map(|a| AccountLine {
                    name: a.name.clone(),
                    account_type: a.account_type.to_string(),
                    balance: a.effective_balance(),
                })
                .collect(),
            assets,
            liabilities,
            month_income,
            month_spending,
            top_categories: aggregate_by_category(this_month.iter().copied(), TOP_CATEGORIES, classifier),
            goals: goals
                .iter()
                .filter(|g| g.status == GoalStatus::Active)
                .map(|g| GoalLine {
                    name: g.name.clone(),
                    current_amount: g.current_amount,
                    target_amount: g.target_amount,
                    progress_percent: progress_percent(g),
                })
                .collect(),
            month,
        }
    }

    /// Plain-text rendering for a system prompt
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Net worth: ${:.2} (assets ${:.2}, liabilities ${:.2})\n",
            self.assets - self.liabilities,
            self.assets,
            self.liabilities
        ));

        if !self.accounts.is_empty() {
            out.push_str("Accounts:\n");
            for a in &self.accounts {
                out.push_str(&format!("- {} ({}): ${:.2}\n", a.name, a.account_type, a.balance));
            }
        }

        out.push_str(&format!(
            "This month ({}): income ${:.2}, spending ${:.2}\n",
            self.month, self.month_income, self.month_spending
        ));

        if !self.top_categories.is_empty() {
            out.push_str("Top spending categories:\n");
            for c in &self.top_categories {
                out.push_str(&format!("- {}: ${:.2}\n", c.category, c.amount));
            }
        }

        if !self.goals.is_empty() {
            out.push_str("Active goals:\n");
            for g in &self.goals {
                out.push_str(&format!(
                    "- {}: ${:.2} of ${:.2} ({:.0}%)\n",
                    g.name, g.current_amount, g.target_amount, g.progress_percent
                ));
            }
        }

        out
    }
}
