//! Built-in insight rules
//!
//! Each rule looks at one aspect of the month and returns zero or more tips.

use super::engine::{AnalysisContext, InsightRule};
use super::types::{Insight, InsightKind, Severity};

/// Month-over-month change (percent) that earns a tip
const SPENDING_CHANGE_THRESHOLD: f64 = 20.0;

/// Savings rate considered healthy
const HEALTHY_SAVINGS_RATE: f64 = 0.20;

/// Compares this month's spending with last month's
pub struct SpendingChangeRule;

impl InsightRule for SpendingChangeRule {
    fn kind(&self) -> InsightKind {
        InsightKind::SpendingChange
    }

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let Some(change) = ctx.spending_change_percent() else {
            return vec![];
        };

        if change >= SPENDING_CHANGE_THRESHOLD {
            vec![Insight::new(
                self.kind(),
                Severity::Warning,
                "Spending is up",
                format!(
                    "You've spent {:.0}% more than last month (${:.2} vs ${:.2}).",
                    change, ctx.spending, ctx.previous_spending
                ),
            )]
        } else if change <= -SPENDING_CHANGE_THRESHOLD {
            vec![Insight::new(
                self.kind(),
                Severity::Info,
                "Spending is down",
                format!(
                    "You've spent {:.0}% less than last month. Nice work!",
                    change.abs()
                ),
            )]
        } else {
            vec![]
        }
    }
}

/// Flags a negative savings rate and praises a healthy one
pub struct SavingsRateRule;

impl InsightRule for SavingsRateRule {
    fn kind(&self) -> InsightKind {
        InsightKind::SavingsRate
    }

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let Some(rate) = ctx.savings_rate() else {
            return vec![];
        };

        if rate < 0.0 {
            vec![Insight::new(
                self.kind(),
                Severity::Alert,
                "Spending exceeds income",
                format!(
                    "You've spent ${:.2} more than you earned this month.",
                    ctx.spending - ctx.income
                ),
            )]
        } else if rate >= HEALTHY_SAVINGS_RATE {
            vec![Insight::new(
                self.kind(),
                Severity::Info,
                "Healthy savings rate",
                format!("You're saving {:.0}% of your income this month.", rate * 100.0),
            )]
        } else {
            vec![]
        }
    }
}

pub struct AnomalyRule;

impl InsightRule for AnomalyRule {
    fn kind(&self) -> InsightKind {
        InsightKind::Anomaly
    }

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        match ctx.anomaly_count() {
            0 => vec![],
            1 => vec![Insight::new(
                self.kind(),
                Severity::Attention,
                "Unusual transaction",
                "One transaction this month is much larger than usual for its category.",
            )],
            n => vec![Insight::new(
                self.kind(),
                Severity::Attention,
                "Unusual transactions",
                format!(
                    "{} transactions this month are much larger than usual for their category.",
                    n
                ),
            )],
        }
    }
}

/// Summarizes recurring charges
pub struct RecurringRule;

impl InsightRule for RecurringRule {
    fn kind(&self) -> InsightKind {
        InsightKind::Recurring
    }

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        if ctx.recurring.is_empty() {
            return vec![];
        }

        let total = crate::recurring::monthly_total(&ctx.recurring);
        let names: Vec<&str> = ctx
            .recurring
            .iter()
            .take(3)
            .map(|g| g.merchant.as_str())
            .collect();

        vec![Insight::new(
            self.kind(),
            Severity::Info,
            "Recurring charges",
            format!(
                "{} recurring charges cost about ${:.2} per month (largest: {}).",
                ctx.recurring.len(),
                total,
                names.join(", ")
            ),
        )]
    }
}

/// Surfaces goals whose projection carries a warning
pub struct GoalPaceRule;

impl InsightRule for GoalPaceRule {
    fn kind(&self) -> InsightKind {
        InsightKind::GoalPace
    }

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        ctx.goals
            .iter()
            .filter(|(_, projection)| projection.warning)
            .map(|(goal, projection)| {
                Insight::new(
                    self.kind(),
                    Severity::Warning,
                    format!("{} is behind", goal.name),
                    projection.tip.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::test_utils::{date, goal, tx_on};

    fn ctx_for<'a>(
        txs: &'a [crate::models::Transaction],
        goals: &'a [crate::models::Goal],
    ) -> AnalysisContext<'a> {
        AnalysisContext::new(txs, goals, date(2024, 5, 20), &Classifier::default())
    }

    #[test]
    fn test_spending_change_thresholds() {
        let up = vec![
            tx_on(date(2024, 4, 5), -100.0, "a", &[]),
            tx_on(date(2024, 5, 5), -130.0, "a", &[]),
        ];
        let tips = SpendingChangeRule.evaluate(&ctx_for(&up, &[]));
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].severity, Severity::Warning);

        let flat = vec![
            tx_on(date(2024, 4, 5), -100.0, "a", &[]),
            tx_on(date(2024, 5, 5), -110.0, "a", &[]),
        ];
        assert!(SpendingChangeRule.evaluate(&ctx_for(&flat, &[])).is_empty());

        let down = vec![
            tx_on(date(2024, 4, 5), -100.0, "a", &[]),
            tx_on(date(2024, 5, 5), -50.0, "a", &[]),
        ];
        let tips = SpendingChangeRule.evaluate(&ctx_for(&down, &[]));
        assert_eq!(tips[0].severity, Severity::Info);
        assert!(tips[0].message.contains("50% less"));
    }

    #[test]
    fn test_savings_rate_bands() {
        let negative = vec![
            tx_on(date(2024, 5, 1), 100.0, "Payroll", &[]),
            tx_on(date(2024, 5, 2), -150.0, "Store", &[]),
        ];
        let tips = SavingsRateRule.evaluate(&ctx_for(&negative, &[]));
        assert_eq!(tips[0].severity, Severity::Alert);
        assert!(tips[0].message.contains("$50.00"));

        let middling = vec![
            tx_on(date(2024, 5, 1), 100.0, "Payroll", &[]),
            tx_on(date(2024, 5, 2), -90.0, "Store", &[]),
        ];
        assert!(SavingsRateRule.evaluate(&ctx_for(&middling, &[])).is_empty());

        let healthy = vec![
            tx_on(date(2024, 5, 1), 100.0, "Payroll", &[]),
            tx_on(date(2024, 5, 2), -50.0, "Store", &[]),
        ];
        let tips = SavingsRateRule.evaluate(&ctx_for(&healthy, &[]));
        assert_eq!(tips[0].severity, Severity::Info);
        assert!(tips[0].message.contains("50%"));
    }

    #[test]
    fn test_anomaly_rule_counts() {
        let mut flagged = tx_on(date(2024, 5, 3), -500.0, "x", &[]);
        flagged.is_anomaly = true;
        let txs = vec![flagged.clone(), flagged];
        let tips = AnomalyRule.evaluate(&ctx_for(&txs, &[]));
        assert_eq!(tips.len(), 1);
        assert!(tips[0].message.starts_with("2 transactions"));

        assert!(AnomalyRule.evaluate(&ctx_for(&[], &[])).is_empty());
    }

    #[test]
    fn test_recurring_rule_reports_total() {
        let txs: Vec<_> = (1..=3)
            .map(|m| tx_on(date(2024, m, 7), -15.49, "NETFLIX.COM", &[]))
            .collect();
        let tips = RecurringRule.evaluate(&ctx_for(&txs, &[]));
        assert_eq!(tips.len(), 1);
        assert!(tips[0].message.contains("$15.49"));
    }

    #[test]
    fn test_goal_pace_only_warns() {
        let behind = goal(5000.0, 0.0, None, Some(date(2024, 1, 1)));
        let fine = goal(1000.0, 900.0, None, None);
        let goals = vec![behind, fine];
        let tips = GoalPaceRule.evaluate(&ctx_for(&[], &goals));
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].severity, Severity::Warning);
    }
}
