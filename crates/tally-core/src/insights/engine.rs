//! Insight engine - runs rules over one month of data

use chrono::NaiveDate;

use crate::aggregate::{aggregate_by_category, in_month, month_key, previous_month_key, totals};
use crate::classify::Classifier;
use crate::goals::{project_goal, GoalProjection};
use crate::models::{Goal, GoalStatus, Transaction};
use crate::recurring::{find_recurring, RecurringGroup};

use super::rules::{AnomalyRule, GoalPaceRule, RecurringRule, SavingsRateRule, SpendingChangeRule};
use super::types::{Insight, InsightKind, InsightsReport};

/// Number of categories shown alongside the tips
const TOP_CATEGORIES: usize = 3;

/// Figures shared by every rule, computed once
pub struct AnalysisContext<'a> {
    pub month: String,
    pub income: f64,
    pub spending: f64,
    pub previous_spending: f64,
    /// Transactions dated in `month`
    pub current: Vec<&'a Transaction>,
    pub recurring: Vec<RecurringGroup>,
    /// Active goals with their projections
    pub goals: Vec<(&'a Goal, GoalProjection)>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        txs: &'a [Transaction],
        goals: &'a [Goal],
        today: NaiveDate,
        classifier: &Classifier,
    ) -> Self {
        let month = month_key(today);
        let previous = previous_month_key(today, 1);

        let current: Vec<&Transaction> = in_month(txs, &month);
        let (income, spending) = totals(current.iter().copied(), classifier);
        let (_, previous_spending) = totals(in_month(txs, &previous), classifier);

        Self {
            month,
            income,
            spending,
            previous_spending,
            current,
            recurring: find_recurring(txs, classifier),
            goals: goals
                .iter()
                .filter(|g| g.status == GoalStatus::Active)
                .map(|g| (g, project_goal(g, today)))
                .collect(),
        }
    }

    pub fn savings_rate(&self) -> Option<f64> {
        (self.income > 0.0).then(|| (self.income - self.spending) / self.income)
    }

    pub fn spending_change_percent(&self) -> Option<f64> {
        (self.previous_spending > 0.0)
            .then(|| (self.spending - self.previous_spending) / self.previous_spending * 100.0)
    }

    pub fn anomaly_count(&self) -> usize {
        self.current.iter().filter(|t| t.is_anomaly).count()
    }
}

/// A rule that turns analysis figures into tips
pub trait InsightRule: Send + Sync {
    fn kind(&self) -> InsightKind;

    fn evaluate(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight>;
}

/// Runs every registered rule
pub struct InsightEngine {
    rules: Vec<Box<dyn InsightRule>>,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    /// Create an engine with the built-in rules
    pub fn new() -> Self {
        let mut engine = Self { rules: vec![] };

        engine.register(Box::new(SpendingChangeRule));
        engine.register(Box::new(SavingsRateRule));
        engine.register(Box::new(AnomalyRule));
        engine.register(Box::new(RecurringRule));
        engine.register(Box::new(GoalPaceRule));

        engine
    }

    pub fn register(&mut self, rule: Box<dyn InsightRule>) {
        self.rules.push(rule);
    }

    pub fn kinds(&self) -> Vec<InsightKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    /// Evaluate all rules, highest severity first
    pub fn analyze_all(&self, ctx: &AnalysisContext<'_>) -> Vec<Insight> {
        let mut tips = vec![];

        for rule in &self.rules {
            let found = rule.evaluate(ctx);
            tracing::debug!(rule = rule.kind().as_str(), count = found.len(), "Insight rule evaluated");
            tips.extend(found);
        }

        // Stable sort keeps registration order within a severity
        tips.sort_by(|a, b| b.severity.cmp(&a.severity));
        tips
    }
}

/// Insights for the month containing `today`
pub fn build_insights(
    txs: &[Transaction],
    goals: &[Goal],
    today: NaiveDate,
    classifier: &Classifier,
) -> InsightsReport {
    let ctx = AnalysisContext::new(txs, goals, today, classifier);
    let tips = InsightEngine::new().analyze_all(&ctx);

    InsightsReport {
        month: ctx.month.clone(),
        income: ctx.income,
        spending: ctx.spending,
        savings_rate: ctx.savings_rate(),
        spending_change_percent: ctx.spending_change_percent(),
        top_categories: aggregate_by_category(ctx.current.iter().copied(), TOP_CATEGORIES, classifier),
        anomaly_count: ctx.anomaly_count(),
        recurring_monthly_total: crate::recurring::monthly_total(&ctx.recurring),
        tips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::Severity;
    use crate::test_utils::{date, goal, tx_on};

    fn classifier() -> Classifier {
        Classifier::default()
    }

    #[test]
    fn test_engine_registers_all_rules() {
        let kinds = InsightEngine::new().kinds();
        assert_eq!(kinds.len(), 5);
        assert!(kinds.contains(&InsightKind::GoalPace));
    }

    #[test]
    fn test_empty_data_has_no_tips() {
        let report = build_insights(&[], &[], date(2024, 5, 15), &classifier());
        assert_eq!(report.month, "2024-05");
        assert!(report.tips.is_empty());
        assert_eq!(report.savings_rate, None);
        assert_eq!(report.spending_change_percent, None);
    }

    #[test]
    fn test_report_figures() {
        let txs = vec![
            tx_on(date(2024, 4, 10), -100.0, "Store", &["Shopping"]),
            tx_on(date(2024, 5, 1), 1000.0, "Payroll", &[]),
            tx_on(date(2024, 5, 3), -150.0, "Store", &["Shopping"]),
            tx_on(date(2024, 5, 5), -50.0, "Grocer", &["Groceries"]),
        ];
        let report = build_insights(&txs, &[], date(2024, 5, 20), &classifier());

        assert_eq!(report.income, 1000.0);
        assert_eq!(report.spending, 200.0);
        assert_eq!(report.savings_rate, Some(0.8));
        assert_eq!(report.spending_change_percent, Some(100.0));
        assert_eq!(report.top_categories[0].category, "Shopping");
        assert_eq!(report.top_categories.len(), 2);
    }

    #[test]
    fn test_tips_sorted_by_severity() {
        let txs = vec![
            // Spending doubled (warning) and exceeds income (alert)
            tx_on(date(2024, 4, 10), -100.0, "Store", &[]),
            tx_on(date(2024, 5, 1), 100.0, "Payroll", &[]),
            tx_on(date(2024, 5, 3), -200.0, "Store", &[]),
        ];
        let goals = vec![goal(5000.0, 0.0, None, Some(date(2024, 1, 1)))];
        let report = build_insights(&txs, &goals, date(2024, 5, 20), &classifier());

        let severities: Vec<Severity> = report.tips.iter().map(|t| t.severity).collect();
        assert_eq!(severities[0], Severity::Alert);
        assert!(severities
            .windows(2)
            .all(|w| w[0] >= w[1]));
        assert!(report.tips.iter().any(|t| t.kind == InsightKind::GoalPace));
    }

    #[test]
    fn test_anomaly_count_only_current_month() {
        let mut old = tx_on(date(2024, 4, 10), -900.0, "x", &[]);
        old.is_anomaly = true;
        let mut new = tx_on(date(2024, 5, 10), -900.0, "x", &[]);
        new.is_anomaly = true;
        let report = build_insights(&[old, new], &[], date(2024, 5, 20), &classifier());
        assert_eq!(report.anomaly_count, 1);
    }
}
