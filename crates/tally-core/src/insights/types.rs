//! Core types for insights

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::CategoryTotal;

/// Kinds of insight tips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Month-over-month spending change
    SpendingChange,
    /// Share of income kept this month
    SavingsRate,
    /// Unusually large transactions this month
    Anomaly,
    /// Recurring charges and their monthly total
    Recurring,
    /// Goals that are falling behind
    GoalPace,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::SpendingChange => "spending_change",
            InsightKind::SavingsRate => "savings_rate",
            InsightKind::Anomaly => "anomaly",
            InsightKind::Recurring => "recurring",
            InsightKind::GoalPace => "goal_pace",
        }
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently a tip wants attention. Ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Attention,
    Warning,
    Alert,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Attention => "attention",
            Severity::Warning => "warning",
            Severity::Alert => "alert",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tip shown on the insights page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Insight {
    pub fn new(
        kind: InsightKind,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Current-month figures plus the tips derived from them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsReport {
    /// Month key, YYYY-MM
    pub month: String,
    pub income: f64,
    pub spending: f64,
    /// (income - spending) / income, absent without income
    pub savings_rate: Option<f64>,
    /// Spending change vs last month in percent, absent without last-month spending
    pub spending_change_percent: Option<f64>,
    pub top_categories: Vec<CategoryTotal>,
    pub anomaly_count: usize,
    pub recurring_monthly_total: f64,
    pub tips: Vec<Insight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(InsightKind::GoalPace.to_string(), "goal_pace");
        assert_eq!(InsightKind::SpendingChange.as_str(), "spending_change");
    }

    #[test]
    fn test_severity_orders_by_urgency() {
        assert!(Severity::Alert > Severity::Warning);
        assert!(Severity::Warning > Severity::Attention);
        assert!(Severity::Attention > Severity::Info);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_insight_serializes_snake_case() {
        let tip = Insight::new(InsightKind::SavingsRate, Severity::Alert, "t", "m");
        let json = serde_json::to_value(&tip).unwrap();
        assert_eq!(json["kind"], "savings_rate");
        assert_eq!(json["severity"], "alert");
    }
}
