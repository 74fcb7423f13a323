//! Transaction classification heuristics
//!
//! Every reporting view derives flow (income vs expense) and display category
//! from here, so charts, insights and chat context always agree.
//!
//! Amount signs are unreliable across data sources (sandbox feeds report
//! income and spending as positive), so a positive amount is only treated as
//! income when the name also matches an income keyword. The keyword lists are
//! configuration: see [`ClassifierConfig::load`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::Transaction;

/// Environment variable pointing at a classifier TOML file
pub const CLASSIFIER_CONFIG_ENV: &str = "TALLY_CLASSIFIER_CONFIG";

/// Category returned when nothing at all can be matched
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Whether money came in or went out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Income,
    Expense,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Income => "income",
            Flow::Expense => "expense",
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub flow: Flow,
    pub category: String,
}

/// Keywords mapped to a category, matched as case-insensitive substrings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, haystack_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| haystack_lower.contains(&k.to_lowercase()))
    }
}

/// Keyword tables driving classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Name keywords that turn a positive amount into income
    pub income_keywords: Vec<String>,
    /// Rules applied to the merchant name, first match wins
    pub merchant_rules: Vec<KeywordRule>,
    /// Category for a merchant that matches no rule
    pub merchant_default: String,
    /// Rules applied to the display name when there is no merchant
    pub name_rules: Vec<KeywordRule>,
    /// Category for a name that matches no rule
    pub name_default: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            income_keywords: ["deposit", "payroll", "payment received", "credit"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            merchant_rules: vec![
                KeywordRule::new("Transportation", &["uber", "lyft", "taxi"]),
                KeywordRule::new(
                    "Food and Dining",
                    &["restaurant", "food", "cafe", "starbucks"],
                ),
                KeywordRule::new("Shopping", &["amazon", "walmart", "target"]),
                KeywordRule::new("Gas", &["gas", "shell", "chevron"]),
            ],
            merchant_default: "General".to_string(),
            name_rules: vec![
                KeywordRule::new("Transportation", &["uber", "lyft"]),
                KeywordRule::new("Income", &["payroll", "deposit"]),
            ],
            name_default: "General".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Parse a TOML document. Missing tables fall back to the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Default config file location (`<config_dir>/tally/classifier.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tally").join("classifier.toml"))
    }

    /// Resolve configuration: `TALLY_CLASSIFIER_CONFIG`, then the default
    /// path, then built-in defaults. A broken file is logged and ignored.
    pub fn load() -> Self {
        let explicit = std::env::var(CLASSIFIER_CONFIG_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let candidate = explicit.or_else(|| Self::default_path().filter(|p| p.exists()));

        let Some(path) = candidate else {
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded classifier config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid classifier config, using defaults");
                Self::default()
            }
        }
    }
}

/// Stateless classifier over a keyword configuration
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify flow and category in one pass
    pub fn classify(&self, tx: &Transaction) -> Classification {
        Classification {
            flow: self.flow(tx.amount, &tx.name),
            category: self.category(&tx.category, tx.merchant_name.as_deref(), &tx.name),
        }
    }

    /// Income only when the amount is positive and the name says so
    pub fn flow(&self, amount: f64, name: &str) -> Flow {
        if amount < 0.0 {
            return Flow::Expense;
        }
        if amount > 0.0 {
            let lower = name.to_lowercase();
            if self
                .config
                .income_keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()))
            {
                return Flow::Income;
            }
        }
        Flow::Expense
    }

    /// Display category: label, then merchant rules, then name rules
    pub fn category(&self, labels: &[String], merchant_name: Option<&str>, name: &str) -> String {
        if let Some(primary) = labels.first().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            return primary.to_string();
        }

        if let Some(merchant) = present(merchant_name) {
            let lower = merchant.to_lowercase();
            return self
                .config
                .merchant_rules
                .iter()
                .find(|r| r.matches(&lower))
                .map(|r| r.category.clone())
                .unwrap_or_else(|| self.config.merchant_default.clone());
        }

        if let Some(name) = present(Some(name)) {
            let lower = name.to_lowercase();
            return self
                .config
                .name_rules
                .iter()
                .find(|r| r.matches(&lower))
                .map(|r| r.category.clone())
                .unwrap_or_else(|| self.config.name_default.clone());
        }

        UNCATEGORIZED.to_string()
    }
}

/// Classify with the built-in keyword tables
pub fn classify(tx: &Transaction) -> Classification {
    Classifier::default().classify(tx)
}

fn present(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tx;

    #[test]
    fn test_negative_amount_is_expense_regardless_of_name() {
        for name in ["Payroll Deposit", "Payment Received", "CREDIT", "Coffee"] {
            let t = tx(-10.0, name, None, &[]);
            assert_eq!(classify(&t).flow, Flow::Expense, "name={}", name);
        }
    }

    #[test]
    fn test_positive_payroll_is_income() {
        let t = tx(2000.0, "ACME PAYROLL", None, &[]);
        assert_eq!(classify(&t).flow, Flow::Income);

        let t = tx(15.0, "Payment received - thanks", None, &[]);
        assert_eq!(classify(&t).flow, Flow::Income);
    }

    #[test]
    fn test_positive_without_keyword_is_expense() {
        // Sandbox feeds report purchases as positive
        let t = tx(12.5, "Starbucks", Some("Starbucks"), &[]);
        assert_eq!(classify(&t).flow, Flow::Expense);
    }

    #[test]
    fn test_zero_amount_is_expense() {
        let t = tx(0.0, "Direct Deposit", None, &[]);
        assert_eq!(classify(&t).flow, Flow::Expense);
    }

    #[test]
    fn test_category_label_wins() {
        let t = tx(-5.0, "Uber 123", Some("Uber"), &["Travel", "Taxi"]);
        assert_eq!(classify(&t).category, "Travel");
    }

    #[test]
    fn test_blank_label_falls_through() {
        let t = tx(-5.0, "whatever", Some("Lyft"), &["  "]);
        assert_eq!(classify(&t).category, "Transportation");
    }

    #[test]
    fn test_merchant_rules() {
        let cases = [
            ("UBER TRIP", "Transportation"),
            ("Blue Bottle Cafe", "Food and Dining"),
            ("Amazon Marketplace", "Shopping"),
            ("Shell Oil 5521", "Gas"),
            ("Local Hardware", "General"),
        ];
        for (merchant, expected) in cases {
            let t = tx(-20.0, "purchase", Some(merchant), &[]);
            assert_eq!(classify(&t).category, expected, "merchant={}", merchant);
        }
    }

    #[test]
    fn test_name_rules_without_merchant() {
        assert_eq!(
            classify(&tx(-9.0, "LYFT RIDE", None, &[])).category,
            "Transportation"
        );
        assert_eq!(
            classify(&tx(900.0, "Payroll", None, &[])).category,
            "Income"
        );
        assert_eq!(
            classify(&tx(-9.0, "Some shop", None, &[])).category,
            "General"
        );
    }

    #[test]
    fn test_uncategorized_when_nothing_present() {
        let t = tx(-9.0, "   ", Some(""), &[]);
        assert_eq!(classify(&t).category, UNCATEGORIZED);
    }

    #[test]
    fn test_custom_config_from_toml() {
        let config = ClassifierConfig::from_toml_str(
            r#"
            income_keywords = ["salary"]

            [[merchant_rules]]
            category = "Coffee"
            keywords = ["starbucks"]
            "#,
        )
        .unwrap();
        let classifier = Classifier::new(config);

        // "payroll" is no longer an income keyword
        assert_eq!(classifier.flow(100.0, "payroll"), Flow::Expense);
        assert_eq!(classifier.flow(100.0, "Monthly SALARY"), Flow::Income);

        let t = tx(-4.0, "x", Some("Starbucks #12"), &[]);
        assert_eq!(classifier.classify(&t).category, "Coffee");

        // Unspecified tables keep their defaults
        assert_eq!(classifier.config().merchant_default, "General");
        assert_eq!(classifier.config().name_rules.len(), 2);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.toml");
        std::fs::write(&path, "merchant_default = \"Misc\"\n").unwrap();

        let config = ClassifierConfig::from_file(&path).unwrap();
        assert_eq!(config.merchant_default, "Misc");
        assert_eq!(config.income_keywords.len(), 4);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(ClassifierConfig::from_toml_str("income_keywords = 5").is_err());
    }
}
