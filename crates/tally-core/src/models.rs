//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string, never sent to clients
    #[serde(skip_serializing, default)]
    pub pin_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregator account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Depository,
    Credit,
    Loan,
    Investment,
    #[default]
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depository => "depository",
            Self::Credit => "credit",
            Self::Loan => "loan",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "depository" => Ok(Self::Depository),
            "credit" => Ok(Self::Credit),
            "loan" => Ok(Self::Loan),
            "investment" | "brokerage" => Ok(Self::Investment),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank account synced from the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub plaid_account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: AccountType,
    pub subtype: Option<String>,
    pub current_balance: Option<f64>,
    pub available_balance: Option<f64>,
    pub currency_code: String,
    pub institution_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Balance used for net worth: current, else available, else zero
    pub fn effective_balance(&self) -> f64 {
        self.current_balance
            .or(self.available_balance)
            .filter(|b| b.is_finite())
            .unwrap_or(0.0)
    }

    /// Negative balances are liabilities
    pub fn is_liability(&self) -> bool {
        self.effective_balance() < 0.0
    }
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub plaid_transaction_id: String,
    pub plaid_account_id: String,
    /// Signed amount. The sign is only a hint: some sources report every
    /// amount as positive, see `classify`.
    pub amount: f64,
    pub date: NaiveDate,
    pub name: String,
    pub merchant_name: Option<String>,
    /// Category labels, first element treated as primary
    pub category: Vec<String>,
    pub pending: bool,
    pub is_anomaly: bool,
    pub is_recurring: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Primary category label if present and non-blank
    pub fn primary_category(&self) -> Option<&str> {
        self.category
            .first()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }
}

/// Goal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Paused,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown goal status: {}", s)),
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A savings goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub deadline: Option<NaiveDate>,
    pub monthly_contribution: Option<f64>,
    pub status: GoalStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A new goal (before DB insertion)
#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    pub deadline: Option<NaiveDate>,
    pub monthly_contribution: Option<f64>,
}

/// Partial update to a goal. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalUpdate {
    pub name: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
    #[serde(default, with = "double_option")]
    pub deadline: Option<Option<NaiveDate>>,
    #[serde(default, with = "double_option")]
    pub monthly_contribution: Option<Option<f64>>,
    pub status: Option<GoalStatus>,
}

/// Distinguishes a missing field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown chat role: {}", s)),
        }
    }
}

/// A chat session with the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    /// Whether assistant replies may consult the user's financial data
    pub share_financial_data: bool,
    pub created_at: DateTime<Utc>,
}

/// A single message within a chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Chat with its full message history
#[derive(Debug, Clone, Serialize)]
pub struct ChatWithMessages {
    #[serde(flatten)]
    pub chat: Chat,
    pub messages: Vec<ChatMessage>,
}

/// Link between a user and their bank aggregator item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankLink {
    pub user_id: i64,
    pub institution_name: Option<String>,
    pub linked_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Report types
// ============================================================================

/// One month of the cashflow chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashflow {
    /// Month key, YYYY-MM
    pub month: String,
    pub inflow: f64,
    pub outflow: f64,
    pub net: f64,
}

/// Spending total for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

/// Balances as of the end of a month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthSnapshot {
    pub month: String,
    pub assets: f64,
    pub liabilities: f64,
    pub net_worth: f64,
}

/// Net-worth trend plus the live totals it was reconstructed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetWorthReport {
    pub history: Vec<NetWorthSnapshot>,
    pub current: NetWorthSnapshot,
}
