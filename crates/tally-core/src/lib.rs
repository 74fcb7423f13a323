//! Tally Core Library
//!
//! Shared functionality for the Tally personal finance backend:
//! - Transaction classification, shared by every view
//! - Month and category aggregation
//! - Anomaly and recurring-charge detection
//! - Net-worth reconstruction and goal projection
//! - Monthly insights
//! - Pluggable chat assistant backends
//! - PIN hashing and session tokens
//! - Encrypted SQLite database access

pub mod aggregate;
pub mod anomaly;
pub mod auth;
pub mod chat;
pub mod classify;
pub mod db;
pub mod error;
pub mod export;
pub mod goals;
pub mod insights;
pub mod models;
pub mod net_worth;
pub mod recurring;
pub mod sync;

#[cfg(test)]
mod test_utils;

pub use aggregate::{aggregate_by_category, aggregate_by_month, month_key};
pub use auth::{Claims, TokenSigner};
pub use chat::{ChatBackend, ChatClient, FinancialContext, MockBackend, OpenAICompatibleBackend};
pub use classify::{classify, Classification, Classifier, ClassifierConfig, Flow};
pub use db::{AuditEntry, Database, TransactionFilter, UnlinkResult};
pub use error::{Error, Result};
pub use goals::{project_goal, GoalProjection};
pub use insights::{build_insights, Insight, InsightKind, InsightsReport, Severity};
pub use net_worth::reconstruct_net_worth;
pub use sync::{SyncAccount, SyncPayload, SyncResult, SyncTransaction};
