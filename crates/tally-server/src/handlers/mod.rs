//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod accounts;
pub mod audit;
pub mod auth;
pub mod chats;
pub mod detection;
pub mod export;
pub mod goals;
pub mod reports;
pub mod transactions;

// Re-export all handlers for use in router
pub use accounts::*;
pub use audit::*;
pub use auth::*;
pub use chats::*;
pub use detection::*;
pub use export::*;
pub use goals::*;
pub use reports::*;
pub use transactions::*;

/// Today's date in UTC, the reference point for month-relative reports
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
