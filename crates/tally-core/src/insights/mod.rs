//! Insights - monthly tips derived from spending, recurring charges and goals
//!
//! Rules are pluggable: each one implements [`InsightRule`] and the
//! [`InsightEngine`] runs them over a shared [`AnalysisContext`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::insights::build_insights;
//!
//! let report = build_insights(&txs, &goals, today, &classifier);
//! for tip in &report.tips {
//!     println!("[{}] {}", tip.severity, tip.title);
//! }
//! ```

pub mod engine;
pub mod rules;
pub mod types;

pub use engine::{build_insights, AnalysisContext, InsightEngine, InsightRule};
pub use types::{Insight, InsightKind, InsightsReport, Severity};
