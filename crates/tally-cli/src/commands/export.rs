//! Transaction export command

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::aggregate::{month_key, parse_month_key};
use tally_core::export::transactions_to_csv_string;
use tally_core::{Classifier, Database};
use tracing::info;

use super::resolve_user;

/// Render a user's transactions as CSV or JSON. Writes to `output`, or stdout.
pub fn cmd_export(
    db: &Database,
    email: &str,
    format: &str,
    month: Option<&str>,
    output: Option<&Path>,
    classifier: &Classifier,
) -> Result<usize> {
    let user = resolve_user(db, email)?;
    let month = month
        .map(|m| parse_month_key(m.trim()).map(month_key))
        .transpose()?;

    let mut txs = db.all_transactions(user.id)?;
    if let Some(month) = &month {
        txs.retain(|t| &month_key(t.date) == month);
    }

    let rendered = match format {
        "csv" => transactions_to_csv_string(&txs, classifier)?,
        "json" => serde_json::to_string_pretty(&txs).context("Failed to serialize transactions")?,
        _ => anyhow::bail!("Unknown export format: {}. Available: csv, json", format),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Exported {} transactions to {}", txs.len(), path.display());
        }
        None => print!("{}", rendered),
    }

    db.log_audit(
        &user.email,
        "export_transactions",
        Some("transaction"),
        None,
        Some(&format!("format={}, month={:?}, count={}", format, month, txs.len())),
    )?;
    info!(count = txs.len(), format, "Exported transactions");

    Ok(txs.len())
}
