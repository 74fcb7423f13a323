//! Transaction CSV export
//!
//! Flow and category columns come from the classifier so the export matches
//! what the reports show.

use std::io::Write;

use serde::Serialize;

use crate::classify::Classifier;
use crate::error::Result;
use crate::models::Transaction;

/// One exported CSV row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    date: String,
    name: &'a str,
    merchant_name: &'a str,
    amount: String,
    flow: &'static str,
    category: String,
    pending: bool,
    is_anomaly: bool,
    is_recurring: bool,
    /// Semicolon-separated
    tags: String,
}

/// Write `txs` as CSV with a header row. Returns the number of rows written.
pub fn export_transactions_csv<W: Write>(
    txs: &[Transaction],
    classifier: &Classifier,
    writer: W,
) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);

    for tx in txs {
        let classification = classifier.classify(tx);
        csv.serialize(ExportRow {
            date: tx.date.format("%Y-%m-%d").to_string(),
            name: &tx.name,
            merchant_name: tx.merchant_name.as_deref().unwrap_or(""),
            amount: format!("{:.2}", tx.amount),
            flow: classification.flow.as_str(),
            category: classification.category,
            pending: tx.pending,
            is_anomaly: tx.is_anomaly,
            is_recurring: tx.is_recurring,
            tags: tx.tags.join(";"),
        })?;
    }

    if txs.is_empty() {
        csv.write_record([
            "date",
            "name",
            "merchant_name",
            "amount",
            "flow",
            "category",
            "pending",
            "is_anomaly",
            "is_recurring",
            "tags",
        ])?;
    }

    csv.flush()?;
    Ok(txs.len())
}

/// Convenience wrapper returning the CSV as a string
pub fn transactions_to_csv_string(txs: &[Transaction], classifier: &Classifier) -> Result<String> {
    let mut buf = Vec::new();
    export_transactions_csv(txs, classifier, &mut buf)?;
    String::from_utf8(buf).map_err(|e| crate::error::Error::InvalidData(e.to_string()))
}
