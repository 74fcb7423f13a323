//! Transaction operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{parse_date, parse_datetime, parse_string_list, Database};
use crate::anomaly::{self, FlagChange};
use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::models::Transaction;
use crate::recurring;
use crate::sync::SyncTransaction;

const TRANSACTION_COLUMNS: &str = "id, user_id, plaid_transaction_id, plaid_account_id, amount, \
     date, name, merchant_name, category, pending, is_anomaly, is_recurring, tags, created_at";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(5)?;
    let created_at_str: String = row.get(13)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plaid_transaction_id: row.get(2)?,
        plaid_account_id: row.get(3)?,
        amount: row.get(4)?,
        date: parse_date(&date_str)?,
        name: row.get(6)?,
        merchant_name: row.get(7)?,
        category: parse_string_list(row.get(8)?),
        pending: row.get(9)?,
        is_anomaly: row.get(10)?,
        is_recurring: row.get(11)?,
        tags: parse_string_list(row.get(12)?),
        created_at: parse_datetime(&created_at_str),
    })
}

/// Filters for listing transactions
///
/// Month and account are applied in SQL. Category is the classified display
/// category, so it is applied after loading and pagination follows it.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// YYYY-MM
    pub month: Option<String>,
    pub category: Option<String>,
    pub account_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn month(mut self, month: Option<String>) -> Self {
        self.month = month;
        self
    }

    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn account_id(mut self, account_id: Option<String>) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }
}

/// Trim, drop blanks and de-duplicate tags, keeping first occurrence order
fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Insert or update a synced transaction. User tags and computed flags are
/// preserved on update.
pub(crate) fn upsert_transaction_on(
    conn: &Connection,
    user_id: i64,
    tx: &SyncTransaction,
) -> Result<()> {
    let category = serde_json::to_string(&tx.category)?;

    conn.execute(
        r#"
        INSERT INTO transactions (user_id, plaid_transaction_id, plaid_account_id, amount, date,
                                  name, merchant_name, category, pending)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, plaid_transaction_id) DO UPDATE SET
            plaid_account_id = excluded.plaid_account_id,
            amount = excluded.amount,
            date = excluded.date,
            name = excluded.name,
            merchant_name = excluded.merchant_name,
            category = excluded.category,
            pending = excluded.pending
        "#,
        params![
            user_id,
            tx.transaction_id,
            tx.account_id,
            tx.amount,
            tx.date.to_string(),
            tx.name,
            tx.merchant_name,
            category,
            tx.pending,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_transaction_on(
    conn: &Connection,
    user_id: i64,
    plaid_transaction_id: &str,
) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM transactions WHERE user_id = ? AND plaid_transaction_id = ?",
        params![user_id, plaid_transaction_id],
    )?)
}

impl Database {
    /// Every transaction for a user, oldest first
    pub fn all_transactions(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date ASC, id ASC",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(params![user_id], transaction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(txs)
    }

    /// List transactions newest first with optional filters
    pub fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        classifier: &Classifier,
    ) -> Result<Vec<Transaction>> {
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ?",
            TRANSACTION_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(month) = &filter.month {
            sql.push_str(" AND substr(date, 1, 7) = ?");
            params_vec.push(Box::new(month.clone()));
        }

        if let Some(account_id) = &filter.account_id {
            sql.push_str(" AND plaid_account_id = ?");
            params_vec.push(Box::new(account_id.clone()));
        }

        sql.push_str(" ORDER BY date DESC, id DESC");

        // Paginate in SQL only when nothing is filtered afterwards
        if filter.category.is_none() {
            sql.push_str(" LIMIT ? OFFSET ?");
            params_vec.push(Box::new(filter.limit.unwrap_or(-1)));
            params_vec.push(Box::new(filter.offset));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let txs = stmt
            .query_map(params_refs.as_slice(), transaction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some(category) = &filter.category else {
            return Ok(txs);
        };

        let limit = filter
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        let offset = usize::try_from(filter.offset).unwrap_or(0);

        Ok(txs
            .into_iter()
            .filter(|t| classifier.classify(t).category.eq_ignore_ascii_case(category))
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Get a transaction owned by the user
    pub fn get_transaction(&self, user_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE user_id = ? AND id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![user_id, id],
                transaction_from_row,
            )
            .optional()?;

        Ok(tx)
    }

    fn require_transaction(&self, user_id: i64, id: i64) -> Result<Transaction> {
        self.get_transaction(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Replace the user tags on a transaction
    pub fn set_transaction_tags(
        &self,
        user_id: i64,
        id: i64,
        tags: &[String],
    ) -> Result<Transaction> {
        let tags = serde_json::to_string(&clean_tags(tags))?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET tags = ? WHERE user_id = ? AND id = ?",
            params![tags, user_id, id],
        )?;
        drop(conn);

        if updated == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        self.require_transaction(user_id, id)
    }

    /// Manually mark a transaction recurring or not. The next detection
    /// run recomputes the flag.
    pub fn set_transaction_recurring(
        &self,
        user_id: i64,
        id: i64,
        is_recurring: bool,
    ) -> Result<Transaction> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET is_recurring = ? WHERE user_id = ? AND id = ?",
            params![is_recurring, user_id, id],
        )?;
        drop(conn);

        if updated == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        self.require_transaction(user_id, id)
    }

    /// Transactions currently flagged anomalous, newest first
    pub fn list_anomalies(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND is_anomaly = 1 ORDER BY date DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let txs = stmt
            .query_map(params![user_id], transaction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(txs)
    }

    /// Recompute anomaly flags for all of a user's transactions and persist
    /// the ones that changed. Returns the number of flags changed.
    pub fn detect_anomalies(&self, user_id: i64) -> Result<usize> {
        let txs = self.all_transactions(user_id)?;
        let changes = anomaly::compute_flag_changes(&txs);
        self.write_flags(user_id, "is_anomaly", &changes)?;

        info!(user_id, scanned = txs.len(), changed = changes.len(), "Anomaly detection complete");
        Ok(changes.len())
    }

    /// Recompute recurring flags, same contract as [`Self::detect_anomalies`]
    pub fn detect_recurring(&self, user_id: i64, classifier: &Classifier) -> Result<usize> {
        let txs = self.all_transactions(user_id)?;
        let changes = recurring::compute_flag_changes(&txs, classifier);
        self.write_flags(user_id, "is_recurring", &changes)?;

        info!(user_id, scanned = txs.len(), changed = changes.len(), "Recurring detection complete");
        Ok(changes.len())
    }

    /// Write flag changes in one SQL transaction
    fn write_flags(&self, user_id: i64, column: &'static str, changes: &[FlagChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let sql = format!(
            "UPDATE transactions SET {} = ? WHERE user_id = ? AND id = ?",
            column
        );

        // Use explicit transaction for atomicity
        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| -> Result<()> {
            let mut stmt = conn.prepare(&sql)?;
            for change in changes {
                stmt.execute(params![change.flag, user_id, change.transaction_id])?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                debug!(column, count = changes.len(), "Flags persisted");
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tags() {
        let tags = vec![
            " travel ".to_string(),
            "".to_string(),
            "Travel".to_string(),
            "work".to_string(),
        ];
        assert_eq!(clean_tags(&tags), vec!["travel".to_string(), "work".to_string()]);
    }
}
