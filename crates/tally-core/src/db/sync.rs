//! Applying aggregator sync payloads and managing the bank link

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::accounts::upsert_account_on;
use super::transactions::{delete_transaction_on, upsert_transaction_on};
use super::{format_datetime, parse_datetime, Database};
use crate::classify::Classifier;
use crate::error::Result;
use crate::models::BankLink;
use crate::sync::{SyncPayload, SyncResult};

/// What unlinking removed
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct UnlinkResult {
    pub accounts: usize,
    pub transactions: usize,
}

impl Database {
    /// Apply one sync payload for a user, then rerun anomaly and recurring
    /// detection. The upserts and deletions share one SQL transaction.
    pub fn apply_sync(
        &self,
        user_id: i64,
        payload: SyncPayload,
        classifier: &Classifier,
    ) -> Result<SyncResult> {
        let payload = payload.normalize()?;
        let now = format_datetime(chrono::Utc::now());

        let conn = self.conn()?;
        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| -> Result<SyncResult> {
            conn.execute(
                r#"
                INSERT INTO bank_links (user_id, institution_name, last_synced_at)
                VALUES (?, ?, ?)
                ON CONFLICT(user_id) DO UPDATE SET
                    institution_name = COALESCE(excluded.institution_name, bank_links.institution_name),
                    last_synced_at = excluded.last_synced_at
                "#,
                params![user_id, payload.institution_name, now],
            )?;

            let institution = payload.institution_name.as_deref();
            for account in &payload.accounts {
                upsert_account_on(&conn, user_id, account, institution)?;
            }

            for tx in payload.added.iter().chain(payload.modified.iter()) {
                upsert_transaction_on(&conn, user_id, tx)?;
            }

            let mut removed = 0;
            for id in &payload.removed {
                removed += delete_transaction_on(&conn, user_id, id)?;
            }

            Ok(SyncResult {
                accounts: payload.accounts.len(),
                added: payload.added.len(),
                modified: payload.modified.len(),
                removed,
                ..Default::default()
            })
        })();

        let mut result = match result {
            Ok(r) => {
                conn.execute("COMMIT", [])?;
                r
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                return Err(e);
            }
        };
        drop(conn);

        result.anomalies_changed = self.detect_anomalies(user_id)?;
        result.recurring_changed = self.detect_recurring(user_id, classifier)?;

        info!(
            user_id,
            accounts = result.accounts,
            added = result.added,
            modified = result.modified,
            removed = result.removed,
            "Sync applied"
        );
        Ok(result)
    }

    pub fn get_bank_link(&self, user_id: i64) -> Result<Option<BankLink>> {
        let conn = self.conn()?;
        let link = conn
            .query_row(
                "SELECT user_id, institution_name, linked_at, last_synced_at FROM bank_links WHERE user_id = ?",
                params![user_id],
                |row| {
                    let linked_at_str: String = row.get(2)?;
                    let last_synced_str: Option<String> = row.get(3)?;
                    Ok(BankLink {
                        user_id: row.get(0)?,
                        institution_name: row.get(1)?,
                        linked_at: parse_datetime(&linked_at_str),
                        last_synced_at: last_synced_str.as_deref().map(parse_datetime),
                    })
                },
            )
            .optional()?;

        Ok(link)
    }

    /// Remove the bank link along with every synced account and transaction
    pub fn delete_bank_link(&self, user_id: i64) -> Result<Option<UnlinkResult>> {
        if self.get_bank_link(user_id)?.is_none() {
            return Ok(None);
        }

        let conn = self.conn()?;
        conn.execute("BEGIN TRANSACTION", [])?;

        let result = (|| -> Result<UnlinkResult> {
            let transactions =
                conn.execute("DELETE FROM transactions WHERE user_id = ?", params![user_id])?;
            let accounts = conn.execute("DELETE FROM accounts WHERE user_id = ?", params![user_id])?;
            conn.execute("DELETE FROM bank_links WHERE user_id = ?", params![user_id])?;
            Ok(UnlinkResult {
                accounts,
                transactions,
            })
        })();

        match result {
            Ok(r) => {
                conn.execute("COMMIT", [])?;
                info!(user_id, accounts = r.accounts, transactions = r.transactions, "Bank unlinked");
                Ok(Some(r))
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
