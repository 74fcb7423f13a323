//! Account operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::Account;
use crate::sync::SyncAccount;

const ACCOUNT_COLUMNS: &str = "id, user_id, plaid_account_id, name, official_name, account_type, \
     subtype, current_balance, available_balance, currency_code, institution_name, updated_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let account_type_str: String = row.get(5)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plaid_account_id: row.get(2)?,
        name: row.get(3)?,
        official_name: row.get(4)?,
        account_type: account_type_str.parse().unwrap_or_default(),
        subtype: row.get(6)?,
        current_balance: row.get(7)?,
        available_balance: row.get(8)?,
        currency_code: row.get(9)?,
        institution_name: row.get(10)?,
        updated_at: parse_datetime(&updated_at_str),
    })
}

/// Insert or update one account by its (user, aggregator id) identity
pub(crate) fn upsert_account_on(
    conn: &Connection,
    user_id: i64,
    account: &SyncAccount,
    institution_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO accounts (user_id, plaid_account_id, name, official_name, account_type,
                              subtype, current_balance, available_balance, currency_code,
                              institution_name, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, plaid_account_id) DO UPDATE SET
            name = excluded.name,
            official_name = excluded.official_name,
            account_type = excluded.account_type,
            subtype = excluded.subtype,
            current_balance = excluded.current_balance,
            available_balance = excluded.available_balance,
            currency_code = excluded.currency_code,
            institution_name = COALESCE(excluded.institution_name, accounts.institution_name),
            updated_at = excluded.updated_at
        "#,
        params![
            user_id,
            account.account_id,
            account.name,
            account.official_name,
            account.parsed_type().as_str(),
            account.subtype,
            account.current_balance,
            account.available_balance,
            account.iso_currency_code.as_deref().unwrap_or("USD"),
            institution_name,
            format_datetime(chrono::Utc::now()),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Insert or update a single account
    pub fn upsert_account(&self, user_id: i64, account: &SyncAccount) -> Result<Account> {
        let conn = self.conn()?;
        upsert_account_on(&conn, user_id, account, None)?;
        drop(conn);

        self.get_account(user_id, &account.account_id)?.ok_or_else(|| {
            crate::error::Error::NotFound(format!("Account {}", account.account_id))
        })
    }

    /// List a user's accounts
    pub fn list_accounts(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY name, id",
            ACCOUNT_COLUMNS
        ))?;

        let accounts = stmt
            .query_map(params![user_id], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Get an account by its aggregator id
    pub fn get_account(&self, user_id: i64, plaid_account_id: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts WHERE user_id = ? AND plaid_account_id = ?",
                    ACCOUNT_COLUMNS
                ),
                params![user_id, plaid_account_id],
                account_from_row,
            )
            .optional()?;

        Ok(account)
    }
}
