//! User operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::auth::{hash_pin, normalize_email, verify_pin};
use crate::error::{Error, Result};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, pin_hash, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at_str: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        pin_hash: row.get(2)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Register a user. Fails with `Conflict` when the email is taken.
    pub fn create_user(&self, email: &str, pin: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let pin_hash = hash_pin(pin)?;

        if self.get_user_by_email(&email)?.is_some() {
            return Err(Error::Conflict(format!("{} is already registered", email)));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (email, pin_hash) VALUES (?, ?)",
            params![email, pin_hash],
        )?;
        let id = conn.last_insert_rowid();

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Look up by email, case-insensitively
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
                params![email.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Check credentials. Unknown email and wrong PIN both yield `Auth`.
    pub fn authenticate(&self, email: &str, pin: &str) -> Result<User> {
        let invalid = || Error::Auth("Invalid email or PIN".to_string());

        let user = self.get_user_by_email(email)?.ok_or_else(invalid)?;
        if !verify_pin(pin, &user.pin_hash) {
            return Err(invalid());
        }
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Replace a user's PIN
    pub fn set_user_pin(&self, user_id: i64, pin: &str) -> Result<()> {
        let pin_hash = hash_pin(pin)?;
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET pin_hash = ? WHERE id = ?",
            params![pin_hash, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Delete a user and everything they own
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?", params![user_id])?;
        Ok(deleted > 0)
    }

    /// Get or create the fixed user that unauthenticated local mode acts as
    pub fn ensure_local_user(&self, email: &str) -> Result<User> {
        if let Some(user) = self.get_user_by_email(email)? {
            return Ok(user);
        }
        // Local mode never checks the PIN, the hash only fills the column
        self.create_user(email, "0000")
    }
}
