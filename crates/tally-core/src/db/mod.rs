//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Registered users and PIN hashes
//! - `accounts` - Synced bank accounts
//! - `transactions` - Transaction queries, tags and flag persistence
//! - `sync` - Applying aggregator payloads and the bank link
//! - `goals` - Savings goals
//! - `chats` - Assistant chats and messages
//! - `audit` - Audit log

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info};

use crate::error::{Error, Result};

mod accounts;
mod audit;
mod chats;
mod goals;
mod sync;
mod transactions;
mod users;

pub use audit::AuditEntry;
pub use sync::UnlinkResult;
pub use transactions::TransactionFilter;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Passphrase for SQLCipher encryption at rest
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

const POOL_SIZE: u32 = 10;

/// Fixed so a passphrase opens its database wherever the file is moved.
/// Changing it orphans every existing encrypted database.
const KEY_SALT: &[u8] = b"tally/sqlcipher/v1";

/// 256-bit SQLCipher raw key, hex encoded
fn derive_key(passphrase: &str) -> Result<String> {
    let mut key = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), KEY_SALT, &mut key)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;
    Ok(hex::encode(key))
}

/// Statements run on every new pooled connection
fn connection_init(key: Option<String>) -> String {
    let mut init = String::new();
    if let Some(key) = key {
        init.push_str(&format!("PRAGMA key = \"x'{}'\";\n", key));
    }
    init.push_str("PRAGMA foreign_keys = ON;\nPRAGMA busy_timeout = 5000;");
    init
}

/// SQLite `CURRENT_TIMESTAMP` text ("YYYY-MM-DD HH:MM:SS") to UTC
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// JSON string-array column; NULL or malformed reads as empty
pub(crate) fn parse_string_list(s: Option<String>) -> Vec<String> {
    s.and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Pooled handle to the Tally database
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    encrypted: bool,
}

impl Database {
    /// Open an encrypted database keyed by `TALLY_DB_KEY`
    ///
    /// Fails when the variable is unset or blank; `new_unencrypted` is the
    /// explicit opt-out.
    pub fn new(path: &str) -> Result<Self> {
        let passphrase = std::env::var(DB_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Encryption(format!(
                    "{} is not set. Provide a passphrase, or pass --no-encrypt to use a plain database.",
                    DB_KEY_ENV
                ))
            })?;
        Self::new_with_key(path, Some(&passphrase))
    }

    /// Open without encryption. Development and tests only.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key = passphrase.map(derive_key).transpose()?;
        let encrypted = key.is_some();
        let init = connection_init(key);

        let manager =
            SqliteConnectionManager::file(path).with_init(move |conn| conn.execute_batch(&init));
        let pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            encrypted,
        };
        db.run_migrations()?;
        debug!(path, encrypted, "Database opened");

        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Fresh unencrypted database in a unique temp file
    ///
    /// SQLCipher builds don't share `:memory:` databases across pooled
    /// connections, so each call gets its own file.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);

        let name = format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let path = std::env::temp_dir().join(name);
        // Leftover from an earlier run with the same pid
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Whether this handle was opened with a SQLCipher key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Users (PIN login)
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                pin_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Bank link (one aggregator item per user)
            CREATE TABLE IF NOT EXISTS bank_links (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                institution_name TEXT,
                linked_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_synced_at DATETIME
            );

            -- Accounts (synced from the aggregator)
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                plaid_account_id TEXT NOT NULL,
                name TEXT NOT NULL,
                official_name TEXT,
                account_type TEXT NOT NULL DEFAULT 'other',
                subtype TEXT,
                current_balance REAL,
                available_balance REAL,
                currency_code TEXT NOT NULL DEFAULT 'USD',
                institution_name TEXT,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, plaid_account_id)
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                plaid_transaction_id TEXT NOT NULL,
                plaid_account_id TEXT NOT NULL,
                amount REAL NOT NULL,
                date DATE NOT NULL,
                name TEXT NOT NULL,
                merchant_name TEXT,
                category TEXT NOT NULL DEFAULT '[]',      -- JSON array, first element primary
                pending BOOLEAN NOT NULL DEFAULT 0,
                is_anomaly BOOLEAN NOT NULL DEFAULT 0,
                is_recurring BOOLEAN NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',          -- JSON array of user tags
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, plaid_transaction_id)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(user_id, plaid_account_id);

            -- Savings goals
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                target_amount REAL NOT NULL,
                current_amount REAL NOT NULL DEFAULT 0,
                deadline DATE,
                monthly_contribution REAL,
                status TEXT NOT NULL DEFAULT 'active',   -- active, completed, paused, cancelled
                completed_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);

            -- Assistant chats
            CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                share_financial_data BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id);

            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY,
                chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                role TEXT NOT NULL,                      -- user, assistant
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id);

            -- Audit log
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_email TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
