//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` - Look up the user a command acts for
//! - `cmd_init` - Initialize the database
//! - `cmd_detect` - Recompute anomaly and recurring flags

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::models::User;
use tally_core::{Classifier, ClassifierConfig, Database};
use tally_server::LOCAL_USER_EMAIL;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Classifier from TALLY_CLASSIFIER_CONFIG, the default config file, or built-ins
pub fn load_classifier() -> Classifier {
    Classifier::new(ClassifierConfig::load())
}

/// The user a command acts for. The local user is created on first use.
pub fn resolve_user(db: &Database, email: &str) -> Result<User> {
    if email.trim().eq_ignore_ascii_case(LOCAL_USER_EMAIL) {
        return db
            .ensure_local_user(LOCAL_USER_EMAIL)
            .context("Failed to create local user");
    }

    db.get_user_by_email(email)?.with_context(|| {
        format!(
            "User not found: {} (create one with 'tally users add')",
            email
        )
    })
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if !db.is_encrypted() {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add a user: tally users add you@example.com --pin 1234");
    println!("  2. Import a sync: tally import --user you@example.com --file sync.json");
    println!("  3. Start the API: tally serve");

    Ok(())
}

/// Flags changed by a detection run, per kind
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DetectSummary {
    pub anomalies: usize,
    pub recurring: usize,
}

pub fn cmd_detect(
    db: &Database,
    email: &str,
    kind: &str,
    classifier: &Classifier,
) -> Result<DetectSummary> {
    let user = resolve_user(db, email)?;
    println!("🔍 Running detection for {}...", user.email);

    let mut summary = DetectSummary::default();
    match kind {
        "anomalies" => {
            println!("   Mode: Anomalies only");
            summary.anomalies = db.detect_anomalies(user.id)?;
        }
        "recurring" => {
            println!("   Mode: Recurring charges only");
            summary.recurring = db.detect_recurring(user.id, classifier)?;
        }
        "all" => {
            println!("   Mode: All detection types");
            summary.anomalies = db.detect_anomalies(user.id)?;
            summary.recurring = db.detect_recurring(user.id, classifier)?;
        }
        _ => anyhow::bail!(
            "Unknown detection kind: {}. Available: anomalies, recurring, all",
            kind
        ),
    }

    let flagged = db.list_anomalies(user.id)?.len();

    println!();
    println!("📊 Detection Results");
    println!("   ─────────────────────────────");
    println!("   Anomaly flags changed: {}", summary.anomalies);
    println!("   Recurring flags changed: {}", summary.recurring);
    println!("   Currently anomalous: {}", flagged);

    Ok(summary)
}
