//! Bank sync import command

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{Classifier, Database, SyncPayload, SyncResult};

use super::resolve_user;

/// Apply a sync payload file for a user. Detection runs as part of the sync.
pub fn cmd_import(
    db: &Database,
    email: &str,
    file: &Path,
    classifier: &Classifier,
) -> Result<SyncResult> {
    let user = resolve_user(db, email)?;

    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    let payload = SyncPayload::from_json(&json)
        .with_context(|| format!("Failed to parse sync payload: {}", file.display()))?;

    println!("📥 Importing {} for {}...", file.display(), user.email);

    let result = db
        .apply_sync(user.id, payload, classifier)
        .context("Failed to apply sync")?;

    db.log_audit(
        &user.email,
        "import",
        Some("bank_link"),
        None,
        Some(&format!("file={}", file.display())),
    )?;

    println!();
    println!("✅ Import complete!");
    println!("   Accounts: {}", result.accounts);
    println!("   Added: {}", result.added);
    println!("   Modified: {}", result.modified);
    println!("   Removed: {}", result.removed);
    println!("   Anomaly flags changed: {}", result.anomalies_changed);
    println!("   Recurring flags changed: {}", result.recurring_changed);

    Ok(result)
}
