//! User management commands

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tally_core::models::User;
use tally_core::Database;

use super::truncate;

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Add one with: tally users add you@example.com --pin 1234");
        return Ok(());
    }

    println!("{:<6} {:<40} Created", "ID", "Email");
    println!("{}", "─".repeat(70));
    for user in &users {
        println!(
            "{:<6} {:<40} {}",
            user.id,
            truncate(&user.email, 40),
            user.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("Total: {} users", users.len());

    Ok(())
}

pub fn cmd_users_add(db: &Database, email: &str, pin: &str) -> Result<User> {
    let user = db.create_user(email, pin)?;
    db.log_audit(&user.email, "register", Some("user"), Some(user.id), Some("cli"))?;

    println!("✅ Created user {} (id {})", user.email, user.id);
    Ok(user)
}

pub fn cmd_users_set_pin(db: &Database, email: &str, pin: &str) -> Result<()> {
    let user = db
        .get_user_by_email(email)?
        .with_context(|| format!("User not found: {}", email))?;

    db.set_user_pin(user.id, pin)?;
    db.log_audit(&user.email, "set_pin", Some("user"), Some(user.id), Some("cli"))?;

    println!("✅ PIN updated for {}", user.email);
    Ok(())
}

pub fn cmd_users_delete(db: &Database, email: &str, yes: bool) -> Result<()> {
    let user = db
        .get_user_by_email(email)?
        .with_context(|| format!("User not found: {}", email))?;

    if !yes {
        print!(
            "Delete {} and all of their accounts, transactions, goals and chats? [y/N] ",
            user.email
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if db.delete_user(user.id)? {
        db.log_audit(&user.email, "delete", Some("user"), Some(user.id), Some("cli"))?;
        println!("🗑️  Deleted {}", user.email);
    }

    Ok(())
}
