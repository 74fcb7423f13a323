//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::auth::JWT_SECRET_ENV;

use super::{load_classifier, open_db};

/// Comma-separated CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "TALLY_ALLOWED_ORIGINS";

pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Tally API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    let jwt_secret = std::env::var(JWT_SECRET_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty());
    let allowed_origins = parse_origins(&std::env::var(ALLOWED_ORIGINS_ENV).unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if jwt_secret.is_some() {
        println!("   🔒 Authentication: PIN login with session tokens");
    } else {
        anyhow::bail!(
            "{} must be set to sign session tokens (or pass --no-auth for local use)",
            JWT_SECRET_ENV
        );
    }
    if !allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {} ({})",
            allowed_origins.join(", "),
            ALLOWED_ORIGINS_ENV
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = tally_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        jwt_secret,
        classifier: load_classifier(),
    };

    tally_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
