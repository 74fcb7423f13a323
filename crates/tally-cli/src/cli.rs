//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_server::LOCAL_USER_EMAIL;

/// Tally - Personal finance analytics backend
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted personal finance analytics backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer session token signed
        /// with TALLY_JWT_SECRET.
        #[arg(long)]
        no_auth: bool,
    },

    /// Apply a bank sync payload (JSON) for a user
    Import {
        /// Sync payload file
        #[arg(short, long)]
        file: PathBuf,

        /// User email
        #[arg(short, long, default_value = LOCAL_USER_EMAIL)]
        user: String,
    },

    /// Recompute anomaly and recurring flags
    Detect {
        /// Detection type: anomalies, recurring, all
        #[arg(short, long, default_value = "all")]
        kind: String,

        /// User email
        #[arg(short, long, default_value = LOCAL_USER_EMAIL)]
        user: String,
    },

    /// Export transactions as CSV or JSON
    Export {
        /// Output format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Only this month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// User email
        #[arg(short, long, default_value = LOCAL_USER_EMAIL)]
        user: String,
    },

    /// Generate reports
    Report {
        /// User email
        #[arg(short, long, default_value = LOCAL_USER_EMAIL, global = true)]
        user: String,

        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Inflow and outflow per month
    Cashflow {
        /// Number of months ending with the current one
        #[arg(short, long, default_value = "6")]
        months: u32,
    },

    /// Top spending categories for a month
    Categories {
        /// Month (YYYY-MM), defaults to the current month
        #[arg(short, long)]
        month: Option<String>,

        /// Number of categories to show
        #[arg(short, long, default_value = "5")]
        top: usize,
    },

    /// Net worth now and at each past month end
    NetWorth,

    /// This month's insights and tips
    Insights,

    /// Savings goals with projections
    Goals,
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users
    List,

    /// Add a user
    Add {
        /// Email address
        email: String,

        /// 4-8 digit PIN
        #[arg(long)]
        pin: String,
    },

    /// Change a user's PIN
    SetPin {
        /// Email address
        email: String,

        /// New 4-8 digit PIN
        #[arg(long)]
        pin: String,
    },

    /// Delete a user and all their data
    Delete {
        /// Email address
        email: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}
