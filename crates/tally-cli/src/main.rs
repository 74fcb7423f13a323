//! Tally CLI - Personal finance analytics backend
//!
//! Usage:
//!   tally init                       Initialize database
//!   tally import --file sync.json    Apply a bank sync payload
//!   tally detect --kind all          Recompute anomaly and recurring flags
//!   tally export --format csv        Export transactions
//!   tally report cashflow            Print reports
//!   tally serve --port 3000          Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
        Commands::Import { file, user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::load_classifier();
            commands::cmd_import(&db, &user, &file, &classifier).map(|_| ())
        }
        Commands::Detect { kind, user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::load_classifier();
            commands::cmd_detect(&db, &user, &kind, &classifier).map(|_| ())
        }
        Commands::Export {
            format,
            month,
            output,
            user,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::load_classifier();
            commands::cmd_export(
                &db,
                &user,
                &format,
                month.as_deref(),
                output.as_deref(),
                &classifier,
            )
            .map(|_| ())
        }
        Commands::Report { user, report_type } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let classifier = commands::load_classifier();
            let today = chrono::Utc::now().date_naive();
            match report_type {
                ReportType::Cashflow { months } => {
                    commands::cmd_report_cashflow(&db, &user, months, today, &classifier)
                }
                ReportType::Categories { month, top } => commands::cmd_report_categories(
                    &db,
                    &user,
                    month.as_deref(),
                    top,
                    today,
                    &classifier,
                ),
                ReportType::NetWorth => {
                    commands::cmd_report_net_worth(&db, &user, today, &classifier)
                }
                ReportType::Insights => {
                    commands::cmd_report_insights(&db, &user, today, &classifier)
                }
                ReportType::Goals => commands::cmd_report_goals(&db, &user, today),
            }
        }
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(UsersAction::List) => commands::cmd_users_list(&db),
                Some(UsersAction::Add { email, pin }) => {
                    commands::cmd_users_add(&db, &email, &pin).map(|_| ())
                }
                Some(UsersAction::SetPin { email, pin }) => {
                    commands::cmd_users_set_pin(&db, &email, &pin)
                }
                Some(UsersAction::Delete { email, yes }) => {
                    commands::cmd_users_delete(&db, &email, yes)
                }
            }
        }
    }
}
