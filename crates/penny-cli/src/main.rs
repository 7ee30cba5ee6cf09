//! Penny CLI - Personal finance with AI assistance
//!
//! Usage:
//!   penny init                         Initialize database
//!   penny transactions add "Uber" 23.40  Record a transaction
//!   penny classify "Uber ride" 23.40   Suggest a category
//!   penny summarize 2024 3             Summarize a month
//!   penny serve --port 3000            Start web server

mod cli;
mod commands;


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
        Commands::Classify {
            description,
            amount,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::open_engine(&db)?;
            commands::cmd_classify(&engine, &cli.user, &description, &amount).await
        }
        Commands::Summarize { year, month, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engine = commands::open_engine(&db)?;
            commands::cmd_summarize(&db, &engine, &cli.user, year, month, json).await
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transactions_list(&db, &cli.user, 20),
                Some(TransactionsAction::List { limit }) => {
                    commands::cmd_transactions_list(&db, &cli.user, limit)
                }
                Some(TransactionsAction::Add {
                    description,
                    amount,
                    income,
                    category,
                    date,
                }) => commands::cmd_transactions_add(
                    &db,
                    &cli.user,
                    &description,
                    &amount,
                    income,
                    category.as_deref(),
                    date.as_deref(),
                ),
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&db, &cli.user, id)
                }
            }
        }
        Commands::Interactions { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_interactions(&db, &cli.user, limit)
        }
        Commands::Health => commands::cmd_health().await,
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
    }
}
