//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Penny - Track spending with AI-assisted categories and summaries
#[derive(Parser)]
#[command(name = "penny")]
#[command(about = "Personal finance tracker with AI assistance", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "penny.db", global = true)]
    pub db: PathBuf,

    /// User id that owns the transactions and audit records
    #[arg(long, default_value = "local", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set PENNY_DB_KEY environment variable with your passphrase.
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

    /// Suggest a category for a transaction description
    Classify {
        /// Transaction description (e.g. "Uber ride downtown")
        description: String,

        /// Transaction amount (e.g. 23.40)
        amount: String,
    },

    /// Summarize one month of spending
    Summarize {
        /// Year (e.g. 2024)
        year: i32,

        /// Month number, 1-12
        month: u32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List and manage transactions
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Show recent AI interactions from the audit log
    Interactions {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Check the configured AI backend
    Health,

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
        /// By default, the server requires an API key from PENNY_API_KEYS.
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Record a transaction (expense unless --income)
    Add {
        /// Transaction description
        description: String,

        /// Amount (sign is ignored)
        amount: String,

        /// Record as income instead of expense
        #[arg(long)]
        income: bool,

        /// Category name (e.g. Food)
        #[arg(short, long)]
        category: Option<String>,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: i64,
    },
}
