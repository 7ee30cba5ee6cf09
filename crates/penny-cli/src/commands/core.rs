//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_engine` - Build the assist engine from config
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use penny_core::{AIAssistEngine, AssistConfig, Database};
use tracing::debug;

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

/// Load the assist config and build an engine that audits into `db`
pub fn open_engine(db: &Database) -> Result<Arc<AIAssistEngine>> {
    let config = AssistConfig::load().context("Failed to load assist config")?;
    debug!(
        backend = ?config.backend.kind,
        model = %config.backend.model,
        max_retries = config.retry.max_retries,
        "Assist config loaded"
    );
    let (engine, _gateway) = penny_server::build_engine(db, config);
    Ok(engine)
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs migrations
    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record a transaction: penny transactions add \"Groceries\" 42.10 -c Food");
    println!("  2. Summarize a month:    penny summarize 2024 3");
    println!("  3. Start web API:        penny serve");

    Ok(())
}
