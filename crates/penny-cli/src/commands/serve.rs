//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use penny_core::AssistConfig;
use tracing::info;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Penny web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    // Parse API keys from environment (comma-separated)
    let api_keys = parse_list(&std::env::var("PENNY_API_KEYS").unwrap_or_default());

    // Parse allowed CORS origins (comma-separated)
    let allowed_origins =
        parse_list(&std::env::var("PENNY_ALLOWED_ORIGINS").unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if api_keys.is_empty() {
        println!(
            "   ⚠️  No API keys configured (set PENNY_API_KEYS), \
             all requests will be rejected"
        );
    } else {
        println!(
            "   🔑 API keys: {} configured (PENNY_API_KEYS)",
            api_keys.len()
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    info!(
        db = %db_path.display(),
        encrypted = !no_encrypt,
        require_auth = !no_auth,
        api_keys = api_keys.len(),
        allowed_origins = allowed_origins.len(),
        "Database opened for web server"
    );
    let assist = AssistConfig::load().context("Failed to load assist config")?;

    let config = penny_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        api_keys,
    };

    penny_server::serve(db, assist, host, port, config).await
}

/// Split a comma-separated list, dropping blanks
pub(crate) fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
