//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_engine)
//! - `ai` - Classification, monthly summaries, audit log, backend health
//! - `serve` - Web server command
//! - `transactions` - Transaction commands (list, add, delete)

pub mod ai;
pub mod core;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use ai::*;
pub use core::*;
pub use serve::*;
pub use transactions::*;

/// Truncate a string to max length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
