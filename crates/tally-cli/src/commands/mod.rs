//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading, ledger loading, table output)
//! - `reconcile` - Reconcile, export and deliver
//! - `chat` - Questions about a reconciled table
//! - `status` - Channel configuration and AI reachability
//! - `prompts` - Prompt library management commands

pub mod chat;
pub mod core;
pub mod prompts;
pub mod reconcile;
pub mod status;

// Re-export command functions for main.rs
pub use chat::*;
pub use core::*;
pub use prompts::*;
pub use reconcile::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
