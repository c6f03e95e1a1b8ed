//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database commands (init) and shared utilities (open_db, parse_owner)
//! - `import` - CSV expense import
//! - `serve` - Web server command
//! - `stats` - Monthly spending statistics
//! - `audit` - Audit log listing

pub mod audit;
pub mod core;
pub mod import;
pub mod serve;
pub mod stats;

// Re-export command functions for main.rs
pub use audit::*;
pub use core::*;
pub use import::*;
pub use serve::*;
pub use stats::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
