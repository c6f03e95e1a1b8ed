//! Audit log command

use anyhow::Result;
use tally_core::db::Database;

use super::truncate;

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit.max(1))?;

    if entries.is_empty() {
        println!("Audit log is empty");
        return Ok(());
    }

    println!(
        "{:<20} {:<36} {:<12} {:<10} {:>6}  Details",
        "Time", "User", "Action", "Entity", "ID"
    );
    for entry in entries {
        println!(
            "{:<20} {:<36} {:<12} {:<10} {:>6}  {}",
            entry.timestamp,
            truncate(&entry.user_id, 36),
            entry.action,
            entry.entity_type.as_deref().unwrap_or("-"),
            entry
                .entity_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(entry.details.as_deref().unwrap_or(""), 60)
        );
    }

    Ok(())
}
