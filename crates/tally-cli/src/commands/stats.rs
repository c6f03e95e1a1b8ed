//! Spending statistics command

use anyhow::Result;
use tally_core::db::Database;

use super::parse_owner;

pub fn cmd_stats(db: &Database, owner: &str) -> Result<()> {
    let owner = parse_owner(owner)?;
    let totals = db.monthly_statistics(&owner)?;

    if totals.is_empty() {
        println!("No expenses recorded for {}", owner);
        return Ok(());
    }

    println!("📊 Monthly spending for {}", owner);
    println!();
    println!("{:<8} {:<24} {:>12}", "Month", "Category", "Total");
    println!("{}", "─".repeat(46));

    let mut current_month: Option<&str> = None;
    for total in &totals {
        // Only print the month on its first row
        let month = if current_month == Some(total.month.as_str()) {
            ""
        } else {
            current_month = Some(total.month.as_str());
            total.month.as_str()
        };
        println!(
            "{:<8} {:<24} {:>12.2}",
            month,
            super::truncate(&total.category, 24),
            total.total_amount
        );
    }

    let grand_total: f64 = totals.iter().map(|t| t.total_amount).sum();
    println!("{}", "─".repeat(46));
    println!("{:<33} {:>12.2}", "Total", grand_total);

    Ok(())
}
