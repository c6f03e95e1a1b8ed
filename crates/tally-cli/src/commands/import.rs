//! CSV import command

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tally_core::db::Database;
use tally_core::import::parse_expenses_csv;
use tally_core::Error;

use super::{parse_owner, truncate};

/// Import a CSV file for `owner`, returning the number of expenses stored
///
/// Uses the same all-or-nothing rules as the upload endpoint.
pub fn cmd_import(db: &Database, file: &Path, owner: &str) -> Result<usize> {
    let owner = parse_owner(owner)?;

    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;

    println!("📥 Importing expenses from {}...", file.display());

    let expenses = match parse_expenses_csv(BufReader::new(csv_file), Utc::now()) {
        Ok(expenses) => expenses,
        Err(Error::InvalidRows(rows)) => {
            println!("   ❌ {} row(s) rejected, nothing imported:", rows.len());
            for row in &rows {
                println!(
                    "      row {:>4}: {}  {}",
                    row.row,
                    row.message,
                    truncate(&row.content.to_string(), 60)
                );
            }
            anyhow::bail!("CSV import rejected");
        }
        Err(e) => return Err(e).context("Failed to parse CSV"),
    };

    let inserted = db
        .insert_expenses(&owner, &expenses)
        .context("Failed to store expenses")?;

    db.log_audit(
        "cli",
        "import",
        Some("expense"),
        None,
        Some(&format!(
            "owner={}, file={}, imported={}",
            owner,
            file.display(),
            inserted.len()
        )),
    )?;

    println!("✅ Imported {} expenses", inserted.len());
    Ok(inserted.len())
}
