//! Spending statistics

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::{MonthlyCategoryTotal, OwnerId};

impl Database {
    /// Total spending per (month, category) for `owner`
    ///
    /// Ordered by month, newest first, then category A-Z. An owner without
    /// expenses gets an empty list.
    pub fn monthly_statistics(&self, owner: &OwnerId) -> Result<Vec<MonthlyCategoryTotal>> {
        let conn = self.conn()?;

        // Stored dates are RFC 3339, so the first seven characters are YYYY-MM
        let mut stmt = conn.prepare(
            r#"
            SELECT substr(date, 1, 7) AS month, category, SUM(amount) AS total_amount
            FROM expenses
            WHERE owner_id = ?
            GROUP BY month, category
            ORDER BY month DESC, category ASC
            "#,
        )?;

        let totals = stmt
            .query_map(params![owner.as_str()], |row| {
                Ok(MonthlyCategoryTotal {
                    month: row.get(0)?,
                    category: row.get(1)?,
                    total_amount: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }
}
