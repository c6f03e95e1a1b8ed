//! Expense operations
//!
//! Every statement here filters on `owner_id`. A row owned by someone else
//! is indistinguishable from a row that doesn't exist.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::expense_filter::ExpenseFilter;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    format_timestamp, parse_stored_timestamp, Expense, ExpensePage, ExpensePatch, NewExpense,
    OwnerId, Pagination,
};

const EXPENSE_COLUMNS: &str =
    "e.id, e.title, e.amount, e.category, e.payment_method, e.date, e.owner_id, e.created_at";

const INSERT_EXPENSE: &str = r#"
    INSERT INTO expenses (owner_id, title, amount, category, payment_method, date, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

impl Database {
    /// Insert a single expense for `owner`
    pub fn insert_expense(&self, owner: &OwnerId, expense: &NewExpense) -> Result<Expense> {
        expense.validate()?;

        let conn = self.conn()?;
        let created_at = format_timestamp(&Utc::now());
        conn.execute(
            INSERT_EXPENSE,
            params![
                owner.as_str(),
                expense.title,
                expense.amount,
                expense.category,
                expense.payment_method,
                format_timestamp(&expense.date),
                created_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        select_owned(&conn, owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {} vanished after insert", id)))
    }

    /// Insert a batch of expenses for `owner` in one transaction
    ///
    /// Either every expense is stored or none is.
    pub fn insert_expenses(&self, owner: &OwnerId, expenses: &[NewExpense]) -> Result<Vec<Expense>> {
        for expense in expenses {
            expense.validate()?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let created_at = format_timestamp(&Utc::now());

        let mut ids = Vec::with_capacity(expenses.len());
        {
            let mut stmt = tx.prepare(INSERT_EXPENSE)?;
            for expense in expenses {
                stmt.execute(params![
                    owner.as_str(),
                    expense.title,
                    expense.amount,
                    expense.category,
                    expense.payment_method,
                    format_timestamp(&expense.date),
                    created_at,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        let mut inserted = Vec::with_capacity(ids.len());
        for id in ids {
            let expense = select_owned(&tx, owner, id)?
                .ok_or_else(|| Error::NotFound(format!("Expense {} vanished after insert", id)))?;
            inserted.push(expense);
        }

        tx.commit()?;
        debug!(owner = %owner, count = inserted.len(), "Inserted expense batch");
        Ok(inserted)
    }

    /// Get an expense by ID, if it belongs to `owner`
    pub fn get_expense(&self, owner: &OwnerId, id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        Ok(select_owned(&conn, owner, id)?)
    }

    /// Apply a partial update to an owned expense
    ///
    /// Returns `None` when no expense with this ID belongs to `owner`.
    pub fn update_expense(
        &self,
        owner: &OwnerId,
        id: i64,
        patch: &ExpensePatch,
    ) -> Result<Option<Expense>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let Some(mut expense) = select_owned(&tx, owner, id)? else {
            return Ok(None);
        };
        patch.apply(&mut expense)?;

        tx.execute(
            r#"
            UPDATE expenses
            SET title = ?, amount = ?, category = ?, payment_method = ?, date = ?
            WHERE id = ? AND owner_id = ?
            "#,
            params![
                expense.title,
                expense.amount,
                expense.category,
                expense.payment_method,
                format_timestamp(&expense.date),
                id,
                owner.as_str(),
            ],
        )?;

        let updated = select_owned(&tx, owner, id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Delete an owned expense, returning whether anything was deleted
    pub fn delete_expense(&self, owner: &OwnerId, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE id = ? AND owner_id = ?",
            params![id, owner.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Delete every expense in `ids` that belongs to `owner`
    ///
    /// IDs that don't exist or belong to someone else are skipped. Returns
    /// the number of rows deleted.
    pub fn delete_expenses(&self, owner: &OwnerId, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Err(Error::Validation(
                "No expense IDs provided for deletion".to_string(),
            ));
        }

        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "DELETE FROM expenses WHERE owner_id = ? AND id IN ({})",
            placeholders.join(", ")
        );

        let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
        let owner_str = owner.as_str();
        params.push(&owner_str);
        for id in ids {
            params.push(id);
        }

        let conn = self.conn()?;
        let deleted = conn.execute(&sql, params.as_slice())?;
        debug!(owner = %owner, requested = ids.len(), deleted, "Bulk delete");
        Ok(deleted)
    }

    /// One page of the owner's expenses matching `filter`
    pub fn search_expenses(
        &self,
        filter: &ExpenseFilter<'_>,
        pagination: Pagination,
    ) -> Result<ExpensePage> {
        // Page and total come from one snapshot on one pooled connection
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let built = filter.build();

        let sql = format!(
            "SELECT {} FROM expenses e {} {} LIMIT ? OFFSET ?",
            EXPENSE_COLUMNS, built.where_clause, built.order_clause
        );

        let mut params = built.into_params();
        params.push(Box::new(pagination.limit));
        params.push(Box::new(pagination.offset()));
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let expenses = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_refs.as_slice(), row_to_expense)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let total = count_matching(&tx, filter)?;
        tx.commit()?;
        debug!(
            owner = %filter.owner(),
            total,
            page = pagination.page,
            returned = expenses.len(),
            "Expense search"
        );

        Ok(ExpensePage {
            expenses,
            total_expenses: total,
            total_pages: pagination.total_pages(total),
            current_page: pagination.page,
        })
    }

    /// Count the owner's expenses matching `filter`
    pub fn count_expenses(&self, filter: &ExpenseFilter<'_>) -> Result<i64> {
        let conn = self.conn()?;
        Ok(count_matching(&conn, filter)?)
    }
}

fn count_matching(conn: &Connection, filter: &ExpenseFilter<'_>) -> rusqlite::Result<i64> {
    let built = filter.build();
    conn.query_row(
        &built.build_count_query(),
        built.params_refs().as_slice(),
        |row| row.get(0),
    )
}

fn select_owned(conn: &Connection, owner: &OwnerId, id: i64) -> rusqlite::Result<Option<Expense>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM expenses e WHERE e.id = ? AND e.owner_id = ?",
            EXPENSE_COLUMNS
        ),
        params![id, owner.as_str()],
        row_to_expense,
    )
    .optional()
}

fn stored_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_stored_timestamp(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

pub(crate) fn row_to_expense(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        payment_method: row.get(4)?,
        date: stored_timestamp(row, 5)?,
        owner: row.get(6)?,
        created_at: stored_timestamp(row, 7)?,
    })
}
