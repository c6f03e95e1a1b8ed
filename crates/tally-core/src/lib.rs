//! Tally Core Library
//!
//! Shared functionality for the Tally expense tracker:
//! - Database access and migrations
//! - Expense query building and pagination
//! - CSV import with row-level validation
//! - Monthly spending statistics by category
//! - Audit logging

pub mod db;
pub mod error;
pub mod import;
pub mod models;

pub use db::{AuditEntry, Database, ExpenseFilter, SortField, SortOrder};
pub use error::{Error, Result, RowError};
pub use models::{
    Expense, ExpensePage, ExpensePatch, MonthlyCategoryTotal, NewExpense, OwnerId, Pagination,
};
