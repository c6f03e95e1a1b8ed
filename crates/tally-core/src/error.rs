//! Error types for Tally

use serde::Serialize;
use thiserror::Error;

/// A CSV row rejected during import
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based data row number (the header row is not counted)
    pub row: usize,
    pub message: String,
    /// Original row content keyed by header
    pub content: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid CSV: {} row(s) rejected", .0.len())]
    InvalidRows(Vec<RowError>),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
