//! CSV import of expenses
//!
//! Columns are matched by header name, case-insensitively: `title`, `amount`,
//! `category`, `paymentMethod` and `date`. Only `amount` must have a value in
//! each row; everything else falls back to a default.
//!
//! The whole document is validated before anything is returned. Bad rows are
//! collected and reported together, so an upload either yields every row or
//! none of them.

use std::io::Read;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result, RowError};
use crate::models::{
    parse_amount, parse_timestamp, validate_amount, NewExpense, DEFAULT_CATEGORY,
    DEFAULT_PAYMENT_METHOD, DEFAULT_TITLE,
};

/// Column positions resolved from the header row
#[derive(Debug, Default)]
struct Columns {
    title: Option<usize>,
    amount: Option<usize>,
    category: Option<usize>,
    payment_method: Option<usize>,
    date: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut columns = Self::default();
        for (i, header) in headers.iter().enumerate() {
            let name = header.trim().trim_start_matches('\u{feff}').to_lowercase();
            let slot = match name.as_str() {
                "title" => &mut columns.title,
                "amount" => &mut columns.amount,
                "category" => &mut columns.category,
                "paymentmethod" | "payment_method" => &mut columns.payment_method,
                "date" => &mut columns.date,
                _ => continue,
            };
            // First matching column wins
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        columns
    }
}

/// Convert a CSV record to a JSON object using headers as keys
fn record_to_json(headers: &StringRecord, record: &StringRecord) -> Value {
    let mut map = serde_json::Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(i) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
    }
    Value::Object(map)
}

/// Non-blank, trimmed value of a column
fn field(record: &StringRecord, column: Option<usize>) -> Option<&str> {
    column
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse an expense CSV document
///
/// `now` is used for rows without a usable date. Returns
/// [`Error::InvalidRows`] listing every rejected row if any row is bad.
pub fn parse_expenses_csv<R: Read>(reader: R, now: DateTime<Utc>) -> Result<Vec<NewExpense>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| Error::Validation(format!("Unable to read CSV header: {}", e)))?
        .clone();
    let columns = Columns::from_headers(&headers);

    let mut expenses = Vec::new();
    let mut errors = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                errors.push(RowError {
                    row,
                    message: format!("Unreadable row: {}", e),
                    content: Value::Null,
                });
                continue;
            }
        };

        match parse_row(&record, &columns, now) {
            Ok(expense) => expenses.push(expense),
            Err(message) => errors.push(RowError {
                row,
                message,
                content: record_to_json(&headers, &record),
            }),
        }
    }

    if !errors.is_empty() {
        debug!(
            rejected = errors.len(),
            accepted = expenses.len(),
            "CSV import rejected"
        );
        return Err(Error::InvalidRows(errors));
    }

    debug!("Parsed {} expenses from CSV", expenses.len());
    Ok(expenses)
}

fn parse_row(
    record: &StringRecord,
    columns: &Columns,
    now: DateTime<Utc>,
) -> std::result::Result<NewExpense, String> {
    let amount_str = field(record, columns.amount).ok_or("Missing amount")?;
    let amount = parse_amount(amount_str).map_err(|_| format!("Invalid amount value: {}", amount_str))?;
    validate_amount(amount).map_err(|_| format!("Amount cannot be negative: {}", amount_str))?;

    let title = field(record, columns.title).unwrap_or(DEFAULT_TITLE);
    let category = field(record, columns.category).unwrap_or(DEFAULT_CATEGORY);
    let payment_method = field(record, columns.payment_method)
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    // Missing or unreadable dates fall back to the import time
    let date = field(record, columns.date)
        .and_then(|s| parse_timestamp(s).ok())
        .unwrap_or(now);

    Ok(NewExpense {
        title: Some(title.to_string()),
        amount,
        category: category.to_string(),
        payment_method,
        date,
    })
}
