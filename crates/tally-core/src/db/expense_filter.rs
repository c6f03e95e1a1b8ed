//! Expense filter builder for constructing dynamic SQL queries
//!
//! Listing and counting share one builder so the two queries can never
//! disagree about which rows match. The owner is a constructor argument:
//! there is no way to build an unscoped filter.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{format_timestamp, OwnerId};

/// Column an expense listing can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Date,
    Amount,
    Category,
    PaymentMethod,
    Title,
    CreatedAt,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            Self::Date => "e.date",
            Self::Amount => "e.amount",
            Self::Category => "e.category",
            Self::PaymentMethod => "e.payment_method",
            Self::Title => "e.title",
            Self::CreatedAt => "e.created_at",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "date" => Ok(Self::Date),
            "amount" => Ok(Self::Amount),
            "category" => Ok(Self::Category),
            "paymentMethod" | "payment_method" => Ok(Self::PaymentMethod),
            "title" => Ok(Self::Title),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            other => Err(Error::Validation(format!("Unknown sort field: {}", other))),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc` sorts ascending, anything else (including nothing) descending
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Builder for owner-scoped expense query filters
///
/// The lifetime `'query` is how long the borrowed filter values must live.
pub struct ExpenseFilter<'query> {
    owner: &'query OwnerId,
    pub category: Option<&'query str>,
    pub payment_method: Option<&'query str>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// Parameters for the WHERE clause, in placeholder order
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> ExpenseFilter<'query> {
    /// Filter matching every expense of `owner`, newest first
    pub fn new(owner: &'query OwnerId) -> Self {
        Self {
            owner,
            category: None,
            payment_method: None,
            start_date: None,
            end_date: None,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        self.owner
    }

    /// Exact category match
    pub fn category(mut self, category: Option<&'query str>) -> Self {
        self.category = category;
        self
    }

    /// Exact payment method match
    pub fn payment_method(mut self, method: Option<&'query str>) -> Self {
        self.payment_method = method;
        self
    }

    /// Inclusive lower bound on date
    pub fn start_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.start_date = date;
        self
    }

    /// Inclusive upper bound on date
    pub fn end_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.end_date = date;
        self
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    /// Build the filter components
    pub fn build(&self) -> FilterResult {
        let mut conditions = vec!["e.owner_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(self.owner.as_str().to_string())];

        // Blank values are treated as absent, not as "match empty"
        if let Some(category) = self.category.map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("e.category = ?".to_string());
            params.push(Box::new(category.to_string()));
        }

        if let Some(method) = self
            .payment_method
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            conditions.push("e.payment_method = ?".to_string());
            params.push(Box::new(method.to_string()));
        }

        // Dates are stored fixed-width, so string comparison is time comparison
        if let Some(start) = self.start_date {
            conditions.push("e.date >= ?".to_string());
            params.push(Box::new(format_timestamp(&start)));
        }

        if let Some(end) = self.end_date {
            conditions.push("e.date <= ?".to_string());
            params.push(Box::new(format_timestamp(&end)));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));
        let order_clause = format!(
            "ORDER BY {} {}, e.id DESC",
            self.sort_field.column(),
            self.sort_order.as_sql()
        );

        FilterResult {
            where_clause,
            order_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM expenses e {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Take the parameter vector to append pagination params
    pub fn into_params(self) -> Vec<Box<dyn rusqlite::ToSql>> {
        self.params
    }
}
