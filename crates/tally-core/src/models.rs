//! Domain models for Tally

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Page size used when a listing request doesn't specify one
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page size a listing request may ask for
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Title given to imported rows without one
pub const DEFAULT_TITLE: &str = "Untitled";

/// Category given to imported rows without one
pub const DEFAULT_CATEGORY: &str = "Miscellaneous";

/// Payment method given to imported rows without one
pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

/// Identifier of the user who owns a set of expenses
///
/// Owner IDs are UUIDs handed to us by the authentication gateway. They are
/// stored in canonical hyphenated lower-case form so the same user always
/// maps to the same rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Validate a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.trim() != raw {
            return Err(Error::validation("Invalid user ID"));
        }
        let uuid = Uuid::parse_str(raw).map_err(|_| Error::validation("Invalid user ID"))?;
        Ok(Self(uuid.hyphenated().to_string()))
    }

    /// Generate a fresh random owner ID
    pub fn random() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for OwnerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i64,
    pub title: Option<String>,
    pub amount: f64,
    pub category: String,
    pub payment_method: String,
    pub date: DateTime<Utc>,
    /// Owner ID (never exposed for mutation)
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

/// An expense ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub title: Option<String>,
    pub amount: f64,
    pub category: String,
    pub payment_method: String,
    pub date: DateTime<Utc>,
}

impl NewExpense {
    /// Check the record invariants (amount, category, payment method)
    pub fn validate(&self) -> Result<()> {
        validate_fields(self.amount, &self.category, &self.payment_method)
    }
}

fn validate_fields(amount: f64, category: &str, payment_method: &str) -> Result<()> {
    validate_amount(amount)?;
    if category.trim().is_empty() {
        return Err(Error::validation("Category cannot be empty"));
    }
    if payment_method.trim().is_empty() {
        return Err(Error::validation("Payment method cannot be empty"));
    }
    Ok(())
}

/// Amounts must be finite and not negative
pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(Error::validation(format!("Invalid amount value: {}", amount)));
    }
    if amount < 0.0 {
        return Err(Error::validation("Amount cannot be negative"));
    }
    Ok(())
}

/// An amount as it arrives in a JSON body: either a number or a numeric string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn resolve(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => parse_amount(s),
        }
    }
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Error::validation(format!("Invalid amount value: {}", s)))
}

/// Partial update of an expense
///
/// Only the fields present in the request are changed. Ownership and ID are
/// not part of the patch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePatch {
    pub title: Option<String>,
    pub amount: Option<AmountInput>,
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub date: Option<String>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.payment_method.is_none()
            && self.date.is_none()
    }

    /// Merge the patch into `expense`
    ///
    /// The merged record is validated before anything is written back, so a
    /// rejected patch leaves `expense` untouched.
    pub fn apply(&self, expense: &mut Expense) -> Result<()> {
        let mut merged = expense.clone();

        if let Some(title) = &self.title {
            merged.title = Some(title.clone());
        }
        if let Some(amount) = &self.amount {
            merged.amount = amount.resolve()?;
        }
        if let Some(category) = &self.category {
            merged.category = category.clone();
        }
        if let Some(payment_method) = &self.payment_method {
            merged.payment_method = payment_method.clone();
        }
        if let Some(date) = &self.date {
            merged.date = parse_timestamp(date)?;
        }

        validate_fields(merged.amount, &merged.category, &merged.payment_method)?;
        *expense = merged;
        Ok(())
    }
}

/// Page and page size for expense listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Pagination {
    /// Page is floored at 1; limit is clamped to 1..=MAX_PAGE_LIMIT
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Parse from raw query-string values
    ///
    /// Only the leading integer is read (`"2.5"` is page 2). Values with no
    /// leading digits fall back to the defaults.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        Self::new(page.and_then(leading_int), limit.and_then(leading_int))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

/// Leading optionally-signed integer of `s`, ignoring surrounding whitespace
/// and any trailing text
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}

/// One page of expenses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePage {
    pub expenses: Vec<Expense>,
    pub total_expenses: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Spending total for one category in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCategoryTotal {
    /// Month as YYYY-MM
    pub month: String,
    pub category: String,
    pub total_amount: f64,
}

/// Format a timestamp the way it is stored: RFC 3339, millisecond precision, `Z` suffix
///
/// Every stored timestamp has the same width, so string order is time order.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a user-supplied timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC), `YYYY-MM-DD` and
/// `MM/DD/YYYY` (both midnight UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            ["%Y-%m-%d", "%m/%d/%Y"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        });

    match parsed {
        // Stored dates must keep a four-digit year for string ordering to hold
        Some(dt) if (0..=9999).contains(&dt.year()) => Ok(dt),
        _ => Err(Error::validation(format!("Invalid date: {}", s))),
    }
}

/// Parse a timestamp previously written by [`format_timestamp`]
pub(crate) fn parse_stored_timestamp(
    s: &str,
) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_expense() -> Expense {
        Expense {
            id: 1,
            title: Some("Lunch".to_string()),
            amount: 12.5,
            category: "Food".to_string(),
            payment_method: "card".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            owner: OwnerId::random().to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_id_parse() {
        let id = OwnerId::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
        assert_eq!(id.as_str(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");

        assert!(OwnerId::parse("").is_err());
        assert!(OwnerId::parse("not-a-uuid").is_err());
        assert!(OwnerId::parse(" 6f9619ff-8b86-d011-b42d-00c04fc964ff").is_err());
        // A 24-character hex object id is not a valid owner here
        assert!(OwnerId::parse("507f1f77bcf86cd799439011").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount(" 42 ").unwrap(), 42.0);
        assert_eq!(parse_amount("(100.00)").unwrap(), -100.0);
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("inf").is_err());
    }

    #[test]
    fn test_amount_input_accepts_numeric_strings() {
        let n: AmountInput = serde_json::from_str("12.5").unwrap();
        assert_eq!(n.resolve().unwrap(), 12.5);

        let s: AmountInput = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(s.resolve().unwrap(), 12.5);

        let bad: AmountInput = serde_json::from_str("\"twelve\"").unwrap();
        assert!(matches!(bad.resolve(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_new_expense() {
        let mut expense = NewExpense {
            title: None,
            amount: 0.0,
            category: "Food".to_string(),
            payment_method: "cash".to_string(),
            date: Utc::now(),
        };
        assert!(expense.validate().is_ok(), "zero amount is allowed");

        expense.amount = -1.0;
        assert!(expense.validate().is_err());

        expense.amount = 5.0;
        expense.category = "  ".to_string();
        assert!(expense.validate().is_err());
    }

    #[test]
    fn test_patch_apply_merges_fields() {
        let mut expense = sample_expense();
        let patch = ExpensePatch {
            amount: Some(AmountInput::Number(20.0)),
            category: Some("Groceries".to_string()),
            ..Default::default()
        };

        patch.apply(&mut expense).unwrap();
        assert_eq!(expense.amount, 20.0);
        assert_eq!(expense.category, "Groceries");
        assert_eq!(expense.title.as_deref(), Some("Lunch"));
        assert_eq!(expense.payment_method, "card");
    }

    #[test]
    fn test_patch_apply_rejects_invalid_without_mutating() {
        let mut expense = sample_expense();
        let before = expense.clone();
        let patch = ExpensePatch {
            title: Some("Changed".to_string()),
            amount: Some(AmountInput::Text("oops".to_string())),
            ..Default::default()
        };

        assert!(patch.apply(&mut expense).is_err());
        assert_eq!(expense, before);

        let patch = ExpensePatch {
            category: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.apply(&mut expense).is_err());
        assert_eq!(expense, before);
    }

    #[test]
    fn test_patch_from_json_ignores_ownership_fields() {
        let patch: ExpensePatch =
            serde_json::from_str(r#"{"owner": "someone-else", "id": 99, "title": "New"}"#).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert!(!patch.is_empty());

        let empty: ExpensePatch = serde_json::from_str(r#"{"owner": "x"}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_pagination_clamping() {
        let p = Pagination::new(None, None);
        assert_eq!((p.page, p.limit), (1, DEFAULT_PAGE_LIMIT));

        let p = Pagination::new(Some(0), Some(500));
        assert_eq!((p.page, p.limit), (1, MAX_PAGE_LIMIT));

        let p = Pagination::new(Some(-3), Some(0));
        assert_eq!((p.page, p.limit), (1, 1));

        let p = Pagination::from_params(Some("abc"), Some("x"));
        assert_eq!(p, Pagination::default());

        let p = Pagination::from_params(Some("3"), Some("20"));
        assert_eq!(p.offset(), 40);

        let p = Pagination::from_params(Some("2.5"), Some(" 15abc"));
        assert_eq!((p.page, p.limit), (2, 15));

        let p = Pagination::from_params(Some("-"), Some("-4"));
        assert_eq!((p.page, p.limit), (1, 1));
    }

    #[test]
    fn test_pagination_total_pages() {
        let p = Pagination::new(Some(1), Some(10));
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(1), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(25), 3);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15").unwrap(), midnight);
        assert_eq!(parse_timestamp("01/15/2024").unwrap(), midnight);
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_format_timestamp_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 5, 7, 8, 9).unwrap();
        let s = format_timestamp(&dt);
        assert_eq!(s, "2024-01-05T07:08:09.000Z");
        assert_eq!(parse_stored_timestamp(&s).unwrap(), dt);
        assert!(parse_stored_timestamp("garbage").is_err());
    }
}
