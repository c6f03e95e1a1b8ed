//! Integration tests for tally-core
//!
//! These tests exercise the full import → store → query → statistics workflow.

use chrono::{TimeZone, Utc};
use tally_core::{
    db::Database,
    import::parse_expenses_csv,
    models::{OwnerId, Pagination},
    Error, ExpenseFilter, SortField, SortOrder,
};

/// Two months of spending across three categories
fn monthly_csv() -> &'static str {
    r#"title,amount,category,paymentMethod,date
Groceries,54.20,Food,card,2024-01-03
Coffee,3.80,Food,cash,2024-01-04
Bus pass,45.00,Transport,card,2024-01-05
Rent,1200,Housing,Bank Transfer,2024-01-01
Groceries,61.10,Food,card,2024-02-02
Taxi,18.40,Transport,CARD,2024-02-09"#
}

// =============================================================================
// Import Workflow Tests
// =============================================================================

#[test]
fn test_full_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let owner = OwnerId::random();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let expenses = parse_expenses_csv(monthly_csv().as_bytes(), now).expect("Failed to parse CSV");
    assert_eq!(expenses.len(), 6);

    let inserted = db
        .insert_expenses(&owner, &expenses)
        .expect("Failed to insert expenses");
    assert_eq!(inserted.len(), 6);
    assert!(inserted.iter().all(|e| e.owner == owner.as_str()));

    // Payment methods are normalized on import
    let card = db
        .count_expenses(&ExpenseFilter::new(&owner).payment_method(Some("card")))
        .unwrap();
    assert_eq!(card, 3);

    let stats = db.monthly_statistics(&owner).unwrap();
    let summary: Vec<(String, String, f64)> = stats
        .into_iter()
        .map(|s| (s.month, s.category, (s.total_amount * 100.0).round() / 100.0))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("2024-02".to_string(), "Food".to_string(), 61.10),
            ("2024-02".to_string(), "Transport".to_string(), 18.40),
            ("2024-01".to_string(), "Food".to_string(), 58.0),
            ("2024-01".to_string(), "Housing".to_string(), 1200.0),
            ("2024-01".to_string(), "Transport".to_string(), 45.0),
        ]
    );
}

#[test]
fn test_rejected_import_stores_nothing() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let owner = OwnerId::random();

    let csv = "title,amount,category\nFine,10,Food\nBroken,lots,Food";
    let err = parse_expenses_csv(csv.as_bytes(), Utc::now()).unwrap_err();

    match err {
        Error::InvalidRows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].row, 2);
        }
        other => panic!("expected InvalidRows, got {:?}", other),
    }

    assert_eq!(db.count_expenses(&ExpenseFilter::new(&owner)).unwrap(), 0);
}

#[test]
fn test_imports_are_isolated_per_owner() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let alice = OwnerId::random();
    let bob = OwnerId::random();

    let expenses = parse_expenses_csv(monthly_csv().as_bytes(), Utc::now()).unwrap();
    db.insert_expenses(&alice, &expenses).unwrap();

    let page = db
        .search_expenses(&ExpenseFilter::new(&bob), Pagination::default())
        .unwrap();
    assert_eq!(page.total_expenses, 0);
    assert!(db.monthly_statistics(&bob).unwrap().is_empty());

    let page = db
        .search_expenses(
            &ExpenseFilter::new(&alice).sort(SortField::Amount, SortOrder::Desc),
            Pagination::new(Some(1), Some(2)),
        )
        .unwrap();
    assert_eq!(page.total_expenses, 6);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.expenses[0].title.as_deref(), Some("Rent"));
}

// =============================================================================
// Encrypted Database Tests
// =============================================================================

#[test]
fn test_encrypted_database_reopens_with_same_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    let path = path.to_str().unwrap();
    let owner = OwnerId::random();

    {
        let db = Database::new_with_key(path, Some("correct horse battery staple")).unwrap();
        let expenses = parse_expenses_csv(monthly_csv().as_bytes(), Utc::now()).unwrap();
        db.insert_expenses(&owner, &expenses).unwrap();
    }

    let db = Database::new_with_key(path, Some("correct horse battery staple")).unwrap();
    assert_eq!(db.count_expenses(&ExpenseFilter::new(&owner)).unwrap(), 6);

    assert!(Database::new_with_key(path, Some("wrong passphrase")).is_err());
}
