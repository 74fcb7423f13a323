//! CLI command tests

use std::io::Write;

use chrono::NaiveDate;
use tally_core::db::Database;
use tally_core::models::NewGoal;
use tally_core::Classifier;
use tally_server::LOCAL_USER_EMAIL;
use tempfile::NamedTempFile;

use crate::commands::{self, truncate, DetectSummary};

const EMAIL: &str = "robin@example.com";

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.create_user(EMAIL, "1357").unwrap();
    db
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
}

/// Payroll, a monthly subscription and a grocery run that stands out
fn sync_file() -> NamedTempFile {
    let json = r#"{
        "institution_name": "Test Credit Union",
        "accounts": [
            {"account_id": "chk", "name": "Checking", "type": "depository", "current_balance": 1200.0},
            {"account_id": "cc", "name": "Card", "type": "credit", "current_balance": -300.0}
        ],
        "added": [
            {"transaction_id": "p1", "account_id": "chk", "amount": 2000.0, "date": "2024-02-28", "name": "EMPLOYER PAYROLL"},
            {"transaction_id": "p2", "account_id": "chk", "amount": 2000.0, "date": "2024-03-29", "name": "EMPLOYER PAYROLL"},
            {"transaction_id": "s1", "account_id": "cc", "amount": -9.99, "date": "2024-01-04", "name": "SPOTIFY"},
            {"transaction_id": "s2", "account_id": "cc", "amount": -9.99, "date": "2024-02-04", "name": "SPOTIFY"},
            {"transaction_id": "s3", "account_id": "cc", "amount": -9.99, "date": "2024-03-04", "name": "SPOTIFY"},
            {"transaction_id": "g1", "account_id": "cc", "amount": -40.0, "date": "2024-03-02", "name": "Market", "category": ["Groceries"]},
            {"transaction_id": "g2", "account_id": "cc", "amount": -45.0, "date": "2024-03-09", "name": "Market", "category": ["Groceries"]},
            {"transaction_id": "g3", "account_id": "cc", "amount": -35.0, "date": "2024-03-16", "name": "Market", "category": ["Groceries"]},
            {"transaction_id": "g4", "account_id": "cc", "amount": -50.0, "date": "2024-03-23", "name": "Market", "category": ["Groceries"]},
            {"transaction_id": "g5", "account_id": "cc", "amount": -40.0, "date": "2024-03-24", "name": "Market", "category": ["Groceries"]},
            {"transaction_id": "g6", "account_id": "cc", "amount": -600.0, "date": "2024-03-25", "name": "Warehouse", "category": ["Groceries"]}
        ]
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn imported_db() -> Database {
    let db = setup_test_db();
    let file = sync_file();
    commands::cmd_import(&db, EMAIL, file.path(), &Classifier::default()).unwrap();
    db
}

fn user_id(db: &Database) -> i64 {
    db.get_user_by_email(EMAIL).unwrap().unwrap().id
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is a long string", 10), "this is...");
}

#[test]
fn test_truncate_multibyte() {
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}

#[test]
fn test_parse_origins() {
    let origins = commands::serve::parse_origins(" http://a.test , ,http://b.test");
    assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    assert!(commands::serve::parse_origins("").is_empty());
}

// ========== User Resolution Tests ==========

#[test]
fn test_resolve_user_existing() {
    let db = setup_test_db();
    let user = commands::resolve_user(&db, EMAIL).unwrap();
    assert_eq!(user.email, EMAIL);
}

#[test]
fn test_resolve_user_creates_local_user() {
    let db = Database::in_memory().unwrap();
    let first = commands::resolve_user(&db, LOCAL_USER_EMAIL).unwrap();
    let second = commands::resolve_user(&db, LOCAL_USER_EMAIL).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[test]
fn test_resolve_user_unknown() {
    let db = setup_test_db();
    let err = commands::resolve_user(&db, "nobody@example.com").unwrap_err();
    assert!(err.to_string().contains("tally users add"));
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import() {
    let db = setup_test_db();
    let file = sync_file();

    let result = commands::cmd_import(&db, EMAIL, file.path(), &Classifier::default()).unwrap();
    assert_eq!(result.accounts, 2);
    assert_eq!(result.added, 11);

    let id = user_id(&db);
    assert_eq!(db.all_transactions(id).unwrap().len(), 11);
    assert!(db.get_bank_link(id).unwrap().is_some());

    let audit = db.list_user_audit_log(EMAIL, 10).unwrap();
    assert!(audit.iter().any(|e| e.action == "import"));
}

#[test]
fn test_cmd_import_twice_is_idempotent() {
    let db = imported_db();
    let file = sync_file();

    commands::cmd_import(&db, EMAIL, file.path(), &Classifier::default()).unwrap();
    assert_eq!(db.all_transactions(user_id(&db)).unwrap().len(), 11);
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let result = commands::cmd_import(
        &db,
        EMAIL,
        std::path::Path::new("/nonexistent/sync.json"),
        &Classifier::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_cmd_import_invalid_json() {
    let db = setup_test_db();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{not json").unwrap();

    let result = commands::cmd_import(&db, EMAIL, file.path(), &Classifier::default());
    assert!(result.is_err());
    assert!(db.all_transactions(user_id(&db)).unwrap().is_empty());
}

#[test]
fn test_cmd_import_unknown_user() {
    let db = setup_test_db();
    let file = sync_file();
    let result = commands::cmd_import(&db, "ghost@example.com", file.path(), &Classifier::default());
    assert!(result.is_err());
}

// ========== Detect Command Tests ==========

#[test]
fn test_cmd_detect_after_import_changes_nothing() {
    let db = imported_db();

    let summary = commands::cmd_detect(&db, EMAIL, "all", &Classifier::default()).unwrap();
    assert_eq!(summary, DetectSummary::default());

    let anomalies = db.list_anomalies(user_id(&db)).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].plaid_transaction_id, "g6");
}

#[test]
fn test_cmd_detect_single_kinds() {
    let db = imported_db();
    let classifier = Classifier::default();

    commands::cmd_detect(&db, EMAIL, "anomalies", &classifier).unwrap();
    commands::cmd_detect(&db, EMAIL, "recurring", &classifier).unwrap();

    let recurring = db
        .all_transactions(user_id(&db))
        .unwrap()
        .into_iter()
        .filter(|t| t.is_recurring)
        .count();
    assert_eq!(recurring, 3);
}

#[test]
fn test_cmd_detect_unknown_kind() {
    let db = setup_test_db();
    let err = commands::cmd_detect(&db, EMAIL, "fraud", &Classifier::default()).unwrap_err();
    assert!(err.to_string().contains("Unknown detection kind"));
}

// ========== Export Command Tests ==========

#[test]
fn test_cmd_export_csv_to_file() {
    let db = imported_db();
    let out = NamedTempFile::new().unwrap();

    let count = commands::cmd_export(
        &db,
        EMAIL,
        "csv",
        Some("2024-03"),
        Some(out.path()),
        &Classifier::default(),
    )
    .unwrap();
    assert_eq!(count, 8);

    let csv = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(csv.lines().count(), count + 1);
    assert!(csv.contains("EMPLOYER PAYROLL"));
    assert!(!csv.contains("2024-02-28"));
}

#[test]
fn test_cmd_export_json_to_file() {
    let db = imported_db();
    let out = NamedTempFile::new().unwrap();

    commands::cmd_export(&db, EMAIL, "json", None, Some(out.path()), &Classifier::default())
        .unwrap();

    let json = std::fs::read_to_string(out.path()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 11);
}

#[test]
fn test_cmd_export_unknown_format() {
    let db = setup_test_db();
    let err = commands::cmd_export(&db, EMAIL, "xml", None, None, &Classifier::default())
        .unwrap_err();
    assert!(err.to_string().contains("Unknown export format"));
}

// ========== Report Command Tests ==========

#[test]
fn test_cmd_reports_with_data() {
    let db = imported_db();
    let classifier = Classifier::default();
    db.create_goal(
        user_id(&db),
        &NewGoal {
            name: "Vacation".to_string(),
            target_amount: 2000.0,
            current_amount: 500.0,
            deadline: Some(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()),
            monthly_contribution: Some(100.0),
        },
    )
    .unwrap();

    assert!(commands::cmd_report_cashflow(&db, EMAIL, 6, today(), &classifier).is_ok());
    assert!(commands::cmd_report_categories(&db, EMAIL, None, 5, today(), &classifier).is_ok());
    assert!(
        commands::cmd_report_categories(&db, EMAIL, Some("2024-02"), 3, today(), &classifier)
            .is_ok()
    );
    assert!(commands::cmd_report_net_worth(&db, EMAIL, today(), &classifier).is_ok());
    assert!(commands::cmd_report_insights(&db, EMAIL, today(), &classifier).is_ok());
    assert!(commands::cmd_report_goals(&db, EMAIL, today()).is_ok());
}

#[test]
fn test_cmd_reports_empty_database() {
    let db = setup_test_db();
    let classifier = Classifier::default();

    assert!(commands::cmd_report_cashflow(&db, EMAIL, 6, today(), &classifier).is_ok());
    assert!(commands::cmd_report_categories(&db, EMAIL, None, 5, today(), &classifier).is_ok());
    assert!(commands::cmd_report_net_worth(&db, EMAIL, today(), &classifier).is_ok());
    assert!(commands::cmd_report_insights(&db, EMAIL, today(), &classifier).is_ok());
    assert!(commands::cmd_report_goals(&db, EMAIL, today()).is_ok());
}

#[test]
fn test_cmd_report_categories_invalid_month() {
    let db = setup_test_db();
    let result = commands::cmd_report_categories(
        &db,
        EMAIL,
        Some("March"),
        5,
        today(),
        &Classifier::default(),
    );
    assert!(result.is_err());
}

// ========== Users Command Tests ==========

#[test]
fn test_cmd_users_add_and_list() {
    let db = Database::in_memory().unwrap();
    let user = commands::cmd_users_add(&db, "Sam@Example.com", "2468").unwrap();
    assert_eq!(user.email, "sam@example.com");
    assert!(commands::cmd_users_list(&db).is_ok());
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[test]
fn test_cmd_users_list_empty() {
    let db = Database::in_memory().unwrap();
    assert!(commands::cmd_users_list(&db).is_ok());
}

#[test]
fn test_cmd_users_add_duplicate() {
    let db = setup_test_db();
    assert!(commands::cmd_users_add(&db, EMAIL, "2468").is_err());
}

#[test]
fn test_cmd_users_add_invalid_pin() {
    let db = Database::in_memory().unwrap();
    let err = commands::cmd_users_add(&db, "sam@example.com", "12").unwrap_err();
    assert!(err.to_string().contains("PIN must be 4-8 digits"));
}

#[test]
fn test_cmd_users_set_pin() {
    let db = setup_test_db();
    commands::cmd_users_set_pin(&db, EMAIL, "97531").unwrap();

    assert!(db.authenticate(EMAIL, "97531").is_ok());
    assert!(db.authenticate(EMAIL, "1357").is_err());
}

#[test]
fn test_cmd_users_set_pin_unknown_user() {
    let db = setup_test_db();
    assert!(commands::cmd_users_set_pin(&db, "ghost@example.com", "1234").is_err());
}

#[test]
fn test_cmd_users_delete_removes_data() {
    let db = imported_db();
    let id = user_id(&db);

    commands::cmd_users_delete(&db, EMAIL, true).unwrap();

    assert!(db.get_user_by_email(EMAIL).unwrap().is_none());
    assert!(db.all_transactions(id).unwrap().is_empty());
    assert!(db.list_accounts(id).unwrap().is_empty());
}
