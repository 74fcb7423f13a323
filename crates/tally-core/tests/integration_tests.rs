//! Integration tests for tally-core
//!
//! These tests exercise the full sync → detect → report workflow.

use chrono::NaiveDate;
use tally_core::{
    aggregate::{aggregate_by_category, recent_cashflow},
    build_insights,
    db::Database,
    export::transactions_to_csv_string,
    models::{GoalStatus, NewGoal},
    project_goal, reconstruct_net_worth, Classifier, InsightKind, SyncPayload,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Three months of activity for a checking account and a credit card:
/// payroll, a monthly streaming charge, groceries and one oversized purchase.
fn sync_payload_json() -> &'static str {
    r#"{
        "institution_name": "First Platypus Bank",
        "accounts": [
            {"account_id": "chk", "name": "Checking", "type": "depository",
             "subtype": "checking", "current_balance": 3000.0, "iso_currency_code": "USD"},
            {"account_id": "cc", "name": "Card", "type": "credit",
             "current_balance": -500.0}
        ],
        "added": [
            {"transaction_id": "p1", "account_id": "chk", "amount": 2500.0, "date": "2024-01-31", "name": "ACME PAYROLL"},
            {"transaction_id": "p2", "account_id": "chk", "amount": 2500.0, "date": "2024-02-29", "name": "ACME PAYROLL"},
            {"transaction_id": "p3", "account_id": "chk", "amount": 2500.0, "date": "2024-03-29", "name": "ACME PAYROLL"},
            {"transaction_id": "n1", "account_id": "cc", "amount": -15.49, "date": "2024-01-07", "name": "NETFLIX.COM", "category": ["Entertainment"]},
            {"transaction_id": "n2", "account_id": "cc", "amount": -15.49, "date": "2024-02-07", "name": "NETFLIX.COM", "category": ["Entertainment"]},
            {"transaction_id": "n3", "account_id": "cc", "amount": -15.49, "date": "2024-03-07", "name": "NETFLIX.COM", "category": ["Entertainment"]},
            {"transaction_id": "g1", "account_id": "cc", "amount": -60.0, "date": "2024-01-12", "name": "Corner Grocer", "category": ["Groceries"]},
            {"transaction_id": "g2", "account_id": "cc", "amount": -55.0, "date": "2024-02-12", "name": "Corner Grocer", "category": ["Groceries"]},
            {"transaction_id": "g3", "account_id": "cc", "amount": -65.0, "date": "2024-03-02", "name": "Farm Stand", "category": ["Groceries"]},
            {"transaction_id": "g4", "account_id": "cc", "amount": -50.0, "date": "2024-03-09", "name": "Farm Stand", "category": ["Groceries"]},
            {"transaction_id": "g5", "account_id": "cc", "amount": -45.0, "date": "2024-03-16", "name": "Farm Stand", "category": ["Groceries"]},
            {"transaction_id": "g6", "account_id": "cc", "amount": -55.0, "date": "2024-03-23", "name": "Farm Stand", "category": ["Groceries"]},
            {"transaction_id": "big", "account_id": "cc", "amount": -900.0, "date": "2024-03-20", "name": "Bulk Club", "category": ["Groceries"]},
            {"transaction_id": "u1", "account_id": "cc", "amount": -22.0, "date": "2024-03-21", "name": "Ride", "merchant_name": "Uber"}
        ]
    }"#
}

fn setup() -> (Database, i64, Classifier) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user = db
        .create_user("casey@example.com", "2468")
        .expect("Failed to create user");
    let classifier = Classifier::default();

    let payload = SyncPayload::from_json(sync_payload_json()).expect("Failed to parse payload");
    db.apply_sync(user.id, payload, &classifier)
        .expect("Failed to apply sync");

    (db, user.id, classifier)
}

#[test]
fn test_full_sync_workflow() {
    let (db, user_id, _) = setup();

    assert_eq!(db.list_accounts(user_id).unwrap().len(), 2);
    let txs = db.all_transactions(user_id).unwrap();
    assert_eq!(txs.len(), 14);

    // Groceries mean = (60+55+65+50+45+55+900)/7 ≈ 175.7, so only the 900 stands out
    let anomalies = db.list_anomalies(user_id).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].plaid_transaction_id, "big");

    let recurring: Vec<&str> = txs
        .iter()
        .filter(|t| t.is_recurring)
        .map(|t| t.plaid_transaction_id.as_str())
        .collect();
    assert_eq!(recurring, vec!["n1", "n2", "n3"]);

    // Detection is idempotent after sync
    assert_eq!(db.detect_anomalies(user_id).unwrap(), 0);
    assert_eq!(db.detect_recurring(user_id, &Classifier::default()).unwrap(), 0);
}

#[test]
fn test_reports_agree_with_each_other() {
    let (db, user_id, classifier) = setup();
    let txs = db.all_transactions(user_id).unwrap();

    let months = recent_cashflow(&txs, date(2024, 3, 31), 3, &classifier);
    assert_eq!(months.len(), 3);
    assert!(months.iter().all(|m| m.inflow == 2500.0));

    let march = txs
        .iter()
        .filter(|t| t.date >= date(2024, 3, 1))
        .collect::<Vec<_>>();
    let categories = aggregate_by_category(march.iter().copied(), 5, &classifier);
    assert_eq!(categories[0].category, "Groceries");
    assert_eq!(categories[0].amount, 1115.0);
    assert!(categories.iter().any(|c| c.category == "Transportation"));

    let march_outflow = months[2].outflow;
    let category_sum: f64 = categories.iter().map(|c| c.amount).sum();
    assert!((march_outflow - category_sum).abs() < 1e-9);
}

#[test]
fn test_net_worth_reconstruction() {
    let (db, user_id, classifier) = setup();
    let accounts = db.list_accounts(user_id).unwrap();
    let txs = db.all_transactions(user_id).unwrap();

    let report = reconstruct_net_worth(&accounts, &txs, date(2024, 4, 10), &classifier);
    assert_eq!(report.current.assets, 3000.0);
    assert_eq!(report.current.liabilities, 500.0);
    assert_eq!(report.current.net_worth, 2500.0);

    let keys: Vec<&str> = report.history.iter().map(|s| s.month.as_str()).collect();
    assert_eq!(keys, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);
    assert!(report.history.iter().all(|s| s.liabilities == 500.0));
    // March is recorded with live balances before March is reversed
    assert_eq!(report.history[2].assets, 3000.0);
}

#[test]
fn test_goal_and_insights_workflow() {
    let (db, user_id, classifier) = setup();

    let goal = db
        .create_goal(
            user_id,
            &NewGoal {
                name: "Emergency fund".to_string(),
                target_amount: 1000.0,
                current_amount: 200.0,
                deadline: Some(date(2024, 5, 1)),
                monthly_contribution: Some(100.0),
            },
        )
        .unwrap();

    let projection = project_goal(&goal, date(2024, 3, 31));
    assert!(projection.warning);
    assert!(projection.tip.starts_with("Increase your monthly contribution"));

    let goals = db.list_goals(user_id).unwrap();
    let txs = db.all_transactions(user_id).unwrap();
    let report = build_insights(&txs, &goals, date(2024, 3, 31), &classifier);
    assert_eq!(report.anomaly_count, 1);
    assert!(report.tips.iter().any(|t| t.kind == InsightKind::GoalPace));
    assert!(report.tips.iter().any(|t| t.kind == InsightKind::Recurring));

    let done = db.contribute_to_goal(user_id, goal.id, 800.0).unwrap();
    assert_eq!(done.status, GoalStatus::Completed);
}

#[test]
fn test_csv_export_of_synced_data() {
    let (db, user_id, classifier) = setup();
    let txs = db.all_transactions(user_id).unwrap();

    let csv = transactions_to_csv_string(&txs, &classifier).unwrap();
    assert_eq!(csv.lines().count(), txs.len() + 1);
    assert!(csv.contains("ACME PAYROLL,,2500.00,income,Income"));
    assert!(csv.contains("Ride,Uber,-22.00,expense,Transportation"));
}

#[test]
fn test_unlink_removes_everything_synced() {
    let (db, user_id, _) = setup();
    let removed = db.delete_bank_link(user_id).unwrap().unwrap();
    assert_eq!(removed.accounts, 2);
    assert_eq!(removed.transactions, 14);
    assert!(db.all_transactions(user_id).unwrap().is_empty());
}
