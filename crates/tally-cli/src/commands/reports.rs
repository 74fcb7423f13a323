//! Report command implementations

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::aggregate::{aggregate_by_category, in_month, month_key, parse_month_key, recent_cashflow};
use tally_core::{build_insights, project_goal, reconstruct_net_worth, Classifier, Database};

use super::{resolve_user, truncate};

pub fn cmd_report_cashflow(
    db: &Database,
    email: &str,
    months: u32,
    today: NaiveDate,
    classifier: &Classifier,
) -> Result<()> {
    let user = resolve_user(db, email)?;
    let txs = db.all_transactions(user.id)?;
    let report = recent_cashflow(&txs, today, months.max(1), classifier);

    println!("💵 Cashflow (last {} months)", months.max(1));
    println!();

    if report.is_empty() {
        println!("   No transactions in this period.");
        return Ok(());
    }

    println!("   {:<8} {:>12} {:>12} {:>12}", "Month", "Inflow", "Outflow", "Net");
    println!("   {}", "─".repeat(47));
    for m in &report {
        println!(
            "   {:<8} {:>12.2} {:>12.2} {:>12.2}",
            m.month, m.inflow, m.outflow, m.net
        );
    }

    Ok(())
}

pub fn cmd_report_categories(
    db: &Database,
    email: &str,
    month: Option<&str>,
    top: usize,
    today: NaiveDate,
    classifier: &Classifier,
) -> Result<()> {
    let user = resolve_user(db, email)?;
    let month = match month {
        Some(m) => month_key(parse_month_key(m.trim())?),
        None => month_key(today),
    };

    let txs = db.all_transactions(user.id)?;
    let categories = aggregate_by_category(in_month(&txs, &month), top, classifier);

    println!("📊 Top categories for {}", month);
    println!();

    if categories.is_empty() {
        println!("   No spending this month.");
        return Ok(());
    }

    let total: f64 = categories.iter().map(|c| c.amount).sum();
    for c in &categories {
        let share = if total > 0.0 { c.amount / total * 100.0 } else { 0.0 };
        println!(
            "   {:<24} ${:>10.2}  ({:>4.1}%)",
            truncate(&c.category, 24),
            c.amount,
            share
        );
    }

    Ok(())
}

pub fn cmd_report_net_worth(
    db: &Database,
    email: &str,
    today: NaiveDate,
    classifier: &Classifier,
) -> Result<()> {
    let user = resolve_user(db, email)?;
    let accounts = db.list_accounts(user.id)?;
    let txs = db.all_transactions(user.id)?;
    let report = reconstruct_net_worth(&accounts, &txs, today, classifier);

    println!("🏦 Net worth");
    println!();
    println!("   Assets:      ${:>12.2}", report.current.assets);
    println!("   Liabilities: ${:>12.2}", report.current.liabilities);
    println!("   Net worth:   ${:>12.2}", report.current.net_worth);

    if !report.history.is_empty() {
        println!();
        println!("   {:<8} {:>12} {:>12} {:>12}", "Month", "Assets", "Liabilities", "Net");
        println!("   {}", "─".repeat(47));
        for s in &report.history {
            println!(
                "   {:<8} {:>12.2} {:>12.2} {:>12.2}",
                s.month, s.assets, s.liabilities, s.net_worth
            );
        }
    }

    Ok(())
}

pub fn cmd_report_insights(
    db: &Database,
    email: &str,
    today: NaiveDate,
    classifier: &Classifier,
) -> Result<()> {
    let user = resolve_user(db, email)?;
    let txs = db.all_transactions(user.id)?;
    let goals = db.list_goals(user.id)?;
    let report = build_insights(&txs, &goals, today, classifier);

    println!("💡 Insights for {}", report.month);
    println!();
    println!("   Income:   ${:.2}", report.income);
    println!("   Spending: ${:.2}", report.spending);
    if let Some(rate) = report.savings_rate {
        println!("   Savings rate: {:.0}%", rate * 100.0);
    }
    if let Some(change) = report.spending_change_percent {
        println!("   Spending vs last month: {:+.0}%", change);
    }
    println!();

    if report.tips.is_empty() {
        println!("   Nothing to flag this month.");
        return Ok(());
    }

    for tip in &report.tips {
        println!("   [{}] {}", tip.severity.as_str(), tip.title);
        println!("       {}", tip.message);
    }

    Ok(())
}

pub fn cmd_report_goals(db: &Database, email: &str, today: NaiveDate) -> Result<()> {
    let user = resolve_user(db, email)?;
    let goals = db.list_goals(user.id)?;

    println!("🎯 Goals");
    println!();

    if goals.is_empty() {
        println!("   No goals yet.");
        return Ok(());
    }

    for goal in &goals {
        let projection = project_goal(goal, today);
        let marker = if projection.warning { "⚠️ " } else { "" };
        println!(
            "   {}{} ({}): ${:.2} of ${:.2} ({:.0}%)",
            marker,
            truncate(&goal.name, 32),
            goal.status,
            goal.current_amount,
            goal.target_amount,
            projection.progress_percent
        );
        println!("       {}", projection.tip);
    }

    Ok(())
}
