//! Goal operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Goal, GoalUpdate, NewGoal};

const GOAL_COLUMNS: &str = "id, user_id, name, target_amount, current_amount, deadline, \
     monthly_contribution, status, completed_at, created_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    let deadline_str: Option<String> = row.get(5)?;
    let status_str: String = row.get(7)?;
    let completed_at_str: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(9)?;

    Ok(Goal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        target_amount: row.get(3)?,
        current_amount: row.get(4)?,
        deadline: deadline_str.as_deref().map(parse_date).transpose()?,
        monthly_contribution: row.get(6)?,
        status: status_str.parse().unwrap_or_default(),
        completed_at: completed_at_str.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Create a goal. A goal created at or above its target starts completed.
    pub fn create_goal(&self, user_id: i64, new: &NewGoal) -> Result<Goal> {
        new.validate()?;

        let now = Utc::now();
        let mut goal = Goal {
            id: 0,
            user_id,
            name: new.name.trim().to_string(),
            target_amount: new.target_amount,
            current_amount: new.current_amount,
            deadline: new.deadline,
            monthly_contribution: new.monthly_contribution,
            status: Default::default(),
            completed_at: None,
            created_at: now,
        };
        goal.refresh_status(now);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO goals (user_id, name, target_amount, current_amount, deadline,
                               monthly_contribution, status, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                goal.name,
                goal.target_amount,
                goal.current_amount,
                goal.deadline.map(|d| d.to_string()),
                goal.monthly_contribution,
                goal.status.as_str(),
                goal.completed_at.map(format_datetime),
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.require_goal(user_id, id)
    }

    pub fn list_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM goals WHERE user_id = ? ORDER BY created_at, id",
            GOAL_COLUMNS
        ))?;

        let goals = stmt
            .query_map(params![user_id], goal_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(goals)
    }

    pub fn get_goal(&self, user_id: i64, id: i64) -> Result<Option<Goal>> {
        let conn = self.conn()?;
        load_goal(&conn, user_id, id)
    }

    fn require_goal(&self, user_id: i64, id: i64) -> Result<Goal> {
        self.get_goal(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Goal {}", id)))
    }

    /// Read, change and write a goal under one write lock
    ///
    /// `BEGIN IMMEDIATE` takes the lock before the read, so concurrent
    /// callers queue on the busy timeout instead of overwriting each other.
    fn modify_goal<F>(&self, user_id: i64, id: i64, change: F) -> Result<Goal>
    where
        F: FnOnce(&mut Goal) -> Result<()>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut goal = load_goal(&tx, user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Goal {}", id)))?;
        change(&mut goal)?;
        write_goal(&tx, &goal)?;

        tx.commit()?;
        Ok(goal)
    }

    /// Apply a partial update and persist the result
    pub fn update_goal(&self, user_id: i64, id: i64, update: GoalUpdate) -> Result<Goal> {
        self.modify_goal(user_id, id, |goal| goal.apply_update(update, Utc::now()))
    }

    /// Add a contribution, completing the goal when it reaches the target
    pub fn contribute_to_goal(&self, user_id: i64, id: i64, amount: f64) -> Result<Goal> {
        self.modify_goal(user_id, id, |goal| goal.contribute(amount, Utc::now()))
    }

    pub fn delete_goal(&self, user_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM goals WHERE user_id = ? AND id = ?",
            params![user_id, id],
        )?;
        Ok(deleted > 0)
    }

}

fn load_goal(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Goal>> {
    let goal = conn
        .query_row(
            &format!("SELECT {} FROM goals WHERE user_id = ? AND id = ?", GOAL_COLUMNS),
            params![user_id, id],
            goal_from_row,
        )
        .optional()?;

    Ok(goal)
}

fn write_goal(conn: &Connection, goal: &Goal) -> Result<()> {
    conn.execute(
        r#"
        UPDATE goals SET name = ?, target_amount = ?, current_amount = ?, deadline = ?,
                         monthly_contribution = ?, status = ?, completed_at = ?
        WHERE user_id = ? AND id = ?
        "#,
        params![
            goal.name,
            goal.target_amount,
            goal.current_amount,
            goal.deadline.map(|d| d.to_string()),
            goal.monthly_contribution,
            goal.status.as_str(),
            goal.completed_at.map(format_datetime),
            goal.user_id,
            goal.id,
        ],
    )?;
    Ok(())
}
