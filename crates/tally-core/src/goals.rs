//! Savings goal projection and lifecycle

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Goal, GoalStatus, GoalUpdate, NewGoal};

/// Projection shown next to a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProjection {
    pub tip: String,
    pub estimated_completion: Option<NaiveDate>,
    pub progress_percent: f64,
    /// Set when the goal needs attention (deadline passed or pace too slow)
    #[serde(default)]
    pub warning: bool,
}

/// Share of the target already saved, in percent
pub fn progress_percent(goal: &Goal) -> f64 {
    if goal.target_amount <= 0.0 {
        return 100.0;
    }
    goal.current_amount / goal.target_amount * 100.0
}

/// Whole 30-day months from `now` until `deadline`, rounded up
pub fn months_until(deadline: NaiveDate, now: NaiveDate) -> i64 {
    let days = (deadline - now).num_days();
    (days as f64 / 30.0).ceil() as i64
}

/// Project when a goal completes and what to suggest, first rule that applies
pub fn project_goal(goal: &Goal, now: NaiveDate) -> GoalProjection {
    let progress = progress_percent(goal);
    let remaining = goal.target_amount - goal.current_amount;

    let projection = |tip: String, estimated_completion: Option<NaiveDate>, warning: bool| {
        GoalProjection {
            tip,
            estimated_completion,
            progress_percent: progress,
            warning,
        }
    };

    if progress >= 100.0 {
        return projection(
            format!("Congratulations! You've reached your {} goal.", goal.name),
            None,
            false,
        );
    }

    if let Some(contribution) = goal.monthly_contribution.filter(|c| *c > 0.0) {
        let months_needed = (remaining / contribution).ceil();
        let completion = u32::try_from(months_needed as i64)
            .ok()
            .and_then(|m| now.checked_add_months(Months::new(m)));

        if let Some(deadline) = goal.deadline {
            let misses_deadline = completion.map_or(true, |c| c > deadline);
            if misses_deadline {
                let months_left = months_until(deadline, now).max(1);
                let additional = remaining / months_left as f64 - contribution;
                if additional > 0.0 {
                    return projection(
                        format!(
                            "Increase your monthly contribution by ${:.2} to reach {} by {}.",
                            additional, goal.name, deadline
                        ),
                        completion,
                        true,
                    );
                }
                return projection(
                    format!(
                        "You're on track: ${:.2} per month reaches {} by {}.",
                        contribution, goal.name, deadline
                    ),
                    completion,
                    false,
                );
            }
        }

        let tip = match completion {
            Some(date) => format!(
                "You're on track to reach {} by {} saving ${:.2} per month.",
                goal.name, date, contribution
            ),
            None => format!(
                "At ${:.2} per month, {} is a long way off. Consider saving more.",
                contribution, goal.name
            ),
        };
        return projection(tip, completion, false);
    }

    if let Some(deadline) = goal.deadline {
        let months_left = months_until(deadline, now);
        if months_left <= 0 {
            return projection(
                format!(
                    "The deadline for {} has passed. Consider setting a new target date.",
                    goal.name
                ),
                None,
                true,
            );
        }
        let required = remaining / months_left as f64;
        return projection(
            format!(
                "Save ${:.2} per month to reach {} by {}.",
                required, goal.name, deadline
            ),
            None,
            false,
        );
    }

    let tip = if progress < 25.0 {
        "Every contribution counts. Set a monthly amount to build momentum."
    } else if progress < 50.0 {
        "Good start! You're building steady progress."
    } else if progress < 75.0 {
        "You're past the halfway mark. Keep it up!"
    } else {
        "Almost there! The finish line is in sight."
    };
    projection(tip.to_string(), None, false)
}

fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidData(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(())
}

fn validate_target(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidData(
            "target_amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

impl NewGoal {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidData("Goal name is required".to_string()));
        }
        validate_target(self.target_amount)?;
        validate_amount("current_amount", self.current_amount)?;
        if let Some(c) = self.monthly_contribution {
            validate_amount("monthly_contribution", c)?;
        }
        Ok(())
    }
}

impl Goal {
    /// Complete an active goal once the target is met
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.status == GoalStatus::Active && self.current_amount >= self.target_amount {
            self.status = GoalStatus::Completed;
            self.completed_at = Some(now);
        }
    }

    /// Add money to the goal
    pub fn contribute(&mut self, amount: f64, now: DateTime<Utc>) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidData(
                "Contribution must be greater than zero".to_string(),
            ));
        }
        self.current_amount += amount;
        self.refresh_status(now);
        Ok(())
    }

    /// Merge a partial update, then re-check completion. Leaves the goal
    /// untouched when any field is invalid.
    pub fn apply_update(&mut self, update: GoalUpdate, now: DateTime<Utc>) -> Result<()> {
        let mut next = self.clone();
        next.merge(update, now)?;
        *self = next;
        Ok(())
    }

    fn merge(&mut self, update: GoalUpdate, now: DateTime<Utc>) -> Result<()> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidData("Goal name is required".to_string()));
            }
            self.name = name;
        }
        if let Some(target) = update.target_amount {
            validate_target(target)?;
            self.target_amount = target;
        }
        if let Some(current) = update.current_amount {
            validate_amount("current_amount", current)?;
            self.current_amount = current;
        }
        if let Some(deadline) = update.deadline {
            self.deadline = deadline;
        }
        if let Some(contribution) = update.monthly_contribution {
            if let Some(c) = contribution {
                validate_amount("monthly_contribution", c)?;
            }
            self.monthly_contribution = contribution;
        }
        if let Some(status) = update.status {
            if status == GoalStatus::Completed && self.current_amount < self.target_amount {
                return Err(Error::InvalidData(
                    "A goal can only be completed once its target is reached".to_string(),
                ));
            }
            if status != GoalStatus::Completed {
                self.completed_at = None;
            } else if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
            self.status = status;
        }
        self.refresh_status(now);
        Ok(())
    }
}
