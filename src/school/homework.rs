//! Homework listing over the `homework_tasks` table: deadline ordering,
//! urgency labels, and the status filters offered on the assignments screen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::identity::{Filter, IdentityProvider, Row};

pub const HOMEWORK_TABLE: &str = "homework_tasks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeworkTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub class: Option<String>,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub teacher_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Overdue,
    DueToday,
    DaysLeft(i64),
}

/// Urgency of a task at `now`, using calendar-day granularity rounded up.
/// Any past deadline is `Overdue`, even one missed less than a day ago;
/// there is no same-day grace window, so the badge always agrees with the
/// overdue status filter.
pub fn urgency(task: &HomeworkTask, now: DateTime<Utc>) -> Urgency {
    let left = task.deadline - now;
    if left < chrono::Duration::zero() {
        return Urgency::Overdue;
    }
    let days = (left.num_seconds() + 86_399) / 86_400;
    if days == 0 {
        Urgency::DueToday
    } else {
        Urgency::DaysLeft(days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Pending,
    Overdue,
}

impl StatusFilter {
    fn keeps(&self, task: &HomeworkTask, now: DateTime<Utc>) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => task.deadline > now,
            StatusFilter::Overdue => task.deadline < now,
        }
    }
}

fn decode_task(row: Row) -> Option<HomeworkTask> {
    match serde_json::from_value(Value::Object(row)) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!("skipping undecodable homework row: {}", e);
            None
        }
    }
}

/// All assignments, filtered by status and ordered by deadline ascending.
pub async fn list_homework(
    provider: &dyn IdentityProvider,
    filter: StatusFilter,
    now: DateTime<Utc>,
) -> AppResult<Vec<HomeworkTask>> {
    let rows = provider
        .select(HOMEWORK_TABLE, &Filter::all())
        .await
        .map_err(|e| AppError::internal("homework_select_failed", e.to_string()))?;
    let mut tasks: Vec<HomeworkTask> = rows
        .into_iter()
        .filter_map(decode_task)
        .filter(|t| filter.keeps(t, now))
        .collect();
    tasks.sort_by_key(|t| t.deadline);
    Ok(tasks)
}

/// Assignments created by one teacher, newest-deadline last.
pub async fn homework_by_teacher(
    provider: &dyn IdentityProvider,
    teacher_id: &str,
) -> AppResult<Vec<HomeworkTask>> {
    let rows = provider
        .select(HOMEWORK_TABLE, &Filter::eq("teacher_id", teacher_id))
        .await
        .map_err(|e| AppError::internal("homework_select_failed", e.to_string()))?;
    let mut tasks: Vec<HomeworkTask> = rows.into_iter().filter_map(decode_task).collect();
    tasks.sort_by_key(|t| t.deadline);
    Ok(tasks)
}
