//! Dashboard statistics for both roles, computed over the record store.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::identity::{Filter, IdentityProvider, Profile};

use super::homework::{self, HomeworkTask, StatusFilter};

pub const CLASS_NOTES_TABLE: &str = "class_notes";

/// How many upcoming tasks the student dashboard shows.
const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentStats {
    pub pending: usize,
    pub completed: usize,
    pub overdue: usize,
    pub upcoming: Vec<HomeworkTask>,
}

/// Stats over the student's next few assignments by deadline.
pub async fn student_stats(
    provider: &dyn IdentityProvider,
    now: DateTime<Utc>,
) -> AppResult<StudentStats> {
    let mut tasks = homework::list_homework(provider, StatusFilter::All, now).await?;
    tasks.truncate(UPCOMING_LIMIT);
    let pending = tasks.iter().filter(|t| t.deadline > now).count();
    let overdue = tasks.iter().filter(|t| t.deadline < now).count();
    Ok(StudentStats {
        pending,
        // completion state is not tracked in homework_tasks yet
        completed: 0,
        overdue,
        upcoming: tasks,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherStats {
    pub homework: usize,
    pub doubts: usize,
    pub notes: usize,
    pub recent_homework: Vec<HomeworkTask>,
}

/// Counts of what this teacher has created plus doubts awaiting review in
/// their subject.
pub async fn teacher_stats(
    provider: &dyn IdentityProvider,
    profile: &Profile,
) -> AppResult<TeacherStats> {
    let mut created = homework::homework_by_teacher(provider, &profile.id).await?;
    let homework_count = created.len();
    created.truncate(UPCOMING_LIMIT);

    let doubts = match &profile.subject {
        Some(subject) => provider
            .select(super::doubts::DOUBTS_TABLE, &Filter::eq("subject", subject.clone()))
            .await
            .map_err(|e| AppError::internal("doubts_select_failed", e.to_string()))?
            .len(),
        None => 0,
    };

    let notes = provider
        .select(CLASS_NOTES_TABLE, &Filter::eq("teacher_id", profile.id.clone()))
        .await
        .map_err(|e| AppError::internal("notes_select_failed", e.to_string()))?
        .len();

    Ok(TeacherStats { homework: homework_count, doubts, notes, recent_homework: created })
}
