//! Database row types. Timestamps stay as epoch milliseconds; conversion to
//! API types happens through the `*_summary` / `to_*` helpers.

use dareboard_types::api::{ChallengeInviteView, ExecutionSummary, ProfileSummary, TaskSummary};
use dareboard_types::models::{ChallengeStatus, EdgeStatus, Execution, Profile, Task, millis_to_utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub id: Uuid,
    pub name: String,
    pub profile_image: Option<String>,
    pub avatar_color: Option<String>,
    pub daily_streak: u32,
    pub last_completion_at: Option<i64>,
}

impl ProfileRow {
    pub const COLUMNS: usize = 6;

    /// Read a profile from six consecutive columns starting at `at`.
    pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, at)?,
            name: row.get(at + 1)?,
            profile_image: row.get(at + 2)?,
            avatar_color: row.get(at + 3)?,
            daily_streak: row.get(at + 4)?,
            last_completion_at: row.get(at + 5)?,
        })
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            name: self.name.clone(),
            profile_image: self.profile_image.clone(),
            avatar_color: self.avatar_color.clone(),
            daily_streak: self.daily_streak,
        }
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            id: self.id,
            name: self.name.clone(),
            profile_image: self.profile_image.clone(),
            avatar_color: self.avatar_color.clone(),
            daily_streak: self.daily_streak,
            last_completion_at: self.last_completion_at.map(millis_to_utc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: Uuid,
    pub creator_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: i64,
}

impl TaskRow {
    pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, at)?,
            creator_id: opt_uuid_col(row, at + 1)?,
            title: row.get(at + 2)?,
            description: row.get(at + 3)?,
            image_url: row.get(at + 4)?,
            created_at: row.get(at + 5)?,
        })
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
        }
    }

    pub fn to_task(&self) -> Task {
        Task {
            id: self.id,
            creator_id: self.creator_id,
            title: self.title.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            created_at: millis_to_utc(self.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub executed_at: i64,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

impl ExecutionRow {
    pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, at)?,
            task_id: uuid_col(row, at + 1)?,
            user_id: uuid_col(row, at + 2)?,
            executed_at: row.get(at + 3)?,
            completed: row.get(at + 4)?,
            completed_at: row.get(at + 5)?,
        })
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            id: self.id,
            completed: self.completed,
            completed_at: self.completed_at.map(millis_to_utc),
        }
    }

    pub fn to_execution(&self) -> Execution {
        Execution {
            id: self.id,
            task_id: self.task_id,
            user_id: self.user_id,
            executed_at: millis_to_utc(self.executed_at),
            completed: self.completed,
            completed_at: self.completed_at.map(millis_to_utc),
        }
    }
}

/// A directed relationship edge with both endpoint profiles expanded.
#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub id: Uuid,
    pub from_user: ProfileRow,
    pub to_user: ProfileRow,
    pub status: EdgeStatus,
    pub created_at: i64,
    pub accepted_at: Option<i64>,
}

/// A challenge invite with sender, recipient, task and (once accepted) execution expanded.
#[derive(Debug, Clone)]
pub struct InviteRow {
    pub id: Uuid,
    pub message: Option<String>,
    pub status: ChallengeStatus,
    pub created_at: i64,
    pub responded_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub from_user: ProfileRow,
    pub to_user: ProfileRow,
    pub task: TaskRow,
    pub execution: Option<ExecutionRow>,
}

impl InviteRow {
    pub fn to_view(&self) -> ChallengeInviteView {
        ChallengeInviteView {
            id: self.id,
            message: self.message.clone(),
            status: self.status,
            created_at: millis_to_utc(self.created_at),
            responded_at: self.responded_at.map(millis_to_utc),
            completed_at: self.completed_at.map(millis_to_utc),
            from_user: self.from_user.summary(),
            to_user: self.to_user.summary(),
            task: self.task.summary(),
            execution: self.execution.as_ref().map(ExecutionRow::summary),
        }
    }
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

pub(crate) fn edge_status_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<EdgeStatus> {
    let raw: String = row.get(idx)?;
    EdgeStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown relationship status '{}'", raw).into(),
        )
    })
}

pub(crate) fn challenge_status_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<ChallengeStatus> {
    let raw: String = row.get(idx)?;
    ChallengeStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown challenge status '{}'", raw).into(),
        )
    })
}
