use crate::Database;
use crate::models::{ExecutionRow, ProfileRow, TaskRow, uuid_col};
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

pub(crate) const PROFILE_COLUMNS: &str =
    "id, name, profile_image, avatar_color, daily_streak, last_completion_at";
const TASK_COLUMNS: &str = "id, creator_id, title, description, image_url, created_at";
const EXECUTION_COLUMNS: &str = "id, task_id, user_id, executed_at, completed, completed_at";

impl Database {
    // -- Profiles --

    /// Create the profile on first save, otherwise update the editable fields.
    /// Streak fields are left alone; only execution completion moves them.
    pub fn upsert_profile(
        &self,
        id: Uuid,
        name: &str,
        profile_image: Option<&str>,
        avatar_color: Option<&str>,
        now_ms: i64,
    ) -> Result<ProfileRow> {
        self.transact(|tx| {
            tx.execute(
                "INSERT INTO profiles (id, name, profile_image, avatar_color, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    profile_image = excluded.profile_image,
                    avatar_color = excluded.avatar_color",
                rusqlite::params![id.to_string(), name, profile_image, avatar_color, now_ms],
            )?;
            query_profile(tx, id)?.ok_or_else(|| anyhow::anyhow!("Profile vanished: {}", id))
        })
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    /// Users whose live query embeds `id`'s profile: every peer of an edge or
    /// invite touching `id`.
    pub fn profile_audience(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| query_profile_audience(conn, id))
    }

    // -- Tasks --

    pub fn create_task(
        &self,
        id: Uuid,
        creator_id: Uuid,
        title: &str,
        description: &str,
        image_url: Option<&str>,
        now_ms: i64,
    ) -> Result<TaskRow> {
        self.transact(|tx| {
            tx.execute(
                "INSERT INTO tasks (id, creator_id, title, description, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.to_string(),
                    creator_id.to_string(),
                    title,
                    description,
                    image_url,
                    now_ms
                ],
            )?;
            query_task(tx, id)?.ok_or_else(|| anyhow::anyhow!("Task vanished: {}", id))
        })
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task(conn, id))
    }

    // -- Executions --

    pub fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>> {
        self.with_conn(|conn| query_execution(conn, id))
    }

    pub fn executions_for_task(&self, task_id: Uuid) -> Result<Vec<ExecutionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM executions WHERE task_id = ?1 ORDER BY executed_at, rowid",
                EXECUTION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([task_id.to_string()], |row| ExecutionRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Insert a bare profile row. Used by seeding code and tests; the API goes
/// through [`Database::upsert_profile`].
pub fn insert_profile(
    conn: &Connection,
    id: Uuid,
    name: &str,
    profile_image: Option<&str>,
    avatar_color: Option<&str>,
    now_ms: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, name, profile_image, avatar_color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), name, profile_image, avatar_color, now_ms],
    )?;
    Ok(())
}

pub fn query_profile(conn: &Connection, id: Uuid) -> Result<Option<ProfileRow>> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([id.to_string()], |row| ProfileRow::from_row(row, 0))
        .optional()?;
    Ok(row)
}

pub fn query_task(conn: &Connection, id: Uuid) -> Result<Option<TaskRow>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([id.to_string()], |row| TaskRow::from_row(row, 0))
        .optional()?;
    Ok(row)
}

pub fn query_execution(conn: &Connection, id: Uuid) -> Result<Option<ExecutionRow>> {
    let sql = format!("SELECT {} FROM executions WHERE id = ?1", EXECUTION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([id.to_string()], |row| ExecutionRow::from_row(row, 0))
        .optional()?;
    Ok(row)
}

/// The user's not-yet-completed execution of a task, if any.
pub fn query_open_execution(
    conn: &Connection,
    task_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ExecutionRow>> {
    let sql = format!(
        "SELECT {} FROM executions
         WHERE task_id = ?1 AND user_id = ?2 AND completed = 0
         ORDER BY executed_at DESC LIMIT 1",
        EXECUTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([task_id.to_string(), user_id.to_string()], |row| {
            ExecutionRow::from_row(row, 0)
        })
        .optional()?;
    Ok(row)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn query_profile_audience(conn: &Connection, id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT to_user FROM relationships WHERE from_user = ?1
         UNION SELECT from_user FROM relationships WHERE to_user = ?1
         UNION SELECT to_user FROM challenge_invites WHERE from_user = ?1
         UNION SELECT from_user FROM challenge_invites WHERE to_user = ?1",
    )?;
    let ids = stmt
        .query_map([id.to_string()], |row| uuid_col(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_creates_then_updates_profile() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();

        let created = db.upsert_profile(id, "Ada", None, Some("#ff0000"), 10).unwrap();
        assert_eq!(created.name, "Ada");
        assert_eq!(created.daily_streak, 0);

        let updated = db.upsert_profile(id, "Ada L.", Some("https://img/ada.png"), None, 20).unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(updated.profile_image.as_deref(), Some("https://img/ada.png"));
        assert_eq!(updated.avatar_color, None);
    }

    #[test]
    fn missing_rows_are_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_profile(Uuid::new_v4()).unwrap().is_none());
        assert!(db.get_task(Uuid::new_v4()).unwrap().is_none());
        assert!(db.get_execution(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn task_requires_existing_creator() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_task(Uuid::new_v4(), Uuid::new_v4(), "Run", "5k", None, 1);
        assert!(err.is_err());
    }

    #[test]
    fn profile_audience_lists_each_peer_once() {
        use crate::ops::{self, TxOp};
        use dareboard_types::models::EdgeStatus;

        let db = Database::open_in_memory().unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for (id, name) in [(a, "Ada"), (b, "Bob"), (c, "Cy")] {
            db.upsert_profile(id, name, None, None, 1).unwrap();
        }

        let edges = [
            TxOp::CreateRelationship { id: Uuid::new_v4(), from_user: a, to_user: b, status: EdgeStatus::Accepted, at: 2 },
            TxOp::CreateRelationship { id: Uuid::new_v4(), from_user: b, to_user: a, status: EdgeStatus::Accepted, at: 2 },
        ];
        db.transact(|tx| ops::apply(tx, &edges)).unwrap();

        assert_eq!(db.profile_audience(a).unwrap(), vec![b]);
        assert_eq!(db.profile_audience(b).unwrap(), vec![a]);
        assert!(db.profile_audience(c).unwrap().is_empty());
    }
}
