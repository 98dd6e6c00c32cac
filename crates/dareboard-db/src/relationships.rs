use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

use crate::Database;
use crate::models::{EdgeRow, ProfileRow, edge_status_col, uuid_col};

const EDGE_SELECT: &str = "
    SELECT r.id, r.status, r.created_at, r.accepted_at,
           f.id, f.name, f.profile_image, f.avatar_color, f.daily_streak, f.last_completion_at,
           t.id, t.name, t.profile_image, t.avatar_color, t.daily_streak, t.last_completion_at
    FROM relationships r
    JOIN profiles f ON f.id = r.from_user
    JOIN profiles t ON t.id = r.to_user";

impl Database {
    /// Live-query view: every edge that starts or ends at `user_id`, oldest first.
    pub fn relationships_touching(&self, user_id: Uuid) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| query_edges_touching(conn, user_id))
    }

    pub fn relationships_between(&self, a: Uuid, b: Uuid) -> Result<Vec<EdgeRow>> {
        self.with_conn(|conn| query_edges_between(conn, a, b))
    }
}

pub fn query_edges_touching(conn: &Connection, user_id: Uuid) -> Result<Vec<EdgeRow>> {
    let sql = format!(
        "{} WHERE r.from_user = ?1 OR r.to_user = ?1 ORDER BY r.created_at, r.rowid",
        EDGE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], edge_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All edges between two users, in either direction.
pub fn query_edges_between(conn: &Connection, a: Uuid, b: Uuid) -> Result<Vec<EdgeRow>> {
    let sql = format!(
        "{} WHERE (r.from_user = ?1 AND r.to_user = ?2)
              OR (r.from_user = ?2 AND r.to_user = ?1)
         ORDER BY r.created_at, r.rowid",
        EDGE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([a.to_string(), b.to_string()], edge_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EdgeRow> {
    Ok(EdgeRow {
        id: uuid_col(row, 0)?,
        status: edge_status_col(row, 1)?,
        created_at: row.get(2)?,
        accepted_at: row.get(3)?,
        from_user: ProfileRow::from_row(row, 4)?,
        to_user: ProfileRow::from_row(row, 4 + ProfileRow::COLUMNS)?,
    })
}
