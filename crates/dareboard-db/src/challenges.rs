use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

use crate::Database;
use crate::models::{ExecutionRow, InviteRow, ProfileRow, TaskRow, challenge_status_col, uuid_col};
use crate::queries::OptionalExt;

const INVITE_SELECT: &str = "
    SELECT c.id, c.message, c.status, c.created_at, c.responded_at, c.completed_at,
           f.id, f.name, f.profile_image, f.avatar_color, f.daily_streak, f.last_completion_at,
           u.id, u.name, u.profile_image, u.avatar_color, u.daily_streak, u.last_completion_at,
           k.id, k.creator_id, k.title, k.description, k.image_url, k.created_at,
           e.id, e.task_id, e.user_id, e.executed_at, e.completed, e.completed_at
    FROM challenge_invites c
    JOIN profiles f ON f.id = c.from_user
    JOIN profiles u ON u.id = c.to_user
    JOIN tasks k ON k.id = c.task_id
    LEFT JOIN executions e ON e.id = c.execution_id";

const FROM_AT: usize = 6;
const TO_AT: usize = FROM_AT + ProfileRow::COLUMNS;
const TASK_AT: usize = TO_AT + ProfileRow::COLUMNS;
const EXECUTION_AT: usize = TASK_AT + 6;

impl Database {
    /// Live-query view: invites sent or received by `user_id`, oldest first.
    pub fn challenge_invites_touching(&self, user_id: Uuid) -> Result<Vec<InviteRow>> {
        self.with_conn(|conn| query_invites_touching(conn, user_id))
    }

    pub fn get_challenge_invite(&self, id: Uuid) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| query_invite(conn, id))
    }
}

pub fn query_invites_touching(conn: &Connection, user_id: Uuid) -> Result<Vec<InviteRow>> {
    let sql = format!(
        "{} WHERE c.from_user = ?1 OR c.to_user = ?1 ORDER BY c.created_at, c.rowid",
        INVITE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], invite_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn query_invite(conn: &Connection, id: Uuid) -> Result<Option<InviteRow>> {
    let sql = format!("{} WHERE c.id = ?1", INVITE_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], invite_from_row).optional()?;
    Ok(row)
}

/// The invite whose one-to-one execution link points at `execution_id`.
pub fn query_invite_by_execution(conn: &Connection, execution_id: Uuid) -> Result<Option<InviteRow>> {
    let sql = format!("{} WHERE c.execution_id = ?1", INVITE_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row([execution_id.to_string()], invite_from_row)
        .optional()?;
    Ok(row)
}

pub fn pending_invite_exists(
    conn: &Connection,
    from_user: Uuid,
    to_user: Uuid,
    task_id: Uuid,
) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM challenge_invites
            WHERE from_user = ?1 AND to_user = ?2 AND task_id = ?3 AND status = 'pending'
        )",
        [from_user.to_string(), to_user.to_string(), task_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn invite_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InviteRow> {
    let execution = match row.get::<_, Option<String>>(EXECUTION_AT)? {
        Some(_) => Some(ExecutionRow::from_row(row, EXECUTION_AT)?),
        None => None,
    };

    Ok(InviteRow {
        id: uuid_col(row, 0)?,
        message: row.get(1)?,
        status: challenge_status_col(row, 2)?,
        created_at: row.get(3)?,
        responded_at: row.get(4)?,
        completed_at: row.get(5)?,
        from_user: ProfileRow::from_row(row, FROM_AT)?,
        to_user: ProfileRow::from_row(row, TO_AT)?,
        task: TaskRow::from_row(row, TASK_AT)?,
        execution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{TxOp, apply};
    use crate::queries::insert_profile;
    use dareboard_types::models::ChallengeStatus;

    struct Fixture {
        db: Database,
        ada: Uuid,
        bob: Uuid,
        task: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let (ada, bob, task) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        db.transact(|tx| {
            insert_profile(tx, ada, "ada", None, None, 0)?;
            insert_profile(tx, bob, "bob", None, None, 0)?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
        db.create_task(task, ada, "Cold shower", "Two minutes", None, 0).unwrap();
        Fixture { db, ada, bob, task }
    }

    fn invite_op(f: &Fixture, id: Uuid) -> TxOp {
        TxOp::CreateChallenge {
            id,
            from_user: f.ada,
            to_user: f.bob,
            task_id: f.task,
            message: Some("go".into()),
            at: 5,
        }
    }

    #[test]
    fn pending_uniqueness_is_enforced_by_index() {
        let f = fixture();
        let first = Uuid::new_v4();
        f.db.transact(|tx| apply(tx, &[invite_op(&f, first)])).unwrap();

        let dup: Result<()> = f.db.transact(|tx| apply(tx, &[invite_op(&f, Uuid::new_v4())]));
        assert!(dup.is_err());

        // Once the first leaves `pending`, a new invite for the same pair is fine.
        f.db.transact(|tx| {
            apply(
                tx,
                &[TxOp::RespondChallenge {
                    id: first,
                    status: ChallengeStatus::Declined,
                    at: 6,
                }],
            )
        })
        .unwrap();
        f.db.transact(|tx| apply(tx, &[invite_op(&f, Uuid::new_v4())])).unwrap();

        let all = f.db.challenge_invites_touching(f.bob).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].status, ChallengeStatus::Declined);
        assert_eq!(all[1].status, ChallengeStatus::Pending);
    }

    #[test]
    fn execution_link_is_expanded() {
        let f = fixture();
        let (invite, execution) = (Uuid::new_v4(), Uuid::new_v4());
        f.db.transact(|tx| {
            apply(
                tx,
                &[
                    invite_op(&f, invite),
                    TxOp::RespondChallenge {
                        id: invite,
                        status: ChallengeStatus::Accepted,
                        at: 7,
                    },
                    TxOp::CreateExecution {
                        id: execution,
                        task_id: f.task,
                        user_id: f.bob,
                        at: 7,
                    },
                    TxOp::LinkChallengeExecution {
                        invite_id: invite,
                        execution_id: execution,
                    },
                ],
            )
        })
        .unwrap();

        let row = f.db.get_challenge_invite(invite).unwrap().unwrap();
        assert_eq!(row.status, ChallengeStatus::Accepted);
        assert_eq!(row.responded_at, Some(7));
        assert_eq!(row.task.title, "Cold shower");
        let exec = row.execution.unwrap();
        assert_eq!(exec.id, execution);
        assert!(!exec.completed);

        let by_exec = f.db.with_conn(|c| query_invite_by_execution(c, execution)).unwrap();
        assert_eq!(by_exec.map(|r| r.id), Some(invite));
        assert!(!f.db.with_conn(|c| pending_invite_exists(c, f.ada, f.bob, f.task)).unwrap());
    }
}
