//! The write primitive: an ordered batch of per-entity operations applied
//! inside one transaction.
//!
//! Every status-changing op is conditional on the row still being in the state
//! it was read in. If nothing matched, the op fails and the caller's
//! transaction rolls back, so a batch either lands whole or not at all.

use anyhow::{Result, bail};
use rusqlite::Connection;
use uuid::Uuid;

use dareboard_types::models::{ChallengeStatus, EdgeStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOp {
    /// New directed edge. Accepted edges get `accepted_at = at`.
    CreateRelationship {
        id: Uuid,
        from_user: Uuid,
        to_user: Uuid,
        status: EdgeStatus,
        at: i64,
    },
    /// pending -> accepted
    AcceptRelationship { id: Uuid, at: i64 },
    DeleteRelationship { id: Uuid },

    CreateChallenge {
        id: Uuid,
        from_user: Uuid,
        to_user: Uuid,
        task_id: Uuid,
        message: Option<String>,
        at: i64,
    },
    /// pending -> accepted | declined, stamping `responded_at`.
    RespondChallenge {
        id: Uuid,
        status: ChallengeStatus,
        at: i64,
    },
    /// accepted -> completed, stamping `completed_at`.
    CompleteChallenge { id: Uuid, at: i64 },
    /// Set the one-to-one execution link; only once per invite.
    LinkChallengeExecution { invite_id: Uuid, execution_id: Uuid },

    CreateExecution {
        id: Uuid,
        task_id: Uuid,
        user_id: Uuid,
        at: i64,
    },
    CompleteExecution { id: Uuid, at: i64 },

    SetStreak {
        user_id: Uuid,
        daily_streak: u32,
        last_completion_at: i64,
    },
}

pub fn apply(conn: &Connection, ops: &[TxOp]) -> Result<()> {
    for op in ops {
        apply_one(conn, op)?;
    }
    Ok(())
}

fn apply_one(conn: &Connection, op: &TxOp) -> Result<()> {
    match op {
        TxOp::CreateRelationship {
            id,
            from_user,
            to_user,
            status,
            at,
        } => {
            let accepted_at = (*status == EdgeStatus::Accepted).then_some(*at);
            conn.execute(
                "INSERT INTO relationships (id, from_user, to_user, status, created_at, accepted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.to_string(),
                    from_user.to_string(),
                    to_user.to_string(),
                    status.as_str(),
                    at,
                    accepted_at
                ],
            )?;
        }

        TxOp::AcceptRelationship { id, at } => {
            let n = conn.execute(
                "UPDATE relationships SET status = 'accepted', accepted_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id.to_string(), at],
            )?;
            expect_one(n, op)?;
        }

        TxOp::DeleteRelationship { id } => {
            let n = conn.execute("DELETE FROM relationships WHERE id = ?1", [id.to_string()])?;
            expect_one(n, op)?;
        }

        TxOp::CreateChallenge {
            id,
            from_user,
            to_user,
            task_id,
            message,
            at,
        } => {
            conn.execute(
                "INSERT INTO challenge_invites (id, from_user, to_user, task_id, message, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                rusqlite::params![
                    id.to_string(),
                    from_user.to_string(),
                    to_user.to_string(),
                    task_id.to_string(),
                    message,
                    at
                ],
            )?;
        }

        TxOp::RespondChallenge { id, status, at } => {
            if !ChallengeStatus::Pending.can_transition_to(*status) {
                bail!("Invalid challenge response: {}", status);
            }
            let n = conn.execute(
                "UPDATE challenge_invites SET status = ?2, responded_at = ?3
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id.to_string(), status.as_str(), at],
            )?;
            expect_one(n, op)?;
        }

        TxOp::CompleteChallenge { id, at } => {
            let n = conn.execute(
                "UPDATE challenge_invites SET status = 'completed', completed_at = ?2
                 WHERE id = ?1 AND status = 'accepted'",
                rusqlite::params![id.to_string(), at],
            )?;
            expect_one(n, op)?;
        }

        TxOp::LinkChallengeExecution {
            invite_id,
            execution_id,
        } => {
            let n = conn.execute(
                "UPDATE challenge_invites SET execution_id = ?2
                 WHERE id = ?1 AND execution_id IS NULL",
                rusqlite::params![invite_id.to_string(), execution_id.to_string()],
            )?;
            expect_one(n, op)?;
        }

        TxOp::CreateExecution {
            id,
            task_id,
            user_id,
            at,
        } => {
            conn.execute(
                "INSERT INTO executions (id, task_id, user_id, executed_at, completed)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                rusqlite::params![id.to_string(), task_id.to_string(), user_id.to_string(), at],
            )?;
        }

        TxOp::CompleteExecution { id, at } => {
            let n = conn.execute(
                "UPDATE executions SET completed = 1, completed_at = ?2
                 WHERE id = ?1 AND completed = 0",
                rusqlite::params![id.to_string(), at],
            )?;
            expect_one(n, op)?;
        }

        TxOp::SetStreak {
            user_id,
            daily_streak,
            last_completion_at,
        } => {
            let n = conn.execute(
                "UPDATE profiles SET daily_streak = ?2, last_completion_at = ?3 WHERE id = ?1",
                rusqlite::params![user_id.to_string(), daily_streak, last_completion_at],
            )?;
            expect_one(n, op)?;
        }
    }
    Ok(())
}

fn expect_one(changed: usize, op: &TxOp) -> Result<()> {
    if changed != 1 {
        bail!("{:?} matched {} rows, expected 1", op, changed);
    }
    Ok(())
}
