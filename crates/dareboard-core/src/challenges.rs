use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use dareboard_db::challenges::{pending_invite_exists, query_invite, query_invite_by_execution};
use dareboard_db::models::InviteRow;
use dareboard_db::ops;
use dareboard_db::queries::query_task;
use dareboard_db::relationships::query_edges_between;
use dareboard_types::api::{ChallengeInviteView, ChallengesResponse};
use dareboard_types::models::{ChallengeStatus, EdgeStatus, MAX_CHALLENGE_MESSAGE_CHARS};

use crate::{Rejection, Result, Social, SocialError, TxOp, now_ms};

/// One user's view of the challenge invites they sent or received.
#[derive(Debug, Clone)]
pub struct ChallengeBoard {
    me: Uuid,
    invites: Vec<InviteRow>,
}

impl ChallengeBoard {
    pub fn new(me: Uuid, mut invites: Vec<InviteRow>) -> Self {
        invites.retain(|i| i.from_user.id == me || i.to_user.id == me);
        Self { me, invites }
    }

    /// Pending invites addressed to me, newest first.
    pub fn incoming(&self) -> Vec<ChallengeInviteView> {
        newest_first(
            self.invites
                .iter()
                .filter(|i| i.to_user.id == self.me && i.status == ChallengeStatus::Pending),
        )
    }

    /// Everything I sent, any status, newest first.
    pub fn sent(&self) -> Vec<ChallengeInviteView> {
        newest_first(self.invites.iter().filter(|i| i.from_user.id == self.me))
    }

    pub fn sent_for_task(&self, task_id: Uuid) -> Vec<ChallengeInviteView> {
        newest_first(
            self.invites
                .iter()
                .filter(|i| i.from_user.id == self.me && i.task.id == task_id),
        )
    }

    pub fn has_pending_invite(&self, to_user: Uuid, task_id: Uuid) -> bool {
        self.invites.iter().any(|i| {
            i.from_user.id == self.me
                && i.to_user.id == to_user
                && i.task.id == task_id
                && i.status == ChallengeStatus::Pending
        })
    }

    pub fn find(&self, invite_id: Uuid) -> Option<&InviteRow> {
        self.invites.iter().find(|i| i.id == invite_id)
    }

    pub fn to_response(&self) -> ChallengesResponse {
        ChallengesResponse {
            incoming_challenges: self.incoming(),
            sent_challenges: self.sent(),
        }
    }
}

// Rows arrive oldest first; reversing before the stable sort puts later rows
// first among equal timestamps.
fn newest_first<'a>(invites: impl DoubleEndedIterator<Item = &'a InviteRow>) -> Vec<ChallengeInviteView> {
    let mut rows: Vec<&InviteRow> = invites.rev().collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows.into_iter().map(InviteRow::to_view).collect()
}

/// Trimmed message; blank becomes absent.
pub fn normalize_message(raw: Option<&str>) -> std::result::Result<Option<String>, Rejection> {
    let Some(message) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };
    if message.chars().count() > MAX_CHALLENGE_MESSAGE_CHARS {
        return Err(Rejection::MessageTooLong);
    }
    Ok(Some(message.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedChallenge {
    pub invite_id: Uuid,
    pub execution_id: Uuid,
    pub from_user: Uuid,
    pub task_id: Uuid,
}

/// An invite that moved to a terminal state, and who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InviteRef {
    pub invite_id: Uuid,
    pub from_user: Uuid,
}

/// Task exists, both accepted edges exist, and no invite for the pair and task is pending.
fn check_challengeable(conn: &Connection, me: Uuid, to: Uuid, task_id: Uuid) -> Result<()> {
    if query_task(conn, task_id)?.is_none() {
        return Err(Rejection::TaskNotFound.into());
    }

    let edges = query_edges_between(conn, me, to)?;
    let accepted = |from: Uuid, to: Uuid| {
        edges
            .iter()
            .any(|e| e.from_user.id == from && e.to_user.id == to && e.status == EdgeStatus::Accepted)
    };
    if !(accepted(me, to) && accepted(to, me)) {
        return Err(Rejection::NotFriends.into());
    }

    if pending_invite_exists(conn, me, to, task_id)? {
        return Err(Rejection::DuplicateChallenge.into());
    }
    Ok(())
}

fn check_respondable(invite: &InviteRow, me: Uuid) -> Result<()> {
    if invite.to_user.id != me {
        return Err(Rejection::NotInviteRecipient.into());
    }
    if invite.status != ChallengeStatus::Pending {
        return Err(Rejection::InviteNotPending.into());
    }
    Ok(())
}

/// The completion op for the accepted invite linked to `execution_id`, if any.
pub(crate) fn completion_op(
    conn: &Connection,
    me: Uuid,
    execution_id: Uuid,
    at: i64,
) -> anyhow::Result<Option<(TxOp, InviteRef)>> {
    let invite = query_invite_by_execution(conn, execution_id)?
        .filter(|i| i.status == ChallengeStatus::Accepted && i.to_user.id == me);

    Ok(invite.map(|i| {
        (
            TxOp::CompleteChallenge { id: i.id, at },
            InviteRef {
                invite_id: i.id,
                from_user: i.from_user.id,
            },
        )
    }))
}

impl Social {
    pub fn challenge_board(&self, me: Uuid) -> Result<ChallengeBoard> {
        Ok(ChallengeBoard::new(me, self.db().challenge_invites_touching(me)?))
    }

    pub fn has_pending_invite(&self, me: Uuid, to_user: Uuid, task_id: Uuid) -> Result<bool> {
        Ok(self.db().with_conn(|conn| pending_invite_exists(conn, me, to_user, task_id))?)
    }

    pub fn sent_challenges_for_task(&self, me: Uuid, task_id: Uuid) -> Result<Vec<ChallengeInviteView>> {
        Ok(self.challenge_board(me)?.sent_for_task(task_id))
    }

    pub fn send_challenge(
        &self,
        me: Uuid,
        to: Uuid,
        task_id: Uuid,
        message: Option<&str>,
    ) -> Result<Uuid> {
        self.require_profile(me)?;
        if me == to {
            return Err(Rejection::SelfTarget.into());
        }
        let message = normalize_message(message)?;

        self.db()
            .with_conn(|conn| Ok(check_challengeable(conn, me, to, task_id)))??;

        let session = self.session(me);
        let _guard = session
            .challenge_locks
            .try_acquire(format!("{}:{}", to, task_id))
            .ok_or(SocialError::Rejected(Rejection::InFlight))?;

        let (id, at) = (Uuid::new_v4(), now_ms());
        self.db().transact(|tx| {
            // The pair may have unfriended or another invite landed since the pre-check.
            check_challengeable(tx, me, to, task_id)?;
            ops::apply(
                tx,
                &[TxOp::CreateChallenge {
                    id,
                    from_user: me,
                    to_user: to,
                    task_id,
                    message: message.clone(),
                    at,
                }],
            )?;
            Ok::<_, SocialError>(())
        })?;

        info!(
            event = "challenge_sent",
            invite_id = %id,
            from_user = %me,
            to_user = %to,
            task_id = %task_id,
            has_message = message.is_some()
        );
        Ok(id)
    }

    /// Accept a pending invite and start the linked execution in the same batch.
    pub fn accept_challenge(&self, me: Uuid, invite_id: Uuid) -> Result<AcceptedChallenge> {
        self.require_profile(me)?;
        let session = self.session(me);
        let _guard = session
            .challenge_locks
            .try_acquire(invite_id.to_string())
            .ok_or(SocialError::Rejected(Rejection::InFlight))?;

        let (execution_id, at) = (Uuid::new_v4(), now_ms());
        let accepted = self.db().transact(|tx| {
            let invite = query_invite(tx, invite_id)?.ok_or(Rejection::InviteNotFound)?;
            check_respondable(&invite, me)?;

            ops::apply(
                tx,
                &[
                    TxOp::RespondChallenge {
                        id: invite.id,
                        status: ChallengeStatus::Accepted,
                        at,
                    },
                    TxOp::CreateExecution {
                        id: execution_id,
                        task_id: invite.task.id,
                        user_id: me,
                        at,
                    },
                    TxOp::LinkChallengeExecution {
                        invite_id: invite.id,
                        execution_id,
                    },
                ],
            )?;

            Ok::<_, SocialError>(AcceptedChallenge {
                invite_id: invite.id,
                execution_id,
                from_user: invite.from_user.id,
                task_id: invite.task.id,
            })
        })?;

        info!(
            event = "challenge_accepted",
            invite_id = %invite_id,
            from_user = %accepted.from_user,
            to_user = %me,
            execution_id = %execution_id
        );
        info!(event = "task_executed", task_id = %accepted.task_id, user_id = %me, source = "challenge");
        Ok(accepted)
    }

    pub fn decline_challenge(&self, me: Uuid, invite_id: Uuid) -> Result<InviteRef> {
        self.require_profile(me)?;
        let session = self.session(me);
        let _guard = session
            .challenge_locks
            .try_acquire(invite_id.to_string())
            .ok_or(SocialError::Rejected(Rejection::InFlight))?;

        let at = now_ms();
        let declined = self.db().transact(|tx| {
            let invite = query_invite(tx, invite_id)?.ok_or(Rejection::InviteNotFound)?;
            check_respondable(&invite, me)?;
            ops::apply(
                tx,
                &[TxOp::RespondChallenge {
                    id: invite.id,
                    status: ChallengeStatus::Declined,
                    at,
                }],
            )?;
            Ok::<_, SocialError>(InviteRef {
                invite_id: invite.id,
                from_user: invite.from_user.id,
            })
        })?;

        info!(event = "challenge_declined", invite_id = %invite_id, from_user = %declined.from_user, to_user = %me);
        Ok(declined)
    }

    /// Complete the accepted invite linked to `execution_id`. Most executions
    /// have no invite; that is `Ok(None)`, not an error.
    pub fn mark_challenge_completed(&self, me: Uuid, execution_id: Uuid) -> Result<Option<InviteRef>> {
        self.require_profile(me)?;
        let at = now_ms();
        let completed = self.db().transact(|tx| {
            let Some((op, invite)) = completion_op(tx, me, execution_id, at)? else {
                return Ok::<_, SocialError>(None);
            };
            ops::apply(tx, &[op])?;
            Ok(Some(invite))
        })?;

        if let Some(invite) = &completed {
            info!(event = "challenge_completed", invite_id = %invite.invite_id, execution_id = %execution_id);
        }
        Ok(completed)
    }
}
