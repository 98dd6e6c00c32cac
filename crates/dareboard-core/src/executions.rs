use tracing::info;
use uuid::Uuid;

use dareboard_db::models::{ProfileRow, TaskRow};
use dareboard_db::ops;
use dareboard_db::queries::{query_execution, query_open_execution, query_profile, query_task};

use crate::challenges::{InviteRef, completion_op};
use crate::streak::next_streak;
use crate::{Rejection, Result, Social, TxOp, now_ms};

pub const MAX_TASK_TITLE_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub execution_id: Uuid,
    pub task_id: Uuid,
    pub daily_streak: u32,
    pub completed_challenge: Option<InviteRef>,
}

impl Social {
    // -- Profiles --

    pub fn upsert_profile(
        &self,
        me: Uuid,
        name: &str,
        profile_image: Option<&str>,
        avatar_color: Option<&str>,
    ) -> Result<ProfileRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::NameRequired.into());
        }
        Ok(self
            .db()
            .upsert_profile(me, name, profile_image, avatar_color, now_ms())?)
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<ProfileRow>> {
        Ok(self.db().get_profile(id)?)
    }

    /// Peers whose snapshot shows `me`'s profile and must refresh when it changes.
    pub fn profile_audience(&self, me: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.db().profile_audience(me)?)
    }

    // -- Tasks --

    pub fn create_task(
        &self,
        me: Uuid,
        title: &str,
        description: &str,
        image_url: Option<&str>,
    ) -> Result<TaskRow> {
        self.require_profile(me)?;
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TASK_TITLE_CHARS {
            return Err(Rejection::InvalidTitle.into());
        }
        let task = self
            .db()
            .create_task(Uuid::new_v4(), me, title, description.trim(), image_url, now_ms())?;
        info!(task_id = %task.id, creator = %me, "Task created");
        Ok(task)
    }

    // -- Executions --

    /// The feed's "Execute" action: one open execution per user and task.
    pub fn execute_task(&self, me: Uuid, task_id: Uuid) -> Result<Uuid> {
        self.require_profile(me)?;
        let (id, at) = (Uuid::new_v4(), now_ms());
        self.db().transact(|tx| -> Result<()> {
            if query_task(tx, task_id)?.is_none() {
                return Err(Rejection::TaskNotFound.into());
            }
            if query_open_execution(tx, task_id, me)?.is_some() {
                return Err(Rejection::AlreadyExecuting.into());
            }
            ops::apply(
                tx,
                &[TxOp::CreateExecution {
                    id,
                    task_id,
                    user_id: me,
                    at,
                }],
            )?;
            Ok(())
        })?;

        info!(event = "task_executed", task_id = %task_id, user_id = %me, source = "feed");
        Ok(id)
    }

    /// Mark an execution done, move the owner's streak, and complete the
    /// challenge it was started from, all in one batch.
    pub fn complete_execution(&self, me: Uuid, execution_id: Uuid) -> Result<Completion> {
        self.require_profile(me)?;
        let at = now_ms();
        let completion = self.db().transact(|tx| -> Result<Completion> {
            let execution = query_execution(tx, execution_id)?.ok_or(Rejection::ExecutionNotFound)?;
            if execution.user_id != me {
                return Err(Rejection::NotExecutionOwner.into());
            }
            if execution.completed {
                return Err(Rejection::AlreadyCompleted.into());
            }

            let profile = query_profile(tx, me)?.ok_or(Rejection::ProfileMissing)?;
            let daily_streak = next_streak(profile.daily_streak, profile.last_completion_at, at);

            let mut batch = vec![
                TxOp::CompleteExecution { id: execution_id, at },
                TxOp::SetStreak {
                    user_id: me,
                    daily_streak,
                    last_completion_at: at,
                },
            ];
            let challenge = completion_op(tx, me, execution_id, at)?;
            if let Some((op, _)) = &challenge {
                batch.push(op.clone());
            }
            ops::apply(tx, &batch)?;

            Ok(Completion {
                execution_id,
                task_id: execution.task_id,
                daily_streak,
                completed_challenge: challenge.map(|(_, invite)| invite),
            })
        })?;

        info!(
            event = "task_completed",
            task_id = %completion.task_id,
            user_id = %me,
            daily_streak = completion.daily_streak
        );
        if let Some(invite) = &completion.completed_challenge {
            info!(event = "challenge_completed", invite_id = %invite.invite_id, execution_id = %execution_id);
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SocialError;
    use crate::testing::{friends, social, task, user};
    use dareboard_types::models::ChallengeStatus;

    fn rejection<T: std::fmt::Debug>(result: Result<T>) -> Rejection {
        match result {
            Err(SocialError::Rejected(r)) => r,
            other => panic!("expected a rejection, got {:?}", other),
        }
    }

    #[test]
    fn profile_upsert_keeps_streak() {
        let s = social();
        let a = user(&s, "ada");
        let t = task(&s, a, "Cold shower");
        let e = s.execute_task(a, t).unwrap();
        s.complete_execution(a, e).unwrap();

        let updated = s.upsert_profile(a, "  Ada L. ", None, Some("#ff8800")).unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(updated.avatar_color.as_deref(), Some("#ff8800"));
        assert_eq!(updated.daily_streak, 1);
        assert_eq!(rejection(s.upsert_profile(a, "  ", None, None)), Rejection::NameRequired);
    }

    #[test]
    fn profile_audience_covers_friends_and_challenge_peers() {
        let s = social();
        let (a, b, c, d) = (user(&s, "ada"), user(&s, "bob"), user(&s, "cy"), user(&s, "di"));
        friends(&s, a, b);
        friends(&s, a, c);
        let t = task(&s, a, "Plank");
        s.send_challenge(a, c, t, None).unwrap();
        // Challenge peer stays visible after the friendship ends.
        s.unfriend(a, c).unwrap();
        s.send_friend_request(d, a).unwrap();

        let mut audience = s.profile_audience(a).unwrap();
        audience.sort();
        let mut expected = vec![b, c, d];
        expected.sort();
        assert_eq!(audience, expected);
        assert_eq!(s.profile_audience(b).unwrap(), vec![a]);
    }

    #[test]
    fn task_title_is_validated() {
        let s = social();
        let a = user(&s, "ada");
        assert_eq!(rejection(s.create_task(a, " ", "", None)), Rejection::InvalidTitle);
        assert_eq!(
            rejection(s.create_task(a, &"t".repeat(MAX_TASK_TITLE_CHARS + 1), "", None)),
            Rejection::InvalidTitle
        );
        assert_eq!(
            rejection(s.create_task(Uuid::new_v4(), "Run", "", None)),
            Rejection::ProfileMissing
        );
        let created = s.create_task(a, " Run 5k ", "before work", None).unwrap();
        assert_eq!(created.title, "Run 5k");
        assert_eq!(created.creator_id, Some(a));
    }

    #[test]
    fn one_open_execution_per_task() {
        let s = social();
        let a = user(&s, "ada");
        let t = task(&s, a, "Cold shower");

        let e = s.execute_task(a, t).unwrap();
        assert_eq!(rejection(s.execute_task(a, t)), Rejection::AlreadyExecuting);
        assert_eq!(rejection(s.execute_task(a, Uuid::new_v4())), Rejection::TaskNotFound);

        let done = s.complete_execution(a, e).unwrap();
        assert_eq!(done.daily_streak, 1);
        assert_eq!(done.completed_challenge, None);
        assert_eq!(rejection(s.complete_execution(a, e)), Rejection::AlreadyCompleted);

        // A finished execution doesn't block the next one.
        s.execute_task(a, t).unwrap();
    }

    #[test]
    fn only_the_owner_completes() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        let t = task(&s, a, "Cold shower");
        let e = s.execute_task(a, t).unwrap();

        assert_eq!(rejection(s.complete_execution(b, e)), Rejection::NotExecutionOwner);
        assert_eq!(rejection(s.complete_execution(a, Uuid::new_v4())), Rejection::ExecutionNotFound);
        assert!(!s.db().get_execution(e).unwrap().unwrap().completed);
    }

    #[test]
    fn completing_a_challenge_execution_completes_the_invite() {
        let s = social();
        let (a, b) = (user(&s, "ada"), user(&s, "bob"));
        friends(&s, a, b);
        let t = task(&s, a, "Cold shower");
        let invite = s.send_challenge(a, b, t, None).unwrap();
        let accepted = s.accept_challenge(b, invite).unwrap();

        // The challenge execution counts as the open one.
        assert_eq!(rejection(s.execute_task(b, t)), Rejection::AlreadyExecuting);

        let done = s.complete_execution(b, accepted.execution_id).unwrap();
        assert_eq!(done.completed_challenge.map(|c| c.invite_id), Some(invite));

        let row = s.db().get_challenge_invite(invite).unwrap().unwrap();
        assert_eq!(row.status, ChallengeStatus::Completed);
        let execution = row.execution.unwrap();
        assert!(execution.completed);
        assert!(execution.completed_at.is_some());
    }
}
