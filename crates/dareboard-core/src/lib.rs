//! Friendship graph and challenge workflow, enforced at the server boundary.
//!
//! Every mutating operation re-reads the rows it depends on inside one store
//! transaction, plans a batch of [`TxOp`]s and applies it. Per-user in-memory
//! state (in-flight locks, the friend-request window) only suppresses duplicate
//! submissions; the store constraints remain the authority.

pub mod challenges;
pub mod error;
pub mod executions;
pub mod graph;
pub mod in_flight;
pub mod rate_limit;
pub mod session;
pub mod streak;

use std::sync::Arc;

use uuid::Uuid;

use dareboard_db::Database;
use dareboard_db::models::ProfileRow;
use dareboard_types::api::SocialSnapshot;

pub use dareboard_db::TxOp;
pub use error::{Rejection, SocialError};

use challenges::ChallengeBoard;
use graph::RelationshipGraph;
use rate_limit::RateLimitConfig;
use session::{Sessions, UserSession};

pub type Result<T> = std::result::Result<T, SocialError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SocialConfig {
    pub friend_requests: RateLimitConfig,
}

/// Shared handle to the engine. Cheap to clone.
#[derive(Clone)]
pub struct Social {
    inner: Arc<SocialInner>,
}

struct SocialInner {
    db: Arc<Database>,
    sessions: Sessions,
    config: SocialConfig,
}

impl Social {
    pub fn new(db: Arc<Database>, config: SocialConfig) -> Self {
        Self {
            inner: Arc::new(SocialInner {
                db,
                sessions: Sessions::new(),
                config,
            }),
        }
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn config(&self) -> &SocialConfig {
        &self.inner.config
    }

    pub(crate) fn session(&self, user_id: Uuid) -> Arc<UserSession> {
        self.inner.sessions.get(user_id)
    }

    pub(crate) fn existing_session(&self, user_id: Uuid) -> Option<Arc<UserSession>> {
        self.inner.sessions.find(user_id)
    }

    pub(crate) fn require_profile(&self, user_id: Uuid) -> Result<ProfileRow> {
        self.db()
            .get_profile(user_id)?
            .ok_or(SocialError::Rejected(Rejection::ProfileMissing))
    }

    /// Full live-query payload for `me`, recomputed from scratch.
    pub fn snapshot(&self, me: Uuid) -> anyhow::Result<SocialSnapshot> {
        let graph = RelationshipGraph::new(me, self.db().relationships_touching(me)?);
        let board = ChallengeBoard::new(me, self.db().challenge_invites_touching(me)?);

        Ok(SocialSnapshot {
            friends: graph.friends(),
            incoming_requests: graph.incoming_requests(),
            outgoing_requests: graph.outgoing_requests(),
            incoming_challenges: board.incoming(),
            sent_challenges: board.sent(),
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn social() -> Social {
        social_with(SocialConfig::default())
    }

    pub fn social_with(config: SocialConfig) -> Social {
        let db = Database::open_in_memory().unwrap();
        Social::new(Arc::new(db), config)
    }

    pub fn user(social: &Social, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        social.upsert_profile(id, name, None, None).unwrap();
        id
    }

    pub fn friends(social: &Social, a: Uuid, b: Uuid) {
        social.send_friend_request(a, b).unwrap();
        social.accept_friend_request(b, a).unwrap();
    }

    pub fn task(social: &Social, creator: Uuid, title: &str) -> Uuid {
        social.create_task(creator, title, "", None).unwrap().id
    }
}
