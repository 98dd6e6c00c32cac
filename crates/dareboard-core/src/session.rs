use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use uuid::Uuid;

use crate::in_flight::InFlight;
use crate::rate_limit::{RateLimitConfig, SlidingWindow};

/// Per-user, in-memory submission state. Lost on restart.
#[derive(Default)]
pub struct UserSession {
    /// Keyed by peer id; shared by send and accept.
    pub friend_locks: InFlight<Uuid>,
    /// Keyed by `"{to_user}:{task}"` for sends and by invite id for responses.
    pub challenge_locks: InFlight<String>,
    friend_requests: Mutex<SlidingWindow>,
}

impl UserSession {
    pub fn try_record_friend_request(&self, now: Instant, config: &RateLimitConfig) -> bool {
        self.friend_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_record(now, config)
    }
}

#[derive(Default)]
pub struct Sessions {
    users: Mutex<HashMap<Uuid, Arc<UserSession>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session only; read paths must not create one per caller.
    pub fn find(&self, user_id: Uuid) -> Option<Arc<UserSession>> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    pub fn get(&self, user_id: Uuid) -> Arc<UserSession> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .clone()
    }
}
