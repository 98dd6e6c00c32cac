use std::fmt;

/// A precondition that was not met. Nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ProfileMissing,
    UnknownUser,
    SelfTarget,
    RateLimited,
    InFlight,
    AlreadyRelated,
    NoPendingRequest,
    NotFriends,
    DuplicateChallenge,
    MessageTooLong,
    TaskNotFound,
    InviteNotFound,
    InviteNotPending,
    NotInviteRecipient,
    ExecutionNotFound,
    NotExecutionOwner,
    AlreadyExecuting,
    AlreadyCompleted,
    NameRequired,
    InvalidTitle,
}

impl Rejection {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProfileMissing => "profile_missing",
            Self::UnknownUser => "unknown_user",
            Self::SelfTarget => "self_target",
            Self::RateLimited => "rate_limited",
            Self::InFlight => "in_flight",
            Self::AlreadyRelated => "already_related",
            Self::NoPendingRequest => "no_pending_request",
            Self::NotFriends => "not_friends",
            Self::DuplicateChallenge => "duplicate_challenge",
            Self::MessageTooLong => "message_too_long",
            Self::TaskNotFound => "task_not_found",
            Self::InviteNotFound => "invite_not_found",
            Self::InviteNotPending => "invite_not_pending",
            Self::NotInviteRecipient => "not_invite_recipient",
            Self::ExecutionNotFound => "execution_not_found",
            Self::NotExecutionOwner => "not_execution_owner",
            Self::AlreadyExecuting => "already_executing",
            Self::AlreadyCompleted => "already_completed",
            Self::NameRequired => "name_required",
            Self::InvalidTitle => "invalid_title",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::ProfileMissing => "Set up your profile first",
            Self::UnknownUser => "User not found",
            Self::SelfTarget => "Cannot target yourself",
            Self::RateLimited => {
                "You are sending too many friend requests. Please try again later."
            }
            Self::InFlight => "Already processing",
            Self::AlreadyRelated => "Already friends or a request is pending",
            Self::NoPendingRequest => "No pending friend request from this user",
            Self::NotFriends => "Can only challenge accepted friends",
            Self::DuplicateChallenge => "Challenge already sent for this task",
            Self::MessageTooLong => "Message must be 200 characters or fewer",
            Self::TaskNotFound => "Task not found",
            Self::InviteNotFound => "Invite not found",
            Self::InviteNotPending => "Invite already responded",
            Self::NotInviteRecipient => "Not your invite",
            Self::ExecutionNotFound => "Execution not found",
            Self::NotExecutionOwner => "Not your execution",
            Self::AlreadyExecuting => "You're already on it",
            Self::AlreadyCompleted => "Already completed",
            Self::NameRequired => "Name is required",
            Self::InvalidTitle => "Title must be between 1 and 200 characters",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("{0}")]
    Rejected(Rejection),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SocialError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(r) => Some(*r),
            Self::Store(_) => None,
        }
    }
}

impl From<Rejection> for SocialError {
    fn from(r: Rejection) -> Self {
        Self::Rejected(r)
    }
}
