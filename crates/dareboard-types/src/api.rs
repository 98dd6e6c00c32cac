use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChallengeStatus, RelationshipStatus};

// -- JWT Claims --

/// JWT claims shared across dareboard-api (REST middleware) and dareboard-gateway
/// (WebSocket authentication). Tokens are minted by the auth provider; `sub`
/// is the profile id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Results --

/// Body of every mutating endpoint. Guard failures carry a message and a stable code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            id: None,
        }
    }

    pub fn created(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::ok()
        }
    }

    pub fn failed(error: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: code.map(str::to_string),
            id: None,
        }
    }
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub name: String,
    pub profile_image: Option<String>,
    pub avatar_color: Option<String>,
}

/// Profile fields shown next to a friend, request or challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub name: String,
    pub profile_image: Option<String>,
    pub avatar_color: Option<String>,
    pub daily_streak: u32,
}

// -- Friends --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendEntry {
    #[serde(flatten)]
    pub profile: ProfileSummary,
    pub relationship_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendsResponse {
    pub friends: Vec<FriendEntry>,
    pub incoming_requests: Vec<FriendEntry>,
    pub outgoing_requests: Vec<FriendEntry>,
    pub friend_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipStatusResponse {
    pub user_id: Uuid,
    pub status: RelationshipStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestOutcome {
    /// A new pending edge was created.
    Requested,
    /// The target had already asked; both edges are now accepted.
    AutoAccepted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestResponse {
    pub success: bool,
    pub outcome: FriendRequestOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfriendResponse {
    pub success: bool,
    pub removed: usize,
}

// -- Tasks & executions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteExecutionResponse {
    pub success: bool,
    pub execution_id: Uuid,
    pub daily_streak: u32,
    pub completed_challenge: Option<Uuid>,
}

// -- Challenges --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChallengeRequest {
    pub to_user_id: Uuid,
    pub task_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PendingInviteQuery {
    pub to_user_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInviteResponse {
    pub pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeInviteView {
    pub id: Uuid,
    pub message: Option<String>,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub from_user: ProfileSummary,
    pub to_user: ProfileSummary,
    pub task: TaskSummary,
    pub execution: Option<ExecutionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengesResponse {
    pub incoming_challenges: Vec<ChallengeInviteView>,
    pub sent_challenges: Vec<ChallengeInviteView>,
}

// -- Live query --

/// Everything a client renders for its social panel, recomputed from scratch
/// on every relevant change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSnapshot {
    pub friends: Vec<FriendEntry>,
    pub incoming_requests: Vec<FriendEntry>,
    pub outgoing_requests: Vec<FriendEntry>,
    pub incoming_challenges: Vec<ChallengeInviteView>,
    pub sent_challenges: Vec<ChallengeInviteView>,
}
