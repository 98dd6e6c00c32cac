use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use dareboard_core::{Rejection, SocialError};
use dareboard_types::api::ActionResult;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Social(#[from] SocialError),

    #[error("spawn_blocking join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        Self::Social(SocialError::Rejected(r))
    }
}

pub fn status_for(rejection: Rejection) -> StatusCode {
    use Rejection::*;
    match rejection {
        ProfileMissing | SelfTarget | MessageTooLong | NameRequired | InvalidTitle => {
            StatusCode::BAD_REQUEST
        }
        NotFriends | NotInviteRecipient | NotExecutionOwner => StatusCode::FORBIDDEN,
        UnknownUser | NoPendingRequest | TaskNotFound | InviteNotFound | ExecutionNotFound => {
            StatusCode::NOT_FOUND
        }
        InFlight | AlreadyRelated | DuplicateChallenge | InviteNotPending | AlreadyExecuting
        | AlreadyCompleted => StatusCode::CONFLICT,
        RateLimited => StatusCode::TOO_MANY_REQUESTS,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Social(SocialError::Rejected(r)) => (
                status_for(r),
                Json(ActionResult::failed(r.message(), Some(r.code()))),
            )
                .into_response(),
            Self::Social(SocialError::Store(e)) => {
                error!("Store error: {:#}", e);
                internal()
            }
            Self::Join(e) => {
                error!("spawn_blocking join error: {}", e);
                internal()
            }
        }
    }
}

fn internal() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResult::failed("Internal server error", None)),
    )
        .into_response()
}

/// Run blocking store work off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SocialError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
