use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use dareboard_types::api::{
    ActionResult, Claims, PendingInviteQuery, PendingInviteResponse, SendChallengeRequest,
};
use dareboard_types::events::ChangeNotice;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn list_challenges(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let board = blocking(move || social.challenge_board(claims.sub)).await?;
    Ok(Json(board.to_response()))
}

pub async fn pending_invite(
    State(state): State<AppState>,
    Query(query): Query<PendingInviteQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let pending = blocking(move || {
        social.has_pending_invite(claims.sub, query.to_user_id, query.task_id)
    })
    .await?;
    Ok(Json(PendingInviteResponse { pending }))
}

pub async fn send_challenge(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let to_user = req.to_user_id;
    let invite_id = blocking(move || {
        social.send_challenge(claims.sub, req.to_user_id, req.task_id, req.message.as_deref())
    })
    .await?;

    state.dispatcher.broadcast(ChangeNotice::ChallengeInvites {
        users: [claims.sub, to_user],
    });
    Ok((StatusCode::CREATED, Json(ActionResult::created(invite_id))))
}

/// Responds with the id of the execution the acceptance started.
pub async fn accept_challenge(
    State(state): State<AppState>,
    Path(invite_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let accepted = blocking(move || social.accept_challenge(claims.sub, invite_id)).await?;

    state.dispatcher.broadcast(ChangeNotice::ChallengeInvites {
        users: [accepted.from_user, claims.sub],
    });
    Ok(Json(ActionResult::created(accepted.execution_id)))
}

pub async fn decline_challenge(
    State(state): State<AppState>,
    Path(invite_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let social = state.social.clone();
    let declined = blocking(move || social.decline_challenge(claims.sub, invite_id)).await?;

    state.dispatcher.broadcast(ChangeNotice::ChallengeInvites {
        users: [declined.from_user, claims.sub],
    });
    Ok(Json(ActionResult::ok()))
}
